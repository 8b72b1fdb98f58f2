//! Debounced remote writes for free-text fields.
//!
//! Each [`FieldKey`] owns at most one pending timer. Scheduling again before
//! the quiet period ends replaces the timer; only the last schedule writes.
//! A write that already started is never aborted.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use super::lock;
use crate::model::{EntityRef, FieldKey};

type WriteFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type WriteFn = Box<dyn FnOnce() -> WriteFuture + Send>;

struct PendingWrite {
    generation: u64,
    write: WriteFn,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    next_generation: u64,
    pending: IndexMap<FieldKey, PendingWrite>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    inflight: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

/// Counts a running write; released even if the write task is aborted.
struct InFlight(Arc<Shared>);

impl InFlight {
    fn start(shared: &Arc<Shared>) -> Self {
        shared.inflight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(shared))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

/// One cancellable timer per field
#[derive(Clone, Default)]
pub struct Debouncer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &self.pending())
            .field("inflight", &self.shared.inflight.load(Ordering::SeqCst))
            .finish()
    }
}

impl Debouncer {
    pub fn new() -> Self {
        Debouncer::default()
    }

    /// Run `write` once `key` has been quiet for `quiet`.
    ///
    /// `write` should read the value it sends when it runs, not capture it
    /// here. Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&self, key: FieldKey, quiet: Duration, write: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let write: WriteFn = Box::new(move || Box::pin(write()));
        let mut state = self.shared.state();
        state.next_generation += 1;
        let generation = state.next_generation;

        let shared = Arc::clone(&self.shared);
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let ready = {
                let mut state = shared.state();
                let newest = state.pending.get(&timer_key).map(|p| p.generation) == Some(generation);
                if newest {
                    state
                        .pending
                        .shift_remove(&timer_key)
                        .map(|p| (p.write, InFlight::start(&shared)))
                } else {
                    None
                }
            };
            if let Some((write, _inflight)) = ready {
                debug!(key = %timer_key, "debounced write firing");
                write().await;
            }
        });

        debug!(key = %key, ?quiet, generation, "debounced write scheduled");
        let previous = state.pending.insert(
            key,
            PendingWrite {
                generation,
                write,
                timer,
            },
        );
        // An entry still in the map has not started writing.
        if let Some(previous) = previous {
            previous.timer.abort();
        }
    }

    /// Drop the pending write for `key`. Returns true if one was pending.
    pub fn cancel(&self, key: &FieldKey) -> bool {
        match self.shared.state().pending.shift_remove(key) {
            Some(p) => {
                p.timer.abort();
                debug!(key = %key, "debounced write cancelled");
                true
            }
            None => false,
        }
    }

    /// Drop every pending write matching `predicate`; returns how many
    pub fn cancel_where(&self, predicate: impl Fn(&FieldKey) -> bool) -> usize {
        let mut state = self.shared.state();
        let before = state.pending.len();
        state.pending.retain(|key, pending| {
            if predicate(key) {
                pending.timer.abort();
                false
            } else {
                true
            }
        });
        before - state.pending.len()
    }

    /// Drop every pending write of one entity
    pub fn cancel_entity(&self, entity: &EntityRef) -> usize {
        self.cancel_where(|key| &key.entity == entity)
    }

    /// Keys with a write still waiting for its quiet period
    pub fn pending(&self) -> Vec<FieldKey> {
        self.shared.state().pending.keys().cloned().collect()
    }

    pub fn is_pending(&self, key: &FieldKey) -> bool {
        self.shared.state().pending.contains_key(key)
    }

    /// Fire every pending write now, then wait for all running writes.
    pub async fn flush(&self) {
        let ready: Vec<(FieldKey, WriteFn, InFlight)> = {
            let mut state = self.shared.state();
            state
                .pending
                .drain(..)
                .map(|(key, p)| {
                    p.timer.abort();
                    (key, p.write, InFlight::start(&self.shared))
                })
                .collect()
        };
        for (key, write, _inflight) in ready {
            debug!(key = %key, "debounced write flushed");
            write().await;
        }
        self.wait_idle().await;
    }

    /// Wait until no debounced write is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, TaskId};
    use pretty_assertions::assert_eq;

    const QUIET: Duration = Duration::from_millis(500);

    /// A field value plus the log of values the "server" received
    #[derive(Clone, Default)]
    struct Harness {
        value: Arc<Mutex<String>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn type_text(&self, debouncer: &Debouncer, key: &FieldKey, text: &str) {
            *self.value.lock().unwrap() = text.to_string();
            let value = Arc::clone(&self.value);
            let sent = Arc::clone(&self.sent);
            debouncer.schedule(key.clone(), QUIET, move || async move {
                let current = value.lock().unwrap().clone();
                sent.lock().unwrap().push(current);
            });
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    fn key(id: &str) -> FieldKey {
        FieldKey::task(&TaskId::new(id), Field::TaskTitle)
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_sends_one_write() {
        let debouncer = Debouncer::new();
        let h = Harness::default();
        for text in ["a", "ab", "abc"] {
            h.type_text(&debouncer, &key("t1"), text);
            wait(100).await;
        }
        wait(1000).await;
        assert_eq!(h.sent(), vec!["abc"]);
        assert!(debouncer.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_between_keystrokes_sends_two_writes() {
        let debouncer = Debouncer::new();
        let h = Harness::default();
        h.type_text(&debouncer, &key("t1"), "a");
        wait(600).await;
        h.type_text(&debouncer, &key("t1"), "ab");
        wait(600).await;
        assert_eq!(h.sent(), vec!["a", "ab"]);
    }

    #[tokio::test(start_paused = true)]
    async fn write_sends_value_at_fire_time() {
        let debouncer = Debouncer::new();
        let h = Harness::default();
        h.type_text(&debouncer, &key("t1"), "draft");
        *h.value.lock().unwrap() = "final".into();
        wait(600).await;
        assert_eq!(h.sent(), vec!["final"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fields_are_independent() {
        let debouncer = Debouncer::new();
        let first = Harness::default();
        let second = Harness::default();
        first.type_text(&debouncer, &key("t1"), "one");
        second.type_text(&debouncer, &key("t2"), "two");
        assert_eq!(debouncer.pending().len(), 2);
        wait(600).await;
        assert_eq!(first.sent(), vec!["one"]);
        assert_eq!(second.sent(), vec!["two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_write() {
        let debouncer = Debouncer::new();
        let h = Harness::default();
        h.type_text(&debouncer, &key("t1"), "gone");
        assert!(debouncer.cancel(&key("t1")));
        assert!(!debouncer.cancel(&key("t1")));
        wait(1000).await;
        assert!(h.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_entity_covers_all_fields() {
        let debouncer = Debouncer::new();
        let h = Harness::default();
        let id = TaskId::new("t1");
        h.type_text(&debouncer, &FieldKey::task(&id, Field::TaskTitle), "x");
        h.type_text(&debouncer, &FieldKey::task(&id, Field::TaskContent), "y");
        h.type_text(&debouncer, &key("t2"), "z");
        assert_eq!(debouncer.cancel_entity(&EntityRef::Task(id)), 2);
        wait(1000).await;
        assert_eq!(h.sent(), vec!["z"]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_fires_immediately() {
        let debouncer = Debouncer::new();
        let h = Harness::default();
        h.type_text(&debouncer, &key("t1"), "now");
        debouncer.flush().await;
        assert_eq!(h.sent(), vec!["now"]);
        wait(1000).await;
        assert_eq!(h.sent(), vec!["now"]);
    }

    #[tokio::test(start_paused = true)]
    async fn started_write_is_not_aborted_by_new_edit() {
        let debouncer = Debouncer::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        for (text, delay_before) in [("a", 0u64), ("ab", 600)] {
            wait(delay_before).await;
            let sent = Arc::clone(&sent);
            debouncer.schedule(key("t1"), QUIET, move || async move {
                // Slow server: the first write is still running when "ab" is typed.
                tokio::time::sleep(Duration::from_millis(300)).await;
                sent.lock().unwrap().push(text);
            });
        }
        debouncer.flush().await;
        assert_eq!(*sent.lock().unwrap(), vec!["a", "ab"]);
    }
}
