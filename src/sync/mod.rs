//! Keeping the local store and the remote boundary in step.

pub mod coordinator;
pub mod debounce;
pub mod memory;
pub mod remote;

pub use coordinator::{Confirm, Mutation, MutationKind, MutationStatus, Session, SessionError};
pub use debounce::Debouncer;
pub use memory::{InMemoryRemote, Op};
pub use remote::{RemoteBoundary, RemoteError};

use std::sync::{Mutex, MutexGuard};

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
