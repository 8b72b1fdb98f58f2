//! Position reindexing for ordered sibling lists.
//!
//! Every container (a folder's boards, a board's sections, a section's tasks,
//! the folder list itself) stores an explicit `position` on each element. A
//! list is *settled* when those positions read `0, 1, ..., n-1` in list order.

use serde::{Deserialize, Serialize};

/// An element of an ordered sibling list
pub trait Positioned {
    type Id: Clone;

    fn id(&self) -> &Self::Id;
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

/// One entry of a remote position batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate<I> {
    pub id: I,
    pub position: usize,
}

/// Assign `position = index` to every element. Returns true if any position changed.
pub fn reindex<T: Positioned>(list: &mut [T]) -> bool {
    let mut changed = false;
    for (index, item) in list.iter_mut().enumerate() {
        if item.position() != index {
            item.set_position(index);
            changed = true;
        }
    }
    changed
}

/// True when positions are dense, zero-based and match list order
pub fn is_settled<T: Positioned>(list: &[T]) -> bool {
    list.iter().enumerate().all(|(i, item)| item.position() == i)
}

/// Build the remote batch for a settled list.
///
/// Entries are emitted in reverse list order so that a store applying them
/// one by one claims the high positions before the low ones are rewritten.
pub fn position_batch<T: Positioned>(list: &[T]) -> Vec<PositionUpdate<T::Id>> {
    list.iter()
        .enumerate()
        .rev()
        .map(|(index, item)| PositionUpdate {
            id: item.id().clone(),
            position: index,
        })
        .collect()
}
