//! Splice-style moves inside one list or between two lists.
//!
//! Both helpers use "remove first, then insert at the raw destination index"
//! semantics, the same as a drag-and-drop library reports them. Callers
//! reindex the touched lists afterwards.

/// Error type for list moves
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    #[error("source index {index} out of range (len {len})")]
    SourceOutOfRange { index: usize, len: usize },
    #[error("destination index {index} out of range (len {len})")]
    DestinationOutOfRange { index: usize, len: usize },
}

/// Move the element at `from` so it ends up at index `to` of the same list.
pub fn move_within<T>(list: &mut Vec<T>, from: usize, to: usize) -> Result<(), ReorderError> {
    if from >= list.len() {
        return Err(ReorderError::SourceOutOfRange {
            index: from,
            len: list.len(),
        });
    }
    // After removal the list is one shorter; `to` may address its end.
    if to >= list.len() {
        return Err(ReorderError::DestinationOutOfRange {
            index: to,
            len: list.len(),
        });
    }
    let item = list.remove(from);
    list.insert(to, item);
    Ok(())
}

/// Move the element at `from` in `src` into `dst` at index `to`.
pub fn transfer<T>(
    src: &mut Vec<T>,
    from: usize,
    dst: &mut Vec<T>,
    to: usize,
) -> Result<(), ReorderError> {
    if from >= src.len() {
        return Err(ReorderError::SourceOutOfRange {
            index: from,
            len: src.len(),
        });
    }
    if to > dst.len() {
        return Err(ReorderError::DestinationOutOfRange {
            index: to,
            len: dst.len(),
        });
    }
    let item = src.remove(from);
    dst.insert(to, item);
    Ok(())
}
