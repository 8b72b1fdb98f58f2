pub mod reindex;
pub mod reorder;
