//! Optimistic sync core for a folders → boards → sections → tasks kanban.
//!
//! [`store::Store`] holds the ordered tree, [`ops`] has the pure ordering
//! algorithms, and [`sync::Session`] applies user mutations locally before
//! reconciling them with a [`sync::RemoteBoundary`].

pub mod cli;
pub mod io;
pub mod model;
pub mod ops;
pub mod store;
pub mod sync;
