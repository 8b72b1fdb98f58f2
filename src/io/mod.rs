pub mod config_io;
pub mod snapshot;
pub mod state;
pub mod workspace;
