pub mod board;
pub mod config;
pub mod folder;
pub mod ids;
pub mod section;
pub mod task;
pub mod view;

pub use board::*;
pub use config::*;
pub use folder::*;
pub use ids::*;
pub use section::*;
pub use task::*;
pub use view::*;
