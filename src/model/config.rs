use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ids::Field;

/// Configuration from stackboard.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Quiet periods, in milliseconds, before a text edit is written remotely
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_short_quiet_ms")]
    pub folder_name_ms: u64,
    /// Board title, description and icon
    #[serde(default = "default_short_quiet_ms")]
    pub board_text_ms: u64,
    #[serde(default = "default_short_quiet_ms")]
    pub section_title_ms: u64,
    /// Task title and content
    #[serde(default = "default_task_quiet_ms")]
    pub task_text_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        DebounceConfig {
            folder_name_ms: default_short_quiet_ms(),
            board_text_ms: default_short_quiet_ms(),
            section_title_ms: default_short_quiet_ms(),
            task_text_ms: default_task_quiet_ms(),
        }
    }
}

impl DebounceConfig {
    /// Quiet period for a given field
    pub fn quiet_period(&self, field: Field) -> Duration {
        let ms = match field {
            Field::FolderName => self.folder_name_ms,
            Field::BoardTitle | Field::BoardDescription | Field::BoardIcon => self.board_text_ms,
            Field::SectionTitle => self.section_title_ms,
            Field::TaskTitle | Field::TaskContent => self.task_text_ms,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Reject reorder batches that would transiently duplicate a position.
    /// Only honored by the bundled in-memory server.
    #[serde(default)]
    pub strict_positions: bool,
}

fn default_short_quiet_ms() -> u64 {
    500
}

fn default_task_quiet_ms() -> u64 {
    1500
}
