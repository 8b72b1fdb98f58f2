use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use crate::ops::reindex::Positioned;

/// A task inside a section. `content` is opaque rich text owned by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Task title text
    #[serde(default)]
    pub title: String,
    /// Rich-text body, never interpreted here
    #[serde(default)]
    pub content: String,
    /// Rank within the parent section (0-based, dense)
    pub position: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived: bool,
}

impl Task {
    /// Create an empty task at position 0
    pub fn new(id: TaskId, created_at: DateTime<Utc>) -> Self {
        Task {
            id,
            title: String::new(),
            content: String::new(),
            position: 0,
            created_at,
            archived: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl Positioned for Task {
    type Id = TaskId;

    fn id(&self) -> &TaskId {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}
