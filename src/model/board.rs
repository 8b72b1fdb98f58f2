use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BoardId, FolderId};
use super::section::Section;
use crate::ops::reindex::Positioned;

/// Title given to boards the server creates
pub const DEFAULT_BOARD_TITLE: &str = "Untitled";
/// Icon given to boards the server creates
pub const DEFAULT_BOARD_ICON: &str = "📝";
/// Description given to boards the server creates
pub const DEFAULT_BOARD_DESCRIPTION: &str = "Add description here";

/// A board: the unit shown in the main view.
///
/// Favorite ordering is not stored here. The store keeps the favorites list as
/// its own ordered index over boards whose `favorite` flag is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub description: String,
    /// Short display glyph (usually an emoji)
    pub icon: String,
    /// Rank within the parent folder, or within the unfiled bucket
    pub position: usize,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub archived: bool,
    /// Parent folder; `None` means the board lives in the unfiled bucket
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    pub created_at: DateTime<Utc>,
    /// Sections in display order. `None` until the board is first opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
}

impl Board {
    /// A board with the server defaults and no sections loaded
    pub fn new(id: BoardId, folder_id: Option<FolderId>, created_at: DateTime<Utc>) -> Self {
        Board {
            id,
            title: DEFAULT_BOARD_TITLE.to_string(),
            description: DEFAULT_BOARD_DESCRIPTION.to_string(),
            icon: DEFAULT_BOARD_ICON.to_string(),
            position: 0,
            favorite: false,
            archived: false,
            folder_id,
            created_at,
            sections: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.sections.is_some()
    }

    /// Loaded sections, or an empty slice when not loaded yet
    pub fn sections(&self) -> &[Section] {
        self.sections.as_deref().unwrap_or(&[])
    }
}

impl Positioned for Board {
    type Id = BoardId;

    fn id(&self) -> &BoardId {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}
