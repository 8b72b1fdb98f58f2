use serde::{Deserialize, Serialize};

use super::board::Board;
use super::ids::FolderId;
use crate::ops::reindex::Positioned;

/// Name given to folders the server creates
pub const DEFAULT_FOLDER_NAME: &str = "Untitled";

/// A named group of boards, ordered within the owner's folder list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub position: usize,
    #[serde(default)]
    pub archived: bool,
    /// Owned boards in display order
    #[serde(default)]
    pub boards: Vec<Board>,
}

impl Folder {
    pub fn new(id: FolderId) -> Self {
        Folder {
            id,
            name: DEFAULT_FOLDER_NAME.to_string(),
            position: 0,
            archived: false,
            boards: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_boards(mut self, boards: Vec<Board>) -> Self {
        self.boards = boards;
        self
    }
}

impl Positioned for Folder {
    type Id = FolderId;

    fn id(&self) -> &FolderId {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}
