//! The remote procedure boundary and its wire types.
//!
//! The server side of every operation is an external collaborator. The core
//! only depends on [`RemoteBoundary`]; `sync::memory` provides the bundled
//! implementation used by tests and the CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    Board, BoardId, EntityKind, Folder, FolderId, Section, SectionId, Task, TaskId, UserId,
};
use crate::ops::reindex::PositionUpdate;

/// One `{ id, position }` entry of a reorder batch
pub type PositionRef<I> = PositionUpdate<I>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server error: {0}")]
    Server(String),
}

impl RemoteError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        RemoteError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    pub id: TaskId,
    pub section_id: SectionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub position: usize,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSection {
    pub id: SectionId,
    pub board_id: BoardId,
    #[serde(default)]
    pub title: String,
    pub position: usize,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub tasks: Vec<WireTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBoard {
    pub id: BoardId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub position: usize,
    #[serde(default)]
    pub favorite: bool,
    /// Rank in the favorites list; only meaningful while `favorite` is set
    #[serde(default)]
    pub favorite_position: Option<usize>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFolder {
    pub id: FolderId,
    pub user_id: UserId,
    pub name: String,
    pub position: usize,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub boards: Vec<WireBoard>,
}

/// `get_board` response: board fields plus its sections and their tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardWithSections {
    #[serde(flatten)]
    pub board: WireBoard,
    pub sections: Vec<WireSection>,
}

/// `get_all_boards_and_folders` response. `boards` holds the boards without
/// a folder; foldered boards arrive inside their folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllBoards {
    pub boards: Vec<WireBoard>,
    pub folders: Vec<WireFolder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted<I> {
    pub id: I,
}

/// `rename_folder` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedFolder {
    pub id: FolderId,
    pub name: String,
}

/// Full board update; the server overwrites all four fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardUpdate {
    pub id: BoardId,
    pub title: String,
    pub icon: String,
    pub description: String,
    pub favorite: bool,
}

impl BoardUpdate {
    pub fn from_board(board: &Board) -> Self {
        BoardUpdate {
            id: board.id.clone(),
            title: board.title.clone(),
            icon: board.icon.clone(),
            description: board.description.clone(),
            favorite: board.favorite,
        }
    }
}

/// Server operations consumed by the sync core
#[async_trait]
pub trait RemoteBoundary: Send + Sync {
    async fn get_all_boards_and_folders(&self, user: &UserId) -> Result<AllBoards, RemoteError>;

    async fn create_folder(&self, user: &UserId) -> Result<WireFolder, RemoteError>;

    async fn rename_folder(&self, id: &FolderId, name: &str) -> Result<RenamedFolder, RemoteError>;

    async fn reorder_folders(&self, order: &[PositionRef<FolderId>]) -> Result<(), RemoteError>;

    async fn archive_folder(&self, id: &FolderId, prev_archived: bool) -> Result<(), RemoteError>;

    async fn delete_folder(
        &self,
        user: &UserId,
        id: &FolderId,
    ) -> Result<Deleted<FolderId>, RemoteError>;

    async fn create_board(
        &self,
        user: &UserId,
        folder: Option<&FolderId>,
    ) -> Result<WireBoard, RemoteError>;

    async fn update_board(&self, update: &BoardUpdate) -> Result<WireBoard, RemoteError>;

    async fn reorder_boards(&self, order: &[PositionRef<BoardId>]) -> Result<(), RemoteError>;

    /// Reparent one board and renumber both lists in one call
    async fn move_or_reorder_boards(
        &self,
        source_folder: Option<&FolderId>,
        destination_folder: Option<&FolderId>,
        source: &[PositionRef<BoardId>],
        destination: &[PositionRef<BoardId>],
    ) -> Result<(), RemoteError>;

    async fn reorder_favorites(&self, order: &[PositionRef<BoardId>]) -> Result<(), RemoteError>;

    async fn archive_board(&self, id: &BoardId, prev_archived: bool) -> Result<(), RemoteError>;

    async fn delete_board(
        &self,
        id: &BoardId,
        user: &UserId,
        folder: Option<&FolderId>,
    ) -> Result<Deleted<BoardId>, RemoteError>;

    async fn get_board(&self, id: &BoardId) -> Result<BoardWithSections, RemoteError>;

    async fn create_section(&self, board: &BoardId) -> Result<WireSection, RemoteError>;

    async fn rename_section(&self, id: &SectionId, title: &str) -> Result<WireSection, RemoteError>;

    async fn reorder_sections(&self, order: &[PositionRef<SectionId>]) -> Result<(), RemoteError>;

    async fn archive_section(&self, id: &SectionId, prev_archived: bool)
    -> Result<(), RemoteError>;

    async fn delete_section(&self, id: &SectionId) -> Result<Deleted<SectionId>, RemoteError>;

    async fn create_task(&self, section: &SectionId) -> Result<WireTask, RemoteError>;

    async fn update_task(
        &self,
        id: &TaskId,
        title: &str,
        content: &str,
    ) -> Result<WireTask, RemoteError>;

    /// Move a task between sections (or within one) and renumber the lists.
    /// When both sections are the same only `destination` is applied.
    async fn move_or_reorder_tasks(
        &self,
        source_section: &SectionId,
        destination_section: &SectionId,
        source: &[PositionRef<TaskId>],
        destination: &[PositionRef<TaskId>],
    ) -> Result<(), RemoteError>;

    async fn toggle_task_archived(&self, id: &TaskId, prev_archived: bool)
    -> Result<(), RemoteError>;

    /// Deletes the task and renumbers its siblings; returns a status message
    async fn delete_task(&self, id: &TaskId) -> Result<String, RemoteError>;
}

// ---------------------------------------------------------------------------
// Wire → model
// ---------------------------------------------------------------------------

impl From<WireTask> for Task {
    fn from(w: WireTask) -> Self {
        Task {
            id: w.id,
            title: w.title,
            content: w.content,
            position: w.position,
            created_at: w.created_at,
            archived: w.archived,
        }
    }
}

impl From<WireSection> for Section {
    fn from(w: WireSection) -> Self {
        Section {
            id: w.id,
            title: w.title,
            position: w.position,
            archived: w.archived,
            tasks: w.tasks.into_iter().map(Task::from).collect(),
        }
    }
}

impl From<WireBoard> for Board {
    fn from(w: WireBoard) -> Self {
        Board {
            id: w.id,
            title: w.title,
            description: w.description,
            icon: w.icon,
            position: w.position,
            favorite: w.favorite,
            archived: w.archived,
            folder_id: w.folder_id,
            created_at: w.created_at,
            sections: None,
        }
    }
}

impl From<BoardWithSections> for Board {
    fn from(w: BoardWithSections) -> Self {
        let mut board = Board::from(w.board);
        board.sections = Some(w.sections.into_iter().map(Section::from).collect());
        board
    }
}

impl From<WireFolder> for Folder {
    fn from(w: WireFolder) -> Self {
        Folder {
            id: w.id,
            name: w.name,
            position: w.position,
            archived: w.archived,
            boards: w.boards.into_iter().map(Board::from).collect(),
        }
    }
}

impl AllBoards {
    /// Favorite board ids ordered by their favorites rank
    pub fn favorites_order(&self) -> Vec<BoardId> {
        let mut favorites: Vec<&WireBoard> = self
            .folders
            .iter()
            .flat_map(|f| f.boards.iter())
            .chain(self.boards.iter())
            .filter(|b| b.favorite)
            .collect();
        favorites.sort_by_key(|b| b.favorite_position.unwrap_or(usize::MAX));
        favorites.into_iter().map(|b| b.id.clone()).collect()
    }

    /// Split into model folders, unfiled boards and the favorites order
    pub fn into_tree(self) -> (Vec<Folder>, Vec<Board>, Vec<BoardId>) {
        let favorites = self.favorites_order();
        let folders = self.folders.into_iter().map(Folder::from).collect();
        let unfiled = self.boards.into_iter().map(Board::from).collect();
        (folders, unfiled, favorites)
    }
}
