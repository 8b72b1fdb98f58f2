//! The hierarchical state store.
//!
//! Holds the canonical folder → board → section → task tree, the favorites
//! index, the active board and the archive toggles. All writes go through
//! [`Store::apply`]; every write that touches a sibling list reindexes that
//! list before returning, so the tree is always settled between changes.

mod change;
mod drop;

pub use change::{Applied, Confirmation, StoreChange};
pub use drop::{Container, DragKind, DropLocation, DropResult, ReorderPlan};

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{
    ArchiveVisibility, Board, BoardId, EntityKind, EntityRef, Field, FieldKey, Folder, FolderId,
    Section, SectionId, Task, TaskId,
};
use crate::ops::reindex::is_settled;
use crate::ops::reorder::ReorderError;

/// Error type for store reads and writes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("sections of board {0} are not loaded")]
    NotLoaded(BoardId),
    #[error("{0} already exists")]
    AlreadyExists(EntityRef),
    #[error("field {field:?} does not belong to {entity}")]
    FieldMismatch { entity: EntityRef, field: Field },
    #[error("invalid drop: {0}")]
    InvalidDrop(String),
    #[error("invalid index {index} (len {len})")]
    InvalidIndex { index: usize, len: usize },
    #[error("reorder failed: {0}")]
    Reorder(#[from] ReorderError),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &EntityRef) -> Self {
        StoreError::NotFound {
            kind: entity.kind(),
            id: entity.id_str().to_string(),
        }
    }

    pub(crate) fn folder_not_found(id: &FolderId) -> Self {
        StoreError::not_found(&EntityRef::Folder(id.clone()))
    }

    pub(crate) fn board_not_found(id: &BoardId) -> Self {
        StoreError::not_found(&EntityRef::Board(id.clone()))
    }

    pub(crate) fn section_not_found(id: &SectionId) -> Self {
        StoreError::not_found(&EntityRef::Section(id.clone()))
    }

    pub(crate) fn task_not_found(id: &TaskId) -> Self {
        StoreError::not_found(&EntityRef::Task(id.clone()))
    }
}

/// Whether a board's sections are available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

/// One row of the favorites view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoriteEntry {
    pub id: BoardId,
    pub title: String,
    pub icon: String,
}

/// Counts shown in a board header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionCounts {
    pub total: usize,
    pub not_archived: usize,
}

/// The in-memory tree plus its derived views
#[derive(Debug, Default)]
pub struct Store {
    folders: Vec<Folder>,
    /// Boards with no parent folder
    unfiled: Vec<Board>,
    /// Favorite boards, in favorites order
    favorites: Vec<BoardId>,
    active: Option<BoardId>,
    visibility: ArchiveVisibility,
    /// Placeholder id → server id, for writes scheduled before confirmation
    aliases: HashMap<EntityRef, EntityRef>,
    loading: HashSet<BoardId>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    // -----------------------------------------------------------------------
    // Tree reads
    // -----------------------------------------------------------------------

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn unfiled_boards(&self) -> &[Board] {
        &self.unfiled
    }

    pub fn folder(&self, id: &FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.id == id)
    }

    /// All boards: folders in order, then the unfiled bucket
    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.folders
            .iter()
            .flat_map(|f| f.boards.iter())
            .chain(self.unfiled.iter())
    }

    pub fn board(&self, id: &BoardId) -> Option<&Board> {
        self.boards().find(|b| &b.id == id)
    }

    /// The board list of a folder, or of the unfiled bucket for `None`
    pub fn board_list(&self, folder: Option<&FolderId>) -> Option<&[Board]> {
        match folder {
            None => Some(&self.unfiled),
            Some(id) => self.folder(id).map(|f| f.boards.as_slice()),
        }
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.boards()
            .flat_map(|b| b.sections().iter())
            .find(|s| &s.id == id)
    }

    /// The board owning a loaded section
    pub fn section_board(&self, id: &SectionId) -> Option<&Board> {
        self.boards()
            .find(|b| b.sections().iter().any(|s| &s.id == id))
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.boards()
            .flat_map(|b| b.sections().iter())
            .flat_map(|s| s.tasks.iter())
            .find(|t| &t.id == id)
    }

    /// The section owning a loaded task
    pub fn task_section(&self, id: &TaskId) -> Option<&Section> {
        self.boards()
            .flat_map(|b| b.sections().iter())
            .find(|s| s.tasks.iter().any(|t| &t.id == id))
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Folder(id) => self.folder(id).is_some(),
            EntityRef::Board(id) => self.board(id).is_some(),
            EntityRef::Section(id) => self.section(id).is_some(),
            EntityRef::Task(id) => self.task(id).is_some(),
        }
    }

    pub fn archived(&self, entity: &EntityRef) -> Option<bool> {
        match entity {
            EntityRef::Folder(id) => self.folder(id).map(|f| f.archived),
            EntityRef::Board(id) => self.board(id).map(|b| b.archived),
            EntityRef::Section(id) => self.section(id).map(|s| s.archived),
            EntityRef::Task(id) => self.task(id).map(|t| t.archived),
        }
    }

    /// Current value of a debounced text field
    pub fn field_value(&self, key: &FieldKey) -> Option<String> {
        let entity = self.resolve(&key.entity);
        match (&entity, key.field) {
            (EntityRef::Folder(id), Field::FolderName) => self.folder(id).map(|f| f.name.clone()),
            (EntityRef::Board(id), Field::BoardTitle) => self.board(id).map(|b| b.title.clone()),
            (EntityRef::Board(id), Field::BoardDescription) => {
                self.board(id).map(|b| b.description.clone())
            }
            (EntityRef::Board(id), Field::BoardIcon) => self.board(id).map(|b| b.icon.clone()),
            (EntityRef::Section(id), Field::SectionTitle) => {
                self.section(id).map(|s| s.title.clone())
            }
            (EntityRef::Task(id), Field::TaskTitle) => self.task(id).map(|t| t.title.clone()),
            (EntityRef::Task(id), Field::TaskContent) => self.task(id).map(|t| t.content.clone()),
            _ => None,
        }
    }

    /// Follow the placeholder alias table to the id the server knows
    pub fn resolve(&self, entity: &EntityRef) -> EntityRef {
        let mut current = entity.clone();
        // Aliases never chain more than once in practice; the bound guards cycles.
        for _ in 0..4 {
            match self.aliases.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    // -----------------------------------------------------------------------
    // Selection and load state
    // -----------------------------------------------------------------------

    pub fn active_board_id(&self) -> Option<&BoardId> {
        self.active.as_ref()
    }

    pub fn active_board(&self) -> Option<&Board> {
        self.active.as_ref().and_then(|id| self.board(id))
    }

    pub fn load_state(&self, id: &BoardId) -> LoadState {
        if self.loading.contains(id) {
            LoadState::Loading
        } else if self.board(id).is_some_and(Board::is_loaded) {
            LoadState::Loaded
        } else {
            LoadState::NotLoaded
        }
    }

    pub fn archive_visibility(&self) -> ArchiveVisibility {
        self.visibility
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    /// The favorites list in its own order, with live titles and icons
    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        self.favorites
            .iter()
            .filter_map(|id| self.board(id))
            .filter(|b| b.favorite)
            .map(|b| FavoriteEntry {
                id: b.id.clone(),
                title: b.title.clone(),
                icon: b.icon.clone(),
            })
            .collect()
    }

    pub fn favorite_ids(&self) -> &[BoardId] {
        &self.favorites
    }

    /// Index of a board in the favorites list
    pub fn favorite_position(&self, id: &BoardId) -> Option<usize> {
        self.favorites.iter().position(|f| f == id)
    }

    pub fn visible_folders(&self) -> Vec<&Folder> {
        self.folders
            .iter()
            .filter(|f| self.visibility.shows(EntityKind::Folder, f.archived))
            .collect()
    }

    pub fn visible_boards(&self, folder: Option<&FolderId>) -> Vec<&Board> {
        self.board_list(folder)
            .unwrap_or(&[])
            .iter()
            .filter(|b| self.visibility.shows(EntityKind::Board, b.archived))
            .collect()
    }

    pub fn visible_sections(&self, board: &BoardId) -> Vec<&Section> {
        self.board(board)
            .map(|b| b.sections())
            .unwrap_or(&[])
            .iter()
            .filter(|s| self.visibility.shows(EntityKind::Section, s.archived))
            .collect()
    }

    pub fn visible_tasks(&self, section: &SectionId) -> Vec<&Task> {
        self.section(section)
            .map(|s| s.tasks.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter(|t| self.visibility.shows(EntityKind::Task, t.archived))
            .collect()
    }

    pub fn section_counts(&self, board: &BoardId) -> SectionCounts {
        let sections = self.board(board).map(|b| b.sections()).unwrap_or(&[]);
        SectionCounts {
            total: sections.len(),
            not_archived: sections.iter().filter(|s| !s.archived).count(),
        }
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    /// Verify that every sibling list is settled and that the favorites index
    /// matches the favorite flags exactly.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        if !is_settled(&self.folders) {
            return Err(StoreError::Invariant("folder positions not settled".into()));
        }
        for folder in &self.folders {
            if !is_settled(&folder.boards) {
                return Err(StoreError::Invariant(format!(
                    "board positions not settled in folder {}",
                    folder.id
                )));
            }
            if let Some(b) = folder.boards.iter().find(|b| b.folder_id.as_ref() != Some(&folder.id)) {
                return Err(StoreError::Invariant(format!(
                    "board {} does not point at its folder {}",
                    b.id, folder.id
                )));
            }
        }
        if !is_settled(&self.unfiled) {
            return Err(StoreError::Invariant("unfiled board positions not settled".into()));
        }
        if let Some(b) = self.unfiled.iter().find(|b| b.folder_id.is_some()) {
            return Err(StoreError::Invariant(format!(
                "unfiled board {} has a folder",
                b.id
            )));
        }
        for board in self.boards() {
            if !is_settled(board.sections()) {
                return Err(StoreError::Invariant(format!(
                    "section positions not settled on board {}",
                    board.id
                )));
            }
            for section in board.sections() {
                if !is_settled(&section.tasks) {
                    return Err(StoreError::Invariant(format!(
                        "task positions not settled in section {}",
                        section.id
                    )));
                }
            }
        }

        let flagged: HashSet<&BoardId> = self.boards().filter(|b| b.favorite).map(|b| &b.id).collect();
        let indexed: HashSet<&BoardId> = self.favorites.iter().collect();
        if flagged != indexed || indexed.len() != self.favorites.len() {
            return Err(StoreError::Invariant(
                "favorites index does not match favorite flags".into(),
            ));
        }
        if let Some(active) = &self.active
            && self.board(active).is_none()
        {
            return Err(StoreError::Invariant(format!(
                "active board {} does not exist",
                active
            )));
        }
        Ok(())
    }
}
