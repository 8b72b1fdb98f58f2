//! In-process implementation of [`RemoteBoundary`].
//!
//! Holds flat tables of folders, boards, sections and tasks the way a
//! relational backend would, and answers every remote operation against them.
//! Tests use it directly (call log, failure injection); the CLI persists its
//! tables through `io::snapshot`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::lock;
use super::remote::{
    AllBoards, BoardUpdate, BoardWithSections, Deleted, PositionRef, RemoteBoundary, RemoteError,
    RenamedFolder, WireBoard, WireFolder, WireSection, WireTask,
};
use crate::model::{
    BoardId, DEFAULT_BOARD_DESCRIPTION, DEFAULT_BOARD_ICON, DEFAULT_BOARD_TITLE,
    DEFAULT_FOLDER_NAME, EntityKind, FolderId, SectionId, TaskId, UserId,
};

/// Remote operation names, used for the call log and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetAllBoardsAndFolders,
    CreateFolder,
    RenameFolder,
    ReorderFolders,
    ArchiveFolder,
    DeleteFolder,
    CreateBoard,
    UpdateBoard,
    ReorderBoards,
    MoveOrReorderBoards,
    ReorderFavorites,
    ArchiveBoard,
    DeleteBoard,
    GetBoard,
    CreateSection,
    RenameSection,
    ReorderSections,
    ArchiveSection,
    DeleteSection,
    CreateTask,
    UpdateTask,
    MoveOrReorderTasks,
    ToggleTaskArchived,
    DeleteTask,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::GetAllBoardsAndFolders => "get_all_boards_and_folders",
            Op::CreateFolder => "create_folder",
            Op::RenameFolder => "rename_folder",
            Op::ReorderFolders => "reorder_folders",
            Op::ArchiveFolder => "archive_folder",
            Op::DeleteFolder => "delete_folder",
            Op::CreateBoard => "create_board",
            Op::UpdateBoard => "update_board",
            Op::ReorderBoards => "reorder_boards",
            Op::MoveOrReorderBoards => "move_or_reorder_boards",
            Op::ReorderFavorites => "reorder_favorites",
            Op::ArchiveBoard => "archive_board",
            Op::DeleteBoard => "delete_board",
            Op::GetBoard => "get_board",
            Op::CreateSection => "create_section",
            Op::RenameSection => "rename_section",
            Op::ReorderSections => "reorder_sections",
            Op::ArchiveSection => "archive_section",
            Op::DeleteSection => "delete_section",
            Op::CreateTask => "create_task",
            Op::UpdateTask => "update_task",
            Op::MoveOrReorderTasks => "move_or_reorder_tasks",
            Op::ToggleTaskArchived => "toggle_task_archived",
            Op::DeleteTask => "delete_task",
        }
    }

    /// Read-only operations
    pub fn is_query(self) -> bool {
        matches!(self, Op::GetAllBoardsAndFolders | Op::GetBoard)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub op: Op,
    pub args: serde_json::Value,
}

/// The server tables. Child collections inside the wire rows stay empty;
/// relations live in `folder_id`, `board_id` and `section_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerData {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    folders: IndexMap<FolderId, WireFolder>,
    #[serde(default)]
    boards: IndexMap<BoardId, WireBoard>,
    #[serde(default)]
    sections: IndexMap<SectionId, WireSection>,
    #[serde(default)]
    tasks: IndexMap<TaskId, WireTask>,
}

fn not_found(kind: EntityKind, id: &impl fmt::Display) -> RemoteError {
    RemoteError::not_found(kind, id.to_string())
}

/// Fail when another sibling already sits at `position`
fn claim<'a, I: PartialEq + fmt::Display + 'a>(
    mut siblings: impl Iterator<Item = (&'a I, usize)>,
    id: &I,
    position: usize,
) -> Result<(), RemoteError> {
    match siblings.find(|(other, p)| *other != id && *p == position) {
        Some((other, _)) => Err(RemoteError::Validation(format!(
            "position {} of {} is already held by {}",
            position, id, other
        ))),
        None => Ok(()),
    }
}

impl ServerData {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn folder_mut(&mut self, id: &FolderId) -> Result<&mut WireFolder, RemoteError> {
        self.folders
            .get_mut(id)
            .ok_or_else(|| not_found(EntityKind::Folder, id))
    }

    fn board_mut(&mut self, id: &BoardId) -> Result<&mut WireBoard, RemoteError> {
        self.boards
            .get_mut(id)
            .ok_or_else(|| not_found(EntityKind::Board, id))
    }

    fn section_mut(&mut self, id: &SectionId) -> Result<&mut WireSection, RemoteError> {
        self.sections
            .get_mut(id)
            .ok_or_else(|| not_found(EntityKind::Section, id))
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut WireTask, RemoteError> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| not_found(EntityKind::Task, id))
    }

    fn boards_in(&self, user: &UserId, folder: Option<&FolderId>) -> Vec<WireBoard> {
        let mut boards: Vec<WireBoard> = self
            .boards
            .values()
            .filter(|b| &b.user_id == user && b.folder_id.as_ref() == folder)
            .cloned()
            .collect();
        boards.sort_by_key(|b| b.position);
        boards
    }

    fn sections_of(&self, board: &BoardId) -> Vec<WireSection> {
        let mut sections: Vec<WireSection> = self
            .sections
            .values()
            .filter(|s| &s.board_id == board)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.position);
        for section in sections.iter_mut() {
            section.tasks = self.tasks_of(&section.id);
        }
        sections
    }

    fn tasks_of(&self, section: &SectionId) -> Vec<WireTask> {
        let mut tasks: Vec<WireTask> = self
            .tasks
            .values()
            .filter(|t| &t.section_id == section)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        tasks
    }

    pub fn all_boards(&self, user: &UserId) -> AllBoards {
        let mut folders: Vec<WireFolder> = self
            .folders
            .values()
            .filter(|f| &f.user_id == user)
            .cloned()
            .collect();
        folders.sort_by_key(|f| f.position);
        for folder in folders.iter_mut() {
            folder.boards = self.boards_in(user, Some(&folder.id));
        }
        AllBoards {
            boards: self.boards_in(user, None),
            folders,
        }
    }

    pub fn board(&self, id: &BoardId) -> Result<BoardWithSections, RemoteError> {
        let board = self
            .boards
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Board, id))?;
        Ok(BoardWithSections {
            sections: self.sections_of(id),
            board,
        })
    }

    fn new_board(&mut self, user: &UserId, folder: Option<&FolderId>) -> WireBoard {
        let position = self
            .boards
            .values()
            .filter(|b| &b.user_id == user && b.folder_id.as_ref() == folder)
            .count();
        let board = WireBoard {
            id: BoardId::new(self.mint("b")),
            user_id: user.clone(),
            title: DEFAULT_BOARD_TITLE.to_string(),
            description: DEFAULT_BOARD_DESCRIPTION.to_string(),
            icon: DEFAULT_BOARD_ICON.to_string(),
            position,
            favorite: false,
            favorite_position: None,
            archived: false,
            folder_id: folder.cloned(),
            created_at: Utc::now(),
        };
        self.boards.insert(board.id.clone(), board.clone());
        board
    }

    pub fn create_folder(&mut self, user: &UserId) -> WireFolder {
        let position = self.folders.values().filter(|f| &f.user_id == user).count();
        let mut folder = WireFolder {
            id: FolderId::new(self.mint("f")),
            user_id: user.clone(),
            name: DEFAULT_FOLDER_NAME.to_string(),
            position,
            archived: false,
            boards: Vec::new(),
        };
        self.folders.insert(folder.id.clone(), folder.clone());
        folder.boards = vec![self.new_board(user, Some(&folder.id))];
        folder
    }

    pub fn create_board(
        &mut self,
        user: &UserId,
        folder: Option<&FolderId>,
    ) -> Result<WireBoard, RemoteError> {
        if let Some(id) = folder
            && !self.folders.contains_key(id)
        {
            return Err(not_found(EntityKind::Folder, id));
        }
        Ok(self.new_board(user, folder))
    }

    pub fn update_board(&mut self, update: &BoardUpdate) -> Result<WireBoard, RemoteError> {
        let user = self.board_mut(&update.id)?.user_id.clone();
        let next_favorite = self
            .boards
            .values()
            .filter(|b| b.user_id == user)
            .filter_map(|b| b.favorite_position)
            .max()
            .map_or(0, |p| p + 1);
        let board = self.board_mut(&update.id)?;
        let unfavorited = board.favorite && !update.favorite;
        if update.favorite && board.favorite_position.is_none() {
            board.favorite_position = Some(next_favorite);
        } else if !update.favorite {
            board.favorite_position = None;
        }
        board.title = update.title.clone();
        board.icon = update.icon.clone();
        board.description = update.description.clone();
        board.favorite = update.favorite;
        let board = board.clone();
        if unfavorited {
            self.compact_favorites(&user);
        }
        Ok(board)
    }

    /// Renumber a user's favorites 0..n, keeping their order.
    fn compact_favorites(&mut self, user: &UserId) {
        let mut favorites: Vec<(usize, BoardId)> = self
            .boards
            .values()
            .filter(|b| &b.user_id == user)
            .filter_map(|b| b.favorite_position.map(|p| (p, b.id.clone())))
            .collect();
        favorites.sort_by_key(|(p, _)| *p);
        for (position, (_, id)) in favorites.into_iter().enumerate() {
            if let Some(board) = self.boards.get_mut(&id) {
                board.favorite_position = Some(position);
            }
        }
    }

    pub fn create_section(&mut self, board: &BoardId) -> Result<WireSection, RemoteError> {
        if !self.boards.contains_key(board) {
            return Err(not_found(EntityKind::Board, board));
        }
        let position = self.sections.values().filter(|s| &s.board_id == board).count();
        let section = WireSection {
            id: SectionId::new(self.mint("s")),
            board_id: board.clone(),
            title: String::new(),
            position,
            archived: false,
            tasks: Vec::new(),
        };
        self.sections.insert(section.id.clone(), section.clone());
        Ok(section)
    }

    pub fn create_task(&mut self, section: &SectionId) -> Result<WireTask, RemoteError> {
        if !self.sections.contains_key(section) {
            return Err(not_found(EntityKind::Section, section));
        }
        let position = self.tasks.values().filter(|t| &t.section_id == section).count();
        let task = WireTask {
            id: TaskId::new(self.mint("t")),
            section_id: section.clone(),
            title: String::new(),
            content: String::new(),
            position,
            archived: false,
            created_at: Utc::now(),
        };
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn remove_board_cascade(&mut self, id: &BoardId) {
        self.boards.shift_remove(id);
        let sections: Vec<SectionId> = self
            .sections
            .values()
            .filter(|s| &s.board_id == id)
            .map(|s| s.id.clone())
            .collect();
        for section in &sections {
            self.remove_section_cascade(section);
        }
    }

    fn remove_section_cascade(&mut self, id: &SectionId) {
        self.sections.shift_remove(id);
        self.tasks.retain(|_, t| &t.section_id != id);
    }

    pub fn delete_folder(&mut self, user: &UserId, id: &FolderId) -> Result<(), RemoteError> {
        match self.folders.get(id) {
            Some(folder) if &folder.user_id == user => {}
            _ => return Err(not_found(EntityKind::Folder, id)),
        }
        self.folders.shift_remove(id);
        let boards: Vec<BoardId> = self
            .boards
            .values()
            .filter(|b| b.folder_id.as_ref() == Some(id))
            .map(|b| b.id.clone())
            .collect();
        for board in &boards {
            self.remove_board_cascade(board);
        }
        self.compact_favorites(user);
        Ok(())
    }

    pub fn delete_board(&mut self, id: &BoardId, user: &UserId) -> Result<(), RemoteError> {
        match self.boards.get(id) {
            Some(board) if &board.user_id == user => {}
            _ => return Err(not_found(EntityKind::Board, id)),
        }
        self.remove_board_cascade(id);
        self.compact_favorites(user);
        Ok(())
    }

    pub fn delete_section(&mut self, id: &SectionId) -> Result<(), RemoteError> {
        if !self.sections.contains_key(id) {
            return Err(not_found(EntityKind::Section, id));
        }
        self.remove_section_cascade(id);
        Ok(())
    }

    /// Removes the task and renumbers what is left of its section
    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), RemoteError> {
        let task = self
            .tasks
            .shift_remove(id)
            .ok_or_else(|| not_found(EntityKind::Task, id))?;
        let mut siblings: Vec<&mut WireTask> = self
            .tasks
            .values_mut()
            .filter(|t| t.section_id == task.section_id)
            .collect();
        siblings.sort_by_key(|t| t.position);
        for (index, sibling) in siblings.into_iter().enumerate() {
            sibling.position = index;
        }
        Ok(())
    }

    // Reorder batches are applied entry by entry, in the order received.

    pub fn reorder_folders(
        &mut self,
        order: &[PositionRef<FolderId>],
        strict: bool,
    ) -> Result<(), RemoteError> {
        for entry in order {
            let user = self.folder_mut(&entry.id)?.user_id.clone();
            if strict {
                let siblings = self
                    .folders
                    .values()
                    .filter(|f| f.user_id == user)
                    .map(|f| (&f.id, f.position));
                claim(siblings, &entry.id, entry.position)?;
            }
            self.folder_mut(&entry.id)?.position = entry.position;
        }
        Ok(())
    }

    fn place_board(
        &mut self,
        entry: &PositionRef<BoardId>,
        folder: Option<Option<&FolderId>>,
        strict: bool,
    ) -> Result<(), RemoteError> {
        let board = self.board_mut(&entry.id)?;
        let user = board.user_id.clone();
        let parent = match folder {
            Some(folder) => folder.cloned(),
            None => board.folder_id.clone(),
        };
        if strict {
            let siblings = self
                .boards
                .values()
                .filter(|b| b.user_id == user && b.folder_id == parent)
                .map(|b| (&b.id, b.position));
            claim(siblings, &entry.id, entry.position)?;
        }
        let board = self.board_mut(&entry.id)?;
        board.folder_id = parent;
        board.position = entry.position;
        Ok(())
    }

    pub fn reorder_boards(
        &mut self,
        order: &[PositionRef<BoardId>],
        strict: bool,
    ) -> Result<(), RemoteError> {
        for entry in order {
            self.place_board(entry, None, strict)?;
        }
        Ok(())
    }

    pub fn move_or_reorder_boards(
        &mut self,
        source_folder: Option<&FolderId>,
        destination_folder: Option<&FolderId>,
        source: &[PositionRef<BoardId>],
        destination: &[PositionRef<BoardId>],
        strict: bool,
    ) -> Result<(), RemoteError> {
        for folder in [source_folder, destination_folder].into_iter().flatten() {
            if !self.folders.contains_key(folder) {
                return Err(not_found(EntityKind::Folder, folder));
            }
        }
        for entry in destination {
            self.place_board(entry, Some(destination_folder), strict)?;
        }
        if source_folder != destination_folder {
            for entry in source {
                self.place_board(entry, Some(source_folder), strict)?;
            }
        }
        Ok(())
    }

    pub fn reorder_favorites(
        &mut self,
        order: &[PositionRef<BoardId>],
        strict: bool,
    ) -> Result<(), RemoteError> {
        for entry in order {
            if strict {
                let siblings = self
                    .boards
                    .values()
                    .filter_map(|b| b.favorite_position.map(|p| (&b.id, p)));
                claim(siblings, &entry.id, entry.position)?;
            }
            self.board_mut(&entry.id)?.favorite_position = Some(entry.position);
        }
        Ok(())
    }

    pub fn reorder_sections(
        &mut self,
        order: &[PositionRef<SectionId>],
        strict: bool,
    ) -> Result<(), RemoteError> {
        for entry in order {
            let board = self.section_mut(&entry.id)?.board_id.clone();
            if strict {
                let siblings = self
                    .sections
                    .values()
                    .filter(|s| s.board_id == board)
                    .map(|s| (&s.id, s.position));
                claim(siblings, &entry.id, entry.position)?;
            }
            self.section_mut(&entry.id)?.position = entry.position;
        }
        Ok(())
    }

    fn place_task(
        &mut self,
        entry: &PositionRef<TaskId>,
        section: &SectionId,
        strict: bool,
    ) -> Result<(), RemoteError> {
        self.task_mut(&entry.id)?;
        if strict {
            let siblings = self
                .tasks
                .values()
                .filter(|t| &t.section_id == section)
                .map(|t| (&t.id, t.position));
            claim(siblings, &entry.id, entry.position)?;
        }
        let task = self.task_mut(&entry.id)?;
        task.section_id = section.clone();
        task.position = entry.position;
        Ok(())
    }

    pub fn move_or_reorder_tasks(
        &mut self,
        source_section: &SectionId,
        destination_section: &SectionId,
        source: &[PositionRef<TaskId>],
        destination: &[PositionRef<TaskId>],
        strict: bool,
    ) -> Result<(), RemoteError> {
        for section in [source_section, destination_section] {
            if !self.sections.contains_key(section) {
                return Err(not_found(EntityKind::Section, section));
            }
        }
        for entry in destination {
            self.place_task(entry, destination_section, strict)?;
        }
        if source_section != destination_section {
            for entry in source {
                self.place_task(entry, source_section, strict)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Failures {
    next: HashMap<Op, Vec<RemoteError>>,
    always: HashMap<Op, RemoteError>,
}

/// The bundled server. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    data: Mutex<ServerData>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<Failures>,
    strict_positions: bool,
    latency: Option<Duration>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        InMemoryRemote::default()
    }

    pub fn from_data(data: ServerData) -> Self {
        InMemoryRemote {
            data: Mutex::new(data),
            ..InMemoryRemote::default()
        }
    }

    /// Reject batch entries that would share a position with a sibling
    pub fn with_strict_positions(mut self, strict: bool) -> Self {
        self.strict_positions = strict;
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Copy of the server tables
    pub fn snapshot(&self) -> ServerData {
        lock(&self.data).clone()
    }

    /// Run `f` directly against the tables, bypassing the call log
    pub fn with_data<R>(&self, f: impl FnOnce(&mut ServerData) -> R) -> R {
        f(&mut lock(&self.data))
    }

    /// Fail the next call of `op` with `error`. Queued errors are used in order.
    pub fn fail_next(&self, op: Op, error: RemoteError) {
        lock(&self.failures).next.entry(op).or_default().push(error);
    }

    /// Fail every call of `op` until cleared
    pub fn fail_always(&self, op: Op, error: RemoteError) {
        lock(&self.failures).always.insert(op, error);
    }

    pub fn clear_failures(&self) {
        let mut failures = lock(&self.failures);
        failures.next.clear();
        failures.always.clear();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, op: Op) -> Vec<RemoteCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    /// Recorded calls that change server state
    pub fn writes(&self) -> Vec<RemoteCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| !c.op.is_query())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Record the call, wait out the latency, then apply injected failures.
    async fn enter(&self, op: Op, args: serde_json::Value) -> Result<(), RemoteError> {
        debug!(%op, %args, "remote call");
        lock(&self.calls).push(RemoteCall { op, args });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut failures = lock(&self.failures);
        if let Some(queue) = failures.next.get_mut(&op)
            && !queue.is_empty()
        {
            return Err(queue.remove(0));
        }
        match failures.always.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn data(&self) -> MutexGuard<'_, ServerData> {
        lock(&self.data)
    }
}

#[async_trait]
impl RemoteBoundary for InMemoryRemote {
    async fn get_all_boards_and_folders(&self, user: &UserId) -> Result<AllBoards, RemoteError> {
        self.enter(Op::GetAllBoardsAndFolders, json!({ "userId": user }))
            .await?;
        Ok(self.data().all_boards(user))
    }

    async fn create_folder(&self, user: &UserId) -> Result<WireFolder, RemoteError> {
        self.enter(Op::CreateFolder, json!({ "userId": user })).await?;
        Ok(self.data().create_folder(user))
    }

    async fn rename_folder(&self, id: &FolderId, name: &str) -> Result<RenamedFolder, RemoteError> {
        self.enter(Op::RenameFolder, json!({ "id": id, "name": name }))
            .await?;
        let mut data = self.data();
        let folder = data.folder_mut(id)?;
        folder.name = name.to_string();
        Ok(RenamedFolder {
            id: folder.id.clone(),
            name: folder.name.clone(),
        })
    }

    async fn reorder_folders(&self, order: &[PositionRef<FolderId>]) -> Result<(), RemoteError> {
        self.enter(Op::ReorderFolders, json!({ "folders": order }))
            .await?;
        self.data().reorder_folders(order, self.strict_positions)
    }

    async fn archive_folder(&self, id: &FolderId, prev_archived: bool) -> Result<(), RemoteError> {
        self.enter(
            Op::ArchiveFolder,
            json!({ "id": id, "prevArchived": prev_archived }),
        )
        .await?;
        self.data().folder_mut(id)?.archived = !prev_archived;
        Ok(())
    }

    async fn delete_folder(
        &self,
        user: &UserId,
        id: &FolderId,
    ) -> Result<Deleted<FolderId>, RemoteError> {
        self.enter(Op::DeleteFolder, json!({ "userId": user, "id": id }))
            .await?;
        self.data().delete_folder(user, id)?;
        Ok(Deleted { id: id.clone() })
    }

    async fn create_board(
        &self,
        user: &UserId,
        folder: Option<&FolderId>,
    ) -> Result<WireBoard, RemoteError> {
        self.enter(Op::CreateBoard, json!({ "userId": user, "folderId": folder }))
            .await?;
        self.data().create_board(user, folder)
    }

    async fn update_board(&self, update: &BoardUpdate) -> Result<WireBoard, RemoteError> {
        self.enter(Op::UpdateBoard, json!(update)).await?;
        self.data().update_board(update)
    }

    async fn reorder_boards(&self, order: &[PositionRef<BoardId>]) -> Result<(), RemoteError> {
        self.enter(Op::ReorderBoards, json!({ "boards": order }))
            .await?;
        self.data().reorder_boards(order, self.strict_positions)
    }

    async fn move_or_reorder_boards(
        &self,
        source_folder: Option<&FolderId>,
        destination_folder: Option<&FolderId>,
        source: &[PositionRef<BoardId>],
        destination: &[PositionRef<BoardId>],
    ) -> Result<(), RemoteError> {
        self.enter(
            Op::MoveOrReorderBoards,
            json!({
                "resourceFolderId": source_folder,
                "destinationFolderId": destination_folder,
                "resourceList": source,
                "destinationList": destination,
            }),
        )
        .await?;
        self.data().move_or_reorder_boards(
            source_folder,
            destination_folder,
            source,
            destination,
            self.strict_positions,
        )
    }

    async fn reorder_favorites(&self, order: &[PositionRef<BoardId>]) -> Result<(), RemoteError> {
        self.enter(Op::ReorderFavorites, json!({ "boards": order }))
            .await?;
        self.data().reorder_favorites(order, self.strict_positions)
    }

    async fn archive_board(&self, id: &BoardId, prev_archived: bool) -> Result<(), RemoteError> {
        self.enter(
            Op::ArchiveBoard,
            json!({ "id": id, "prevArchived": prev_archived }),
        )
        .await?;
        self.data().board_mut(id)?.archived = !prev_archived;
        Ok(())
    }

    async fn delete_board(
        &self,
        id: &BoardId,
        user: &UserId,
        folder: Option<&FolderId>,
    ) -> Result<Deleted<BoardId>, RemoteError> {
        self.enter(
            Op::DeleteBoard,
            json!({ "id": id, "userId": user, "folderId": folder }),
        )
        .await?;
        self.data().delete_board(id, user)?;
        Ok(Deleted { id: id.clone() })
    }

    async fn get_board(&self, id: &BoardId) -> Result<BoardWithSections, RemoteError> {
        self.enter(Op::GetBoard, json!({ "id": id })).await?;
        self.data().board(id)
    }

    async fn create_section(&self, board: &BoardId) -> Result<WireSection, RemoteError> {
        self.enter(Op::CreateSection, json!({ "boardId": board }))
            .await?;
        self.data().create_section(board)
    }

    async fn rename_section(&self, id: &SectionId, title: &str) -> Result<WireSection, RemoteError> {
        self.enter(Op::RenameSection, json!({ "id": id, "title": title }))
            .await?;
        let mut data = self.data();
        let section = data.section_mut(id)?;
        section.title = title.to_string();
        Ok(section.clone())
    }

    async fn reorder_sections(&self, order: &[PositionRef<SectionId>]) -> Result<(), RemoteError> {
        self.enter(Op::ReorderSections, json!({ "sections": order }))
            .await?;
        self.data().reorder_sections(order, self.strict_positions)
    }

    async fn archive_section(
        &self,
        id: &SectionId,
        prev_archived: bool,
    ) -> Result<(), RemoteError> {
        self.enter(
            Op::ArchiveSection,
            json!({ "id": id, "prevArchived": prev_archived }),
        )
        .await?;
        self.data().section_mut(id)?.archived = !prev_archived;
        Ok(())
    }

    async fn delete_section(&self, id: &SectionId) -> Result<Deleted<SectionId>, RemoteError> {
        self.enter(Op::DeleteSection, json!({ "id": id })).await?;
        self.data().delete_section(id)?;
        Ok(Deleted { id: id.clone() })
    }

    async fn create_task(&self, section: &SectionId) -> Result<WireTask, RemoteError> {
        self.enter(Op::CreateTask, json!({ "sectionId": section }))
            .await?;
        self.data().create_task(section)
    }

    async fn update_task(
        &self,
        id: &TaskId,
        title: &str,
        content: &str,
    ) -> Result<WireTask, RemoteError> {
        self.enter(
            Op::UpdateTask,
            json!({ "id": id, "title": title, "content": content }),
        )
        .await?;
        let mut data = self.data();
        let task = data.task_mut(id)?;
        task.title = title.to_string();
        task.content = content.to_string();
        Ok(task.clone())
    }

    async fn move_or_reorder_tasks(
        &self,
        source_section: &SectionId,
        destination_section: &SectionId,
        source: &[PositionRef<TaskId>],
        destination: &[PositionRef<TaskId>],
    ) -> Result<(), RemoteError> {
        self.enter(
            Op::MoveOrReorderTasks,
            json!({
                "resourceSectionId": source_section,
                "destinationSectionId": destination_section,
                "resourceList": source,
                "destinationList": destination,
            }),
        )
        .await?;
        self.data().move_or_reorder_tasks(
            source_section,
            destination_section,
            source,
            destination,
            self.strict_positions,
        )
    }

    async fn toggle_task_archived(
        &self,
        id: &TaskId,
        prev_archived: bool,
    ) -> Result<(), RemoteError> {
        self.enter(
            Op::ToggleTaskArchived,
            json!({ "id": id, "prevArchived": prev_archived }),
        )
        .await?;
        self.data().task_mut(id)?.archived = !prev_archived;
        Ok(())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<String, RemoteError> {
        self.enter(Op::DeleteTask, json!({ "id": id })).await?;
        self.data().delete_task(id)?;
        Ok("Task deleted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user() -> UserId {
        UserId::new("u1")
    }

    fn pos<I>(id: I, position: usize) -> PositionRef<I> {
        PositionRef { id, position }
    }

    #[tokio::test]
    async fn new_folder_has_one_default_board() {
        let remote = InMemoryRemote::new();
        let folder = remote.create_folder(&user()).await.unwrap();
        assert_eq!(folder.name, "Untitled");
        assert_eq!(folder.boards.len(), 1);
        assert_eq!(folder.boards[0].title, "Untitled");
        assert_eq!(folder.boards[0].icon, "📝");
        assert_eq!(folder.boards[0].description, "Add description here");
        assert_eq!(folder.boards[0].folder_id, Some(folder.id.clone()));

        let all = remote.get_all_boards_and_folders(&user()).await.unwrap();
        assert_eq!(all.folders[0].boards.len(), 1);
        assert!(all.boards.is_empty());
    }

    #[tokio::test]
    async fn delete_task_renumbers_siblings() {
        let remote = InMemoryRemote::new();
        let board = remote.create_board(&user(), None).await.unwrap();
        let section = remote.create_section(&board.id).await.unwrap();
        let a = remote.create_task(&section.id).await.unwrap();
        let b = remote.create_task(&section.id).await.unwrap();
        let c = remote.create_task(&section.id).await.unwrap();
        assert_eq!(c.position, 2);

        remote.delete_task(&a.id).await.unwrap();
        let loaded = remote.get_board(&board.id).await.unwrap();
        let tasks: Vec<_> = loaded.sections[0]
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.position))
            .collect();
        assert_eq!(tasks, vec![(b.id, 0), (c.id, 1)]);
    }

    #[tokio::test]
    async fn delete_folder_cascades() {
        let remote = InMemoryRemote::new();
        let folder = remote.create_folder(&user()).await.unwrap();
        let board = folder.boards[0].id.clone();
        let section = remote.create_section(&board).await.unwrap();
        remote.create_task(&section.id).await.unwrap();

        remote.delete_folder(&user(), &folder.id).await.unwrap();
        let data = remote.snapshot();
        assert!(data.boards.is_empty());
        assert!(data.sections.is_empty());
        assert!(data.tasks.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let remote = InMemoryRemote::new();
        let err = remote.delete_task(&TaskId::new("nope")).await.unwrap_err();
        assert_eq!(err, RemoteError::not_found(EntityKind::Task, "nope"));
        let err = remote
            .rename_section(&SectionId::new("gone"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reverse_batch_moves_task_between_sections() {
        let remote = InMemoryRemote::new();
        let board = remote.create_board(&user(), None).await.unwrap();
        let s1 = remote.create_section(&board.id).await.unwrap();
        let s2 = remote.create_section(&board.id).await.unwrap();
        let t1 = remote.create_task(&s1.id).await.unwrap();
        let t2 = remote.create_task(&s1.id).await.unwrap();
        let t3 = remote.create_task(&s2.id).await.unwrap();

        remote
            .move_or_reorder_tasks(
                &s1.id,
                &s2.id,
                &[pos(t2.id.clone(), 0)],
                &[pos(t3.id.clone(), 1), pos(t1.id.clone(), 0)],
            )
            .await
            .unwrap();

        let loaded = remote.get_board(&board.id).await.unwrap();
        let ids = |i: usize| -> Vec<TaskId> {
            loaded.sections[i].tasks.iter().map(|t| t.id.clone()).collect()
        };
        assert_eq!(ids(0), vec![t2.id]);
        assert_eq!(ids(1), vec![t1.id, t3.id]);
    }

    #[tokio::test]
    async fn strict_mode_rejects_transient_duplicates() {
        let remote = InMemoryRemote::new().with_strict_positions(true);
        let a = remote.create_folder(&user()).await.unwrap();
        let b = remote.create_folder(&user()).await.unwrap();
        // Swapping two folders collides on the first write whatever the order.
        let err = remote
            .reorder_folders(&[pos(a.id.clone(), 1), pos(b.id.clone(), 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Validation(_)));

        let relaxed = InMemoryRemote::from_data(remote.snapshot());
        relaxed
            .reorder_folders(&[pos(a.id.clone(), 1), pos(b.id.clone(), 0)])
            .await
            .unwrap();
        let all = relaxed.get_all_boards_and_folders(&user()).await.unwrap();
        assert_eq!(all.folders[0].id, b.id);
    }

    #[tokio::test]
    async fn favorites_get_positions_in_order() {
        let remote = InMemoryRemote::new();
        let a = remote.create_board(&user(), None).await.unwrap();
        let b = remote.create_board(&user(), None).await.unwrap();
        for board in [&b, &a] {
            let update = BoardUpdate {
                id: board.id.clone(),
                title: board.title.clone(),
                icon: board.icon.clone(),
                description: board.description.clone(),
                favorite: true,
            };
            remote.update_board(&update).await.unwrap();
        }
        let all = remote.get_all_boards_and_folders(&user()).await.unwrap();
        assert_eq!(all.favorites_order(), vec![b.id.clone(), a.id.clone()]);

        remote
            .reorder_favorites(&[pos(b.id.clone(), 1), pos(a.id.clone(), 0)])
            .await
            .unwrap();
        let all = remote.get_all_boards_and_folders(&user()).await.unwrap();
        assert_eq!(all.favorites_order(), vec![a.id, b.id]);
    }

    fn favorite_update(board: &WireBoard, favorite: bool) -> BoardUpdate {
        BoardUpdate {
            id: board.id.clone(),
            title: board.title.clone(),
            icon: board.icon.clone(),
            description: board.description.clone(),
            favorite,
        }
    }

    #[tokio::test]
    async fn unfavorite_closes_the_gap() {
        let remote = InMemoryRemote::new();
        let folder = remote.create_folder(&user()).await.unwrap();
        let filed = &folder.boards[0];
        let a = remote.create_board(&user(), None).await.unwrap();
        let b = remote.create_board(&user(), None).await.unwrap();
        remote.update_board(&favorite_update(&a, true)).await.unwrap();
        remote.update_board(&favorite_update(&b, true)).await.unwrap();
        remote.update_board(&favorite_update(&a, false)).await.unwrap();
        remote.update_board(&favorite_update(filed, true)).await.unwrap();

        let positions: Vec<_> = remote.with_data(|d| {
            [&filed.id, &a.id, &b.id]
                .iter()
                .map(|id| d.boards[*id].favorite_position)
                .collect()
        });
        assert_eq!(positions, vec![Some(1), None, Some(0)]);
        let all = remote.get_all_boards_and_folders(&user()).await.unwrap();
        assert_eq!(all.favorites_order(), vec![b.id.clone(), filed.id.clone()]);
    }

    #[tokio::test]
    async fn favorite_positions_are_counted_per_user() {
        let remote = InMemoryRemote::new();
        let other = remote
            .create_board(&UserId::new("u2"), None)
            .await
            .unwrap();
        remote.update_board(&favorite_update(&other, true)).await.unwrap();
        let mine = remote.create_board(&user(), None).await.unwrap();
        let updated = remote.update_board(&favorite_update(&mine, true)).await.unwrap();
        assert_eq!(updated.favorite_position, Some(0));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let remote = InMemoryRemote::new();
        remote.fail_next(Op::CreateBoard, RemoteError::Transport("offline".into()));
        assert!(remote.create_board(&user(), None).await.is_err());
        assert!(remote.create_board(&user(), None).await.is_ok());

        remote.fail_always(Op::GetBoard, RemoteError::Server("boom".into()));
        assert!(remote.get_board(&BoardId::new("b1")).await.is_err());
        assert!(remote.get_board(&BoardId::new("b1")).await.is_err());
        remote.clear_failures();
        assert_eq!(remote.calls_to(Op::CreateBoard).len(), 2);
        assert_eq!(remote.writes().len(), 2);
    }

    #[tokio::test]
    async fn archive_toggles_from_previous_value() {
        let remote = InMemoryRemote::new();
        let board = remote.create_board(&user(), None).await.unwrap();
        remote.archive_board(&board.id, false).await.unwrap();
        assert!(remote.get_board(&board.id).await.unwrap().board.archived);
        let call = remote.calls_to(Op::ArchiveBoard).remove(0);
        assert_eq!(call.args["prevArchived"], false);
    }
}
