use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::drop::{Container, DropResult, ReorderPlan};
use super::{Store, StoreError};
use crate::model::{
    ArchiveVisibility, Board, BoardId, EntityRef, Field, FieldKey, Folder, FolderId, Section,
    SectionId, Task, TaskId,
};
use crate::ops::reindex::reindex;

/// A write to the store. [`Store::apply`] is the only way the tree changes.
#[derive(Debug, Clone)]
pub enum StoreChange {
    /// Full load: replaces the whole tree. `favorites` gives the favorites
    /// order; favorite boards missing from it are appended in tree order.
    Replace {
        folders: Vec<Folder>,
        unfiled: Vec<Board>,
        favorites: Vec<BoardId>,
    },
    InsertFolder {
        folder: Folder,
        index: usize,
    },
    InsertBoard {
        board: Board,
        folder: Option<FolderId>,
        index: usize,
    },
    InsertSection {
        board: BoardId,
        section: Section,
        index: usize,
    },
    InsertTask {
        section: SectionId,
        task: Task,
        index: usize,
    },
    /// Removes the folder and every board it owns
    RemoveFolder(FolderId),
    RemoveBoard(BoardId),
    RemoveSection(SectionId),
    RemoveTask(TaskId),
    SetText {
        key: FieldKey,
        value: String,
    },
    /// Flips the archived flag only. Positions are untouched.
    SetArchived {
        entity: EntityRef,
        archived: bool,
    },
    SetFavorite {
        board: BoardId,
        favorite: bool,
    },
    Drop(DropResult),
    /// Swap a placeholder for the entity the server created
    Confirm(Confirmation),
    LoadSections {
        board: BoardId,
        sections: Vec<Section>,
    },
    MarkLoading(BoardId),
    /// A section fetch finished without data
    ClearLoading(BoardId),
    SelectBoard(Option<BoardId>),
    SetArchiveVisibility(ArchiveVisibility),
}

/// Server data for an optimistically inserted placeholder.
///
/// The server id and timestamps replace the placeholder's. Text and flags the
/// user may already have edited stay local, and so does the list position.
#[derive(Debug, Clone)]
pub enum Confirmation {
    Folder { placeholder: FolderId, server: Folder },
    Board { placeholder: BoardId, server: Board },
    Section { placeholder: SectionId, server: Section },
    Task { placeholder: TaskId, server: Task },
}

/// What a change did besides the edit itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Sibling lists that were reindexed
    pub reindexed: Vec<Container>,
    /// Set when the active board changed
    pub active_changed: bool,
    /// Entities that left the tree, cascaded children included
    pub removed: Vec<EntityRef>,
    /// Remote updates for a resolved drop
    pub plan: Option<ReorderPlan>,
}

impl Applied {
    fn reindexed(container: Container) -> Self {
        Applied {
            reindexed: vec![container],
            ..Applied::default()
        }
    }
}

fn check_insert_index(index: usize, len: usize) -> Result<(), StoreError> {
    if index > len {
        return Err(StoreError::InvalidIndex { index, len });
    }
    Ok(())
}

/// Sort by stored position, then renumber densely
fn settle_board(board: &mut Board) {
    if let Some(sections) = board.sections.as_mut() {
        settle_sections(sections);
    }
}

fn settle_sections(sections: &mut [Section]) {
    sections.sort_by_key(|s| s.position);
    reindex(sections);
    for section in sections.iter_mut() {
        section.tasks.sort_by_key(|t| t.position);
        reindex(&mut section.tasks);
    }
}

fn settle_boards(boards: &mut [Board], folder: Option<&FolderId>) {
    boards.sort_by_key(|b| b.position);
    reindex(boards);
    for board in boards.iter_mut() {
        board.folder_id = folder.cloned();
        settle_board(board);
    }
}

fn collect_board(board: &Board, out: &mut Vec<EntityRef>) {
    out.push(EntityRef::Board(board.id.clone()));
    for section in board.sections() {
        collect_section(section, out);
    }
}

fn collect_section(section: &Section, out: &mut Vec<EntityRef>) {
    out.push(EntityRef::Section(section.id.clone()));
    out.extend(section.tasks.iter().map(|t| EntityRef::Task(t.id.clone())));
}

impl Store {
    /// Apply one change. Every touched sibling list is reindexed before this
    /// returns; on error the tree is left as it was.
    pub fn apply(&mut self, change: StoreChange) -> Result<Applied, StoreError> {
        match change {
            StoreChange::Replace {
                folders,
                unfiled,
                favorites,
            } => Ok(self.replace(folders, unfiled, favorites)),
            StoreChange::InsertFolder { folder, index } => self.insert_folder(folder, index),
            StoreChange::InsertBoard {
                board,
                folder,
                index,
            } => self.insert_board(board, folder, index),
            StoreChange::InsertSection {
                board,
                section,
                index,
            } => self.insert_section(&board, section, index),
            StoreChange::InsertTask {
                section,
                task,
                index,
            } => self.insert_task(&section, task, index),
            StoreChange::RemoveFolder(id) => self.remove_folder(&id),
            StoreChange::RemoveBoard(id) => self.remove_board(&id),
            StoreChange::RemoveSection(id) => self.remove_section(&id),
            StoreChange::RemoveTask(id) => self.remove_task(&id),
            StoreChange::SetText { key, value } => self.set_text(&key, value),
            StoreChange::SetArchived { entity, archived } => self.set_archived(&entity, archived),
            StoreChange::SetFavorite { board, favorite } => self.set_favorite(&board, favorite),
            StoreChange::Drop(drop) => {
                let plan = self.resolve_drop(&drop)?;
                Ok(Applied {
                    reindexed: plan.containers(),
                    plan: Some(plan),
                    ..Applied::default()
                })
            }
            StoreChange::Confirm(confirmation) => self.confirm(confirmation),
            StoreChange::LoadSections { board, sections } => self.load_sections(&board, sections),
            StoreChange::MarkLoading(board) => {
                let board = self.resolve_board(&board);
                self.board_mut(&board)?;
                self.loading.insert(board);
                Ok(Applied::default())
            }
            StoreChange::ClearLoading(board) => {
                let board = self.resolve_board(&board);
                self.loading.remove(&board);
                Ok(Applied::default())
            }
            StoreChange::SelectBoard(board) => self.select(board),
            StoreChange::SetArchiveVisibility(visibility) => {
                self.visibility = visibility;
                Ok(Applied::default())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutable lookups
    // -----------------------------------------------------------------------

    fn boards_mut(&mut self) -> impl Iterator<Item = &mut Board> {
        self.folders
            .iter_mut()
            .flat_map(|f| f.boards.iter_mut())
            .chain(self.unfiled.iter_mut())
    }

    fn folder_mut(&mut self, id: &FolderId) -> Result<&mut Folder, StoreError> {
        self.folders
            .iter_mut()
            .find(|f| &f.id == id)
            .ok_or_else(|| StoreError::folder_not_found(id))
    }

    pub(super) fn board_list_mut(
        &mut self,
        folder: Option<&FolderId>,
    ) -> Result<&mut Vec<Board>, StoreError> {
        match folder {
            None => Ok(&mut self.unfiled),
            Some(id) => Ok(&mut self.folder_mut(id)?.boards),
        }
    }

    fn board_mut(&mut self, id: &BoardId) -> Result<&mut Board, StoreError> {
        self.boards_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| StoreError::board_not_found(id))
    }

    pub(super) fn sections_mut(&mut self, board: &BoardId) -> Result<&mut Vec<Section>, StoreError> {
        self.board_mut(board)?
            .sections
            .as_mut()
            .ok_or_else(|| StoreError::NotLoaded(board.clone()))
    }

    fn section_mut(&mut self, id: &SectionId) -> Result<&mut Section, StoreError> {
        self.boards_mut()
            .flat_map(|b| b.sections.iter_mut().flatten())
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::section_not_found(id))
    }

    pub(super) fn tasks_mut(&mut self, section: &SectionId) -> Result<&mut Vec<Task>, StoreError> {
        Ok(&mut self.section_mut(section)?.tasks)
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, StoreError> {
        self.boards_mut()
            .flat_map(|b| b.sections.iter_mut().flatten())
            .flat_map(|s| s.tasks.iter_mut())
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    fn board_location(&self, id: &BoardId) -> Option<(Option<FolderId>, usize)> {
        for folder in &self.folders {
            if let Some(index) = folder.boards.iter().position(|b| &b.id == id) {
                return Some((Some(folder.id.clone()), index));
            }
        }
        self.unfiled
            .iter()
            .position(|b| &b.id == id)
            .map(|index| (None, index))
    }

    fn section_location(&self, id: &SectionId) -> Option<(BoardId, usize)> {
        self.boards().find_map(|b| {
            b.sections()
                .iter()
                .position(|s| &s.id == id)
                .map(|index| (b.id.clone(), index))
        })
    }

    fn task_location(&self, id: &TaskId) -> Option<(SectionId, usize)> {
        self.boards()
            .flat_map(|b| b.sections().iter())
            .find_map(|s| {
                s.tasks
                    .iter()
                    .position(|t| &t.id == id)
                    .map(|index| (s.id.clone(), index))
            })
    }

    fn resolve_board(&self, id: &BoardId) -> BoardId {
        match self.resolve(&EntityRef::Board(id.clone())) {
            EntityRef::Board(id) => id,
            _ => id.clone(),
        }
    }

    fn resolve_folder(&self, id: &FolderId) -> FolderId {
        match self.resolve(&EntityRef::Folder(id.clone())) {
            EntityRef::Folder(id) => id,
            _ => id.clone(),
        }
    }

    fn resolve_section(&self, id: &SectionId) -> SectionId {
        match self.resolve(&EntityRef::Section(id.clone())) {
            EntityRef::Section(id) => id,
            _ => id.clone(),
        }
    }

    fn resolve_task(&self, id: &TaskId) -> TaskId {
        match self.resolve(&EntityRef::Task(id.clone())) {
            EntityRef::Task(id) => id,
            _ => id.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Changes
    // -----------------------------------------------------------------------

    fn replace(
        &mut self,
        mut folders: Vec<Folder>,
        mut unfiled: Vec<Board>,
        favorites: Vec<BoardId>,
    ) -> Applied {
        folders.sort_by_key(|f| f.position);
        reindex(&mut folders);
        for folder in folders.iter_mut() {
            let id = folder.id.clone();
            settle_boards(&mut folder.boards, Some(&id));
        }
        settle_boards(&mut unfiled, None);
        self.folders = folders;
        self.unfiled = unfiled;
        self.loading.clear();

        let flagged: Vec<BoardId> = self
            .boards()
            .filter(|b| b.favorite)
            .map(|b| b.id.clone())
            .collect();
        let flagged_set: HashSet<&BoardId> = flagged.iter().collect();
        let mut seen = HashSet::new();
        let mut ordered: Vec<BoardId> = favorites
            .into_iter()
            .filter(|id| flagged_set.contains(id) && seen.insert(id.clone()))
            .collect();
        ordered.extend(flagged.iter().filter(|id| !seen.contains(*id)).cloned());
        self.favorites = ordered;

        let mut applied = Applied {
            reindexed: vec![Container::Folders, Container::Boards(None)],
            ..Applied::default()
        };
        applied
            .reindexed
            .extend(self.folders.iter().map(|f| Container::Boards(Some(f.id.clone()))));
        if let Some(active) = &self.active
            && self.board(active).is_none()
        {
            self.active = None;
            applied.active_changed = true;
        }
        applied
    }

    fn insert_folder(&mut self, mut folder: Folder, index: usize) -> Result<Applied, StoreError> {
        if self.folder(&folder.id).is_some() {
            return Err(StoreError::AlreadyExists(EntityRef::Folder(folder.id)));
        }
        if let Some(b) = folder.boards.iter().find(|b| self.board(&b.id).is_some()) {
            return Err(StoreError::AlreadyExists(EntityRef::Board(b.id.clone())));
        }
        check_insert_index(index, self.folders.len())?;
        let id = folder.id.clone();
        settle_boards(&mut folder.boards, Some(&id));
        self.favorites.extend(
            folder
                .boards
                .iter()
                .filter(|b| b.favorite)
                .map(|b| b.id.clone()),
        );
        self.folders.insert(index, folder);
        reindex(&mut self.folders);
        let mut applied = Applied::reindexed(Container::Folders);
        applied.reindexed.push(Container::Boards(Some(id)));
        Ok(applied)
    }

    fn insert_board(
        &mut self,
        mut board: Board,
        folder: Option<FolderId>,
        index: usize,
    ) -> Result<Applied, StoreError> {
        if self.board(&board.id).is_some() {
            return Err(StoreError::AlreadyExists(EntityRef::Board(board.id)));
        }
        let folder = folder.map(|f| self.resolve_folder(&f));
        board.folder_id = folder.clone();
        settle_board(&mut board);
        let favorite = board.favorite.then(|| board.id.clone());

        let list = self.board_list_mut(folder.as_ref())?;
        check_insert_index(index, list.len())?;
        list.insert(index, board);
        reindex(list);
        self.favorites.extend(favorite);
        Ok(Applied::reindexed(Container::Boards(folder)))
    }

    fn insert_section(
        &mut self,
        board: &BoardId,
        mut section: Section,
        index: usize,
    ) -> Result<Applied, StoreError> {
        if self.section(&section.id).is_some() {
            return Err(StoreError::AlreadyExists(EntityRef::Section(section.id)));
        }
        let board = self.resolve_board(board);
        section.tasks.sort_by_key(|t| t.position);
        reindex(&mut section.tasks);
        let sections = self.sections_mut(&board)?;
        check_insert_index(index, sections.len())?;
        sections.insert(index, section);
        reindex(sections);
        Ok(Applied::reindexed(Container::Sections(board)))
    }

    fn insert_task(
        &mut self,
        section: &SectionId,
        task: Task,
        index: usize,
    ) -> Result<Applied, StoreError> {
        if self.task(&task.id).is_some() {
            return Err(StoreError::AlreadyExists(EntityRef::Task(task.id)));
        }
        let section = self.resolve_section(section);
        let tasks = self.tasks_mut(&section)?;
        check_insert_index(index, tasks.len())?;
        tasks.insert(index, task);
        reindex(tasks);
        Ok(Applied::reindexed(Container::Tasks(section)))
    }

    /// The board to select after the active one at `index` of `folder` left.
    fn replacement_for(&self, folder: Option<&FolderId>, index: usize) -> Option<BoardId> {
        let list = self.board_list(folder).unwrap_or(&[]);
        list.get(index)
            .or_else(|| index.checked_sub(1).and_then(|i| list.get(i)))
            .or_else(|| self.boards().next())
            .map(|b| b.id.clone())
    }

    fn forget_boards(&mut self, removed: &[EntityRef]) {
        for entity in removed {
            if let EntityRef::Board(id) = entity {
                self.favorites.retain(|f| f != id);
                self.loading.remove(id);
            }
        }
    }

    fn remove_folder(&mut self, id: &FolderId) -> Result<Applied, StoreError> {
        let id = self.resolve_folder(id);
        let index = self
            .folders
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| StoreError::folder_not_found(&id))?;
        let folder = self.folders.remove(index);
        reindex(&mut self.folders);

        let mut removed = vec![EntityRef::Folder(folder.id.clone())];
        for board in &folder.boards {
            collect_board(board, &mut removed);
        }
        self.forget_boards(&removed);

        let mut applied = Applied::reindexed(Container::Folders);
        if let Some(active) = &self.active
            && folder.boards.iter().any(|b| &b.id == active)
        {
            let next = self.boards().next().map(|b| b.id.clone());
            self.active = next;
            applied.active_changed = true;
        }
        applied.removed = removed;
        Ok(applied)
    }

    fn remove_board(&mut self, id: &BoardId) -> Result<Applied, StoreError> {
        let id = self.resolve_board(id);
        let (folder, index) = self
            .board_location(&id)
            .ok_or_else(|| StoreError::board_not_found(&id))?;
        let list = self.board_list_mut(folder.as_ref())?;
        let board = list.remove(index);
        reindex(list);

        let mut removed = Vec::new();
        collect_board(&board, &mut removed);
        self.forget_boards(&removed);

        let mut applied = Applied::reindexed(Container::Boards(folder.clone()));
        if self.active.as_ref() == Some(&id) {
            self.active = self.replacement_for(folder.as_ref(), index);
            applied.active_changed = true;
        }
        applied.removed = removed;
        Ok(applied)
    }

    fn remove_section(&mut self, id: &SectionId) -> Result<Applied, StoreError> {
        let id = self.resolve_section(id);
        let (board, index) = self
            .section_location(&id)
            .ok_or_else(|| StoreError::section_not_found(&id))?;
        let sections = self.sections_mut(&board)?;
        let section = sections.remove(index);
        reindex(sections);

        let mut applied = Applied::reindexed(Container::Sections(board));
        collect_section(&section, &mut applied.removed);
        Ok(applied)
    }

    fn remove_task(&mut self, id: &TaskId) -> Result<Applied, StoreError> {
        let id = self.resolve_task(id);
        let (section, index) = self
            .task_location(&id)
            .ok_or_else(|| StoreError::task_not_found(&id))?;
        let tasks = self.tasks_mut(&section)?;
        tasks.remove(index);
        reindex(tasks);

        let mut applied = Applied::reindexed(Container::Tasks(section));
        applied.removed.push(EntityRef::Task(id));
        Ok(applied)
    }

    fn set_text(&mut self, key: &FieldKey, value: String) -> Result<Applied, StoreError> {
        if !key.is_well_formed() {
            return Err(StoreError::FieldMismatch {
                entity: key.entity.clone(),
                field: key.field,
            });
        }
        match (self.resolve(&key.entity), key.field) {
            (EntityRef::Folder(id), _) => self.folder_mut(&id)?.name = value,
            (EntityRef::Board(id), Field::BoardTitle) => self.board_mut(&id)?.title = value,
            (EntityRef::Board(id), Field::BoardDescription) => {
                self.board_mut(&id)?.description = value
            }
            (EntityRef::Board(id), _) => self.board_mut(&id)?.icon = value,
            (EntityRef::Section(id), _) => self.section_mut(&id)?.title = value,
            (EntityRef::Task(id), Field::TaskTitle) => self.task_mut(&id)?.title = value,
            (EntityRef::Task(id), _) => self.task_mut(&id)?.content = value,
        }
        Ok(Applied::default())
    }

    fn set_archived(&mut self, entity: &EntityRef, archived: bool) -> Result<Applied, StoreError> {
        match self.resolve(entity) {
            EntityRef::Folder(id) => self.folder_mut(&id)?.archived = archived,
            EntityRef::Board(id) => self.board_mut(&id)?.archived = archived,
            EntityRef::Section(id) => self.section_mut(&id)?.archived = archived,
            EntityRef::Task(id) => self.task_mut(&id)?.archived = archived,
        }
        Ok(Applied::default())
    }

    fn set_favorite(&mut self, id: &BoardId, favorite: bool) -> Result<Applied, StoreError> {
        let id = self.resolve_board(id);
        self.board_mut(&id)?.favorite = favorite;
        let listed = self.favorites.contains(&id);
        if favorite && !listed {
            self.favorites.push(id);
        } else if !favorite && listed {
            self.favorites.retain(|f| f != &id);
        }
        Ok(Applied::default())
    }

    fn load_sections(
        &mut self,
        board: &BoardId,
        mut sections: Vec<Section>,
    ) -> Result<Applied, StoreError> {
        let board = self.resolve_board(board);
        settle_sections(&mut sections);
        self.board_mut(&board)?.sections = Some(sections);
        self.loading.remove(&board);
        Ok(Applied::reindexed(Container::Sections(board)))
    }

    fn select(&mut self, board: Option<BoardId>) -> Result<Applied, StoreError> {
        let board = match board {
            Some(id) => {
                let id = self.resolve_board(&id);
                if self.board(&id).is_none() {
                    return Err(StoreError::board_not_found(&id));
                }
                Some(id)
            }
            None => None,
        };
        let changed = self.active != board;
        self.active = board;
        Ok(Applied {
            active_changed: changed,
            ..Applied::default()
        })
    }

    // -----------------------------------------------------------------------
    // Placeholder confirmation
    // -----------------------------------------------------------------------

    fn confirm(&mut self, confirmation: Confirmation) -> Result<Applied, StoreError> {
        match confirmation {
            Confirmation::Folder {
                placeholder,
                server,
            } => self.confirm_folder(&placeholder, server)?,
            Confirmation::Board {
                placeholder,
                server,
            } => self.confirm_board(&placeholder, server)?,
            Confirmation::Section {
                placeholder,
                server,
            } => {
                let section = self.section_mut(&placeholder)?;
                section.id = server.id.clone();
                self.alias(
                    EntityRef::Section(placeholder),
                    EntityRef::Section(server.id),
                );
            }
            Confirmation::Task {
                placeholder,
                server,
            } => {
                let task = self.task_mut(&placeholder)?;
                task.id = server.id.clone();
                task.created_at = server.created_at;
                self.alias(EntityRef::Task(placeholder), EntityRef::Task(server.id));
            }
        }
        Ok(Applied::default())
    }

    fn alias(&mut self, placeholder: EntityRef, real: EntityRef) {
        debug!(%placeholder, %real, "placeholder confirmed");
        self.aliases.insert(placeholder, real);
    }

    fn rename_board(&mut self, placeholder: &BoardId, real: &BoardId, created_at: DateTime<Utc>) {
        if let Ok(board) = self.board_mut(placeholder) {
            board.id = real.clone();
            board.created_at = created_at;
        }
        for favorite in self.favorites.iter_mut().filter(|f| *f == placeholder) {
            *favorite = real.clone();
        }
        if self.active.as_ref() == Some(placeholder) {
            self.active = Some(real.clone());
        }
        if self.loading.remove(placeholder) {
            self.loading.insert(real.clone());
        }
        self.alias(EntityRef::Board(placeholder.clone()), EntityRef::Board(real.clone()));
    }

    fn confirm_board(&mut self, placeholder: &BoardId, server: Board) -> Result<(), StoreError> {
        let board = self.board_mut(placeholder)?;
        if board.sections.is_none() {
            board.sections = server.sections;
        }
        self.rename_board(placeholder, &server.id, server.created_at);
        Ok(())
    }

    fn confirm_folder(&mut self, placeholder: &FolderId, server: Folder) -> Result<(), StoreError> {
        let folder = self.folder_mut(placeholder)?;
        folder.id = server.id.clone();
        let pending: Vec<BoardId> = folder
            .boards
            .iter()
            .filter(|b| b.id.is_placeholder())
            .map(|b| b.id.clone())
            .collect();
        for board in folder.boards.iter_mut() {
            board.folder_id = Some(server.id.clone());
        }
        // Server boards pair with the placeholders in list order.
        let mut server_boards = server.boards;
        server_boards.sort_by_key(|b| b.position);
        for (local, remote) in pending.iter().zip(server_boards) {
            let board = self.board_mut(local)?;
            if board.sections.is_none() {
                board.sections = remote.sections;
            }
            self.rename_board(local, &remote.id, remote.created_at);
        }
        self.alias(
            EntityRef::Folder(placeholder.clone()),
            EntityRef::Folder(server.id),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;
    use crate::store::{FavoriteEntry, LoadState};
    use pretty_assertions::assert_eq;

    fn fav(store: &mut Store, id: &str, favorite: bool) {
        store
            .apply(StoreChange::SetFavorite {
                board: BoardId::new(id),
                favorite,
            })
            .unwrap();
    }

    fn select(store: &mut Store, id: &str) {
        store
            .apply(StoreChange::SelectBoard(Some(BoardId::new(id))))
            .unwrap();
    }

    #[test]
    fn replace_sorts_by_position_and_orders_favorites() {
        let mut a = board("a", None);
        a.position = 1;
        a.favorite = true;
        let mut b = board("b", None);
        b.position = 0;
        b.favorite = true;
        let mut store = Store::new();
        store
            .apply(StoreChange::Replace {
                folders: Vec::new(),
                unfiled: vec![a, b],
                favorites: vec![BoardId::new("a")],
            })
            .unwrap();
        assert_eq!(board_ids(&store, None), vec!["b", "a"]);
        assert_eq!(store.favorite_ids(), &[BoardId::new("a"), BoardId::new("b")]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn favorites_follow_flag_and_title() {
        let mut store = sample_store();
        fav(&mut store, "b3", true);
        fav(&mut store, "b1", true);
        store
            .apply(StoreChange::SetText {
                key: FieldKey::board(&BoardId::new("b3"), Field::BoardTitle),
                value: "Groceries".into(),
            })
            .unwrap();
        let favorites = store.favorites();
        assert_eq!(
            favorites[0],
            FavoriteEntry {
                id: BoardId::new("b3"),
                title: "Groceries".into(),
                icon: "📝".into(),
            }
        );
        assert_eq!(favorites[1].id, BoardId::new("b1"));

        fav(&mut store, "b3", false);
        assert_eq!(store.favorite_ids(), &[BoardId::new("b1")]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn deleting_a_favorite_removes_it_from_favorites() {
        let mut store = sample_store();
        fav(&mut store, "b2", true);
        store
            .apply(StoreChange::RemoveBoard(BoardId::new("b2")))
            .unwrap();
        assert!(store.favorites().is_empty());
        store.check_invariants().unwrap();
    }

    #[test]
    fn deleting_active_board_selects_the_next_one() {
        let mut store = sample_store();
        select(&mut store, "b1");
        let applied = store
            .apply(StoreChange::RemoveBoard(BoardId::new("b1")))
            .unwrap();
        assert!(applied.active_changed);
        assert_eq!(store.active_board_id(), Some(&BoardId::new("b2")));
        assert!(applied.removed.contains(&EntityRef::Task(TaskId::new("t3"))));
    }

    #[test]
    fn deleting_last_board_of_folder_selects_previous_sibling() {
        let mut store = sample_store();
        select(&mut store, "b2");
        store
            .apply(StoreChange::RemoveBoard(BoardId::new("b2")))
            .unwrap();
        assert_eq!(store.active_board_id(), Some(&BoardId::new("b1")));
    }

    #[test]
    fn deleting_only_board_falls_back_to_first_board_anywhere() {
        let mut store = sample_store();
        select(&mut store, "b4");
        store
            .apply(StoreChange::RemoveBoard(BoardId::new("b4")))
            .unwrap();
        assert_eq!(store.active_board_id(), Some(&BoardId::new("b1")));
    }

    #[test]
    fn deleting_every_board_clears_selection() {
        let mut store = Store::new();
        store
            .apply(StoreChange::InsertBoard {
                board: board("solo", None),
                folder: None,
                index: 0,
            })
            .unwrap();
        select(&mut store, "solo");
        store
            .apply(StoreChange::RemoveBoard(BoardId::new("solo")))
            .unwrap();
        assert_eq!(store.active_board_id(), None);
    }

    #[test]
    fn folder_delete_cascades_to_boards_and_favorites() {
        let mut store = sample_store();
        fav(&mut store, "b1", true);
        fav(&mut store, "b4", true);
        select(&mut store, "b2");
        let applied = store
            .apply(StoreChange::RemoveFolder(FolderId::new("f1")))
            .unwrap();
        assert!(store.board(&BoardId::new("b1")).is_none());
        assert_eq!(store.favorite_ids(), &[BoardId::new("b4")]);
        assert_eq!(store.active_board_id(), Some(&BoardId::new("b3")));
        assert!(applied.removed.contains(&EntityRef::Board(BoardId::new("b2"))));
        store.check_invariants().unwrap();
    }

    #[test]
    fn archiving_keeps_positions() {
        let mut store = sample_store();
        store
            .apply(StoreChange::SetArchived {
                entity: EntityRef::Task(TaskId::new("t1")),
                archived: true,
            })
            .unwrap();
        assert_eq!(task_ids(&store, "s1"), vec!["t1", "t2"]);
        assert_eq!(store.task(&TaskId::new("t1")).unwrap().position, 0);
        let visible: Vec<_> = store
            .visible_tasks(&SectionId::new("s1"))
            .iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(visible, vec!["t2"]);

        store
            .apply(StoreChange::SetArchiveVisibility(ArchiveVisibility::all()))
            .unwrap();
        assert_eq!(store.visible_tasks(&SectionId::new("s1")).len(), 2);
    }

    #[test]
    fn archived_section_keeps_its_slot() {
        let mut store = sample_store();
        let b1 = BoardId::new("b1");
        store
            .apply(StoreChange::SetArchived {
                entity: EntityRef::Section(SectionId::new("s1")),
                archived: true,
            })
            .unwrap();
        let section_ids = |store: &Store| -> Vec<String> {
            store
                .board(&b1)
                .unwrap()
                .sections()
                .iter()
                .map(|s| s.id.to_string())
                .collect()
        };
        assert_eq!(section_ids(&store), vec!["s1", "s2"]);
        assert_eq!(store.section(&SectionId::new("s1")).unwrap().position, 0);
        assert_eq!(store.section(&SectionId::new("s2")).unwrap().position, 1);
        let visible: Vec<_> = store
            .visible_sections(&b1)
            .iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(visible, vec!["s2"]);

        store
            .apply(StoreChange::SetArchiveVisibility(ArchiveVisibility::all()))
            .unwrap();
        assert_eq!(store.visible_sections(&b1).len(), 2);
        store.check_invariants().unwrap();
    }

    #[test]
    fn favorite_toggle_reindexes_nothing() {
        let mut store = sample_store();
        let applied = store
            .apply(StoreChange::SetFavorite {
                board: BoardId::new("b2"),
                favorite: true,
            })
            .unwrap();
        assert_eq!(applied, Applied::default());
        assert_eq!(store.favorite_ids(), &[BoardId::new("b2")]);
    }

    #[test]
    fn task_delete_renumbers_siblings() {
        let mut store = sample_store();
        store
            .apply(StoreChange::InsertTask {
                section: SectionId::new("s1"),
                task: task("t0"),
                index: 0,
            })
            .unwrap();
        store
            .apply(StoreChange::RemoveTask(TaskId::new("t1")))
            .unwrap();
        assert_eq!(task_ids(&store, "s1"), vec!["t0", "t2"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn insert_rejects_index_past_end() {
        let mut store = sample_store();
        let err = store
            .apply(StoreChange::InsertTask {
                section: SectionId::new("s2"),
                task: task("t9"),
                index: 3,
            })
            .unwrap_err();
        assert_eq!(err, StoreError::InvalidIndex { index: 3, len: 1 });
    }

    #[test]
    fn insert_section_requires_loaded_board() {
        let mut store = sample_store();
        let err = store
            .apply(StoreChange::InsertSection {
                board: BoardId::new("b2"),
                section: section("s9", &[]),
                index: 0,
            })
            .unwrap_err();
        assert_eq!(err, StoreError::NotLoaded(BoardId::new("b2")));
    }

    #[test]
    fn mismatched_field_key_is_rejected() {
        let mut store = sample_store();
        let err = store
            .apply(StoreChange::SetText {
                key: FieldKey::new(EntityRef::Task(TaskId::new("t1")), Field::BoardTitle),
                value: "x".into(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::FieldMismatch { .. }));
    }

    #[test]
    fn confirm_board_swaps_id_in_place() {
        let mut store = sample_store();
        let placeholder = BoardId::new("pending-1");
        let mut local = board("pending-1", Some("f2"));
        local.sections = Some(Vec::new());
        store
            .apply(StoreChange::InsertBoard {
                board: local,
                folder: Some(FolderId::new("f2")),
                index: 0,
            })
            .unwrap();
        fav(&mut store, "pending-1", true);
        select(&mut store, "pending-1");
        store
            .apply(StoreChange::SetText {
                key: FieldKey::board(&placeholder, Field::BoardTitle),
                value: "Roadmap".into(),
            })
            .unwrap();

        store
            .apply(StoreChange::Confirm(Confirmation::Board {
                placeholder: placeholder.clone(),
                server: board("srv-9", Some("f2")),
            }))
            .unwrap();

        let real = BoardId::new("srv-9");
        assert_eq!(board_ids(&store, Some("f2")), vec!["srv-9", "b3"]);
        assert_eq!(store.board(&real).unwrap().title, "Roadmap");
        assert_eq!(store.favorite_ids(), &[real.clone()]);
        assert_eq!(store.active_board_id(), Some(&real));
        assert_eq!(store.resolve(&EntityRef::Board(placeholder.clone())), EntityRef::Board(real));
        let key = FieldKey::board(&placeholder, Field::BoardTitle);
        assert_eq!(store.field_value(&key).as_deref(), Some("Roadmap"));
        store.check_invariants().unwrap();
    }

    #[test]
    fn confirm_folder_renames_default_board() {
        let mut store = sample_store();
        let folder = Folder::new(FolderId::new("pending-1"))
            .with_boards(vec![board("pending-2", Some("pending-1"))]);
        store
            .apply(StoreChange::InsertFolder { folder, index: 2 })
            .unwrap();
        let server = Folder::new(FolderId::new("f9"))
            .with_boards(vec![board("b9", Some("f9"))]);
        store
            .apply(StoreChange::Confirm(Confirmation::Folder {
                placeholder: FolderId::new("pending-1"),
                server,
            }))
            .unwrap();
        assert_eq!(board_ids(&store, Some("f9")), vec!["b9"]);
        assert_eq!(
            store.board(&BoardId::new("b9")).unwrap().folder_id,
            Some(FolderId::new("f9"))
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn load_state_transitions() {
        let mut store = sample_store();
        let id = BoardId::new("b2");
        store.apply(StoreChange::MarkLoading(id.clone())).unwrap();
        assert_eq!(store.load_state(&id), LoadState::Loading);
        let mut unsorted = vec![section("x", &["t7", "t8"]), section("y", &[])];
        unsorted[0].position = 4;
        unsorted[1].position = 1;
        store
            .apply(StoreChange::LoadSections {
                board: id.clone(),
                sections: unsorted,
            })
            .unwrap();
        assert_eq!(store.load_state(&id), LoadState::Loaded);
        let titles: Vec<_> = store.visible_sections(&id).iter().map(|s| s.id.to_string()).collect();
        assert_eq!(titles, vec!["y", "x"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn selecting_unknown_board_fails() {
        let mut store = sample_store();
        assert!(
            store
                .apply(StoreChange::SelectBoard(Some(BoardId::new("zzz"))))
                .is_err()
        );
        assert_eq!(store.active_board_id(), None);
    }
}
