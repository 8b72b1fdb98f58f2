//! Optimistic mutations against the store and the remote boundary.
//!
//! Every mutation commits to the store first, then calls the server and
//! reconciles. The store lock is never held across an `.await`, so the
//! session keeps accepting mutations while calls are in flight. Remote
//! failures are logged and reported in the returned [`Mutation`]; only local
//! store errors come back as `Err`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::debounce::Debouncer;
use super::lock;
use super::remote::{BoardUpdate, RemoteBoundary, RemoteError};
use crate::io::state::{LocalState, LocalStateFile};
use crate::model::{
    ArchiveVisibility, Board, BoardId, EntityRef, Field, FieldKey, Folder, FolderId,
    PLACEHOLDER_PREFIX, Section, SectionId, SyncConfig, Task, TaskId, UserId,
};
use crate::ops::reindex::position_batch;
use crate::store::{Confirmation, DropResult, LoadState, ReorderPlan, Store, StoreChange, StoreError};

/// Asks the user to approve a destructive operation
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    ToggleFavorite,
    ToggleArchive,
    Delete,
    Edit,
    SetIcon,
    Drag,
}

/// Where a mutation ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum MutationStatus {
    /// Committed locally; no remote answer is awaited (debounced or no-op)
    Applied,
    /// The server accepted it
    Confirmed,
    /// The server rejected it; any rollback has already happened
    Failed(String),
    /// The user declined the confirmation prompt
    Declined,
}

/// Outcome of one mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mutation {
    pub kind: MutationKind,
    /// The entity acted on; for confirmed creates, its server id
    pub entity: Option<EntityRef>,
    #[serde(flatten)]
    pub status: MutationStatus,
}

impl Mutation {
    fn new(kind: MutationKind, entity: Option<EntityRef>, status: MutationStatus) -> Self {
        Mutation {
            kind,
            entity,
            status,
        }
    }

    fn from_remote(kind: MutationKind, entity: EntityRef, result: Result<(), RemoteError>) -> Self {
        let status = match result {
            Ok(()) => MutationStatus::Confirmed,
            Err(e) => MutationStatus::Failed(e.to_string()),
        };
        Mutation::new(kind, Some(entity), status)
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == MutationStatus::Confirmed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, MutationStatus::Failed(_))
    }
}

/// Errors from the suspending operations (load and board selection)
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),
}

/// The remote write a debounced field edit turns into
enum FieldWrite {
    Folder { id: FolderId, name: String },
    Board(BoardUpdate),
    Section { id: SectionId, title: String },
    Task { id: TaskId, title: String, content: String },
}

impl FieldWrite {
    /// Read the current values for `key`. `None` if the entity is gone or
    /// still waiting for its server id.
    fn prepare(store: &Store, key: &FieldKey) -> Option<Self> {
        let entity = store.resolve(&key.entity);
        if entity.id_str().starts_with(PLACEHOLDER_PREFIX) {
            debug!(key = %key, "entity not confirmed yet; write deferred");
            return None;
        }
        match entity {
            EntityRef::Folder(id) => store.folder(&id).map(|f| FieldWrite::Folder {
                name: f.name.clone(),
                id,
            }),
            EntityRef::Board(id) => store
                .board(&id)
                .map(|b| FieldWrite::Board(BoardUpdate::from_board(b))),
            EntityRef::Section(id) => store.section(&id).map(|s| FieldWrite::Section {
                title: s.title.clone(),
                id,
            }),
            EntityRef::Task(id) => store.task(&id).map(|t| FieldWrite::Task {
                title: t.title.clone(),
                content: t.content.clone(),
                id,
            }),
        }
    }

    async fn send(self, remote: &dyn RemoteBoundary) -> Result<(), RemoteError> {
        match self {
            FieldWrite::Folder { id, name } => remote.rename_folder(&id, &name).await.map(|_| ()),
            FieldWrite::Board(update) => remote.update_board(&update).await.map(|_| ()),
            FieldWrite::Section { id, title } => {
                remote.rename_section(&id, &title).await.map(|_| ())
            }
            FieldWrite::Task { id, title, content } => {
                remote.update_task(&id, &title, &content).await.map(|_| ())
            }
        }
    }
}

async fn write_field(store: Arc<Mutex<Store>>, remote: Arc<dyn RemoteBoundary>, key: FieldKey) {
    let write = {
        let store = lock(&store);
        FieldWrite::prepare(&store, &key)
    };
    let Some(write) = write else {
        debug!(key = %key, "dropping debounced write");
        return;
    };
    if let Err(e) = write.send(remote.as_ref()).await {
        warn!(key = %key, error = %e, "debounced write failed");
    }
}

/// One user's editing session over the shared store
pub struct Session {
    store: Arc<Mutex<Store>>,
    remote: Arc<dyn RemoteBoundary>,
    debouncer: Debouncer,
    config: SyncConfig,
    user: UserId,
    local_file: Option<LocalStateFile>,
    local: Mutex<LocalState>,
    next_placeholder: AtomicU64,
}

impl Session {
    pub fn new(remote: Arc<dyn RemoteBoundary>, user: UserId, config: SyncConfig) -> Self {
        Session {
            store: Arc::new(Mutex::new(Store::new())),
            remote,
            debouncer: Debouncer::new(),
            config,
            user,
            local_file: None,
            local: Mutex::new(LocalState::default()),
            next_placeholder: AtomicU64::new(1),
        }
    }

    /// Persist the active board and theme to `file`, starting from its contents
    pub fn with_local_state(mut self, file: LocalStateFile) -> Self {
        self.local = Mutex::new(file.read().unwrap_or_default());
        self.local_file = Some(file);
        self
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn local_state(&self) -> LocalState {
        lock(&self.local).clone()
    }

    /// Run `f` against the current store contents
    pub fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&self.store())
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        lock(&self.store)
    }

    fn commit(&self, change: StoreChange) -> Result<crate::store::Applied, StoreError> {
        self.store().apply(change)
    }

    fn placeholder(&self) -> String {
        let n = self.next_placeholder.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", PLACEHOLDER_PREFIX, n)
    }

    fn persist_local(&self) {
        let active = self.store().active_board_id().cloned();
        let state = {
            let mut local = lock(&self.local);
            // Placeholder ids mean nothing after a restart.
            if active.as_ref().is_none_or(|id| !id.is_placeholder()) {
                local.active_board = active;
            }
            local.clone()
        };
        if let Some(file) = &self.local_file
            && let Err(e) = file.write(&state)
        {
            warn!(path = %file.path().display(), error = %e, "could not save local state");
        }
    }

    // -----------------------------------------------------------------------
    // Loading and selection (the two suspending operations)
    // -----------------------------------------------------------------------

    /// Fetch the whole tree, restore the persisted selection and load it.
    pub async fn load(&self) -> Result<(), SessionError> {
        info!(user = %self.user, "loading folders and boards");
        let all = self.remote.get_all_boards_and_folders(&self.user).await?;
        let (folders, unfiled, favorites) = all.into_tree();
        let active = {
            let mut store = self.store();
            store.apply(StoreChange::Replace {
                folders,
                unfiled,
                favorites,
            })?;
            let remembered = lock(&self.local)
                .active_board
                .clone()
                .filter(|id| store.board(id).is_some());
            let active = remembered.or_else(|| store.boards().next().map(|b| b.id.clone()));
            store.apply(StoreChange::SelectBoard(active.clone()))?;
            active
        };
        self.persist_local();
        if let Some(id) = active {
            self.ensure_loaded(&id).await?;
        }
        Ok(())
    }

    /// Make `id` the active board, fetching its sections if needed
    pub async fn select_board(&self, id: &BoardId) -> Result<(), SessionError> {
        self.commit(StoreChange::SelectBoard(Some(id.clone())))?;
        info!(board = %id, "board selected");
        self.persist_local();
        self.ensure_loaded(id).await
    }

    async fn ensure_loaded(&self, id: &BoardId) -> Result<(), SessionError> {
        let id = match self.store().resolve(&EntityRef::Board(id.clone())) {
            EntityRef::Board(id) => id,
            _ => id.clone(),
        };
        {
            let mut store = self.store();
            if store.load_state(&id) != LoadState::NotLoaded {
                return Ok(());
            }
            store.apply(StoreChange::MarkLoading(id.clone()))?;
        }
        debug!(board = %id, "fetching sections");
        match self.remote.get_board(&id).await {
            Ok(board) => {
                let sections = board.sections.into_iter().map(Section::from).collect();
                self.commit(StoreChange::LoadSections {
                    board: id,
                    sections,
                })?;
                Ok(())
            }
            Err(e) => {
                warn!(board = %id, error = %e, "could not load board");
                self.commit(StoreChange::ClearLoading(id))?;
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// After a create is confirmed, send any text the user typed while the
    /// placeholder was pending and differs from what the server stored.
    fn reconcile_text(&self, placeholder: &EntityRef, real: &EntityRef, server: Vec<(Field, String)>) {
        self.debouncer.cancel_entity(placeholder);
        for (field, remote_value) in server {
            let key = FieldKey::new(real.clone(), field);
            let local = self.store().field_value(&key);
            if local.is_some_and(|v| v != remote_value) {
                self.schedule_write(key);
            }
        }
    }

    fn board_text(board: &Board) -> Vec<(Field, String)> {
        vec![
            (Field::BoardTitle, board.title.clone()),
            (Field::BoardDescription, board.description.clone()),
            (Field::BoardIcon, board.icon.clone()),
        ]
    }

    /// Apply a confirmation; false when the placeholder was removed meanwhile
    fn confirm_placeholder(&self, confirmation: Confirmation) -> bool {
        match self.commit(StoreChange::Confirm(confirmation)) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "placeholder gone before the server answered");
                false
            }
        }
    }

    fn drop_placeholder(&self, entity: EntityRef, change: StoreChange) {
        self.debouncer.cancel_entity(&entity);
        if let Err(e) = self.commit(change) {
            debug!(%entity, error = %e, "placeholder already gone");
        }
    }

    /// New folder at the end of the folder list, with one default board
    pub async fn create_folder(&self) -> Result<Mutation, StoreError> {
        let folder_id = FolderId::new(self.placeholder());
        let board_id = BoardId::new(self.placeholder());
        let mut board = Board::new(board_id, Some(folder_id.clone()), Utc::now());
        board.sections = Some(Vec::new());
        {
            let mut store = self.store();
            let index = store.folders().len();
            store.apply(StoreChange::InsertFolder {
                folder: Folder::new(folder_id.clone()).with_boards(vec![board]),
                index,
            })?;
        }

        let placeholder = EntityRef::Folder(folder_id.clone());
        match self.remote.create_folder(&self.user).await {
            Ok(wire) => {
                let server = Folder::from(wire);
                let real = EntityRef::Folder(server.id.clone());
                let name = server.name.clone();
                let local_boards: Vec<BoardId> = self
                    .store()
                    .folder(&folder_id)
                    .map(|f| f.boards.iter().map(|b| b.id.clone()).collect())
                    .unwrap_or_default();
                let server_boards = server.boards.clone();
                if !self.confirm_placeholder(Confirmation::Folder {
                    placeholder: folder_id,
                    server,
                }) {
                    return Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed));
                }
                self.reconcile_text(&placeholder, &real, vec![(Field::FolderName, name)]);
                for (local, remote) in local_boards.iter().zip(&server_boards) {
                    self.reconcile_text(
                        &EntityRef::Board(local.clone()),
                        &EntityRef::Board(remote.id.clone()),
                        Self::board_text(remote),
                    );
                }
                self.persist_local();
                Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed))
            }
            Err(e) => {
                warn!(error = %e, "create folder failed; removing placeholder");
                self.drop_placeholder(placeholder.clone(), StoreChange::RemoveFolder(folder_id));
                Ok(Mutation::new(
                    MutationKind::Create,
                    Some(placeholder),
                    MutationStatus::Failed(e.to_string()),
                ))
            }
        }
    }

    /// New board at the end of `folder` (or of the unfiled bucket). The new
    /// board becomes the active one.
    pub async fn create_board(&self, folder: Option<&FolderId>) -> Result<Mutation, StoreError> {
        let board_id = BoardId::new(self.placeholder());
        let mut board = Board::new(board_id.clone(), folder.cloned(), Utc::now());
        board.sections = Some(Vec::new());
        let folder = {
            let mut store = self.store();
            let folder = folder.map(|f| match store.resolve(&EntityRef::Folder(f.clone())) {
                EntityRef::Folder(id) => id,
                _ => f.clone(),
            });
            let index = store
                .board_list(folder.as_ref())
                .ok_or_else(|| match &folder {
                    Some(id) => StoreError::folder_not_found(id),
                    None => StoreError::Invariant("unfiled bucket missing".into()),
                })?
                .len();
            store.apply(StoreChange::InsertBoard {
                board,
                folder: folder.clone(),
                index,
            })?;
            store.apply(StoreChange::SelectBoard(Some(board_id.clone())))?;
            folder
        };

        let placeholder = EntityRef::Board(board_id.clone());
        match self.remote.create_board(&self.user, folder.as_ref()).await {
            Ok(wire) => {
                let server = Board::from(wire);
                let real = EntityRef::Board(server.id.clone());
                let text = Self::board_text(&server);
                if !self.confirm_placeholder(Confirmation::Board {
                    placeholder: board_id,
                    server,
                }) {
                    return Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed));
                }
                self.reconcile_text(&placeholder, &real, text);
                self.persist_local();
                Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed))
            }
            Err(e) => {
                warn!(error = %e, "create board failed; removing placeholder");
                self.drop_placeholder(placeholder.clone(), StoreChange::RemoveBoard(board_id));
                self.persist_local();
                Ok(Mutation::new(
                    MutationKind::Create,
                    Some(placeholder),
                    MutationStatus::Failed(e.to_string()),
                ))
            }
        }
    }

    /// New section at the end of a loaded board
    pub async fn create_section(&self, board: &BoardId) -> Result<Mutation, StoreError> {
        let section_id = SectionId::new(self.placeholder());
        let board = {
            let mut store = self.store();
            let board = match store.resolve(&EntityRef::Board(board.clone())) {
                EntityRef::Board(id) => id,
                _ => board.clone(),
            };
            let index = store
                .board(&board)
                .ok_or_else(|| StoreError::board_not_found(&board))?
                .sections()
                .len();
            store.apply(StoreChange::InsertSection {
                board: board.clone(),
                section: Section::new(section_id.clone()),
                index,
            })?;
            board
        };

        let placeholder = EntityRef::Section(section_id.clone());
        match self.remote.create_section(&board).await {
            Ok(wire) => {
                let server = Section::from(wire);
                let real = EntityRef::Section(server.id.clone());
                let title = server.title.clone();
                if !self.confirm_placeholder(Confirmation::Section {
                    placeholder: section_id,
                    server,
                }) {
                    return Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed));
                }
                self.reconcile_text(&placeholder, &real, vec![(Field::SectionTitle, title)]);
                Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed))
            }
            Err(e) => {
                warn!(error = %e, "create section failed; removing placeholder");
                self.drop_placeholder(placeholder.clone(), StoreChange::RemoveSection(section_id));
                Ok(Mutation::new(
                    MutationKind::Create,
                    Some(placeholder),
                    MutationStatus::Failed(e.to_string()),
                ))
            }
        }
    }

    /// New task at the top of `section`
    pub async fn create_task(&self, section: &SectionId) -> Result<Mutation, StoreError> {
        let task_id = TaskId::new(self.placeholder());
        let section = {
            let mut store = self.store();
            let section = match store.resolve(&EntityRef::Section(section.clone())) {
                EntityRef::Section(id) => id,
                _ => section.clone(),
            };
            store.apply(StoreChange::InsertTask {
                section: section.clone(),
                task: Task::new(task_id.clone(), Utc::now()),
                index: 0,
            })?;
            section
        };

        let placeholder = EntityRef::Task(task_id.clone());
        match self.remote.create_task(&section).await {
            Ok(wire) => {
                let server = Task::from(wire);
                let real = EntityRef::Task(server.id.clone());
                let text = vec![
                    (Field::TaskTitle, server.title.clone()),
                    (Field::TaskContent, server.content.clone()),
                ];
                if !self.confirm_placeholder(Confirmation::Task {
                    placeholder: task_id,
                    server,
                }) {
                    return Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed));
                }
                self.reconcile_text(&placeholder, &real, text);
                // The server appends new tasks; send the local top-first order.
                self.sync_task_order(&section).await;
                Ok(Mutation::new(MutationKind::Create, Some(real), MutationStatus::Confirmed))
            }
            Err(e) => {
                warn!(error = %e, "create task failed; removing placeholder");
                self.drop_placeholder(placeholder.clone(), StoreChange::RemoveTask(task_id));
                Ok(Mutation::new(
                    MutationKind::Create,
                    Some(placeholder),
                    MutationStatus::Failed(e.to_string()),
                ))
            }
        }
    }

    async fn sync_task_order(&self, section: &SectionId) {
        let batch = self
            .store()
            .section(section)
            .map(|s| position_batch(&s.tasks));
        let Some(batch) = batch else {
            return;
        };
        if batch.iter().any(|u| u.id.is_placeholder()) {
            debug!(section = %section, "section still has placeholders; order sync skipped");
            return;
        }
        if let Err(e) = self
            .remote
            .move_or_reorder_tasks(section, section, &[], &batch)
            .await
        {
            warn!(section = %section, error = %e, "task order sync failed");
        }
    }

    // -----------------------------------------------------------------------
    // Toggles (rolled back on failure)
    // -----------------------------------------------------------------------

    pub async fn toggle_favorite(&self, board: &BoardId) -> Result<Mutation, StoreError> {
        let (id, favorite, update) = {
            let mut store = self.store();
            let id = match store.resolve(&EntityRef::Board(board.clone())) {
                EntityRef::Board(id) => id,
                _ => board.clone(),
            };
            let favorite = !store
                .board(&id)
                .ok_or_else(|| StoreError::board_not_found(&id))?
                .favorite;
            store.apply(StoreChange::SetFavorite {
                board: id.clone(),
                favorite,
            })?;
            let update = store.board(&id).map(BoardUpdate::from_board);
            (id, favorite, update)
        };
        let update = update.ok_or_else(|| StoreError::board_not_found(&id))?;

        let result = self.remote.update_board(&update).await.map(|_| ());
        if let Err(e) = &result {
            warn!(board = %id, error = %e, "favorite toggle failed; rolling back");
            let mut store = self.store();
            if store.board(&id).is_some_and(|b| b.favorite == favorite) {
                store.apply(StoreChange::SetFavorite {
                    board: id.clone(),
                    favorite: !favorite,
                })?;
            }
        }
        Ok(Mutation::from_remote(
            MutationKind::ToggleFavorite,
            EntityRef::Board(id),
            result,
        ))
    }

    pub async fn toggle_archive(&self, entity: &EntityRef) -> Result<Mutation, StoreError> {
        let (entity, previous) = {
            let mut store = self.store();
            let entity = store.resolve(entity);
            let previous = store
                .archived(&entity)
                .ok_or_else(|| StoreError::not_found(&entity))?;
            store.apply(StoreChange::SetArchived {
                entity: entity.clone(),
                archived: !previous,
            })?;
            (entity, previous)
        };

        let result = match &entity {
            EntityRef::Folder(id) => self.remote.archive_folder(id, previous).await,
            EntityRef::Board(id) => self.remote.archive_board(id, previous).await,
            EntityRef::Section(id) => self.remote.archive_section(id, previous).await,
            EntityRef::Task(id) => self.remote.toggle_task_archived(id, previous).await,
        };
        if let Err(e) = &result {
            warn!(%entity, error = %e, "archive toggle failed; rolling back");
            let mut store = self.store();
            if store.archived(&entity) == Some(!previous) {
                store.apply(StoreChange::SetArchived {
                    entity: entity.clone(),
                    archived: previous,
                })?;
            }
        }
        Ok(Mutation::from_remote(MutationKind::ToggleArchive, entity, result))
    }

    // -----------------------------------------------------------------------
    // Deletion (confirmed first, never rolled back)
    // -----------------------------------------------------------------------

    pub async fn delete_folder(
        &self,
        id: &FolderId,
        confirm: &dyn Confirm,
    ) -> Result<Mutation, StoreError> {
        self.delete(EntityRef::Folder(id.clone()), confirm).await
    }

    pub async fn delete_board(
        &self,
        id: &BoardId,
        confirm: &dyn Confirm,
    ) -> Result<Mutation, StoreError> {
        self.delete(EntityRef::Board(id.clone()), confirm).await
    }

    pub async fn delete_section(
        &self,
        id: &SectionId,
        confirm: &dyn Confirm,
    ) -> Result<Mutation, StoreError> {
        self.delete(EntityRef::Section(id.clone()), confirm).await
    }

    pub async fn delete_task(
        &self,
        id: &TaskId,
        confirm: &dyn Confirm,
    ) -> Result<Mutation, StoreError> {
        self.delete(EntityRef::Task(id.clone()), confirm).await
    }

    async fn delete(&self, entity: EntityRef, confirm: &dyn Confirm) -> Result<Mutation, StoreError> {
        let (entity, label) = {
            let store = self.store();
            let entity = store.resolve(&entity);
            let label = match &entity {
                EntityRef::Folder(id) => store.folder(id).map(|f| f.name.clone()),
                EntityRef::Board(id) => store.board(id).map(|b| b.title.clone()),
                EntityRef::Section(id) => store.section(id).map(|s| s.title.clone()),
                EntityRef::Task(id) => store.task(id).map(|t| t.title.clone()),
            }
            .ok_or_else(|| StoreError::not_found(&entity))?;
            (entity, label)
        };
        if !confirm.confirm(&format!("Delete {} \"{}\"?", entity.kind(), label)) {
            return Ok(Mutation::new(
                MutationKind::Delete,
                Some(entity),
                MutationStatus::Declined,
            ));
        }

        let (applied, board_folder) = {
            let mut store = self.store();
            let board_folder = match &entity {
                EntityRef::Board(id) => store.board(id).and_then(|b| b.folder_id.clone()),
                _ => None,
            };
            let change = match &entity {
                EntityRef::Folder(id) => StoreChange::RemoveFolder(id.clone()),
                EntityRef::Board(id) => StoreChange::RemoveBoard(id.clone()),
                EntityRef::Section(id) => StoreChange::RemoveSection(id.clone()),
                EntityRef::Task(id) => StoreChange::RemoveTask(id.clone()),
            };
            (store.apply(change)?, board_folder)
        };

        // Pending edits may be keyed by a placeholder id that now resolves to a removed entity.
        let cancelled = {
            let store = self.store();
            self.debouncer
                .cancel_where(|key| applied.removed.contains(&store.resolve(&key.entity)))
        };
        if cancelled > 0 {
            debug!(%entity, cancelled, "pending edits of deleted entities dropped");
        }

        if applied.active_changed {
            self.persist_local();
            let active = self.store().active_board_id().cloned();
            if let Some(active) = active
                && let Err(e) = self.ensure_loaded(&active).await
            {
                warn!(board = %active, error = %e, "could not load replacement board");
            }
        }

        let result = match &entity {
            EntityRef::Folder(id) => self.remote.delete_folder(&self.user, id).await.map(|_| ()),
            EntityRef::Board(id) => self
                .remote
                .delete_board(id, &self.user, board_folder.as_ref())
                .await
                .map(|_| ()),
            EntityRef::Section(id) => self.remote.delete_section(id).await.map(|_| ()),
            EntityRef::Task(id) => self.remote.delete_task(id).await.map(|_| ()),
        };
        if let Err(e) = &result {
            warn!(%entity, error = %e, "remote delete failed; local state kept");
        }
        Ok(Mutation::from_remote(MutationKind::Delete, entity, result))
    }

    // -----------------------------------------------------------------------
    // Text edits
    // -----------------------------------------------------------------------

    fn schedule_write(&self, key: FieldKey) {
        let quiet = self.config.debounce.quiet_period(key.field);
        let store = Arc::clone(&self.store);
        let remote = Arc::clone(&self.remote);
        let write_key = key.clone();
        self.debouncer
            .schedule(key, quiet, move || write_field(store, remote, write_key));
    }

    /// Update a text field now; the remote write follows after the field's
    /// quiet period. Must be called inside a tokio runtime.
    pub fn edit(&self, key: FieldKey, value: impl Into<String>) -> Result<Mutation, StoreError> {
        self.commit(StoreChange::SetText {
            key: key.clone(),
            value: value.into(),
        })?;
        let entity = key.entity.clone();
        self.schedule_write(key);
        Ok(Mutation::new(
            MutationKind::Edit,
            Some(entity),
            MutationStatus::Applied,
        ))
    }

    /// Set a board icon and write it right away
    pub async fn set_icon(&self, board: &BoardId, icon: &str) -> Result<Mutation, StoreError> {
        let key = FieldKey::board(board, Field::BoardIcon);
        let write = {
            let mut store = self.store();
            store.apply(StoreChange::SetText {
                key: key.clone(),
                value: icon.to_string(),
            })?;
            FieldWrite::prepare(&store, &key)
        };
        self.debouncer.cancel(&key);
        let entity = self.store().resolve(&key.entity);
        let Some(write) = write else {
            return Ok(Mutation::new(
                MutationKind::SetIcon,
                Some(entity),
                MutationStatus::Applied,
            ));
        };
        let result = write.send(self.remote.as_ref()).await;
        if let Err(e) = &result {
            warn!(board = %board, error = %e, "icon write failed");
        }
        Ok(Mutation::from_remote(MutationKind::SetIcon, entity, result))
    }

    // -----------------------------------------------------------------------
    // Drag and drop (not rolled back)
    // -----------------------------------------------------------------------

    pub async fn drag(&self, drop: DropResult) -> Result<Mutation, StoreError> {
        let plan = self
            .commit(StoreChange::Drop(drop))?
            .plan
            .unwrap_or(ReorderPlan::NoOp);
        let remote = self.remote.as_ref();
        let (entity, result) = match &plan {
            ReorderPlan::NoOp => {
                return Ok(Mutation::new(MutationKind::Drag, None, MutationStatus::Applied));
            }
            ReorderPlan::Folders(updates) => (None, remote.reorder_folders(updates).await),
            ReorderPlan::Favorites(updates) => (None, remote.reorder_favorites(updates).await),
            ReorderPlan::Boards {
                board,
                source_folder,
                destination_folder,
                source,
                destination,
            } => {
                let result = if plan.is_transfer() {
                    remote
                        .move_or_reorder_boards(
                            source_folder.as_ref(),
                            destination_folder.as_ref(),
                            source,
                            destination,
                        )
                        .await
                } else {
                    remote.reorder_boards(destination).await
                };
                (Some(EntityRef::Board(board.clone())), result)
            }
            ReorderPlan::Sections { updates, .. } => {
                (None, remote.reorder_sections(updates).await)
            }
            ReorderPlan::Tasks {
                task,
                source_section,
                destination_section,
                source,
                destination,
            } => (
                Some(EntityRef::Task(task.clone())),
                remote
                    .move_or_reorder_tasks(source_section, destination_section, source, destination)
                    .await,
            ),
        };
        let status = match result {
            Ok(()) => MutationStatus::Confirmed,
            Err(e) => {
                warn!(error = %e, "reorder failed; local order kept");
                MutationStatus::Failed(e.to_string())
            }
        };
        Ok(Mutation::new(MutationKind::Drag, entity, status))
    }

    // -----------------------------------------------------------------------
    // Local-only settings
    // -----------------------------------------------------------------------

    pub fn set_archive_visibility(&self, visibility: ArchiveVisibility) {
        if let Err(e) = self.store().apply(StoreChange::SetArchiveVisibility(visibility)) {
            warn!(error = %e, "archive visibility not applied");
        }
    }

    pub fn set_theme(&self, dark: bool) {
        lock(&self.local).dark_theme = dark;
        self.persist_local();
    }

    /// Send every pending debounced write and wait for running ones
    pub async fn shutdown(&self) {
        let pending = self.debouncer.pending().len();
        if pending > 0 {
            debug!(pending, "flushing debounced writes");
        }
        self.debouncer.flush().await;
    }
}
