mod init;
mod moves;

pub use init::cmd_init;

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::snapshot::SnapshotRemote;
use crate::io::state::LocalStateFile;
use crate::io::workspace::{self, WorkspaceError};
use crate::model::{
    ArchiveVisibility, BoardId, EntityRef, Field, FieldKey, FolderId, SectionId, TaskId, UserId,
};
use crate::sync::{Mutation, MutationKind, MutationStatus, Session};

type CmdResult = Result<(), Box<dyn Error>>;

/// The single user of a local workspace
const LOCAL_USER: &str = "local";

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> CmdResult {
    let start = start_dir(cli.workspace_dir.as_deref())?;
    if let Commands::Init = cli.command {
        return cmd_init(&start, cli.json);
    }

    let ctx = Context::open(&start, cli.json, cli.yes).await?;
    let result = match cli.command {
        Commands::Init => Ok(()),
        Commands::Tree(args) => cmd_tree(&ctx, args),
        Commands::Show(args) => cmd_show(&ctx, args).await,
        Commands::Folder(cmd) => cmd_folder(&ctx, cmd.action).await,
        Commands::Board(cmd) => cmd_board(&ctx, cmd.action).await,
        Commands::Section(cmd) => cmd_section(&ctx, cmd.action).await,
        Commands::Task(cmd) => cmd_task(&ctx, cmd.action).await,
        Commands::Fav(cmd) => cmd_fav(&ctx, cmd.action).await,
        Commands::Theme(args) => cmd_theme(&ctx, args),
    };
    // Local changes are already committed; flush and save even when the command failed.
    ctx.finish().await?;
    result
}

fn start_dir(override_dir: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    match override_dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub(crate) struct Context {
    server: SnapshotRemote,
    pub(crate) session: Session,
    json: bool,
    yes: bool,
}

impl Context {
    async fn open(start: &Path, json: bool, yes: bool) -> Result<Self, Box<dyn Error>> {
        let root = workspace::discover_workspace(start)?;
        let dir = workspace::data_dir(&root);
        let config = config_io::read_config(&dir)?;
        let server = SnapshotRemote::open(&dir, config.remote.strict_positions)?;
        debug!(workspace = %root.display(), "opening session");
        let session = Session::new(server.remote(), UserId::new(LOCAL_USER), config)
            .with_local_state(LocalStateFile::in_dir(&dir));
        session.load().await?;
        Ok(Context {
            server,
            session,
            json,
            yes,
        })
    }

    async fn finish(&self) -> Result<(), WorkspaceError> {
        self.session.shutdown().await;
        self.server.save()
    }

    fn confirm(&self, question: &str) -> bool {
        if self.yes {
            return true;
        }
        eprint!("{} [y/N] ", question);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }

    fn active_board(&self) -> Result<BoardId, Box<dyn Error>> {
        self.session
            .read(|s| s.active_board_id().cloned())
            .ok_or_else(|| "no active board; create or select one first".into())
    }

    /// Print a mutation outcome; a failed mutation becomes the command's error
    fn report(&self, mutation: &Mutation, message: impl FnOnce(&str) -> String) -> CmdResult {
        if self.json {
            println!("{}", serde_json::to_string_pretty(mutation)?);
        }
        match &mutation.status {
            MutationStatus::Failed(error) => Err(error.clone().into()),
            MutationStatus::Declined => {
                if !self.json {
                    println!("cancelled");
                }
                Ok(())
            }
            MutationStatus::Applied | MutationStatus::Confirmed => {
                if !self.json {
                    let entity = mutation
                        .entity
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default();
                    println!("{}", message(&entity));
                }
                Ok(())
            }
        }
    }

    fn report_kind(&self, mutation: &Mutation) -> CmdResult {
        let verb = match mutation.kind {
            MutationKind::Create => "created",
            MutationKind::Delete => "deleted",
            MutationKind::Edit | MutationKind::SetIcon => "updated",
            MutationKind::Drag => "moved",
            MutationKind::ToggleFavorite => "toggled favorite",
            MutationKind::ToggleArchive => "toggled archive",
        };
        self.report(mutation, |entity| format!("{} {}", verb, entity).trim_end().to_string())
    }

    async fn archive(&self, entity: EntityRef) -> CmdResult {
        let mutation = self.session.toggle_archive(&entity).await?;
        let archived = self.session.read(|s| s.archived(&entity)).unwrap_or(false);
        self.report(&mutation, |e| {
            format!("{} {}", if archived { "archived" } else { "unarchived" }, e)
        })
    }

    /// Apply a text edit; the write is sent when the session shuts down
    fn edit(&self, key: FieldKey, value: String) -> CmdResult {
        let mutation = self.session.edit(key, value)?;
        self.report_kind(&mutation)
    }

    fn created_id(mutation: &Mutation) -> Option<String> {
        match &mutation.status {
            MutationStatus::Confirmed => mutation.entity.as_ref().map(|e| e.id_str().to_string()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn apply_visibility(ctx: &Context, archived: bool) {
    if archived {
        ctx.session.set_archive_visibility(ArchiveVisibility::all());
    }
}

fn cmd_tree(ctx: &Context, args: ViewArgs) -> CmdResult {
    apply_visibility(ctx, args.archived);
    if ctx.json {
        let tree = ctx.session.read(tree_json);
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{}", ctx.session.read(format_tree));
    }
    Ok(())
}

async fn cmd_show(ctx: &Context, args: ShowArgs) -> CmdResult {
    apply_visibility(ctx, args.archived);
    let id = match args.id {
        Some(id) => {
            let id = BoardId::new(id);
            ctx.session.select_board(&id).await?;
            id
        }
        None => ctx.active_board()?,
    };
    let rendered = ctx.session.read(|s| {
        s.board(&id).map(|board| {
            if ctx.json {
                serde_json::to_string_pretty(&board_json(s, board))
            } else {
                Ok(format_board(s, board))
            }
        })
    });
    match rendered {
        Some(text) => {
            println!("{}", text?);
            Ok(())
        }
        None => Err(format!("board {} not found", id).into()),
    }
}

// ---------------------------------------------------------------------------
// Folder commands
// ---------------------------------------------------------------------------

async fn cmd_folder(ctx: &Context, action: FolderAction) -> CmdResult {
    match action {
        FolderAction::New { name } => {
            let mutation = ctx.session.create_folder().await?;
            if let (Some(id), Some(name)) = (Context::created_id(&mutation), name) {
                ctx.session
                    .edit(FieldKey::folder_name(&FolderId::new(id)), name)?;
            }
            ctx.report_kind(&mutation)
        }
        FolderAction::Rename { id, name } => {
            ctx.edit(FieldKey::folder_name(&FolderId::new(id)), name)
        }
        FolderAction::Archive { id } => ctx.archive(EntityRef::Folder(FolderId::new(id))).await,
        FolderAction::Delete { id } => {
            let confirm = |q: &str| ctx.confirm(q);
            let mutation = ctx.session.delete_folder(&FolderId::new(id), &confirm).await?;
            ctx.report_kind(&mutation)
        }
        FolderAction::Mv { id, index } => moves::move_folder(ctx, FolderId::new(id), index).await,
    }
}

// ---------------------------------------------------------------------------
// Board commands
// ---------------------------------------------------------------------------

async fn cmd_board(ctx: &Context, action: BoardAction) -> CmdResult {
    match action {
        BoardAction::New { folder, title } => {
            let folder = folder.map(FolderId::new);
            let mutation = ctx.session.create_board(folder.as_ref()).await?;
            if let (Some(id), Some(title)) = (Context::created_id(&mutation), title) {
                ctx.session
                    .edit(FieldKey::board(&BoardId::new(id), Field::BoardTitle), title)?;
            }
            ctx.report_kind(&mutation)
        }
        BoardAction::Select { id } => {
            let id = BoardId::new(id);
            ctx.session.select_board(&id).await?;
            if !ctx.json {
                println!("selected board {}", id);
            }
            Ok(())
        }
        BoardAction::Title { id, title } => {
            ctx.edit(FieldKey::board(&BoardId::new(id), Field::BoardTitle), title)
        }
        BoardAction::Describe { id, description } => ctx.edit(
            FieldKey::board(&BoardId::new(id), Field::BoardDescription),
            description,
        ),
        BoardAction::Icon { id, icon } => {
            let mutation = ctx.session.set_icon(&BoardId::new(id), &icon).await?;
            ctx.report_kind(&mutation)
        }
        BoardAction::Fav { id } => {
            let id = BoardId::new(id);
            let mutation = ctx.session.toggle_favorite(&id).await?;
            let favorite = ctx
                .session
                .read(|s| s.board(&id).map(|b| b.favorite))
                .unwrap_or(false);
            ctx.report(&mutation, |e| {
                if favorite {
                    format!("added {} to favorites", e)
                } else {
                    format!("removed {} from favorites", e)
                }
            })
        }
        BoardAction::Archive { id } => ctx.archive(EntityRef::Board(BoardId::new(id))).await,
        BoardAction::Delete { id } => {
            let confirm = |q: &str| ctx.confirm(q);
            let mutation = ctx.session.delete_board(&BoardId::new(id), &confirm).await?;
            ctx.report_kind(&mutation)
        }
        BoardAction::Mv(args) => {
            let destination = if args.unfiled {
                Some(None)
            } else {
                args.folder.map(|f| Some(FolderId::new(f)))
            };
            moves::move_board(ctx, BoardId::new(args.id), args.index, destination).await
        }
    }
}

// ---------------------------------------------------------------------------
// Section commands
// ---------------------------------------------------------------------------

async fn cmd_section(ctx: &Context, action: SectionAction) -> CmdResult {
    match action {
        SectionAction::New { board, title } => {
            let board = match board {
                Some(id) => BoardId::new(id),
                None => ctx.active_board()?,
            };
            let mutation = ctx.session.create_section(&board).await?;
            if let (Some(id), Some(title)) = (Context::created_id(&mutation), title) {
                ctx.session
                    .edit(FieldKey::section_title(&SectionId::new(id)), title)?;
            }
            ctx.report_kind(&mutation)
        }
        SectionAction::Rename { id, title } => {
            ctx.edit(FieldKey::section_title(&SectionId::new(id)), title)
        }
        SectionAction::Archive { id } => {
            ctx.archive(EntityRef::Section(SectionId::new(id))).await
        }
        SectionAction::Delete { id } => {
            let confirm = |q: &str| ctx.confirm(q);
            let mutation = ctx
                .session
                .delete_section(&SectionId::new(id), &confirm)
                .await?;
            ctx.report_kind(&mutation)
        }
        SectionAction::Mv { id, index } => {
            moves::move_section(ctx, SectionId::new(id), index).await
        }
    }
}

// ---------------------------------------------------------------------------
// Task commands
// ---------------------------------------------------------------------------

async fn cmd_task(ctx: &Context, action: TaskAction) -> CmdResult {
    match action {
        TaskAction::New { section, title } => {
            let mutation = ctx.session.create_task(&SectionId::new(section)).await?;
            if let (Some(id), Some(title)) = (Context::created_id(&mutation), title) {
                ctx.session
                    .edit(FieldKey::task(&TaskId::new(id), Field::TaskTitle), title)?;
            }
            ctx.report_kind(&mutation)
        }
        TaskAction::Edit { id, title, content } => {
            if title.is_none() && content.is_none() {
                return Err("nothing to change: pass --title and/or --content".into());
            }
            let id = TaskId::new(id);
            let mut last = None;
            if let Some(title) = title {
                last = Some(ctx.session.edit(FieldKey::task(&id, Field::TaskTitle), title)?);
            }
            if let Some(content) = content {
                last = Some(
                    ctx.session
                        .edit(FieldKey::task(&id, Field::TaskContent), content)?,
                );
            }
            match last {
                Some(mutation) => ctx.report_kind(&mutation),
                None => Ok(()),
            }
        }
        TaskAction::Archive { id } => ctx.archive(EntityRef::Task(TaskId::new(id))).await,
        TaskAction::Delete { id } => {
            let confirm = |q: &str| ctx.confirm(q);
            let mutation = ctx.session.delete_task(&TaskId::new(id), &confirm).await?;
            ctx.report_kind(&mutation)
        }
        TaskAction::Mv { id, index, section } => {
            moves::move_task(ctx, TaskId::new(id), index, section.map(SectionId::new)).await
        }
    }
}

// ---------------------------------------------------------------------------
// Favorites and theme
// ---------------------------------------------------------------------------

async fn cmd_fav(ctx: &Context, action: FavAction) -> CmdResult {
    match action {
        FavAction::List => {
            let favorites = ctx.session.read(|s| s.favorites());
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&favorites)?);
            } else if favorites.is_empty() {
                println!("(no favorites)");
            } else {
                for (i, entry) in favorites.iter().enumerate() {
                    println!("{}. {} {} [{}]", i, entry.icon, entry.title, entry.id);
                }
            }
            Ok(())
        }
        FavAction::Mv { id, index } => moves::move_favorite(ctx, BoardId::new(id), index).await,
    }
}

fn cmd_theme(ctx: &Context, args: ThemeArgs) -> CmdResult {
    let dark = match args.theme.as_deref() {
        None => ctx.session.local_state().dark_theme,
        Some("dark") => {
            ctx.session.set_theme(true);
            true
        }
        Some("light") => {
            ctx.session.set_theme(false);
            false
        }
        Some(other) => return Err(format!("unknown theme '{}' (dark, light)", other).into()),
    };
    let name = if dark { "dark" } else { "light" };
    if ctx.json {
        println!("{}", serde_json::json!({ "theme": name }));
    } else {
        println!("{}", name);
    }
    Ok(())
}
