use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sb", about = concat!("stackboard v", env!("CARGO_PKG_VERSION"), " - folders, boards, sections, tasks"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new workspace in the current directory
    Init,
    /// Show favorites, folders and boards
    Tree(ViewArgs),
    /// Show a board's sections and tasks (selects it)
    Show(ShowArgs),
    /// Folder management
    Folder(FolderCmd),
    /// Board management
    Board(BoardCmd),
    /// Section management
    Section(SectionCmd),
    /// Task management
    Task(TaskCmd),
    /// Reorder favorites
    Fav(FavCmd),
    /// Show or set the color theme
    Theme(ThemeArgs),
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ViewArgs {
    /// Include archived entities
    #[arg(long)]
    pub archived: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Board to show (default: the active board)
    pub id: Option<String>,
    /// Include archived sections and tasks
    #[arg(long)]
    pub archived: bool,
}

// ---------------------------------------------------------------------------
// Folder commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct FolderCmd {
    #[command(subcommand)]
    pub action: FolderAction,
}

#[derive(Subcommand)]
pub enum FolderAction {
    /// Create a folder (with one default board) at the end of the list
    New {
        /// Folder name
        #[arg(long)]
        name: Option<String>,
    },
    /// Rename a folder
    Rename { id: String, name: String },
    /// Archive or unarchive a folder
    Archive { id: String },
    /// Delete a folder and everything in it
    Delete { id: String },
    /// Move a folder to a new index
    Mv { id: String, index: usize },
}

// ---------------------------------------------------------------------------
// Board commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct BoardCmd {
    #[command(subcommand)]
    pub action: BoardAction,
}

#[derive(Subcommand)]
pub enum BoardAction {
    /// Create a board and make it active
    New {
        /// Parent folder (default: unfiled)
        #[arg(long)]
        folder: Option<String>,
        /// Board title
        #[arg(long)]
        title: Option<String>,
    },
    /// Make a board active
    Select { id: String },
    /// Change a board's title
    Title { id: String, title: String },
    /// Change a board's description
    Describe { id: String, description: String },
    /// Change a board's icon
    Icon { id: String, icon: String },
    /// Add or remove a board from favorites
    Fav { id: String },
    /// Archive or unarchive a board
    Archive { id: String },
    /// Delete a board
    Delete { id: String },
    /// Move a board within its list or into another folder
    Mv(BoardMvArgs),
}

#[derive(Args)]
pub struct BoardMvArgs {
    pub id: String,
    /// Destination index
    pub index: usize,
    /// Destination folder
    #[arg(long, conflicts_with = "unfiled")]
    pub folder: Option<String>,
    /// Move to the unfiled bucket
    #[arg(long)]
    pub unfiled: bool,
}

// ---------------------------------------------------------------------------
// Section commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SectionCmd {
    #[command(subcommand)]
    pub action: SectionAction,
}

#[derive(Subcommand)]
pub enum SectionAction {
    /// Add a section at the end of a board
    New {
        /// Board (default: the active board)
        #[arg(long)]
        board: Option<String>,
        /// Section title
        #[arg(long)]
        title: Option<String>,
    },
    /// Rename a section
    Rename { id: String, title: String },
    /// Archive or unarchive a section
    Archive { id: String },
    /// Delete a section and its tasks
    Delete { id: String },
    /// Move a section to a new index on its board
    Mv { id: String, index: usize },
}

// ---------------------------------------------------------------------------
// Task commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TaskCmd {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task at the top of a section
    New {
        section: String,
        /// Task title
        title: Option<String>,
    },
    /// Change a task's title and/or content
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Archive or unarchive a task
    Archive { id: String },
    /// Delete a task
    Delete { id: String },
    /// Move a task within its section or into another one
    Mv {
        id: String,
        /// Destination index
        index: usize,
        /// Destination section (default: the task's own section)
        #[arg(long)]
        section: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Favorites and theme
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct FavCmd {
    #[command(subcommand)]
    pub action: FavAction,
}

#[derive(Subcommand)]
pub enum FavAction {
    /// List favorites in order
    List,
    /// Move a favorite to a new index
    Mv { id: String, index: usize },
}

#[derive(Args)]
pub struct ThemeArgs {
    /// "dark" or "light"; omit to print the current theme
    pub theme: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sb", "board", "delete", "b1", "--yes", "--json"]).unwrap();
        assert!(cli.yes);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Board(BoardCmd {
                action: BoardAction::Delete { .. }
            })
        ));
    }

    #[test]
    fn board_mv_folder_conflicts_with_unfiled() {
        let result =
            Cli::try_parse_from(["sb", "board", "mv", "b1", "0", "--folder", "f1", "--unfiled"]);
        assert!(result.is_err());
    }
}
