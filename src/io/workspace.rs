use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Name of the data directory inside a workspace root
pub const WORKSPACE_DIR: &str = "stackboard";
pub const CONFIG_FILE: &str = "stackboard.toml";
pub const SERVER_FILE: &str = "server.json";
pub const STATE_FILE: &str = ".stackboard-state.json";

/// Error type for workspace I/O operations
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not a stackboard workspace: no stackboard/ directory found")]
    NotAWorkspace,
    #[error("workspace already initialized at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not parse stackboard.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not serialize stackboard.toml: {0}")]
    ConfigSerializeError(#[from] toml::ser::Error),
    #[error("could not parse server.json: {0}")]
    SnapshotParseError(#[from] serde_json::Error),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

/// Discover the workspace by walking up from `start`, looking for a
/// `stackboard/` directory with a config file in it.
pub fn discover_workspace(start: &Path) -> Result<PathBuf, WorkspaceError> {
    let mut current = start.to_path_buf();
    loop {
        let dir = current.join(WORKSPACE_DIR);
        if dir.is_dir() && dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(WorkspaceError::NotAWorkspace);
        }
    }
}

/// Data directory of a workspace root
pub fn data_dir(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR)
}

/// Create `stackboard/` with a default config under `root`
pub fn init_workspace(root: &Path) -> Result<PathBuf, WorkspaceError> {
    let dir = data_dir(root);
    if dir.join(CONFIG_FILE).exists() {
        return Err(WorkspaceError::AlreadyInitialized(dir));
    }
    fs::create_dir_all(&dir)?;
    super::config_io::write_config(&dir, &Default::default())?;
    Ok(dir)
}

/// Write a file via temp file + rename so readers never see a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a file, mapping failures to a `ReadError` naming the path
pub(crate) fn read_file(path: &Path) -> Result<String, WorkspaceError> {
    fs::read_to_string(path).map_err(|e| WorkspaceError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}
