use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::workspace::{STATE_FILE, WorkspaceError, atomic_write};
use crate::model::BoardId;

/// Client-local state that survives restarts (written to .stackboard-state.json)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    /// Board selected when the session ended
    #[serde(default)]
    pub active_board: Option<BoardId>,
    /// Display theme flag
    #[serde(default)]
    pub dark_theme: bool,
}

/// Location of the local state file
#[derive(Debug, Clone)]
pub struct LocalStateFile {
    path: PathBuf,
}

impl LocalStateFile {
    pub fn in_dir(dir: &Path) -> Self {
        LocalStateFile {
            path: dir.join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or malformed files read as `None`
    pub fn read(&self) -> Option<LocalState> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn write(&self, state: &LocalState) -> Result<(), WorkspaceError> {
        let content = serde_json::to_string_pretty(state)?;
        atomic_write(&self.path, content.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = LocalStateFile::in_dir(dir.path());
        let state = LocalState {
            active_board: Some(BoardId::new("b7")),
            dark_theme: true,
        };
        file.write(&state).unwrap();
        assert_eq!(file.read(), Some(state));
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(LocalStateFile::in_dir(dir.path()).read().is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(LocalStateFile::in_dir(dir.path()).read().is_none());
    }

    #[test]
    fn serde_defaults_on_empty_object() {
        let state: LocalState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, LocalState::default());
    }
}
