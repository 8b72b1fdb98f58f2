use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::workspace::{SERVER_FILE, WorkspaceError, atomic_write, read_file};
use crate::sync::memory::{InMemoryRemote, ServerData};

/// The bundled server, backed by `server.json` in the data directory.
///
/// Sessions talk to [`SnapshotRemote::remote`]; call [`SnapshotRemote::save`]
/// once they have flushed.
#[derive(Debug)]
pub struct SnapshotRemote {
    path: PathBuf,
    remote: Arc<InMemoryRemote>,
}

impl SnapshotRemote {
    /// Load server.json, or start empty when the file does not exist
    pub fn open(dir: &Path, strict_positions: bool) -> Result<Self, WorkspaceError> {
        let path = dir.join(SERVER_FILE);
        let data = if path.exists() {
            serde_json::from_str::<ServerData>(&read_file(&path)?)?
        } else {
            ServerData::default()
        };
        let remote = InMemoryRemote::from_data(data).with_strict_positions(strict_positions);
        Ok(SnapshotRemote {
            path,
            remote: Arc::new(remote),
        })
    }

    pub fn remote(&self) -> Arc<InMemoryRemote> {
        Arc::clone(&self.remote)
    }

    pub fn save(&self) -> Result<(), WorkspaceError> {
        let content = serde_json::to_string_pretty(&self.remote.snapshot())?;
        atomic_write(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), "server snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::sync::remote::RemoteBoundary;
    use tempfile::TempDir;

    #[tokio::test]
    async fn saved_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let user = UserId::new("local");
        let first = SnapshotRemote::open(dir.path(), false).unwrap();
        let folder = first.remote().create_folder(&user).await.unwrap();
        first.save().unwrap();

        let second = SnapshotRemote::open(dir.path(), false).unwrap();
        let all = second
            .remote()
            .get_all_boards_and_folders(&user)
            .await
            .unwrap();
        assert_eq!(all.folders.len(), 1);
        assert_eq!(all.folders[0].id, folder.id);

        // Ids keep counting after a reload.
        let board = second.remote().create_board(&user, None).await.unwrap();
        assert_ne!(board.id, folder.boards[0].id);
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SERVER_FILE), "{ nope").unwrap();
        assert!(matches!(
            SnapshotRemote::open(dir.path(), false),
            Err(WorkspaceError::SnapshotParseError(_))
        ));
    }
}
