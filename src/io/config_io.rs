use std::path::Path;

use super::workspace::{CONFIG_FILE, WorkspaceError, atomic_write, read_file};
use crate::model::SyncConfig;

/// Read stackboard.toml from the data directory. A missing file means defaults.
pub fn read_config(dir: &Path) -> Result<SyncConfig, WorkspaceError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    let text = read_file(&path)?;
    Ok(toml::from_str(&text)?)
}

/// Write the config file, replacing any existing one
pub fn write_config(dir: &Path, config: &SyncConfig) -> Result<(), WorkspaceError> {
    let text = toml::to_string_pretty(config)?;
    atomic_write(&dir.join(CONFIG_FILE), text.as_bytes())?;
    Ok(())
}
