use std::error::Error;
use std::path::Path;

use crate::io::workspace;

/// Create `stackboard/` under `root` with a default config and an empty server.
pub fn cmd_init(root: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let dir = workspace::init_workspace(root)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "initialized": dir.display().to_string() })
        );
    } else {
        println!("initialized {}", dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::workspace::{CONFIG_FILE, WORKSPACE_DIR};
    use tempfile::TempDir;

    #[test]
    fn init_creates_config() {
        let tmp = TempDir::new().unwrap();
        cmd_init(tmp.path(), false).unwrap();
        assert!(tmp.path().join(WORKSPACE_DIR).join(CONFIG_FILE).exists());
    }

    #[test]
    fn init_twice_fails() {
        let tmp = TempDir::new().unwrap();
        cmd_init(tmp.path(), false).unwrap();
        let err = cmd_init(tmp.path(), false).unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }
}
