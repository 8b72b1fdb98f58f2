use serde::{Deserialize, Serialize};

use super::ids::EntityKind;

/// Per-kind "include archived" toggles. Archived entities keep their slot in
/// the ordered lists; these only decide what the default views show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchiveVisibility {
    #[serde(default)]
    pub folders: bool,
    #[serde(default)]
    pub boards: bool,
    #[serde(default)]
    pub sections: bool,
    #[serde(default)]
    pub tasks: bool,
}

impl ArchiveVisibility {
    /// Show archived entities of every kind
    pub fn all() -> Self {
        ArchiveVisibility {
            folders: true,
            boards: true,
            sections: true,
            tasks: true,
        }
    }

    pub fn includes(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Folder => self.folders,
            EntityKind::Board => self.boards,
            EntityKind::Section => self.sections,
            EntityKind::Task => self.tasks,
        }
    }

    /// Whether an entity of `kind` with the given archived flag is shown
    pub fn shows(&self, kind: EntityKind, archived: bool) -> bool {
        !archived || self.includes(kind)
    }
}
