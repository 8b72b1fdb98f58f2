use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True for ids minted on the client before the server answered
            pub fn is_placeholder(&self) -> bool {
                self.0.starts_with(PLACEHOLDER_PREFIX)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

/// Prefix of client-generated placeholder ids
pub const PLACEHOLDER_PREFIX: &str = "pending-";

string_id!(
    /// Identifies a folder
    FolderId
);
string_id!(
    /// Identifies a board
    BoardId
);
string_id!(
    /// Identifies a section within a board
    SectionId
);
string_id!(
    /// Identifies a task within a section
    TaskId
);
string_id!(
    /// Owner of folders and boards
    UserId
);

/// The kind of entity an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Folder,
    Board,
    Section,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Folder => write!(f, "folder"),
            EntityKind::Board => write!(f, "board"),
            EntityKind::Section => write!(f, "section"),
            EntityKind::Task => write!(f, "task"),
        }
    }
}

/// A typed reference to any entity in the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Folder(FolderId),
    Board(BoardId),
    Section(SectionId),
    Task(TaskId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Folder(_) => EntityKind::Folder,
            EntityRef::Board(_) => EntityKind::Board,
            EntityRef::Section(_) => EntityKind::Section,
            EntityRef::Task(_) => EntityKind::Task,
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            EntityRef::Folder(id) => id.as_str(),
            EntityRef::Board(id) => id.as_str(),
            EntityRef::Section(id) => id.as_str(),
            EntityRef::Task(id) => id.as_str(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id_str())
    }
}

/// A free-text field that is edited with debounced writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FolderName,
    BoardTitle,
    BoardDescription,
    BoardIcon,
    SectionTitle,
    TaskTitle,
    TaskContent,
}

impl Field {
    /// The entity kind this field belongs to
    pub fn owner_kind(self) -> EntityKind {
        match self {
            Field::FolderName => EntityKind::Folder,
            Field::BoardTitle | Field::BoardDescription | Field::BoardIcon => EntityKind::Board,
            Field::SectionTitle => EntityKind::Section,
            Field::TaskTitle | Field::TaskContent => EntityKind::Task,
        }
    }
}

/// One debounce slot: a field of a specific entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub entity: EntityRef,
    pub field: Field,
}

impl FieldKey {
    pub fn new(entity: EntityRef, field: Field) -> Self {
        FieldKey { entity, field }
    }

    pub fn folder_name(id: &FolderId) -> Self {
        FieldKey::new(EntityRef::Folder(id.clone()), Field::FolderName)
    }

    pub fn board(id: &BoardId, field: Field) -> Self {
        FieldKey::new(EntityRef::Board(id.clone()), field)
    }

    pub fn section_title(id: &SectionId) -> Self {
        FieldKey::new(EntityRef::Section(id.clone()), Field::SectionTitle)
    }

    pub fn task(id: &TaskId, field: Field) -> Self {
        FieldKey::new(EntityRef::Task(id.clone()), field)
    }

    /// The field must belong to the referenced entity kind
    pub fn is_well_formed(&self) -> bool {
        self.field.owner_kind() == self.entity.kind()
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.entity, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection() {
        assert!(BoardId::new("pending-3").is_placeholder());
        assert!(!BoardId::new("clb1x").is_placeholder());
    }

    #[test]
    fn field_key_well_formed() {
        assert!(FieldKey::task(&TaskId::new("t1"), Field::TaskContent).is_well_formed());
        let bad = FieldKey::new(EntityRef::Section(SectionId::new("s1")), Field::BoardTitle);
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn entity_ref_serializes_tagged() {
        let json = serde_json::to_string(&EntityRef::Board(BoardId::new("b1"))).unwrap();
        assert_eq!(json, r#"{"kind":"board","id":"b1"}"#);
    }
}
