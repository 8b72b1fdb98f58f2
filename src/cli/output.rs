use serde::Serialize;

use crate::model::{Board, BoardId, Folder, FolderId, Section, Task};
use crate::store::{FavoriteEntry, Store};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BoardSummaryJson {
    pub id: BoardId,
    pub title: String,
    pub icon: String,
    pub favorite: bool,
    pub archived: bool,
    pub active: bool,
}

#[derive(Serialize)]
pub struct FolderJson {
    pub id: FolderId,
    pub name: String,
    pub archived: bool,
    pub boards: Vec<BoardSummaryJson>,
}

#[derive(Serialize)]
pub struct TreeJson {
    pub favorites: Vec<FavoriteEntry>,
    pub folders: Vec<FolderJson>,
    pub unfiled: Vec<BoardSummaryJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<BoardId>,
}

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    pub archived: bool,
}

#[derive(Serialize)]
pub struct SectionJson {
    pub id: String,
    pub title: String,
    pub archived: bool,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct BoardJson {
    pub id: BoardId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub favorite: bool,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderId>,
    pub sections: Vec<SectionJson>,
}

// ---------------------------------------------------------------------------
// JSON builders
// ---------------------------------------------------------------------------

fn board_summary_json(store: &Store, board: &Board) -> BoardSummaryJson {
    BoardSummaryJson {
        id: board.id.clone(),
        title: board.title.clone(),
        icon: board.icon.clone(),
        favorite: board.favorite,
        archived: board.archived,
        active: store.active_board_id() == Some(&board.id),
    }
}

fn folder_json(store: &Store, folder: &Folder) -> FolderJson {
    FolderJson {
        id: folder.id.clone(),
        name: folder.name.clone(),
        archived: folder.archived,
        boards: store
            .visible_boards(Some(&folder.id))
            .into_iter()
            .map(|b| board_summary_json(store, b))
            .collect(),
    }
}

pub fn tree_json(store: &Store) -> TreeJson {
    TreeJson {
        favorites: store.favorites(),
        folders: store
            .visible_folders()
            .into_iter()
            .map(|f| folder_json(store, f))
            .collect(),
        unfiled: store
            .visible_boards(None)
            .into_iter()
            .map(|b| board_summary_json(store, b))
            .collect(),
        active: store.active_board_id().cloned(),
    }
}

fn task_json(task: &Task) -> TaskJson {
    TaskJson {
        id: task.id.to_string(),
        title: task.title.clone(),
        content: task.content.clone(),
        archived: task.archived,
    }
}

fn section_json(store: &Store, section: &Section) -> SectionJson {
    SectionJson {
        id: section.id.to_string(),
        title: section.title.clone(),
        archived: section.archived,
        tasks: store
            .visible_tasks(&section.id)
            .into_iter()
            .map(task_json)
            .collect(),
    }
}

pub fn board_json(store: &Store, board: &Board) -> BoardJson {
    BoardJson {
        id: board.id.clone(),
        title: board.title.clone(),
        description: board.description.clone(),
        icon: board.icon.clone(),
        favorite: board.favorite,
        archived: board.archived,
        folder: board.folder_id.clone(),
        sections: store
            .visible_sections(&board.id)
            .into_iter()
            .map(|s| section_json(store, s))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn archived_suffix(archived: bool) -> &'static str {
    if archived { " (archived)" } else { "" }
}

fn board_line(store: &Store, board: &Board) -> String {
    let marker = if store.active_board_id() == Some(&board.id) {
        ">"
    } else {
        " "
    };
    format!(
        "{} {} {} [{}]{}",
        marker,
        board.icon,
        board.title,
        board.id,
        archived_suffix(board.archived)
    )
}

/// Favorites, then folders with their boards, then unfiled boards.
/// The active board is marked with `>`.
pub fn format_tree(store: &Store) -> String {
    let mut lines = Vec::new();

    let favorites = store.favorites();
    if !favorites.is_empty() {
        lines.push("Favorites".to_string());
        for entry in &favorites {
            lines.push(format!("  {} {} [{}]", entry.icon, entry.title, entry.id));
        }
    }

    for folder in store.visible_folders() {
        lines.push(format!(
            "{} [{}]{}",
            folder.name,
            folder.id,
            archived_suffix(folder.archived)
        ));
        for board in store.visible_boards(Some(&folder.id)) {
            lines.push(board_line(store, board));
        }
    }

    let unfiled = store.visible_boards(None);
    if !unfiled.is_empty() {
        lines.push("Unfiled".to_string());
        for board in unfiled {
            lines.push(board_line(store, board));
        }
    }

    if lines.is_empty() {
        return "(no boards)".to_string();
    }
    lines.join("\n")
}

/// One board with its sections and tasks
pub fn format_board(store: &Store, board: &Board) -> String {
    let counts = store.section_counts(&board.id);
    let mut header = format!(
        "{} {} [{}]{} · {} section{}",
        board.icon,
        board.title,
        board.id,
        archived_suffix(board.archived),
        counts.total,
        if counts.total == 1 { "" } else { "s" }
    );
    let archived = counts.total - counts.not_archived;
    if archived > 0 {
        header.push_str(&format!(" ({} archived)", archived));
    }
    let mut lines = vec![header];
    if !board.description.is_empty() {
        lines.push(board.description.clone());
    }
    if !board.is_loaded() {
        lines.push(String::new());
        lines.push("(sections not loaded)".to_string());
        return lines.join("\n");
    }

    for section in store.visible_sections(&board.id) {
        lines.push(String::new());
        lines.push(format!(
            "{} [{}]{}",
            section.title,
            section.id,
            archived_suffix(section.archived)
        ));
        for task in store.visible_tasks(&section.id) {
            lines.push(format!(
                "  - {} [{}]{}",
                task.title,
                task.id,
                archived_suffix(task.archived)
            ));
            if let Some(first) = task.content.lines().next().filter(|l| !l.is_empty()) {
                lines.push(format!("      {}", first));
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveVisibility, EntityRef, SectionId, TaskId};
    use crate::store::StoreChange;
    use crate::store::test_support::sample_store;
    use insta::assert_snapshot;

    fn store() -> Store {
        let mut store = sample_store();
        store
            .apply(StoreChange::SelectBoard(Some(BoardId::new("b1"))))
            .unwrap();
        store
            .apply(StoreChange::SetFavorite {
                board: BoardId::new("b3"),
                favorite: true,
            })
            .unwrap();
        store
    }

    #[test]
    fn tree_marks_active_and_lists_favorites() {
        assert_snapshot!(format_tree(&store()), @r"
        Favorites
          📝 B3 [b3]
        Work [f1]
        > 📝 B1 [b1]
          📝 B2 [b2]
        Home [f2]
          📝 B3 [b3]
        Unfiled
          📝 B4 [b4]
        ");
    }

    #[test]
    fn archived_entities_hidden_until_requested() {
        let mut store = store();
        store
            .apply(StoreChange::SetArchived {
                entity: EntityRef::Board(BoardId::new("b2")),
                archived: true,
            })
            .unwrap();
        assert!(!format_tree(&store).contains("[b2]"));

        store
            .apply(StoreChange::SetArchiveVisibility(ArchiveVisibility::all()))
            .unwrap();
        assert!(format_tree(&store).contains("  📝 B2 [b2] (archived)"));
    }

    #[test]
    fn board_lists_sections_and_tasks() {
        let mut store = store();
        store
            .apply(StoreChange::SetArchived {
                entity: EntityRef::Section(SectionId::new("s2")),
                archived: true,
            })
            .unwrap();
        store
            .apply(StoreChange::SetText {
                key: crate::model::FieldKey::task(&TaskId::new("t2"), crate::model::Field::TaskContent),
                value: "details\nmore".into(),
            })
            .unwrap();
        let board = store.board(&BoardId::new("b1")).unwrap();
        assert_snapshot!(format_board(&store, board), @r"
        📝 B1 [b1] · 2 sections (1 archived)
        Add description here

        S1 [s1]
          - T1 [t1]
          - T2 [t2]
              details
        ");
    }

    #[test]
    fn unloaded_board_says_so() {
        let store = store();
        let board = store.board(&BoardId::new("b4")).unwrap();
        let text = format_board(&store, board);
        assert!(text.ends_with("(sections not loaded)"));
    }

    #[test]
    fn tree_json_reports_active_board() {
        let json = serde_json::to_value(tree_json(&store())).unwrap();
        assert_eq!(json["active"], "b1");
        assert_eq!(json["folders"][0]["boards"][0]["active"], true);
        assert_eq!(json["favorites"][0]["id"], "b3");
        assert_eq!(json["unfiled"][0]["id"], "b4");
    }
}
