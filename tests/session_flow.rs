//! End-to-end mutation flows: a `Session` talking to the bundled in-memory server.
//!
//! The seeded server holds folder f1 with board b2; b2 has sections s3 [t5, t6]
//! and s4 [t7].

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use stackboard::io::state::LocalStateFile;
use stackboard::model::{
    ArchiveVisibility, BoardId, EntityRef, Field, FieldKey, SectionId, SyncConfig, TaskId, UserId,
};
use stackboard::store::{Container, DragKind, DropLocation, DropResult, LoadState};
use stackboard::sync::{InMemoryRemote, MutationStatus, Op, RemoteBoundary, RemoteError, Session};
use tempfile::TempDir;

fn user() -> UserId {
    UserId::new("u1")
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

async fn seed(remote: &InMemoryRemote) {
    let folder = remote.create_folder(&user()).await.unwrap();
    let board = folder.boards[0].id.clone();
    let first = remote.create_section(&board).await.unwrap();
    let second = remote.create_section(&board).await.unwrap();
    remote.create_task(&first.id).await.unwrap();
    remote.create_task(&first.id).await.unwrap();
    remote.create_task(&second.id).await.unwrap();
    remote.clear_calls();
}

async fn seeded(remote: InMemoryRemote) -> (Arc<InMemoryRemote>, Session) {
    let remote = Arc::new(remote);
    seed(&remote).await;
    let session = Session::new(remote.clone(), user(), SyncConfig::default());
    session.load().await.unwrap();
    (remote, session)
}

fn local_tasks(session: &Session, section: &str) -> Vec<String> {
    session.read(|s| {
        s.section(&SectionId::new(section))
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    })
}

fn server_tasks(remote: &InMemoryRemote, section: &str) -> Vec<String> {
    remote.with_data(|d| {
        d.board(&BoardId::new("b2"))
            .unwrap()
            .sections
            .into_iter()
            .find(|s| s.id.as_str() == section)
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    })
}

fn server_title(remote: &InMemoryRemote, task: &str) -> String {
    remote.with_data(|d| {
        d.board(&BoardId::new("b2"))
            .unwrap()
            .sections
            .into_iter()
            .flat_map(|s| s.tasks)
            .find(|t| t.id.as_str() == task)
            .unwrap()
            .title
    })
}

#[tokio::test]
async fn load_selects_first_board_and_fetches_its_sections() {
    let (_remote, session) = seeded(InMemoryRemote::new()).await;
    let active = BoardId::new("b2");
    assert_eq!(session.read(|s| s.active_board_id().cloned()), Some(active.clone()));
    assert_eq!(session.read(|s| s.load_state(&active)), LoadState::Loaded);
    assert_eq!(local_tasks(&session, "s3"), vec!["t5", "t6"]);
    assert_eq!(local_tasks(&session, "s4"), vec!["t7"]);
}

#[tokio::test]
async fn created_task_lands_on_top_locally_and_remotely() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let mutation = session.create_task(&SectionId::new("s3")).await.unwrap();
    assert_eq!(mutation.status, MutationStatus::Confirmed);
    assert_eq!(mutation.entity, Some(EntityRef::Task(TaskId::new("t8"))));
    assert_eq!(local_tasks(&session, "s3"), vec!["t8", "t5", "t6"]);
    assert_eq!(server_tasks(&remote, "s3"), vec!["t8", "t5", "t6"]);
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_send_a_single_update() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let key = FieldKey::task(&TaskId::new("t5"), Field::TaskTitle);
    for text in ["a", "ab", "abc"] {
        session.edit(key.clone(), text).unwrap();
        tokio::time::sleep(ms(100)).await;
    }
    assert!(remote.calls_to(Op::UpdateTask).is_empty());
    tokio::time::sleep(ms(2000)).await;
    assert_eq!(remote.calls_to(Op::UpdateTask).len(), 1);
    assert_eq!(server_title(&remote, "t5"), "abc");
}

#[tokio::test(start_paused = true)]
async fn edit_during_pending_create_reaches_the_server() {
    let (remote, session) = seeded(InMemoryRemote::new().with_latency(ms(200))).await;
    let section = SectionId::new("s3");

    let typing = async {
        tokio::time::sleep(ms(50)).await;
        let placeholder = session.read(|s| s.section(&section).unwrap().tasks[0].id.clone());
        assert!(placeholder.is_placeholder());
        session
            .edit(FieldKey::task(&placeholder, Field::TaskTitle), "Buy milk")
            .unwrap();
    };
    let (created, ()) = tokio::join!(session.create_task(&section), typing);
    let created = created.unwrap();
    assert!(created.is_confirmed());

    session.shutdown().await;
    let task = TaskId::new("t8");
    assert_eq!(local_tasks(&session, "s3"), vec!["t8", "t5", "t6"]);
    assert_eq!(session.read(|s| s.task(&task).map(|t| t.title.clone())), Some("Buy milk".into()));
    assert_eq!(remote.calls_to(Op::UpdateTask).len(), 1);
    assert_eq!(server_title(&remote, "t8"), "Buy milk");
}

#[tokio::test]
async fn task_drag_across_sections_matches_the_server() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let drop = DropResult::new(
        DragKind::Task,
        DropLocation::new(Container::Tasks(SectionId::new("s3")), 0),
        Some(DropLocation::new(Container::Tasks(SectionId::new("s4")), 1)),
    );
    let mutation = session.drag(drop).await.unwrap();
    assert!(mutation.is_confirmed());
    assert_eq!(local_tasks(&session, "s3"), vec!["t6"]);
    assert_eq!(local_tasks(&session, "s4"), vec!["t7", "t5"]);
    assert_eq!(server_tasks(&remote, "s3"), vec!["t6"]);
    assert_eq!(server_tasks(&remote, "s4"), vec!["t7", "t5"]);
    assert_eq!(remote.calls_to(Op::MoveOrReorderTasks).len(), 1);
}

#[tokio::test]
async fn drop_outside_any_list_sends_nothing() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let drop = DropResult::new(
        DragKind::Task,
        DropLocation::new(Container::Tasks(SectionId::new("s3")), 0),
        None,
    );
    let mutation = session.drag(drop).await.unwrap();
    assert_eq!(mutation.status, MutationStatus::Applied);
    assert!(remote.writes().is_empty());
    assert_eq!(local_tasks(&session, "s3"), vec!["t5", "t6"]);
}

#[tokio::test]
async fn failed_favorite_toggle_rolls_back() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let board = BoardId::new("b2");
    remote.fail_next(Op::UpdateBoard, RemoteError::Transport("offline".into()));
    let mutation = session.toggle_favorite(&board).await.unwrap();
    assert!(mutation.is_failed());
    assert_eq!(session.read(|s| s.board(&board).map(|b| b.favorite)), Some(false));
    assert!(session.read(|s| s.favorite_ids().is_empty()));

    let mutation = session.toggle_favorite(&board).await.unwrap();
    assert!(mutation.is_confirmed());
    assert_eq!(session.read(|s| s.favorite_ids().to_vec()), vec![board]);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_task_drops_its_pending_edit() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let task = TaskId::new("t5");
    session
        .edit(FieldKey::task(&task, Field::TaskTitle), "doomed")
        .unwrap();
    let mutation = session.delete_task(&task, &|_: &str| true).await.unwrap();
    assert!(mutation.is_confirmed());
    assert!(session.debouncer().pending().is_empty());
    tokio::time::sleep(ms(3000)).await;
    assert!(remote.calls_to(Op::UpdateTask).is_empty());
    assert_eq!(server_tasks(&remote, "s3"), vec!["t6"]);
}

#[tokio::test]
async fn deleting_the_active_board_selects_a_neighbor_and_persists_it() {
    let tmp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    seed(&remote).await;
    let extra = remote.create_board(&user(), None).await.unwrap();

    let state = LocalStateFile::in_dir(tmp.path());
    let session =
        Session::new(remote.clone(), user(), SyncConfig::default()).with_local_state(state.clone());
    session.load().await.unwrap();
    assert_eq!(state.read().unwrap().active_board, Some(BoardId::new("b2")));

    let mutation = session
        .delete_board(&BoardId::new("b2"), &|_: &str| true)
        .await
        .unwrap();
    assert!(mutation.is_confirmed());
    assert_eq!(session.read(|s| s.active_board_id().cloned()), Some(extra.id.clone()));
    assert_eq!(state.read().unwrap().active_board, Some(extra.id));
}

#[tokio::test]
async fn declined_delete_keeps_everything() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let mutation = session
        .delete_section(&SectionId::new("s3"), &|_: &str| false)
        .await
        .unwrap();
    assert_eq!(mutation.status, MutationStatus::Declined);
    assert_eq!(local_tasks(&session, "s3"), vec!["t5", "t6"]);
    assert!(remote.writes().is_empty());
}

#[tokio::test]
async fn failed_board_load_leaves_it_unloaded() {
    let remote = Arc::new(InMemoryRemote::new());
    seed(&remote).await;
    let other = remote.create_board(&user(), None).await.unwrap();
    let session = Session::new(remote.clone(), user(), SyncConfig::default());
    session.load().await.unwrap();

    remote.fail_next(Op::GetBoard, RemoteError::Server("boom".into()));
    assert!(session.select_board(&other.id).await.is_err());
    assert_eq!(session.read(|s| s.load_state(&other.id)), LoadState::NotLoaded);

    session.select_board(&other.id).await.unwrap();
    assert_eq!(session.read(|s| s.load_state(&other.id)), LoadState::Loaded);
}

#[tokio::test]
async fn remembered_board_is_restored_on_load() {
    let tmp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    seed(&remote).await;
    let other = remote.create_board(&user(), None).await.unwrap();
    let state = LocalStateFile::in_dir(tmp.path());

    let first =
        Session::new(remote.clone(), user(), SyncConfig::default()).with_local_state(state.clone());
    first.load().await.unwrap();
    first.select_board(&other.id).await.unwrap();

    let second = Session::new(remote.clone(), user(), SyncConfig::default()).with_local_state(state);
    second.load().await.unwrap();
    assert_eq!(second.read(|s| s.active_board_id().cloned()), Some(other.id));
}

#[tokio::test]
async fn favorites_order_survives_a_reload() {
    let remote = Arc::new(InMemoryRemote::new());
    seed(&remote).await;
    let first = remote.create_board(&user(), None).await.unwrap().id;
    let second = remote.create_board(&user(), None).await.unwrap().id;
    let filed = BoardId::new("b2");
    let session = Session::new(remote.clone(), user(), SyncConfig::default());
    session.load().await.unwrap();

    for board in [&first, &second, &first, &filed] {
        assert!(session.toggle_favorite(board).await.unwrap().is_confirmed());
    }
    let local = session.read(|s| s.favorite_ids().to_vec());
    assert_eq!(local, vec![second.clone(), filed.clone()]);

    let reloaded = Session::new(remote.clone(), user(), SyncConfig::default());
    reloaded.load().await.unwrap();
    assert_eq!(reloaded.read(|s| s.favorite_ids().to_vec()), local);
}

#[tokio::test]
async fn archived_section_stays_in_place_until_shown() {
    let (remote, session) = seeded(InMemoryRemote::new()).await;
    let board = BoardId::new("b2");
    let mutation = session
        .toggle_archive(&EntityRef::Section(SectionId::new("s3")))
        .await
        .unwrap();
    assert!(mutation.is_confirmed());
    assert!(remote.with_data(|d| d.board(&board).unwrap().sections[0].archived));

    let visible = |session: &Session| -> Vec<String> {
        session.read(|s| {
            s.visible_sections(&board)
                .iter()
                .map(|sec| sec.id.to_string())
                .collect()
        })
    };
    let all: Vec<(String, usize)> = session.read(|s| {
        s.board(&board)
            .unwrap()
            .sections()
            .iter()
            .map(|sec| (sec.id.to_string(), sec.position))
            .collect()
    });
    assert_eq!(all, vec![("s3".to_string(), 0), ("s4".to_string(), 1)]);
    assert_eq!(visible(&session), vec!["s4"]);

    session.set_archive_visibility(ArchiveVisibility::all());
    assert_eq!(visible(&session), vec!["s3", "s4"]);
}
