//! Move commands, expressed as the drop a drag gesture would report.

use super::{CmdResult, Context};
use crate::model::{BoardId, FolderId, SectionId, TaskId};
use crate::store::{Container, DragKind, DropLocation, DropResult, Store};

fn not_found(kind: &str, id: &impl std::fmt::Display) -> Box<dyn std::error::Error> {
    format!("{} {} not found", kind, id).into()
}

async fn send(ctx: &Context, drop: DropResult) -> CmdResult {
    let mutation = ctx.session.drag(drop).await?;
    ctx.report_kind(&mutation)
}

pub(super) async fn move_folder(ctx: &Context, id: FolderId, index: usize) -> CmdResult {
    let from = ctx
        .session
        .read(|s| s.folders().iter().position(|f| f.id == id))
        .ok_or_else(|| not_found("folder", &id))?;
    send(ctx, DropResult::within(DragKind::Folder, Container::Folders, from, index)).await
}

/// `destination` is `None` to stay in the current list, `Some(None)` for the
/// unfiled bucket.
pub(super) async fn move_board(
    ctx: &Context,
    id: BoardId,
    index: usize,
    destination: Option<Option<FolderId>>,
) -> CmdResult {
    let source = ctx
        .session
        .read(|s| board_location(s, &id))
        .ok_or_else(|| not_found("board", &id))?;
    let destination = match destination {
        Some(folder) => DropLocation::new(Container::Boards(folder), index),
        None => DropLocation::new(source.container.clone(), index),
    };
    send(ctx, DropResult::new(DragKind::Board, source, Some(destination))).await
}

fn board_location(store: &Store, id: &BoardId) -> Option<DropLocation> {
    let folder = store.board(id)?.folder_id.clone();
    let index = store
        .board_list(folder.as_ref())?
        .iter()
        .position(|b| &b.id == id)?;
    Some(DropLocation::new(Container::Boards(folder), index))
}

pub(super) async fn move_favorite(ctx: &Context, id: BoardId, index: usize) -> CmdResult {
    let from = ctx
        .session
        .read(|s| s.favorite_position(&id))
        .ok_or_else(|| not_found("favorite", &id))?;
    send(ctx, DropResult::within(DragKind::Favorite, Container::Favorites, from, index)).await
}

pub(super) async fn move_section(ctx: &Context, id: SectionId, index: usize) -> CmdResult {
    let (board, from) = ctx
        .session
        .read(|s| {
            let board = s.section_board(&id)?;
            let from = board.sections().iter().position(|sec| sec.id == id)?;
            Some((board.id.clone(), from))
        })
        .ok_or_else(|| not_found("section", &id))?;
    send(
        ctx,
        DropResult::within(DragKind::Section, Container::Sections(board), from, index),
    )
    .await
}

pub(super) async fn move_task(
    ctx: &Context,
    id: TaskId,
    index: usize,
    destination: Option<SectionId>,
) -> CmdResult {
    let (section, from) = ctx
        .session
        .read(|s| {
            let section = s.task_section(&id)?;
            let from = section.tasks.iter().position(|t| t.id == id)?;
            Some((section.id.clone(), from))
        })
        .ok_or_else(|| not_found("task", &id))?;
    let destination = destination.unwrap_or_else(|| section.clone());
    send(
        ctx,
        DropResult::new(
            DragKind::Task,
            DropLocation::new(Container::Tasks(section), from),
            Some(DropLocation::new(Container::Tasks(destination), index)),
        ),
    )
    .await
}
