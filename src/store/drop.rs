use serde::{Deserialize, Serialize};

use super::{Store, StoreError};
use crate::model::{BoardId, EntityRef, FolderId, SectionId, TaskId};
use crate::ops::reindex::{PositionUpdate, position_batch, reindex};
use crate::ops::reorder::{move_within, transfer};

/// What kind of element is being dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Folder,
    Board,
    /// A row of the favorites list (reorders favorites, not folder boards)
    Favorite,
    Section,
    Task,
}

/// An ordered sibling list that can be a drag source or target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "list", content = "parent", rename_all = "lowercase")]
pub enum Container {
    Folders,
    /// Boards of a folder, or the unfiled bucket for `None`
    Boards(Option<FolderId>),
    Favorites,
    Sections(BoardId),
    Tasks(SectionId),
}

impl Container {
    /// Whether elements of `kind` live in this kind of list
    pub fn accepts(&self, kind: DragKind) -> bool {
        matches!(
            (self, kind),
            (Container::Folders, DragKind::Folder)
                | (Container::Boards(_), DragKind::Board)
                | (Container::Favorites, DragKind::Favorite)
                | (Container::Sections(_), DragKind::Section)
                | (Container::Tasks(_), DragKind::Task)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropLocation {
    pub container: Container,
    pub index: usize,
}

impl DropLocation {
    pub fn new(container: Container, index: usize) -> Self {
        DropLocation { container, index }
    }
}

/// A finished drag gesture, as reported by the drag-and-drop layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropResult {
    pub kind: DragKind,
    pub source: DropLocation,
    /// `None` when the drop landed outside any valid container
    pub destination: Option<DropLocation>,
}

impl DropResult {
    pub fn new(kind: DragKind, source: DropLocation, destination: Option<DropLocation>) -> Self {
        DropResult {
            kind,
            source,
            destination,
        }
    }

    /// A drop inside one list
    pub fn within(kind: DragKind, container: Container, from: usize, to: usize) -> Self {
        DropResult::new(
            kind,
            DropLocation::new(container.clone(), from),
            Some(DropLocation::new(container, to)),
        )
    }
}

/// The remote position updates a resolved drop needs.
///
/// Every batch is in reverse list order. For moves inside one list the
/// `source` batch of `Boards` and `Tasks` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderPlan {
    NoOp,
    Folders(Vec<PositionUpdate<FolderId>>),
    Favorites(Vec<PositionUpdate<BoardId>>),
    Boards {
        board: BoardId,
        source_folder: Option<FolderId>,
        destination_folder: Option<FolderId>,
        source: Vec<PositionUpdate<BoardId>>,
        destination: Vec<PositionUpdate<BoardId>>,
    },
    Sections {
        board: BoardId,
        updates: Vec<PositionUpdate<SectionId>>,
    },
    Tasks {
        task: TaskId,
        source_section: SectionId,
        destination_section: SectionId,
        source: Vec<PositionUpdate<TaskId>>,
        destination: Vec<PositionUpdate<TaskId>>,
    },
}

impl ReorderPlan {
    /// True when the element changed parent
    pub fn is_transfer(&self) -> bool {
        match self {
            ReorderPlan::Boards {
                source_folder,
                destination_folder,
                ..
            } => source_folder != destination_folder,
            ReorderPlan::Tasks {
                source_section,
                destination_section,
                ..
            } => source_section != destination_section,
            _ => false,
        }
    }

    /// The containers whose order changed
    pub fn containers(&self) -> Vec<Container> {
        match self {
            ReorderPlan::NoOp => Vec::new(),
            ReorderPlan::Folders(_) => vec![Container::Folders],
            ReorderPlan::Favorites(_) => vec![Container::Favorites],
            ReorderPlan::Boards {
                source_folder,
                destination_folder,
                ..
            } => {
                let mut out = vec![Container::Boards(destination_folder.clone())];
                if source_folder != destination_folder {
                    out.insert(0, Container::Boards(source_folder.clone()));
                }
                out
            }
            ReorderPlan::Sections { board, .. } => vec![Container::Sections(board.clone())],
            ReorderPlan::Tasks {
                source_section,
                destination_section,
                ..
            } => {
                let mut out = vec![Container::Tasks(destination_section.clone())];
                if source_section != destination_section {
                    out.insert(0, Container::Tasks(source_section.clone()));
                }
                out
            }
        }
    }
}

/// Positions of the favorites index, in reverse order like every other batch
pub fn favorites_batch(favorites: &[BoardId]) -> Vec<PositionUpdate<BoardId>> {
    favorites
        .iter()
        .enumerate()
        .rev()
        .map(|(index, id)| PositionUpdate {
            id: id.clone(),
            position: index,
        })
        .collect()
}

impl Store {
    fn resolve_container(&self, container: &Container) -> Container {
        match container {
            Container::Boards(Some(id)) => match self.resolve(&EntityRef::Folder(id.clone())) {
                EntityRef::Folder(id) => Container::Boards(Some(id)),
                _ => container.clone(),
            },
            Container::Sections(id) => match self.resolve(&EntityRef::Board(id.clone())) {
                EntityRef::Board(id) => Container::Sections(id),
                _ => container.clone(),
            },
            Container::Tasks(id) => match self.resolve(&EntityRef::Section(id.clone())) {
                EntityRef::Section(id) => Container::Tasks(id),
                _ => container.clone(),
            },
            _ => container.clone(),
        }
    }

    /// Apply a drop to the tree and describe the remote updates it needs.
    pub(super) fn resolve_drop(&mut self, drop: &DropResult) -> Result<ReorderPlan, StoreError> {
        let Some(destination) = &drop.destination else {
            return Ok(ReorderPlan::NoOp);
        };
        let from = drop.source.index;
        let to = destination.index;
        let source = self.resolve_container(&drop.source.container);
        let target = self.resolve_container(&destination.container);

        if !source.accepts(drop.kind) || !target.accepts(drop.kind) {
            return Err(StoreError::InvalidDrop(format!(
                "{:?} cannot move from {:?} to {:?}",
                drop.kind, source, target
            )));
        }
        if source == target && from == to {
            return Ok(ReorderPlan::NoOp);
        }

        match (source, target) {
            (Container::Folders, Container::Folders) => {
                move_within(&mut self.folders, from, to)?;
                reindex(&mut self.folders);
                Ok(ReorderPlan::Folders(position_batch(&self.folders)))
            }
            (Container::Favorites, Container::Favorites) => {
                move_within(&mut self.favorites, from, to)?;
                Ok(ReorderPlan::Favorites(favorites_batch(&self.favorites)))
            }
            (Container::Sections(board), Container::Sections(other)) => {
                if board != other {
                    return Err(StoreError::InvalidDrop(
                        "sections cannot move between boards".into(),
                    ));
                }
                let sections = self.sections_mut(&board)?;
                move_within(sections, from, to)?;
                reindex(sections);
                let updates = position_batch(sections);
                Ok(ReorderPlan::Sections { board, updates })
            }
            (Container::Boards(src), Container::Boards(dst)) => self.drop_board(src, from, dst, to),
            (Container::Tasks(src), Container::Tasks(dst)) => self.drop_task(src, from, dst, to),
            (source, target) => Err(StoreError::InvalidDrop(format!(
                "cannot move from {:?} to {:?}",
                source, target
            ))),
        }
    }

    fn drop_board(
        &mut self,
        src: Option<FolderId>,
        from: usize,
        dst: Option<FolderId>,
        to: usize,
    ) -> Result<ReorderPlan, StoreError> {
        if src == dst {
            let list = self.board_list_mut(src.as_ref())?;
            move_within(list, from, to)?;
            reindex(list);
            let board = list[to].id.clone();
            let destination = position_batch(list);
            return Ok(ReorderPlan::Boards {
                board,
                source_folder: src,
                destination_folder: dst,
                source: Vec::new(),
                destination,
            });
        }

        // Both lists live in the same tree; detach the destination while moving.
        self.board_list_mut(src.as_ref())?;
        let mut target = std::mem::take(self.board_list_mut(dst.as_ref())?);
        let moved = self
            .board_list_mut(src.as_ref())
            .and_then(|list| transfer(list, from, &mut target, to).map_err(StoreError::from));
        if moved.is_ok() {
            target[to].folder_id = dst.clone();
            reindex(&mut target);
        }
        let board = target.get(to).map(|b| b.id.clone());
        let destination = position_batch(&target);
        *self.board_list_mut(dst.as_ref())? = target;
        moved?;

        let list = self.board_list_mut(src.as_ref())?;
        reindex(list);
        let source = position_batch(list);
        Ok(ReorderPlan::Boards {
            board: board.ok_or_else(|| StoreError::Invariant("moved board missing".into()))?,
            source_folder: src,
            destination_folder: dst,
            source,
            destination,
        })
    }

    fn drop_task(
        &mut self,
        src: SectionId,
        from: usize,
        dst: SectionId,
        to: usize,
    ) -> Result<ReorderPlan, StoreError> {
        if src == dst {
            let tasks = self.tasks_mut(&src)?;
            move_within(tasks, from, to)?;
            reindex(tasks);
            let task = tasks[to].id.clone();
            let destination = position_batch(tasks);
            return Ok(ReorderPlan::Tasks {
                task,
                source_section: src,
                destination_section: dst,
                source: Vec::new(),
                destination,
            });
        }

        self.tasks_mut(&src)?;
        let mut target = std::mem::take(self.tasks_mut(&dst)?);
        let moved = self
            .tasks_mut(&src)
            .and_then(|list| transfer(list, from, &mut target, to).map_err(StoreError::from));
        if moved.is_ok() {
            reindex(&mut target);
        }
        let task = target.get(to).map(|t| t.id.clone());
        let destination = position_batch(&target);
        *self.tasks_mut(&dst)? = target;
        moved?;

        let list = self.tasks_mut(&src)?;
        reindex(list);
        let source = position_batch(list);
        Ok(ReorderPlan::Tasks {
            task: task.ok_or_else(|| StoreError::Invariant("moved task missing".into()))?,
            source_section: src,
            destination_section: dst,
            source,
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreChange;
    use crate::store::test_support::*;
    use pretty_assertions::assert_eq;

    fn apply_drop(store: &mut Store, result: DropResult) -> ReorderPlan {
        store.apply(StoreChange::Drop(result)).unwrap().plan.unwrap()
    }

    fn tasks(id: &str) -> Container {
        Container::Tasks(SectionId::new(id))
    }

    #[test]
    fn missing_destination_is_noop() {
        let mut store = sample_store();
        let result = DropResult::new(
            DragKind::Task,
            DropLocation::new(tasks("s1"), 0),
            None,
        );
        assert_eq!(apply_drop(&mut store, result), ReorderPlan::NoOp);
        assert_eq!(task_ids(&store, "s1"), vec!["t1", "t2"]);
    }

    #[test]
    fn same_slot_is_noop() {
        let mut store = sample_store();
        let plan = apply_drop(&mut store, DropResult::within(DragKind::Task, tasks("s1"), 1, 1));
        assert_eq!(plan, ReorderPlan::NoOp);
    }

    #[test]
    fn task_moves_between_sections() {
        let mut store = sample_store();
        let result = DropResult::new(
            DragKind::Task,
            DropLocation::new(tasks("s1"), 0),
            Some(DropLocation::new(tasks("s2"), 0)),
        );
        let plan = apply_drop(&mut store, result);

        assert_eq!(task_ids(&store, "s1"), vec!["t2"]);
        assert_eq!(task_ids(&store, "s2"), vec!["t1", "t3"]);
        store.check_invariants().unwrap();
        assert!(plan.is_transfer());
        let ReorderPlan::Tasks {
            task,
            source,
            destination,
            ..
        } = plan
        else {
            panic!("expected a task plan");
        };
        assert_eq!(task, TaskId::new("t1"));
        assert_eq!(source, vec![PositionUpdate { id: TaskId::new("t2"), position: 0 }]);
        assert_eq!(
            destination,
            vec![
                PositionUpdate { id: TaskId::new("t3"), position: 1 },
                PositionUpdate { id: TaskId::new("t1"), position: 0 },
            ]
        );
    }

    #[test]
    fn task_reorder_within_section_sends_one_list() {
        let mut store = sample_store();
        let plan = apply_drop(&mut store, DropResult::within(DragKind::Task, tasks("s1"), 0, 1));
        assert_eq!(task_ids(&store, "s1"), vec!["t2", "t1"]);
        let ReorderPlan::Tasks { source, destination, .. } = plan else {
            panic!("expected a task plan");
        };
        assert!(source.is_empty());
        assert_eq!(destination.len(), 2);
    }

    #[test]
    fn board_moves_to_unfiled_and_updates_parent() {
        let mut store = sample_store();
        let result = DropResult::new(
            DragKind::Board,
            DropLocation::new(Container::Boards(Some(FolderId::new("f1"))), 1),
            Some(DropLocation::new(Container::Boards(None), 0)),
        );
        let plan = apply_drop(&mut store, result);

        assert_eq!(board_ids(&store, Some("f1")), vec!["b1"]);
        assert_eq!(board_ids(&store, None), vec!["b2", "b4"]);
        assert_eq!(store.board(&BoardId::new("b2")).unwrap().folder_id, None);
        store.check_invariants().unwrap();
        assert_eq!(
            plan.containers(),
            vec![
                Container::Boards(Some(FolderId::new("f1"))),
                Container::Boards(None)
            ]
        );
    }

    #[test]
    fn folder_reorder_uses_splice_semantics() {
        let mut store = sample_store();
        let plan = apply_drop(
            &mut store,
            DropResult::within(DragKind::Folder, Container::Folders, 0, 1),
        );
        let names: Vec<_> = store.folders().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Work"]);
        assert_eq!(
            plan,
            ReorderPlan::Folders(vec![
                PositionUpdate { id: FolderId::new("f1"), position: 1 },
                PositionUpdate { id: FolderId::new("f2"), position: 0 },
            ])
        );
    }

    #[test]
    fn sections_cannot_change_board() {
        let mut store = sample_store();
        let result = DropResult::new(
            DragKind::Section,
            DropLocation::new(Container::Sections(BoardId::new("b1")), 0),
            Some(DropLocation::new(Container::Sections(BoardId::new("b2")), 0)),
        );
        let err = store.apply(StoreChange::Drop(result)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDrop(_)));
        assert_eq!(store.section_counts(&BoardId::new("b1")).total, 2);
    }

    #[test]
    fn kind_must_match_container() {
        let mut store = sample_store();
        let result = DropResult::within(DragKind::Folder, tasks("s1"), 0, 1);
        assert!(store.apply(StoreChange::Drop(result)).is_err());
    }

    #[test]
    fn out_of_range_drop_leaves_both_lists_intact() {
        let mut store = sample_store();
        let result = DropResult::new(
            DragKind::Task,
            DropLocation::new(tasks("s1"), 0),
            Some(DropLocation::new(tasks("s2"), 5)),
        );
        assert!(store.apply(StoreChange::Drop(result)).is_err());
        assert_eq!(task_ids(&store, "s1"), vec!["t1", "t2"]);
        assert_eq!(task_ids(&store, "s2"), vec!["t3"]);
    }
}
