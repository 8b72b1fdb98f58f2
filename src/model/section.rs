use serde::{Deserialize, Serialize};

use super::ids::SectionId;
use super::task::Task;
use crate::ops::reindex::Positioned;

/// A column on a board holding an ordered list of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    #[serde(default)]
    pub title: String,
    /// Rank within the parent board (0-based, dense)
    pub position: usize,
    #[serde(default)]
    pub archived: bool,
    /// Tasks in display order
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Section {
    pub fn new(id: SectionId) -> Self {
        Section {
            id,
            title: String::new(),
            position: 0,
            archived: false,
            tasks: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn task(&self, id: &super::ids::TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

impl Positioned for Section {
    type Id = SectionId;

    fn id(&self) -> &SectionId {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}
