use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::task::{Column, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Complete,
}

/// A project board: metadata plus one ordered task list per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub tasks: BTreeMap<Column, Vec<Task>>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            color: String::new(),
            icon: String::new(),
            status: ProjectStatus::Active,
            tasks: BTreeMap::new(),
        }
    }

    pub fn column(&self, column: Column) -> &[Task] {
        self.tasks.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn column_mut(&mut self, column: Column) -> &mut Vec<Task> {
        self.tasks.entry(column).or_default()
    }

    /// Find a task by id, scanning all four columns.
    pub fn find_task(&self, task_id: &str) -> Option<(Column, usize, &Task)> {
        for col in Column::ALL {
            if let Some(idx) = self.column(col).iter().position(|t| t.id == task_id) {
                return Some((col, idx, &self.column(col)[idx]));
            }
        }
        None
    }

    /// Remove a task from every column it appears in, returning the last
    /// removed copy. Removing before re-inserting is what makes completion
    /// and moves idempotent.
    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let mut removed = None;
        for col in Column::ALL {
            if let Some(list) = self.tasks.get_mut(&col) {
                if let Some(idx) = list.iter().position(|t| t.id == task_id) {
                    removed = Some(list.remove(idx));
                }
            }
        }
        removed
    }

    pub fn task_count(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }

    pub fn completion_ratio(&self) -> (usize, usize) {
        let done = self.column(Column::Done).len();
        (done, self.task_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_project() -> Project {
        let mut p = Project::new("p1", "Launch");
        p.column_mut(Column::Todo).push(Task::new("a"));
        p.column_mut(Column::Done).push(Task::new("b"));
        p
    }

    #[test]
    fn find_task_scans_all_columns() {
        let p = make_project();
        let done_id = p.column(Column::Done)[0].id.clone();
        let (col, idx, task) = p.find_task(&done_id).unwrap();
        assert_eq!(col, Column::Done);
        assert_eq!(idx, 0);
        assert_eq!(task.id, done_id);
        assert!(p.find_task("missing").is_none());
    }

    #[test]
    fn remove_task_clears_every_column() {
        let mut p = make_project();
        let id = p.column(Column::Todo)[0].id.clone();
        // Simulate a duplicate left behind by an interrupted move.
        let dup = p.column(Column::Todo)[0].clone();
        p.column_mut(Column::Upnext).push(dup);

        let removed = p.remove_task(&id);
        assert!(removed.is_some());
        assert!(p.find_task(&id).is_none());
    }
}
