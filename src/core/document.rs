use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change_request::ChangeRequest;
use super::idea::Idea;
use super::project::Project;
use super::task::{Column, Task};
use super::today_plan::TodayPlan;

/// Where a task was found inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskLocation {
    /// Inside a project column: (project index, column, index in column).
    Project(usize, Column, usize),
    /// In the loose top-level todo list.
    Loose(usize),
}

/// The full shared state document, as stored remotely.
///
/// Every collection defaults to empty so older documents missing a list
/// still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub todos: Vec<Task>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub change_requests: Vec<ChangeRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_plan: Option<TodayPlan>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Document {
    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    pub fn project_mut(&mut self, project_id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == project_id)
    }

    /// Locate a task by id across every column of every project, then the
    /// loose todos. Ids are globally unique, so the first hit is the task.
    pub fn locate_task(&self, task_id: &str) -> Option<TaskLocation> {
        for (pi, project) in self.projects.iter().enumerate() {
            if let Some((col, idx, _)) = project.find_task(task_id) {
                return Some(TaskLocation::Project(pi, col, idx));
            }
        }
        self.todos
            .iter()
            .position(|t| t.id == task_id)
            .map(TaskLocation::Loose)
    }

    pub fn get_task(&self, loc: &TaskLocation) -> &Task {
        match loc {
            TaskLocation::Project(pi, col, idx) => &self.projects[*pi].column(*col)[*idx],
            TaskLocation::Loose(idx) => &self.todos[*idx],
        }
    }

    pub fn get_task_mut(&mut self, loc: &TaskLocation) -> &mut Task {
        match loc {
            TaskLocation::Project(pi, col, idx) => {
                &mut self.projects[*pi].column_mut(*col)[*idx]
            }
            TaskLocation::Loose(idx) => &mut self.todos[*idx],
        }
    }

    /// Whether any project column or the loose list contains this id.
    pub fn contains_task(&self, task_id: &str) -> bool {
        self.locate_task(task_id).is_some()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_scans_projects_then_loose_todos() {
        let mut doc = Document::default();
        let mut p = Project::new("p1", "P");
        p.column_mut(Column::Done).push(Task::new("in project"));
        let project_task = p.column(Column::Done)[0].id.clone();
        doc.projects.push(p);
        doc.todos.push(Task::new("loose"));
        let loose_task = doc.todos[0].id.clone();

        assert_eq!(
            doc.locate_task(&project_task),
            Some(TaskLocation::Project(0, Column::Done, 0))
        );
        assert_eq!(doc.locate_task(&loose_task), Some(TaskLocation::Loose(0)));
        assert_eq!(doc.locate_task("nope"), None);
    }

    #[test]
    fn document_roundtrips_through_json() {
        let mut doc = Document::default();
        doc.projects.push(Project::new("p1", "P"));
        doc.todos.push(Task::new("🦁 unicode title"));
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn missing_collections_deserialize_as_empty() {
        let doc: Document =
            serde_json::from_str(r#"{"lastUpdated":"2026-08-06T00:00:00Z"}"#).unwrap();
        assert!(doc.projects.is_empty());
        assert!(doc.todos.is_empty());
        assert!(doc.ideas.is_empty());
        assert!(doc.change_requests.is_empty());
        assert!(doc.today_plan.is_none());
    }
}
