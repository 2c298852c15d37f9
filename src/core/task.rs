use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the four storage arrays a task can live in inside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Todo,
    Upnext,
    InProgress,
    Done,
}

impl Column {
    /// Scan order used when locating a task inside a project.
    pub const ALL: [Column; 4] = [
        Column::Todo,
        Column::Upnext,
        Column::InProgress,
        Column::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Upnext => "upnext",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

/// Where a move or placement points: a structural column, or a person.
///
/// Only the three canonical column names are structural; every other string
/// is an assignee name. An assignee target stores the task in `upnext` with
/// the `assignee` field set: two projections of one storage array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnTarget {
    Column(Column),
    Assignee(String),
}

impl ColumnTarget {
    pub fn parse(s: &str) -> Self {
        match s {
            "todo" => Self::Column(Column::Todo),
            "upnext" => Self::Column(Column::Upnext),
            "done" => Self::Column(Column::Done),
            other => Self::Assignee(other.to_string()),
        }
    }

    /// The storage array this target resolves to.
    pub fn storage_column(&self) -> Column {
        match self {
            Self::Column(c) => *c,
            Self::Assignee(_) => Column::Upnext,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Column(c) => c.as_str(),
            Self::Assignee(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: high < medium < low.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub done: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: format!("s-{}", Uuid::new_v4()),
            title: title.into(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: client_task_id(),
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            tags: Vec::new(),
            assignee: None,
            due_date: None,
            subtasks: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            reminder: None,
        }
    }

    /// Add a tag unless already present; tags behave as a set.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.iter().any(|t| *t == tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Shallow-merge a patch into this task.
    ///
    /// An empty or absent patched subtask list never clobbers non-empty
    /// canonical subtasks, so a title-only edit cannot lose subtask state.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref description) = patch.description {
            self.description = if description.is_empty() {
                None
            } else {
                Some(description.clone())
            };
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref assignee) = patch.assignee {
            self.assignee = if assignee.is_empty() {
                None
            } else {
                Some(assignee.clone())
            };
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(ref subtasks) = patch.subtasks {
            if !subtasks.is_empty() || self.subtasks.is_empty() {
                self.subtasks = subtasks.clone();
            }
        }
    }
}

/// Partial task: only the present fields are applied on edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a newer patch into this one, field-wise: present fields of the
    /// newer patch win, absent fields keep the older value.
    pub fn merge(&mut self, newer: &TaskPatch) {
        if newer.title.is_some() {
            self.title = newer.title.clone();
        }
        if newer.description.is_some() {
            self.description = newer.description.clone();
        }
        if newer.priority.is_some() {
            self.priority = newer.priority;
        }
        if newer.tags.is_some() {
            self.tags = newer.tags.clone();
        }
        if newer.assignee.is_some() {
            self.assignee = newer.assignee.clone();
        }
        if newer.due_date.is_some() {
            self.due_date = newer.due_date;
        }
        if newer.subtasks.is_some() {
            self.subtasks = newer.subtasks.clone();
        }
    }
}

/// Client-generated task id: globally unique and stable, so a later snapshot
/// containing the committed task is matched by id rather than duplicated.
pub fn client_task_id() -> String {
    format!("u-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_target_parses_canonical_forms() {
        assert_eq!(
            ColumnTarget::parse("todo"),
            ColumnTarget::Column(Column::Todo)
        );
        assert_eq!(
            ColumnTarget::parse("upnext"),
            ColumnTarget::Column(Column::Upnext)
        );
        assert_eq!(
            ColumnTarget::parse("done"),
            ColumnTarget::Column(Column::Done)
        );
    }

    #[test]
    fn column_target_treats_everything_else_as_assignee() {
        assert_eq!(
            ColumnTarget::parse("mordy"),
            ColumnTarget::Assignee("mordy".to_string())
        );
        // Only the three canonical forms are structural.
        assert_eq!(
            ColumnTarget::parse("in_progress"),
            ColumnTarget::Assignee("in_progress".to_string())
        );
        assert_eq!(ColumnTarget::parse("mordy").storage_column(), Column::Upnext);
    }

    #[test]
    fn patch_preserves_subtasks_when_absent_or_empty() {
        let mut task = Task::new("Write report");
        task.subtasks = vec![Subtask::new("outline"), Subtask::new("draft")];

        let patch = TaskPatch {
            title: Some("Write the report".into()),
            ..Default::default()
        };
        task.apply_patch(&patch);
        assert_eq!(task.title, "Write the report");
        assert_eq!(task.subtasks.len(), 2);

        let patch = TaskPatch {
            subtasks: Some(Vec::new()),
            ..Default::default()
        };
        task.apply_patch(&patch);
        assert_eq!(task.subtasks.len(), 2, "empty list must not clobber");
    }

    #[test]
    fn patch_replaces_subtasks_when_non_empty() {
        let mut task = Task::new("Write report");
        task.subtasks = vec![Subtask::new("outline")];
        let patch = TaskPatch {
            subtasks: Some(vec![Subtask::new("outline"), Subtask::new("review")]),
            ..Default::default()
        };
        task.apply_patch(&patch);
        assert_eq!(task.subtasks.len(), 2);
    }

    #[test]
    fn tags_are_a_set() {
        let mut task = Task::new("t");
        task.add_tag("user-added");
        task.add_tag("user-added");
        assert_eq!(task.tags, vec!["user-added".to_string()]);
    }
}
