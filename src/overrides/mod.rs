pub mod store;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::change_request::ChangeRequest;
use crate::core::task::{Column, ColumnTarget, Task, TaskPatch};

/// The single placement state a task can be overridden into.
///
/// One tagged value per task: a later move replaces a completion override
/// and vice versa, so placement intent can never disagree with itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Unset,
    MovedTo(ColumnTarget),
    Completed(bool),
}

/// Everything locally known about one task id, layered over the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOverride {
    #[serde(default)]
    pub placement: Placement,
    /// Field edits; orthogonal to placement and kept across placement changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<TaskPatch>,
}

impl TaskOverride {
    pub fn is_empty(&self) -> bool {
        self.placement == Placement::Unset && self.patch.is_none()
    }
}

/// Manual ordering for one `(project, column)` pair. Tasks listed here sort
/// by list position; tasks absent from the list sort after all listed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOverride {
    pub project_id: String,
    pub column: Column,
    pub ids: Vec<String>,
}

/// A task created locally and not yet observed in any snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTask {
    pub task: Task,
    /// None places the task in the loose top-level todo list.
    pub project_id: Option<String>,
    pub target: ColumnTarget,
}

/// In-memory view of every persisted override kind; what the reconciler reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    pub tasks: HashMap<String, TaskOverride>,
    pub orders: Vec<OrderOverride>,
    pub local_tasks: Vec<LocalTask>,
    pub reminders: HashMap<String, DateTime<Utc>>,
    /// Change requests submitted from this instance, kept until the
    /// snapshot carries them.
    pub change_requests: Vec<ChangeRequest>,
}

impl OverrideSet {
    pub fn task(&self, task_id: &str) -> Option<&TaskOverride> {
        self.tasks.get(task_id)
    }

    pub fn order_for(&self, project_id: &str, column: Column) -> Option<&[String]> {
        self.orders
            .iter()
            .find(|o| o.project_id == project_id && o.column == column)
            .map(|o| o.ids.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.orders.is_empty()
            && self.local_tasks.is_empty()
            && self.reminders.is_empty()
            && self.change_requests.is_empty()
    }
}
