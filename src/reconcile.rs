//! The view projector: a pure function layering locally persisted overrides
//! on top of the last-fetched snapshot. No clock, no I/O: identical inputs
//! always project the identical board.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::change_request::ChangeRequest;
use crate::core::document::Document;
use crate::core::idea::Idea;
use crate::core::project::{Project, ProjectStatus};
use crate::core::task::{Column, ColumnTarget, Task};
use crate::core::today_plan::TodayPlan;
use crate::overrides::{OverrideSet, Placement};

/// Columns a task can render under. Canonical membership resolves
/// `done` > `upnext` > everything else as `todo`, so `in_progress` storage
/// folds into the todo view unless an override says otherwise.
pub const VIEW_COLUMNS: [Column; 3] = [Column::Todo, Column::Upnext, Column::Done];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    pub status: ProjectStatus,
    pub columns: BTreeMap<Column, Vec<Task>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub projects: Vec<ProjectView>,
    pub todos: Vec<Task>,
    pub ideas: Vec<Idea>,
    pub change_requests: Vec<ChangeRequest>,
    pub today_plan: Option<TodayPlan>,
    pub last_updated: DateTime<Utc>,
}

/// Project the effective board from a snapshot and the override set.
pub fn project_view(doc: &Document, overrides: &OverrideSet) -> BoardView {
    let projects = doc
        .projects
        .iter()
        .map(|p| project_columns(p, doc, overrides))
        .collect();

    // Loose todos: canonical list plus locally created loose tasks the
    // snapshot does not carry yet, with field edits applied.
    let mut todos: Vec<Task> = doc
        .todos
        .iter()
        .map(|t| patched(t, overrides))
        .collect();
    for local in &overrides.local_tasks {
        if local.project_id.is_none() && !doc.contains_task(&local.task.id) {
            todos.push(patched(&local.task, overrides));
        }
    }

    // Pending change requests: document union local cache, document wins
    // on duplicate ids (a cancelled one drops its cached copy).
    let mut change_requests: Vec<ChangeRequest> = doc.change_requests.clone();
    let seen: HashSet<&str> = doc.change_requests.iter().map(|r| r.id.as_str()).collect();
    for cached in &overrides.change_requests {
        if !seen.contains(cached.id.as_str()) {
            change_requests.push(cached.clone());
        }
    }
    change_requests.retain(|r| r.is_pending());

    BoardView {
        projects,
        todos,
        ideas: doc.ideas.clone(),
        change_requests,
        today_plan: doc.today_plan.clone(),
        last_updated: doc.last_updated,
    }
}

/// Effective column for one task, by priority:
/// 1. explicit placement override (move wins, assignee lands in upnext);
/// 2. completion override (true forces done, false reopens done into todo);
/// 3. canonical membership.
fn effective_column(canonical: Column, placement: &Placement) -> Column {
    match placement {
        Placement::MovedTo(target) => fold(target.storage_column()),
        Placement::Completed(true) => Column::Done,
        Placement::Completed(false) => {
            if canonical == Column::Done {
                Column::Todo
            } else {
                fold(canonical)
            }
        }
        Placement::Unset => fold(canonical),
    }
}

/// Collapse storage columns onto the three view columns.
fn fold(column: Column) -> Column {
    match column {
        Column::Done => Column::Done,
        Column::Upnext => Column::Upnext,
        Column::Todo | Column::InProgress => Column::Todo,
    }
}

fn patched(task: &Task, overrides: &OverrideSet) -> Task {
    let mut task = task.clone();
    if let Some(ov) = overrides.task(&task.id) {
        if let Some(ref patch) = ov.patch {
            task.apply_patch(patch);
        }
        if let Placement::MovedTo(ColumnTarget::Assignee(ref name)) = ov.placement {
            task.assignee = Some(name.clone());
        }
    }
    task
}

fn project_columns(project: &Project, doc: &Document, overrides: &OverrideSet) -> ProjectView {
    let mut columns: BTreeMap<Column, Vec<Task>> =
        VIEW_COLUMNS.iter().map(|c| (*c, Vec::new())).collect();

    // Canonical membership precedence done > upnext > todo: scan in that
    // order and keep the first sighting of each id.
    let mut seen: HashSet<&str> = HashSet::new();
    let scan = [
        Column::Done,
        Column::Upnext,
        Column::Todo,
        Column::InProgress,
    ];
    let mut members: Vec<(&Task, Column)> = Vec::new();
    for col in scan {
        for task in project.column(col) {
            if seen.insert(task.id.as_str()) {
                members.push((task, col));
            }
        }
    }
    // Keep the view in array order, not scan order.
    members.sort_by_key(|(task, col)| {
        let idx = project
            .column(*col)
            .iter()
            .position(|t| t.id == task.id)
            .unwrap_or(usize::MAX);
        (*col, idx)
    });

    for (task, canonical) in members {
        let placement = overrides
            .task(&task.id)
            .map(|ov| ov.placement.clone())
            .unwrap_or_default();
        let col = effective_column(canonical, &placement);
        columns.entry(col).or_default().push(patched(task, overrides));
    }

    // Locally created tasks land in their target column until a snapshot
    // carries the same id.
    for local in &overrides.local_tasks {
        if local.project_id.as_deref() != Some(project.id.as_str())
            || doc.contains_task(&local.task.id)
        {
            continue;
        }
        let mut task = local.task.clone();
        if let ColumnTarget::Assignee(ref name) = local.target {
            task.assignee = Some(name.clone());
        }
        let placement = overrides
            .task(&task.id)
            .map(|ov| ov.placement.clone())
            .unwrap_or_default();
        let col = effective_column(local.target.storage_column(), &placement);
        columns.entry(col).or_default().push(patched(&task, overrides));
    }

    for (col, tasks) in columns.iter_mut() {
        order_column(project, *col, tasks, overrides);
    }

    ProjectView {
        id: project.id.clone(),
        name: project.name.clone(),
        description: project.description.clone(),
        color: project.color.clone(),
        icon: project.icon.clone(),
        status: project.status,
        columns,
    }
}

/// Manual order wins when present: listed ids sort by list position and
/// unlisted tasks come after all listed ones in their original relative
/// order. Otherwise a stable priority sort, except done, which keeps
/// arrival order.
fn order_column(project: &Project, column: Column, tasks: &mut [Task], overrides: &OverrideSet) {
    if let Some(order) = overrides.order_for(&project.id, column) {
        tasks.sort_by_key(|t| {
            order
                .iter()
                .position(|id| *id == t.id)
                .unwrap_or(usize::MAX)
        });
    } else if column != Column::Done {
        tasks.sort_by_key(|t| t.priority.rank());
    }
}
