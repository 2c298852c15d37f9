use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::change_request::ChangeRequest;
use crate::core::task::{Column, TaskPatch};
use crate::overrides::{LocalTask, OrderOverride, OverrideSet, Placement, TaskOverride};

const TASK_OVERRIDES_FILE: &str = "task_overrides.json";
const COLUMN_ORDERS_FILE: &str = "column_orders.json";
const LOCAL_TASKS_FILE: &str = "local_tasks.json";
const REMINDERS_FILE: &str = "reminders.json";
const CHANGE_REQUESTS_FILE: &str = "change_requests.json";

/// File-backed override store: one JSON file per override kind under the
/// data dir, written through on every mutation so intent survives restart.
///
/// No cross-process coordination is provided; concurrent writers to the
/// same file are last-write-wins.
pub struct OverrideStore {
    dir: PathBuf,
    data: OverrideSet,
}

impl OverrideStore {
    /// Open the store, creating the directory and loading whatever override
    /// files already exist. Unreadable or corrupt files load as empty.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::error!("Failed to create override dir {}: {}", dir.display(), e);
        }
        let data = OverrideSet {
            tasks: load_file(&dir.join(TASK_OVERRIDES_FILE)),
            orders: load_file(&dir.join(COLUMN_ORDERS_FILE)),
            local_tasks: load_file(&dir.join(LOCAL_TASKS_FILE)),
            reminders: load_file(&dir.join(REMINDERS_FILE)),
            change_requests: load_file(&dir.join(CHANGE_REQUESTS_FILE)),
        };
        log::debug!(
            "Override store opened: {} task overrides, {} orders, {} local tasks",
            data.tasks.len(),
            data.orders.len(),
            data.local_tasks.len()
        );
        Self { dir, data }
    }

    /// The current override set, as the reconciler consumes it.
    pub fn snapshot(&self) -> &OverrideSet {
        &self.data
    }

    // ── per-task overrides ─────────────────────────────────────────────

    /// Replace the placement for a task, keeping any field patch.
    pub fn set_placement(&mut self, task_id: &str, placement: Placement) {
        self.data.tasks.entry(task_id.to_string()).or_default().placement = placement;
        self.save_tasks();
    }

    /// Fold an edit into the task's patch, keeping any placement.
    pub fn merge_patch(&mut self, task_id: &str, patch: &TaskPatch) {
        let entry = self.data.tasks.entry(task_id.to_string()).or_default();
        match entry.patch {
            Some(ref mut existing) => existing.merge(patch),
            None => entry.patch = Some(patch.clone()),
        }
        self.save_tasks();
    }

    pub fn clear_task(&mut self, task_id: &str) {
        if self.data.tasks.remove(task_id).is_some() {
            self.save_tasks();
        }
    }

    // ── manual ordering ────────────────────────────────────────────────

    pub fn set_order(&mut self, project_id: &str, column: Column, ids: Vec<String>) {
        if let Some(existing) = self
            .data
            .orders
            .iter_mut()
            .find(|o| o.project_id == project_id && o.column == column)
        {
            existing.ids = ids;
        } else {
            self.data.orders.push(OrderOverride {
                project_id: project_id.to_string(),
                column,
                ids,
            });
        }
        self.save_orders();
    }

    pub fn clear_order(&mut self, project_id: &str, column: Column) {
        let before = self.data.orders.len();
        self.data
            .orders
            .retain(|o| !(o.project_id == project_id && o.column == column));
        if self.data.orders.len() != before {
            self.save_orders();
        }
    }

    // ── locally created tasks ──────────────────────────────────────────

    pub fn add_local_task(&mut self, local: LocalTask) {
        // Same id re-added replaces the earlier record.
        self.data.local_tasks.retain(|l| l.task.id != local.task.id);
        self.data.local_tasks.push(local);
        self.save_local_tasks();
    }

    pub fn remove_local_task(&mut self, task_id: &str) {
        let before = self.data.local_tasks.len();
        self.data.local_tasks.retain(|l| l.task.id != task_id);
        if self.data.local_tasks.len() != before {
            self.save_local_tasks();
        }
    }

    // ── reminders ──────────────────────────────────────────────────────

    pub fn set_reminder(&mut self, task_id: &str, at: DateTime<Utc>) {
        self.data.reminders.insert(task_id.to_string(), at);
        self.save_reminders();
    }

    pub fn clear_reminder(&mut self, task_id: &str) {
        if self.data.reminders.remove(task_id).is_some() {
            self.save_reminders();
        }
    }

    // ── cached change requests ─────────────────────────────────────────

    pub fn cache_change_request(&mut self, request: ChangeRequest) {
        self.data.change_requests.retain(|r| r.id != request.id);
        self.data.change_requests.push(request);
        self.save_change_requests();
    }

    pub fn remove_change_request(&mut self, id: &str) {
        let before = self.data.change_requests.len();
        self.data.change_requests.retain(|r| r.id != id);
        if self.data.change_requests.len() != before {
            self.save_change_requests();
        }
    }

    // ── persistence ────────────────────────────────────────────────────

    fn save_tasks(&self) {
        // Fully empty records are dropped rather than persisted.
        let pruned: HashMap<&String, &TaskOverride> = self
            .data
            .tasks
            .iter()
            .filter(|(_, o)| !o.is_empty())
            .collect();
        save_file(&self.dir.join(TASK_OVERRIDES_FILE), &pruned);
    }

    fn save_orders(&self) {
        save_file(&self.dir.join(COLUMN_ORDERS_FILE), &self.data.orders);
    }

    fn save_local_tasks(&self) {
        save_file(&self.dir.join(LOCAL_TASKS_FILE), &self.data.local_tasks);
    }

    fn save_reminders(&self) {
        save_file(&self.dir.join(REMINDERS_FILE), &self.data.reminders);
    }

    fn save_change_requests(&self) {
        save_file(&self.dir.join(CHANGE_REQUESTS_FILE), &self.data.change_requests);
    }
}

fn load_file<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => T::default(),
    }
}

fn save_file<T: Serialize>(path: &Path, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                log::error!("Failed to save {}: {}", path.display(), e);
            }
        }
        Err(e) => log::error!("Failed to serialize {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{ColumnTarget, Task};

    #[test]
    fn overrides_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = OverrideStore::open(dir.path());
        store.set_placement("t1", Placement::Completed(true));
        store.merge_patch(
            "t1",
            &TaskPatch {
                title: Some("renamed".into()),
                ..Default::default()
            },
        );
        store.set_order("p1", Column::Todo, vec!["t3".into(), "t1".into()]);
        store.add_local_task(LocalTask {
            task: Task::new("local"),
            project_id: Some("p1".into()),
            target: ColumnTarget::parse("todo"),
        });
        drop(store);

        let store = OverrideStore::open(dir.path());
        let ov = store.snapshot().task("t1").unwrap();
        assert_eq!(ov.placement, Placement::Completed(true));
        assert_eq!(ov.patch.as_ref().unwrap().title.as_deref(), Some("renamed"));
        assert_eq!(
            store.snapshot().order_for("p1", Column::Todo),
            Some(&["t3".to_string(), "t1".to_string()][..])
        );
        assert_eq!(store.snapshot().local_tasks.len(), 1);
    }

    #[test]
    fn placement_replaces_but_patch_survives() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = OverrideStore::open(dir.path());

        store.merge_patch(
            "t1",
            &TaskPatch {
                title: Some("edited".into()),
                ..Default::default()
            },
        );
        store.set_placement("t1", Placement::Completed(true));
        // A later move replaces the completion override outright.
        store.set_placement("t1", Placement::MovedTo(ColumnTarget::parse("mordy")));

        let ov = store.snapshot().task("t1").unwrap();
        assert_eq!(
            ov.placement,
            Placement::MovedTo(ColumnTarget::Assignee("mordy".into()))
        );
        assert_eq!(ov.patch.as_ref().unwrap().title.as_deref(), Some("edited"));
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TASK_OVERRIDES_FILE), "{not json").unwrap();
        let store = OverrideStore::open(dir.path());
        assert!(store.snapshot().tasks.is_empty());
    }

    #[test]
    fn last_write_wins_on_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = OverrideStore::open(dir.path());
        store.set_order("p1", Column::Todo, vec!["a".into()]);
        store.set_order("p1", Column::Todo, vec!["b".into()]);
        assert_eq!(
            store.snapshot().order_for("p1", Column::Todo),
            Some(&["b".to_string()][..])
        );
        assert_eq!(store.snapshot().orders.len(), 1);
    }
}
