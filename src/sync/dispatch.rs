use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use super::api::ApiClient;
use crate::core::change_request::ChangeRequest;
use crate::core::idea::{IdeaPatch, client_idea_id};
use crate::core::task::{Column, ColumnTarget, Subtask, Task, TaskPatch};
use crate::error::SyncError;
use crate::mutate::{NewIdea, NewTask, SubtaskAction};
use crate::overrides::store::OverrideStore;
use crate::overrides::{LocalTask, Placement};

/// A user action as the dispatcher consumes it. Every variant first lands
/// in the override store; variants with a remote counterpart then race an
/// independent request to the server.
#[derive(Debug, Clone)]
pub enum UserAction {
    ToggleCompletion {
        task_id: String,
        project_id: Option<String>,
        completed: bool,
    },
    Move {
        task_id: String,
        project_id: String,
        target: ColumnTarget,
    },
    Edit {
        task_id: String,
        project_id: Option<String>,
        patch: TaskPatch,
    },
    AddTask {
        task: Task,
        project_id: Option<String>,
        target: ColumnTarget,
    },
    Subtask {
        task_id: String,
        project_id: Option<String>,
        action: SubtaskAction,
        /// The post-action subtask list, for instant local feedback.
        updated: Vec<Subtask>,
    },
    AddIdea {
        idea: NewIdea,
    },
    DeleteIdea {
        id: String,
    },
    EditIdea {
        id: String,
        patch: IdeaPatch,
    },
    SubmitChangeRequest {
        request: ChangeRequest,
    },
    CancelChangeRequest {
        id: String,
    },
    /// Manual column ordering. Local-only: there is no remote counterpart.
    Reorder {
        project_id: String,
        column: Column,
        ids: Vec<String>,
    },
    /// Reminders are local-only as well.
    SetReminder {
        task_id: String,
        at: DateTime<Utc>,
    },
    ClearReminder {
        task_id: String,
    },
}

impl UserAction {
    pub fn submit_change_request(text: impl Into<String>) -> Self {
        Self::SubmitChangeRequest {
            request: ChangeRequest::new(text),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::ToggleCompletion { task_id, completed, .. } => {
                format!("complete {task_id}={completed}")
            }
            Self::Move { task_id, target, .. } => {
                format!("move {task_id} to {}", target.label())
            }
            Self::Edit { task_id, .. } => format!("edit {task_id}"),
            Self::AddTask { task, .. } => format!("add task {}", task.id),
            Self::Subtask { task_id, .. } => format!("subtask on {task_id}"),
            Self::AddIdea { idea } => format!("add idea {}", idea.title),
            Self::DeleteIdea { id } => format!("delete idea {id}"),
            Self::EditIdea { id, .. } => format!("edit idea {id}"),
            Self::SubmitChangeRequest { request } => {
                format!("change request {}", request.id)
            }
            Self::CancelChangeRequest { id } => format!("cancel change request {id}"),
            Self::Reorder { project_id, column, .. } => {
                format!("reorder {project_id}/{}", column.as_str())
            }
            Self::SetReminder { task_id, .. } => format!("remind {task_id}"),
            Self::ClearReminder { task_id } => format!("clear reminder {task_id}"),
        }
    }

    fn is_local_only(&self) -> bool {
        matches!(
            self,
            Self::Reorder { .. } | Self::SetReminder { .. } | Self::ClearReminder { .. }
        )
    }

    /// Add paths surface "saved locally, sync pending" when the push fails.
    fn is_add(&self) -> bool {
        matches!(self, Self::AddTask { .. } | Self::AddIdea { .. })
    }
}

/// Explicit result of one dispatched mutation, delivered on the ticket.
#[derive(Debug)]
pub struct MutationOutcome {
    pub label: String,
    pub attempts: u32,
    pub result: Result<(), SyncError>,
    /// True when local intent is preserved and still awaiting sync.
    pub pending_local: bool,
}

pub struct DispatchTicket {
    pub outcome: oneshot::Receiver<MutationOutcome>,
}

/// Turns user actions into an immediate override write plus an asynchronous,
/// un-deduplicated remote request. Two rapid edits to the same task race at
/// the store; the local override already reflects this instance's final
/// intent, so only other viewers depend on which write lands last.
pub struct MutationDispatcher {
    api: Arc<ApiClient>,
    overrides: Arc<Mutex<OverrideStore>>,
    push_attempts: u32,
    push_backoff: Duration,
}

impl MutationDispatcher {
    pub fn new(
        api: Arc<ApiClient>,
        overrides: Arc<Mutex<OverrideStore>>,
        push_attempts: u32,
        push_backoff: Duration,
    ) -> Self {
        Self {
            api,
            overrides,
            push_attempts: push_attempts.max(1),
            push_backoff,
        }
    }

    /// Synchronously record the action in the override store, then push it
    /// to the server in its own task. The ticket resolves with the final
    /// outcome after bounded retries; the override is never cleared on
    /// success (the next snapshot supersedes it) nor on failure (local
    /// intent persists).
    pub fn dispatch(&self, mut action: UserAction) -> DispatchTicket {
        // Ids are assigned before the first send so retries and later
        // snapshots refer to the same entity.
        if let UserAction::AddIdea { ref mut idea } = action {
            if idea.id.is_none() {
                idea.id = Some(client_idea_id());
            }
        }

        {
            let mut store = lock_overrides(&self.overrides);
            apply_local(&mut store, &action);
        }

        let (tx, rx) = oneshot::channel();
        let label = action.label();

        if action.is_local_only() {
            let _ = tx.send(MutationOutcome {
                label,
                attempts: 0,
                result: Ok(()),
                pending_local: false,
            });
            return DispatchTicket { outcome: rx };
        }

        let api = self.api.clone();
        let attempts_max = self.push_attempts;
        let backoff = self.push_backoff;
        tokio::spawn(async move {
            let mut attempt = 0;
            let result = loop {
                attempt += 1;
                match send_remote(&api, &action).await {
                    Ok(()) => break Ok(()),
                    Err(e) if e.is_retryable() && attempt < attempts_max => {
                        let delay = backoff * 2u32.saturating_pow(attempt - 1);
                        log::warn!(
                            "Push failed ({e}), retrying {label} in {delay:?} \
                             (attempt {attempt}/{attempts_max})"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => break Err(e),
                }
            };

            match result {
                Ok(()) => log::info!("Pushed {label} after {attempt} attempt(s)"),
                Err(ref e) => log::error!("Giving up on {label}: {e} (override retained)"),
            }
            let _ = tx.send(MutationOutcome {
                label,
                attempts: attempt,
                pending_local: result.is_err() && action.is_add(),
                result,
            });
        });

        DispatchTicket { outcome: rx }
    }
}

fn lock_overrides(overrides: &Mutex<OverrideStore>) -> std::sync::MutexGuard<'_, OverrideStore> {
    match overrides.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Step one of the dispatch contract: the next reconcile pass must reflect
/// intent with no perceptible latency.
fn apply_local(store: &mut OverrideStore, action: &UserAction) {
    match action {
        UserAction::ToggleCompletion { task_id, completed, .. } => {
            store.set_placement(task_id, Placement::Completed(*completed));
        }
        UserAction::Move { task_id, target, .. } => {
            store.set_placement(task_id, Placement::MovedTo(target.clone()));
        }
        UserAction::Edit { task_id, patch, .. } => {
            store.merge_patch(task_id, patch);
        }
        UserAction::AddTask { task, project_id, target } => {
            store.add_local_task(LocalTask {
                task: task.clone(),
                project_id: project_id.clone(),
                target: target.clone(),
            });
        }
        UserAction::Subtask { task_id, updated, .. } => {
            store.merge_patch(
                task_id,
                &TaskPatch {
                    subtasks: Some(updated.clone()),
                    ..Default::default()
                },
            );
        }
        UserAction::SubmitChangeRequest { request } => {
            store.cache_change_request(request.clone());
        }
        UserAction::CancelChangeRequest { id } => {
            store.remove_change_request(id);
        }
        UserAction::Reorder { project_id, column, ids } => {
            store.set_order(project_id, *column, ids.clone());
        }
        UserAction::SetReminder { task_id, at } => {
            store.set_reminder(task_id, *at);
        }
        UserAction::ClearReminder { task_id } => {
            store.clear_reminder(task_id);
        }
        // Ideas have no persisted override kind; their outcome ticket is
        // the only local signal.
        UserAction::AddIdea { .. } | UserAction::DeleteIdea { .. } | UserAction::EditIdea { .. } => {}
    }
}

async fn send_remote(api: &ApiClient, action: &UserAction) -> Result<(), SyncError> {
    match action {
        UserAction::ToggleCompletion { task_id, project_id, completed } => {
            api.set_completion(task_id, project_id.as_deref(), *completed).await
        }
        UserAction::Move { task_id, project_id, target } => {
            api.move_task(task_id, project_id, target.label()).await
        }
        UserAction::Edit { task_id, project_id, patch } => {
            api.edit_task(task_id, project_id.as_deref(), patch).await
        }
        UserAction::AddTask { task, project_id, target } => {
            let new = NewTask {
                id: Some(task.id.clone()),
                title: task.title.clone(),
                description: task.description.clone(),
                priority: Some(task.priority),
                tags: task.tags.clone(),
                assignee: task.assignee.clone(),
                due_date: task.due_date,
                created_at: Some(task.created_at),
            };
            api.add_task(&new, project_id.as_deref(), target.label()).await
        }
        UserAction::Subtask { task_id, project_id, action, .. } => {
            api.mutate_subtask(task_id, project_id.as_deref(), action).await
        }
        UserAction::AddIdea { idea } => api.add_idea(idea).await,
        UserAction::DeleteIdea { id } => api.delete_idea(id).await,
        UserAction::EditIdea { id, patch } => api.edit_idea(id, patch).await,
        UserAction::SubmitChangeRequest { request } => {
            api.submit_change_request(&request.text, &request.id).await
        }
        UserAction::CancelChangeRequest { id } => api.cancel_change_request(id).await,
        UserAction::Reorder { .. }
        | UserAction::SetReminder { .. }
        | UserAction::ClearReminder { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points at a closed port: every push fails fast with a network error.
    fn make_dispatcher(dir: &std::path::Path) -> (MutationDispatcher, Arc<Mutex<OverrideStore>>) {
        let api = Arc::new(ApiClient::new("http://127.0.0.1:9").unwrap());
        let overrides = Arc::new(Mutex::new(OverrideStore::open(dir)));
        let dispatcher =
            MutationDispatcher::new(api, overrides.clone(), 2, Duration::from_millis(1));
        (dispatcher, overrides)
    }

    #[tokio::test]
    async fn override_written_synchronously_and_kept_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (dispatcher, overrides) = make_dispatcher(dir.path());

        let ticket = dispatcher.dispatch(UserAction::ToggleCompletion {
            task_id: "t1".into(),
            project_id: Some("p1".into()),
            completed: true,
        });

        // The override is visible before the push settles.
        {
            let store = lock_overrides(&overrides);
            assert_eq!(
                store.snapshot().task("t1").unwrap().placement,
                Placement::Completed(true)
            );
        }

        let outcome = ticket.outcome.await.unwrap();
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 2, "network failures retry up to the bound");
        assert!(!outcome.pending_local);

        // Failure never rolls the override back.
        let store = lock_overrides(&overrides);
        assert_eq!(
            store.snapshot().task("t1").unwrap().placement,
            Placement::Completed(true)
        );
    }

    #[tokio::test]
    async fn local_only_actions_resolve_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (dispatcher, overrides) = make_dispatcher(dir.path());

        let ticket = dispatcher.dispatch(UserAction::Reorder {
            project_id: "p1".into(),
            column: Column::Todo,
            ids: vec!["id3".into(), "id1".into()],
        });
        let outcome = ticket.outcome.await.unwrap();
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts, 0);

        let store = lock_overrides(&overrides);
        assert_eq!(
            store.snapshot().order_for("p1", Column::Todo),
            Some(&["id3".to_string(), "id1".to_string()][..])
        );
    }

    #[tokio::test]
    async fn failed_add_reports_pending_local() {
        let dir = tempfile::tempdir().unwrap();
        let (dispatcher, overrides) = make_dispatcher(dir.path());

        let task = Task::new("offline add");
        let task_id = task.id.clone();
        let ticket = dispatcher.dispatch(UserAction::AddTask {
            task,
            project_id: Some("p1".into()),
            target: ColumnTarget::parse("todo"),
        });

        let outcome = ticket.outcome.await.unwrap();
        assert!(outcome.result.is_err());
        assert!(outcome.pending_local, "add paths surface sync-pending");

        let store = lock_overrides(&overrides);
        assert!(
            store
                .snapshot()
                .local_tasks
                .iter()
                .any(|l| l.task.id == task_id)
        );
    }

    #[tokio::test]
    async fn misconfiguration_is_not_retried() {
        // A bad URL scheme fails in reqwest as a builder error → Network,
        // so instead check the retry gate directly.
        assert!(!SyncError::Misconfiguration("no token".into()).is_retryable());
        assert!(!SyncError::NotFound("t1".into()).is_retryable());
        assert!(!SyncError::Invalid("bad".into()).is_retryable());
    }
}
