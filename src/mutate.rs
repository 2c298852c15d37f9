//! Server-side mutation engine: every operation is one optimistic
//! read-modify-write cycle against the document store. A stale revision
//! token re-runs the whole cycle (re-read, reapply) a bounded number of
//! times before `Conflict` reaches the caller.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::change_request::{ChangeRequest, ChangeRequestStatus, client_change_request_id};
use crate::core::document::{Document, TaskLocation};
use crate::core::idea::{Idea, IdeaPatch, client_idea_id};
use crate::core::task::{Column, ColumnTarget, Subtask, Task, TaskPatch, client_task_id};
use crate::core::today_plan;
use crate::error::SyncError;
use crate::store::DocumentStore;

/// Fields accepted when creating a task. Everything else is stamped
/// server-side.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<crate::core::task::Priority>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields accepted when creating an idea.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdea {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubtask {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "subtaskAction",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SubtaskAction {
    Add { subtask: NewSubtask },
    Toggle { subtask_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub task_id: String,
    pub from: Column,
    pub to: Column,
}

/// What one apply pass asks the commit loop to do.
enum Commit<T> {
    /// Write the modified document with this commit message.
    Write(T, String),
    /// Nothing changed; skip the write entirely.
    Skip(T),
}

pub struct DocumentMutator {
    store: Arc<dyn DocumentStore>,
    write_attempts: u32,
}

impl DocumentMutator {
    pub fn new(store: Arc<dyn DocumentStore>, write_attempts: u32) -> Self {
        Self {
            store,
            write_attempts: write_attempts.max(1),
        }
    }

    /// Read the current document without the mutation cycle.
    pub async fn current_document(&self) -> Result<Document, SyncError> {
        let (text, _) = self.store.read().await?;
        serde_json::from_str(&text).map_err(|e| SyncError::Parse(format!("document JSON: {e}")))
    }

    /// One optimistic read-modify-write cycle, re-run on `Conflict` up to
    /// the attempt bound. `apply` must be deterministic across re-runs.
    async fn commit<T, F>(&self, apply: F) -> Result<T, SyncError>
    where
        F: Fn(&mut Document) -> Result<Commit<T>, SyncError>,
    {
        let mut attempt = 1;
        loop {
            let (text, token) = self.store.read().await?;
            let mut doc: Document = serde_json::from_str(&text)
                .map_err(|e| SyncError::Parse(format!("document JSON: {e}")))?;

            let (value, message) = match apply(&mut doc)? {
                Commit::Write(value, message) => (value, message),
                Commit::Skip(value) => return Ok(value),
            };

            doc.touch(Utc::now());
            let updated = serde_json::to_string_pretty(&doc)
                .map_err(|e| SyncError::Parse(format!("document JSON: {e}")))?;

            match self.store.write(&updated, &token, &message).await {
                Ok(_) => {
                    log::info!("Committed: {message}");
                    return Ok(value);
                }
                Err(SyncError::Conflict) if attempt < self.write_attempts => {
                    attempt += 1;
                    log::warn!(
                        "Stale revision token, re-reading (attempt {attempt}/{})",
                        self.write_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ── task operations ────────────────────────────────────────────────

    pub async fn add_task(
        &self,
        new: NewTask,
        project_id: Option<&str>,
        target: &ColumnTarget,
    ) -> Result<Task, SyncError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(SyncError::Invalid("missing task title".into()));
        }

        // Stamp everything outside the apply closure so a conflict re-run
        // commits the identical task.
        let mut task = Task {
            id: new.id.clone().unwrap_or_else(client_task_id),
            title,
            description: new
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            priority: new.priority.unwrap_or_default(),
            tags: new.tags.clone(),
            assignee: new.assignee.clone(),
            due_date: new.due_date,
            subtasks: Vec::new(),
            created_at: new.created_at.unwrap_or_else(Utc::now),
            completed_at: None,
            reminder: None,
        };
        task.add_tag("user-added");
        if let ColumnTarget::Assignee(name) = target {
            task.assignee = Some(name.clone());
        }

        let project_id = project_id.map(str::to_string);
        let target = target.clone();
        self.commit(move |doc| {
            let task = task.clone();
            let message = format!("Add task: {}", task.title);
            match project_id {
                Some(ref pid) => {
                    let project = doc
                        .project_mut(pid)
                        .ok_or_else(|| SyncError::NotFound(format!("project {pid}")))?;
                    project.column_mut(target.storage_column()).push(task.clone());
                }
                None => doc.todos.push(task.clone()),
            }
            Ok(Commit::Write(task, message))
        })
        .await
    }

    pub async fn move_task(
        &self,
        task_id: &str,
        project_id: &str,
        target: &ColumnTarget,
    ) -> Result<MoveOutcome, SyncError> {
        let task_id = task_id.to_string();
        let project_id = project_id.to_string();
        let target = target.clone();
        self.commit(move |doc| {
            let project = doc
                .project_mut(&project_id)
                .ok_or_else(|| SyncError::NotFound(format!("project {project_id}")))?;
            let (from, _, _) = project
                .find_task(&task_id)
                .ok_or_else(|| SyncError::NotFound(format!("task {task_id}")))?;
            let Some(mut task) = project.remove_task(&task_id) else {
                return Err(SyncError::NotFound(format!("task {task_id}")));
            };

            if let ColumnTarget::Assignee(ref name) = target {
                task.assignee = Some(name.clone());
            }
            let to = target.storage_column();
            let message = format!("Move task \"{}\" to {}", task.title, target.label());
            project.column_mut(to).push(task);

            Ok(Commit::Write(
                MoveOutcome {
                    task_id: task_id.clone(),
                    from,
                    to,
                },
                message,
            ))
        })
        .await
    }

    pub async fn set_completion(&self, task_id: &str, completed: bool) -> Result<bool, SyncError> {
        let task_id = task_id.to_string();
        let now = Utc::now();
        self.commit(move |doc| {
            let loc = doc
                .locate_task(&task_id)
                .ok_or_else(|| SyncError::NotFound(format!("task {task_id}")))?;

            match loc {
                TaskLocation::Loose(_) => {
                    let task = doc.get_task_mut(&loc);
                    task.completed_at = if completed { Some(now) } else { None };
                    let message = format!(
                        "{} task: {}",
                        if completed { "Complete" } else { "Reopen" },
                        task.title
                    );
                    Ok(Commit::Write(completed, message))
                }
                TaskLocation::Project(pi, _, _) => {
                    let project = &mut doc.projects[pi];
                    let Some(mut task) = project.remove_task(&task_id) else {
                        return Err(SyncError::NotFound(format!("task {task_id}")));
                    };
                    let message = format!(
                        "{} task: {}",
                        if completed { "Complete" } else { "Reopen" },
                        task.title
                    );
                    if completed {
                        task.completed_at = Some(now);
                        project.column_mut(Column::Done).push(task);
                    } else {
                        task.completed_at = None;
                        project.column_mut(Column::Todo).push(task);
                    }
                    Ok(Commit::Write(completed, message))
                }
            }
        })
        .await
    }

    pub async fn edit_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, SyncError> {
        if patch.is_empty() {
            return Err(SyncError::Invalid("empty update".into()));
        }
        let task_id = task_id.to_string();
        let patch = patch.clone();
        self.commit(move |doc| {
            let loc = doc
                .locate_task(&task_id)
                .ok_or_else(|| SyncError::NotFound(format!("task {task_id}")))?;
            let task = doc.get_task_mut(&loc);
            task.apply_patch(&patch);
            let message = format!("Edit task: {}", task.title);
            Ok(Commit::Write(task.clone(), message))
        })
        .await
    }

    pub async fn mutate_subtask(
        &self,
        task_id: &str,
        action: &SubtaskAction,
    ) -> Result<(), SyncError> {
        enum Prepared {
            Add(Subtask),
            Toggle(String),
        }

        // Pre-build the subtask so retries keep a stable id.
        let prepared = match action {
            SubtaskAction::Add { subtask } => {
                let title = subtask.title.trim();
                if title.is_empty() {
                    return Err(SyncError::Invalid("missing subtask title".into()));
                }
                Prepared::Add(Subtask::new(title))
            }
            SubtaskAction::Toggle { subtask_id } => Prepared::Toggle(subtask_id.clone()),
        };

        let task_id = task_id.to_string();
        self.commit(move |doc| {
            let loc = doc
                .locate_task(&task_id)
                .ok_or_else(|| SyncError::NotFound(format!("task {task_id}")))?;
            let task = doc.get_task_mut(&loc);
            let message = match prepared {
                Prepared::Add(ref subtask) => {
                    let message = format!("Add subtask to {}: {}", task.title, subtask.title);
                    task.subtasks.push(subtask.clone());
                    message
                }
                Prepared::Toggle(ref subtask_id) => {
                    let subtask = task
                        .subtasks
                        .iter_mut()
                        .find(|s| s.id == *subtask_id)
                        .ok_or_else(|| SyncError::NotFound(format!("subtask {subtask_id}")))?;
                    subtask.done = !subtask.done;
                    format!(
                        "{} subtask: {}",
                        if subtask.done { "Check" } else { "Uncheck" },
                        subtask.title
                    )
                }
            };
            Ok(Commit::Write((), message))
        })
        .await
    }

    // ── ideas ──────────────────────────────────────────────────────────

    pub async fn add_idea(&self, new: NewIdea) -> Result<Idea, SyncError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(SyncError::Invalid("missing idea title".into()));
        }
        let idea = Idea {
            id: new.id.clone().unwrap_or_else(client_idea_id),
            title,
            idea: new
                .idea
                .as_deref()
                .map(str::trim)
                .filter(|i| !i.is_empty())
                .map(str::to_string),
            tags: new.tags.clone(),
            created_at: new.created_at.unwrap_or_else(Utc::now),
        };

        self.commit(move |doc| {
            let idea = idea.clone();
            let message = format!("Add idea: {}", idea.title);
            doc.ideas.push(idea.clone());
            Ok(Commit::Write(idea, message))
        })
        .await
    }

    pub async fn delete_idea(&self, id: &str) -> Result<(), SyncError> {
        let id = id.to_string();
        self.commit(move |doc| {
            let before = doc.ideas.len();
            doc.ideas.retain(|i| i.id != id);
            if doc.ideas.len() == before {
                return Err(SyncError::NotFound(format!("idea {id}")));
            }
            Ok(Commit::Write((), format!("Delete idea: {id}")))
        })
        .await
    }

    pub async fn edit_idea(&self, id: &str, patch: &IdeaPatch) -> Result<Idea, SyncError> {
        let id = id.to_string();
        let patch = patch.clone();
        self.commit(move |doc| {
            let idea = doc
                .ideas
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| SyncError::NotFound(format!("idea {id}")))?;
            idea.apply_patch(&patch);
            let message = format!("Edit idea: {}", idea.title);
            Ok(Commit::Write(idea.clone(), message))
        })
        .await
    }

    // ── change requests ────────────────────────────────────────────────

    pub async fn submit_change_request(
        &self,
        text: &str,
        id: Option<String>,
    ) -> Result<String, SyncError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SyncError::Invalid("missing text".into()));
        }
        let request = ChangeRequest {
            id: id.unwrap_or_else(client_change_request_id),
            text,
            created_at: Utc::now(),
            status: ChangeRequestStatus::Pending,
            cancelled_at: None,
        };

        self.commit(move |doc| {
            let request = request.clone();
            let id = request.id.clone();
            let excerpt: String = request.text.chars().take(60).collect();
            doc.change_requests.push(request);
            Ok(Commit::Write(id, format!("Change request: {excerpt}")))
        })
        .await
    }

    pub async fn cancel_change_request(&self, id: &str) -> Result<(), SyncError> {
        let id = id.to_string();
        let now = Utc::now();
        self.commit(move |doc| {
            let request = doc
                .change_requests
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| SyncError::NotFound(format!("change request {id}")))?;
            request.status = ChangeRequestStatus::Cancelled;
            request.cancelled_at = Some(now);
            let excerpt: String = request.text.chars().take(50).collect();
            Ok(Commit::Write((), format!("Cancel change request: {excerpt}")))
        })
        .await
    }

    // ── today plan ─────────────────────────────────────────────────────

    /// Populate today's plan. Returns the number of planned tasks, or 0
    /// without writing when the plan for `today` is already populated.
    pub async fn populate_today(
        &self,
        today: NaiveDate,
        weights: &HashMap<String, u32>,
    ) -> Result<usize, SyncError> {
        let weights = weights.clone();
        let now = Utc::now();
        self.commit(move |doc| {
            match today_plan::populate_today(doc, today, &weights, now) {
                Some(plan) => {
                    let count = plan.tasks.len();
                    let message = format!("Populate today plan: {count} tasks for {today}");
                    doc.today_plan = Some(plan);
                    Ok(Commit::Write(count, message))
                }
                None => Ok(Commit::Skip(0)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::Project;
    use crate::store::{InMemoryStore, RevisionToken};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn seed_document() -> Document {
        let mut p = Project::new("p1", "Board");
        let mut t = Task::new("existing");
        t.id = "t1".to_string();
        p.column_mut(Column::Todo).push(t);
        let mut doc = Document::default();
        doc.projects.push(p);
        doc
    }

    fn seed_store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new(
            serde_json::to_string_pretty(&seed_document()).unwrap(),
        ))
    }

    async fn stored_document(store: &InMemoryStore) -> Document {
        serde_json::from_str(&store.current().await).unwrap()
    }

    #[tokio::test]
    async fn add_task_lands_in_project_column() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);

        let task = mutator
            .add_task(
                NewTask {
                    title: "  New thing  ".into(),
                    ..Default::default()
                },
                Some("p1"),
                &ColumnTarget::parse("todo"),
            )
            .await
            .unwrap();
        assert_eq!(task.title, "New thing");
        assert!(task.has_tag("user-added"));

        let doc = stored_document(&store).await;
        let todo = doc.projects[0].column(Column::Todo);
        assert_eq!(todo.len(), 2);
        assert_eq!(todo[1].id, task.id);
    }

    #[tokio::test]
    async fn add_task_without_project_goes_to_loose_todos() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);
        let task = mutator
            .add_task(
                NewTask {
                    title: "loose".into(),
                    ..Default::default()
                },
                None,
                &ColumnTarget::parse("todo"),
            )
            .await
            .unwrap();
        let doc = stored_document(&store).await;
        assert_eq!(doc.todos[0].id, task.id);
    }

    #[tokio::test]
    async fn add_task_with_assignee_target_lands_in_upnext() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);
        mutator
            .add_task(
                NewTask {
                    title: "delegated".into(),
                    ..Default::default()
                },
                Some("p1"),
                &ColumnTarget::parse("yaakov"),
            )
            .await
            .unwrap();
        let doc = stored_document(&store).await;
        let upnext = doc.projects[0].column(Column::Upnext);
        assert_eq!(upnext.len(), 1);
        assert_eq!(upnext[0].assignee.as_deref(), Some("yaakov"));
    }

    #[tokio::test]
    async fn add_task_rejects_blank_title() {
        let mutator = DocumentMutator::new(seed_store(), 3);
        let err = mutator
            .add_task(
                NewTask {
                    title: "   ".into(),
                    ..Default::default()
                },
                None,
                &ColumnTarget::parse("todo"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Invalid(_)));
    }

    #[tokio::test]
    async fn move_to_assignee_name_overloads_upnext() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);

        let outcome = mutator
            .move_task("t1", "p1", &ColumnTarget::parse("mordy"))
            .await
            .unwrap();
        assert_eq!(outcome.from, Column::Todo);
        assert_eq!(outcome.to, Column::Upnext);

        let doc = stored_document(&store).await;
        let upnext = doc.projects[0].column(Column::Upnext);
        assert_eq!(upnext.len(), 1);
        assert_eq!(upnext[0].assignee.as_deref(), Some("mordy"));
        assert!(doc.projects[0].column(Column::Todo).is_empty());
    }

    #[tokio::test]
    async fn move_unknown_task_is_not_found() {
        let mutator = DocumentMutator::new(seed_store(), 3);
        let err = mutator
            .move_task("ghost", "p1", &ColumnTarget::parse("done"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn set_completion_twice_keeps_single_done_entry() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);

        mutator.set_completion("t1", true).await.unwrap();
        mutator.set_completion("t1", true).await.unwrap();

        let doc = stored_document(&store).await;
        let done = doc.projects[0].column(Column::Done);
        assert_eq!(done.iter().filter(|t| t.id == "t1").count(), 1);
        assert!(done[0].completed_at.is_some());

        mutator.set_completion("t1", false).await.unwrap();
        let doc = stored_document(&store).await;
        assert!(doc.projects[0].column(Column::Done).is_empty());
        let todo = doc.projects[0].column(Column::Todo);
        assert_eq!(todo[0].id, "t1");
        assert!(todo[0].completed_at.is_none());
    }

    #[tokio::test]
    async fn edit_task_patches_fields_only() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);
        let task = mutator
            .edit_task(
                "t1",
                &TaskPatch {
                    title: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.title, "renamed");
        let doc = stored_document(&store).await;
        assert_eq!(doc.projects[0].column(Column::Todo)[0].title, "renamed");
    }

    #[tokio::test]
    async fn subtask_add_then_toggle() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);

        mutator
            .mutate_subtask(
                "t1",
                &SubtaskAction::Add {
                    subtask: NewSubtask {
                        title: "step one".into(),
                    },
                },
            )
            .await
            .unwrap();
        let doc = stored_document(&store).await;
        let subtask = doc.projects[0].column(Column::Todo)[0].subtasks[0].clone();
        assert!(!subtask.done);

        mutator
            .mutate_subtask("t1", &SubtaskAction::Toggle { subtask_id: subtask.id })
            .await
            .unwrap();
        let doc = stored_document(&store).await;
        assert!(doc.projects[0].column(Column::Todo)[0].subtasks[0].done);
    }

    #[tokio::test]
    async fn idea_lifecycle() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);

        let idea = mutator
            .add_idea(NewIdea {
                title: "SEO duplication".into(),
                idea: Some("replicate calculators".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let edited = mutator
            .edit_idea(
                &idea.id,
                &IdeaPatch {
                    title: Some("AEO duplication".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.title, "AEO duplication");

        mutator.delete_idea(&idea.id).await.unwrap();
        let err = mutator.delete_idea(&idea.id).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn change_request_submit_and_cancel() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);

        let id = mutator
            .submit_change_request("please reorder the board", None)
            .await
            .unwrap();
        mutator.cancel_change_request(&id).await.unwrap();

        let doc = stored_document(&store).await;
        assert_eq!(doc.change_requests.len(), 1);
        assert_eq!(
            doc.change_requests[0].status,
            ChangeRequestStatus::Cancelled
        );
        assert!(doc.change_requests[0].cancelled_at.is_some());
    }

    #[tokio::test]
    async fn populate_today_writes_once_per_date() {
        let store = seed_store();
        let mutator = DocumentMutator::new(store.clone(), 3);
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        let count = mutator.populate_today(today, &HashMap::new()).await.unwrap();
        assert_eq!(count, 1);
        let after_first = store.current().await;

        let count = mutator.populate_today(today, &HashMap::new()).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.current().await, after_first, "skip must not write");
    }

    /// Wraps the in-memory store and sneaks a competing commit in front of
    /// the first write, so that write loses the token race.
    struct ContendedStore {
        inner: InMemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for ContendedStore {
        async fn read(&self) -> Result<(String, RevisionToken), SyncError> {
            self.inner.read().await
        }

        async fn write(
            &self,
            content: &str,
            token: &RevisionToken,
            message: &str,
        ) -> Result<RevisionToken, SyncError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let (current, fresh) = self.inner.read().await?;
                self.inner.write(&current, &fresh, "competing writer").await?;
            }
            self.inner.write(content, token, message).await
        }
    }

    #[tokio::test]
    async fn conflict_is_retried_with_a_fresh_read() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryStore::new(serde_json::to_string_pretty(&seed_document()).unwrap()),
            raced: AtomicBool::new(false),
        });
        let mutator = DocumentMutator::new(store.clone(), 3);

        mutator.set_completion("t1", true).await.unwrap();
        let doc: Document = serde_json::from_str(&store.inner.current().await).unwrap();
        assert_eq!(doc.projects[0].column(Column::Done).len(), 1);
    }

    /// Always rejects writes with a stale-token conflict.
    struct AlwaysConflict {
        inner: InMemoryStore,
        writes: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for AlwaysConflict {
        async fn read(&self) -> Result<(String, RevisionToken), SyncError> {
            self.inner.read().await
        }

        async fn write(
            &self,
            _content: &str,
            _token: &RevisionToken,
            _message: &str,
        ) -> Result<RevisionToken, SyncError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Conflict)
        }
    }

    #[tokio::test]
    async fn conflict_surfaces_after_bounded_attempts() {
        let store = Arc::new(AlwaysConflict {
            inner: InMemoryStore::new(serde_json::to_string_pretty(&seed_document()).unwrap()),
            writes: AtomicU32::new(0),
        });
        let mutator = DocumentMutator::new(store.clone(), 3);

        let err = mutator.set_completion("t1", true).await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict));
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }
}
