use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AppState, error_response, notify_background};
use crate::core::idea::IdeaPatch;
use crate::core::task::{ColumnTarget, TaskPatch};
use crate::error::SyncError;
use crate::mutate::{NewIdea, NewTask, SubtaskAction};

/// The live document, decoded and passed through verbatim, never a cached
/// deploy copy.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    match read_status(&state).await {
        Ok(text) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CACHE_CONTROL, "no-cache, no-store"),
            ],
            text,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn read_status(state: &AppState) -> Result<String, SyncError> {
    let (text, _) = state.store()?.read().await?;
    Ok(text)
}

// ── /api/tasks ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBody {
    task: NewTask,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    column: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveBody {
    task_id: String,
    project_id: String,
    target_column: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteBody {
    task_id: String,
    #[serde(default)]
    completed: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditBody {
    task_id: String,
    updates: TaskPatch,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubtaskBody {
    task_id: String,
    #[serde(flatten)]
    action: SubtaskAction,
}

pub async fn tasks_handler(State(state): State<AppState>, raw: String) -> Response {
    match parse_json(&raw) {
        Ok(body) => match handle_task_request(&state, body).await {
            Ok((status, body)) => (status, Json(body)).into_response(),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}

async fn handle_task_request(
    state: &AppState,
    body: Value,
) -> Result<(StatusCode, Value), SyncError> {
    let mutator = state.mutator()?;
    // A request without an action is an add, as the original dispatch did.
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("add")
        .to_string();

    match action.as_str() {
        "add" => {
            let body: AddBody = parse_body(body)?;
            let target = ColumnTarget::parse(body.column.as_deref().unwrap_or("todo"));
            let task = mutator
                .add_task(body.task, body.project_id.as_deref(), &target)
                .await?;
            Ok((StatusCode::CREATED, json!({ "ok": true, "task": task })))
        }
        "move" => {
            let body: MoveBody = parse_body(body)?;
            let target = ColumnTarget::parse(&body.target_column);
            let outcome = mutator
                .move_task(&body.task_id, &body.project_id, &target)
                .await?;
            Ok((
                StatusCode::OK,
                json!({
                    "ok": true,
                    "taskId": outcome.task_id,
                    "from": outcome.from,
                    "to": outcome.to,
                }),
            ))
        }
        "complete" => {
            let body: CompleteBody = parse_body(body)?;
            let completed = body.completed.unwrap_or(true);
            let completed = mutator.set_completion(&body.task_id, completed).await?;
            Ok((
                StatusCode::OK,
                json!({ "ok": true, "taskId": body.task_id, "completed": completed }),
            ))
        }
        "edit" => {
            let body: EditBody = parse_body(body)?;
            let task = mutator.edit_task(&body.task_id, &body.updates).await?;
            Ok((StatusCode::OK, json!({ "ok": true, "task": task })))
        }
        "subtask" => {
            let body: SubtaskBody = parse_body(body)?;
            mutator.mutate_subtask(&body.task_id, &body.action).await?;
            Ok((StatusCode::OK, json!({ "ok": true })))
        }
        other => Err(SyncError::Invalid(format!("unknown action: {other}"))),
    }
}

// ── /api/ideas ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdeaEditBody {
    id: String,
    #[serde(flatten)]
    patch: IdeaPatch,
}

#[derive(Deserialize)]
struct IdBody {
    id: String,
}

pub async fn ideas_handler(State(state): State<AppState>, raw: String) -> Response {
    match parse_json(&raw) {
        Ok(body) => match handle_idea_request(&state, body).await {
            Ok((status, body)) => (status, Json(body)).into_response(),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}

async fn handle_idea_request(
    state: &AppState,
    body: Value,
) -> Result<(StatusCode, Value), SyncError> {
    let mutator = state.mutator()?;
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("add")
        .to_string();

    match action.as_str() {
        "add" => {
            let new: NewIdea = parse_body(body)?;
            let idea = mutator.add_idea(new).await?;
            notify_background(&state.notifier, format!("New idea: \"{}\"", idea.title));
            Ok((StatusCode::CREATED, json!({ "ok": true, "idea": idea })))
        }
        "delete" => {
            let body: IdBody = parse_body(body)?;
            mutator.delete_idea(&body.id).await?;
            Ok((StatusCode::OK, json!({ "ok": true })))
        }
        "edit" => {
            let body: IdeaEditBody = parse_body(body)?;
            let idea = mutator.edit_idea(&body.id, &body.patch).await?;
            Ok((StatusCode::OK, json!({ "ok": true, "idea": idea })))
        }
        other => Err(SyncError::Invalid(format!("unknown action: {other}"))),
    }
}

// ── /api/change-request ────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChangeRequestBody {
    text: String,
    #[serde(default)]
    id: Option<String>,
}

pub async fn change_request_handler(State(state): State<AppState>, raw: String) -> Response {
    match parse_json(&raw) {
        Ok(body) => match handle_change_request(&state, body).await {
            Ok((status, body)) => (status, Json(body)).into_response(),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}

async fn handle_change_request(
    state: &AppState,
    body: Value,
) -> Result<(StatusCode, Value), SyncError> {
    let mutator = state.mutator()?;

    if body.get("action").and_then(Value::as_str) == Some("cancel") {
        let body: IdBody = parse_body(body)?;
        mutator.cancel_change_request(&body.id).await?;
        return Ok((StatusCode::OK, json!({ "ok": true })));
    }

    let body: ChangeRequestBody = parse_body(body)?;
    let id = mutator.submit_change_request(&body.text, body.id).await?;
    let excerpt: String = body.text.chars().take(120).collect();
    notify_background(&state.notifier, format!("Change request: {excerpt}"));
    Ok((StatusCode::CREATED, json!({ "ok": true, "id": id })))
}

fn parse_json(raw: &str) -> Result<Value, SyncError> {
    serde_json::from_str(raw).map_err(|_| SyncError::Invalid("invalid JSON body".into()))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, SyncError> {
    serde_json::from_value(body).map_err(|e| SyncError::Invalid(format!("bad request body: {e}")))
}
