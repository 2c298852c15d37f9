use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use crate::core::document::Document;
use crate::core::idea::IdeaPatch;
use crate::core::task::TaskPatch;
use crate::error::SyncError;
use crate::mutate::{NewIdea, NewTask, SubtaskAction};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the board's mutation endpoints plus the snapshot read.
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// GET the full document. Never cached.
    pub async fn fetch_snapshot(&self) -> Result<Document, SyncError> {
        let resp = self
            .http
            .get(format!("{}/api/status", self.base_url))
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("snapshot fetch failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SyncError::Network(format!("snapshot body: {e}")))?;
        if !status.is_success() {
            return Err(map_api_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| SyncError::Parse(format!("snapshot JSON: {e}")))
    }

    pub async fn add_task(
        &self,
        task: &NewTask,
        project_id: Option<&str>,
        column: &str,
    ) -> Result<(), SyncError> {
        self.post(
            "/api/tasks",
            json!({
                "action": "add",
                "task": task,
                "projectId": project_id,
                "column": column,
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn move_task(
        &self,
        task_id: &str,
        project_id: &str,
        target_column: &str,
    ) -> Result<(), SyncError> {
        self.post(
            "/api/tasks",
            json!({
                "action": "move",
                "taskId": task_id,
                "projectId": project_id,
                "targetColumn": target_column,
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_completion(
        &self,
        task_id: &str,
        project_id: Option<&str>,
        completed: bool,
    ) -> Result<(), SyncError> {
        self.post(
            "/api/tasks",
            json!({
                "action": "complete",
                "taskId": task_id,
                "projectId": project_id,
                "completed": completed,
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn edit_task(
        &self,
        task_id: &str,
        project_id: Option<&str>,
        updates: &TaskPatch,
    ) -> Result<(), SyncError> {
        self.post(
            "/api/tasks",
            json!({
                "action": "edit",
                "taskId": task_id,
                "projectId": project_id,
                "updates": updates,
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn mutate_subtask(
        &self,
        task_id: &str,
        project_id: Option<&str>,
        action: &SubtaskAction,
    ) -> Result<(), SyncError> {
        let mut body = serde_json::to_value(action)
            .map_err(|e| SyncError::Parse(format!("subtask payload: {e}")))?;
        if let Value::Object(ref mut map) = body {
            map.insert("action".into(), json!("subtask"));
            map.insert("taskId".into(), json!(task_id));
            map.insert("projectId".into(), json!(project_id));
        }
        self.post("/api/tasks", body).await.map(|_| ())
    }

    pub async fn add_idea(&self, idea: &NewIdea) -> Result<(), SyncError> {
        let mut body = serde_json::to_value(idea)
            .map_err(|e| SyncError::Parse(format!("idea payload: {e}")))?;
        if let Value::Object(ref mut map) = body {
            map.insert("action".into(), json!("add"));
        }
        self.post("/api/ideas", body).await.map(|_| ())
    }

    pub async fn delete_idea(&self, id: &str) -> Result<(), SyncError> {
        self.post("/api/ideas", json!({ "action": "delete", "id": id }))
            .await
            .map(|_| ())
    }

    pub async fn edit_idea(&self, id: &str, patch: &IdeaPatch) -> Result<(), SyncError> {
        let mut body = serde_json::to_value(patch)
            .map_err(|e| SyncError::Parse(format!("idea payload: {e}")))?;
        if let Value::Object(ref mut map) = body {
            map.insert("action".into(), json!("edit"));
            map.insert("id".into(), json!(id));
        }
        self.post("/api/ideas", body).await.map(|_| ())
    }

    pub async fn submit_change_request(&self, text: &str, id: &str) -> Result<(), SyncError> {
        self.post("/api/change-request", json!({ "text": text, "id": id }))
            .await
            .map(|_| ())
    }

    pub async fn cancel_change_request(&self, id: &str) -> Result<(), SyncError> {
        self.post("/api/change-request", json!({ "action": "cancel", "id": id }))
            .await
            .map(|_| ())
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, SyncError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("POST {path} failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SyncError::Network(format!("POST {path} body: {e}")))?;
        if !status.is_success() {
            return Err(map_api_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| SyncError::Parse(format!("POST {path} JSON: {e}")))
    }
}

/// Map a non-2xx `{error, detail}` response back into the taxonomy.
fn map_api_error(status: StatusCode, body: &str) -> SyncError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::BAD_REQUEST => SyncError::Invalid(detail),
        StatusCode::NOT_FOUND => SyncError::NotFound(detail),
        StatusCode::CONFLICT => SyncError::Conflict,
        StatusCode::INTERNAL_SERVER_ERROR => SyncError::Misconfiguration(detail),
        _ => SyncError::Network(format!("{status}: {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_back_into_the_taxonomy() {
        let body = r#"{"error":"not_found","detail":"task t9 missing"}"#;
        assert!(matches!(
            map_api_error(StatusCode::NOT_FOUND, body),
            SyncError::NotFound(d) if d == "task t9 missing"
        ));
        assert!(matches!(
            map_api_error(StatusCode::CONFLICT, "{}"),
            SyncError::Conflict
        ));
        assert!(matches!(
            map_api_error(StatusCode::INTERNAL_SERVER_ERROR, "not json"),
            SyncError::Misconfiguration(_)
        ));
        assert!(matches!(
            map_api_error(StatusCode::BAD_GATEWAY, "oops"),
            SyncError::Network(_)
        ));
    }
}
