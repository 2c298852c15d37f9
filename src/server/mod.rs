pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::error::SyncError;
use crate::mutate::DocumentMutator;
use crate::store::{DocumentStore, RemoteStore};

/// Shared handler state. A missing document store is tolerated at startup:
/// every mutation then fails deterministically as `Misconfiguration`.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn DocumentStore>>,
    pub mutator: Option<Arc<DocumentMutator>>,
    pub notifier: Option<Arc<Notifier>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let store: Option<Arc<dyn DocumentStore>> = match RemoteStore::from_config(config) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                log::error!("Document store unavailable: {e}");
                None
            }
        };
        let mutator = store
            .as_ref()
            .map(|s| Arc::new(DocumentMutator::new(s.clone(), config.write_attempts)));
        Self {
            store,
            mutator,
            notifier: Notifier::from_config(config).map(Arc::new),
        }
    }

    /// State over an arbitrary store, used by tests and local setups.
    pub fn with_store(store: Arc<dyn DocumentStore>, write_attempts: u32) -> Self {
        Self {
            store: Some(store.clone()),
            mutator: Some(Arc::new(DocumentMutator::new(store, write_attempts))),
            notifier: None,
        }
    }

    fn mutator(&self) -> Result<&Arc<DocumentMutator>, SyncError> {
        self.mutator
            .as_ref()
            .ok_or_else(|| SyncError::Misconfiguration("missing store credentials".into()))
    }

    fn store(&self) -> Result<&Arc<dyn DocumentStore>, SyncError> {
        self.store
            .as_ref()
            .ok_or_else(|| SyncError::Misconfiguration("missing store credentials".into()))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handlers::status_handler))
        .route("/api/tasks", post(handlers::tasks_handler))
        .route("/api/ideas", post(handlers::ideas_handler))
        .route("/api/change-request", post(handlers::change_request_handler))
        .with_state(state)
}

pub(crate) fn error_status(err: &SyncError) -> StatusCode {
    match err {
        SyncError::Invalid(_) => StatusCode::BAD_REQUEST,
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::Conflict => StatusCode::CONFLICT,
        SyncError::Network(_) | SyncError::Parse(_) => StatusCode::BAD_GATEWAY,
        SyncError::Misconfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Every failure leaves the server as structured JSON: `{error, detail}`.
pub(crate) fn error_response(err: SyncError) -> Response {
    let label = match err {
        SyncError::Invalid(_) => "invalid_request",
        SyncError::NotFound(_) => "not_found",
        SyncError::Conflict => "conflict",
        SyncError::Network(_) => "upstream_failure",
        SyncError::Parse(_) => "parse_failure",
        SyncError::Misconfiguration(_) => "not_configured",
    };
    let body = axum::Json(json!({ "error": label, "detail": err.to_string() }));
    (error_status(&err), body).into_response()
}

/// Optional webhook pinged when a viewer submits an idea or change request.
/// Strictly fire-and-forget: failures are logged and swallowed.
pub struct Notifier {
    hook_url: String,
    hook_token: String,
    http: Client,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Option<Self> {
        let hook_url = config.hook_url.clone()?;
        let hook_token = config.hook_token.clone()?;
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .ok()?;
        Some(Self {
            hook_url: hook_url.trim_end_matches('/').to_string(),
            hook_token,
            http,
        })
    }

    pub async fn notify(&self, text: String) {
        let result = self
            .http
            .post(format!("{}/hooks/wake", self.hook_url))
            .bearer_auth(&self.hook_token)
            .json(&json!({ "text": text, "mode": "now" }))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => log::debug!("Hook returned {}", resp.status()),
            Err(e) => log::debug!("Hook delivery failed: {e}"),
        }
    }
}

/// Spawn a notification without blocking the response.
pub(crate) fn notify_background(notifier: &Option<Arc<Notifier>>, text: String) {
    if let Some(notifier) = notifier {
        let notifier = notifier.clone();
        tokio::spawn(async move { notifier.notify(text).await });
    }
}
