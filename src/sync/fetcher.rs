use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::api::ApiClient;
use crate::core::document::Document;
use crate::error::SyncError;

/// The fetcher's published state: last-good document plus a non-fatal error
/// indicator. A failed fetch never discards the document: viewers keep
/// rendering the previous snapshot with the error flag raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotState {
    pub document: Option<Document>,
    pub error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl SnapshotState {
    pub fn is_stale(&self) -> bool {
        self.error.is_some()
    }
}

/// Periodically pulls the document and publishes it on a watch channel.
pub struct SnapshotFetcher {
    api: Arc<ApiClient>,
    tx: watch::Sender<SnapshotState>,
}

impl SnapshotFetcher {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (tx, _) = watch::channel(SnapshotState::default());
        Self { api, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SnapshotState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SnapshotState {
        self.tx.borrow().clone()
    }

    /// One on-demand fetch cycle.
    pub async fn refresh(&self) {
        let result = self.api.fetch_snapshot().await;
        self.apply(result);
    }

    fn apply(&self, result: Result<Document, SyncError>) {
        self.tx.send_modify(|state| {
            match result {
                Ok(document) => {
                    log::debug!(
                        "Snapshot refreshed: {} projects, {} loose todos",
                        document.projects.len(),
                        document.todos.len()
                    );
                    state.document = Some(document);
                    state.error = None;
                }
                Err(e) => {
                    log::warn!("Snapshot fetch failed, keeping last-good copy: {e}");
                    state.error = Some(e.to_string());
                }
            }
            state.last_refresh = Some(Utc::now());
        });
    }

    /// Start the polling loop. The returned handle aborts the task when
    /// dropped, so acquisition is scoped and cancellation guaranteed.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> FetchHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        });
        FetchHandle { task }
    }
}

pub struct FetchHandle {
    task: JoinHandle<()>,
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::Project;

    fn make_fetcher() -> SnapshotFetcher {
        SnapshotFetcher::new(Arc::new(ApiClient::new("http://127.0.0.1:9").unwrap()))
    }

    fn make_document() -> Document {
        let mut doc = Document::default();
        doc.projects.push(Project::new("p1", "Board"));
        doc
    }

    #[tokio::test]
    async fn failure_retains_last_good_document() {
        let fetcher = make_fetcher();

        fetcher.apply(Ok(make_document()));
        let state = fetcher.current();
        assert!(state.document.is_some());
        assert!(state.error.is_none());

        fetcher.apply(Err(SyncError::Network("connection refused".into())));
        let state = fetcher.current();
        assert!(state.document.is_some(), "last-good copy must survive");
        assert!(state.is_stale());

        // A later success clears the error flag.
        fetcher.apply(Ok(make_document()));
        assert!(!fetcher.current().is_stale());
    }

    #[tokio::test]
    async fn error_before_any_snapshot_leaves_no_document() {
        let fetcher = make_fetcher();
        fetcher.apply(Err(SyncError::Network("down".into())));
        let state = fetcher.current();
        assert!(state.document.is_none());
        assert!(state.error.is_some());
    }
}
