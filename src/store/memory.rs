use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DocumentStore, RevisionToken};
use crate::error::SyncError;

/// Mutex-held store with a counter-based revision token. Behaves exactly
/// like the remote contract (a write holding a stale token is rejected
/// with `Conflict`), which makes it the fixture for mutator and handler
/// tests.
pub struct InMemoryStore {
    state: Mutex<(String, u64)>,
}

impl InMemoryStore {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            state: Mutex::new((content.into(), 0)),
        }
    }

    /// Current content, bypassing the token protocol (test inspection).
    pub async fn current(&self) -> String {
        self.state.lock().await.0.clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn read(&self) -> Result<(String, RevisionToken), SyncError> {
        let state = self.state.lock().await;
        Ok((state.0.clone(), RevisionToken(state.1.to_string())))
    }

    async fn write(
        &self,
        content: &str,
        token: &RevisionToken,
        _message: &str,
    ) -> Result<RevisionToken, SyncError> {
        let mut state = self.state.lock().await;
        if token.as_str() != state.1.to_string() {
            return Err(SyncError::Conflict);
        }
        state.0 = content.to_string();
        state.1 += 1;
        Ok(RevisionToken(state.1.to_string()))
    }
}
