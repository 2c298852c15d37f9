pub mod memory;
pub mod remote;
pub mod transport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub use memory::InMemoryStore;
pub use remote::RemoteStore;

/// Opaque revision token issued by the store on read and required, matching,
/// on write. A mismatch means another writer committed in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionToken(pub String);

impl RevisionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shared document's storage contract: read the full decoded text plus
/// its revision token; write new text conditioned on the token still being
/// current. A stale token fails the write with `SyncError::Conflict`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self) -> Result<(String, RevisionToken), SyncError>;

    async fn write(
        &self,
        content: &str,
        token: &RevisionToken,
        message: &str,
    ) -> Result<RevisionToken, SyncError>;
}
