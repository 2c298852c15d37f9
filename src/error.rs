use thiserror::Error;

/// Failure taxonomy shared by the store, the mutator, and the client sync layer.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The request did not complete (DNS, connect, timeout, broken transfer).
    #[error("network failure: {0}")]
    Network(String),

    /// A response or stored payload was not valid JSON / UTF-8 / base64.
    #[error("parse failure: {0}")]
    Parse(String),

    /// The target entity id is absent from the document.
    #[error("not found: {0}")]
    NotFound(String),

    /// The revision token went stale: another writer committed in between.
    #[error("conflict: revision token is stale")]
    Conflict,

    /// The server is missing a required credential or setting. Not retryable.
    #[error("server not configured: {0}")]
    Misconfiguration(String),

    /// The request payload was rejected before touching the document.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl SyncError {
    /// Whether retrying the same request could possibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(SyncError::Network("timeout".into()).is_retryable());
        assert!(SyncError::Conflict.is_retryable());
        assert!(!SyncError::NotFound("t1".into()).is_retryable());
        assert!(!SyncError::Misconfiguration("no token".into()).is_retryable());
    }
}
