use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeRequestStatus {
    #[default]
    Pending,
    Cancelled,
}

/// A free-text request from a viewer, queued in the document until acted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ChangeRequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl ChangeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: client_change_request_id(),
            text: text.into(),
            created_at: Utc::now(),
            status: ChangeRequestStatus::Pending,
            cancelled_at: None,
        }
    }

    pub fn cancel(&mut self) {
        self.status = ChangeRequestStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChangeRequestStatus::Pending
    }
}

pub fn client_change_request_id() -> String {
    format!("cr-{}", Uuid::new_v4())
}
