use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A captured idea. Lives in its own document list, outside any project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    /// Free-form body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Idea {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: client_idea_id(),
            title: title.into(),
            idea: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

pub fn client_idea_id() -> String {
    format!("idea-{}", Uuid::new_v4())
}

/// Partial idea for edits: only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Idea {
    pub fn apply_patch(&mut self, patch: &IdeaPatch) {
        if let Some(ref title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(ref body) = patch.idea {
            let trimmed = body.trim();
            self.idea = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
    }
}
