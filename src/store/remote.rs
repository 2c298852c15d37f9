use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{DocumentStore, RevisionToken, transport};
use crate::config::Config;
use crate::error::SyncError;

const USER_AGENT: &str = "plank";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the contents endpoint returns on read: transport-wrapped document
/// text plus the revision token.
#[derive(Debug, Deserialize)]
struct ContentsFile {
    content: String,
    sha: String,
}

/// Client for the remote document store's contents protocol: GET yields
/// `{content, sha}` with base64-wrapped text, PUT takes `{message, content,
/// sha}` and rejects a stale `sha`.
pub struct RemoteStore {
    api_url: String,
    token: String,
    http: Client,
}

impl RemoteStore {
    pub fn new(api_url: &str, token: &str) -> Result<Self, SyncError> {
        if api_url.is_empty() {
            return Err(SyncError::Misconfiguration("missing store URL".into()));
        }
        if token.is_empty() {
            return Err(SyncError::Misconfiguration("missing store token".into()));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Self::new(&config.store_url(), config.store_token.as_deref().unwrap_or(""))
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.http
            .request(method, &self.api_url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
    }
}

#[async_trait]
impl DocumentStore for RemoteStore {
    async fn read(&self) -> Result<(String, RevisionToken), SyncError> {
        let resp = self
            .request(reqwest::Method::GET)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("store read failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!(
                "store read returned {status}: {body}"
            )));
        }

        let file: ContentsFile = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("store read body: {e}")))?;

        let text = transport::decode(&file.content)?;
        Ok((text, RevisionToken(file.sha)))
    }

    async fn write(
        &self,
        content: &str,
        token: &RevisionToken,
        message: &str,
    ) -> Result<RevisionToken, SyncError> {
        let body = json!({
            "message": message,
            "content": transport::encode(content),
            "sha": token.as_str(),
        });

        let resp = self
            .request(reqwest::Method::PUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("store write failed: {e}")))?;

        let status = resp.status();
        // The contents protocol signals a stale sha as a conflict-class status.
        if matches!(
            status,
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            log::warn!("Store write rejected ({status}): stale revision token");
            return Err(SyncError::Conflict);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!(
                "store write returned {status}: {body}"
            )));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("store write body: {e}")))?;
        value
            .pointer("/content/sha")
            .and_then(|v| v.as_str())
            .map(|sha| RevisionToken(sha.to_string()))
            .ok_or_else(|| SyncError::Parse("store write response missing new sha".into()))
    }
}
