use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("plank")
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// Where the override store keeps its per-kind JSON files.
    pub data_dir: PathBuf,
    /// Server bind address.
    pub bind_addr: String,
    /// Remote document store: either a full contents-endpoint URL, or a
    /// `owner/name` repo plus a path the URL is derived from.
    pub store_url_override: Option<String>,
    pub store_repo: Option<String>,
    pub store_path: String,
    pub store_token: Option<String>,
    /// Base URL the client-side sync layer talks to.
    pub api_base: String,
    pub poll_interval_secs: u64,
    /// Bounded attempts for the server-side optimistic write cycle.
    pub write_attempts: u32,
    /// Bounded attempts and base backoff for client mutation pushes.
    pub push_attempts: u32,
    pub push_backoff_ms: u64,
    /// Optional webhook pinged on idea/change-request submissions.
    pub hook_url: Option<String>,
    pub hook_token: Option<String>,
    /// Per-project weights for daily plan population.
    pub plan_weights: HashMap<String, u32>,
    /// Weekdays (0 = Sunday … 6 = Saturday) the daily plan skips.
    pub rest_days: Vec<u32>,
    pub debug_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind_addr: "127.0.0.1:8787".to_string(),
            store_url_override: None,
            store_repo: None,
            store_path: "public/status.json".to_string(),
            store_token: None,
            api_base: "http://127.0.0.1:8787".to_string(),
            poll_interval_secs: 60,
            write_attempts: 3,
            push_attempts: 3,
            push_backoff_ms: 500,
            hook_url: None,
            hook_token: None,
            plan_weights: HashMap::new(),
            rest_days: vec![5, 6],
            debug_logging: false,
        }
    }
}

impl Config {
    /// Build a config from `PLANK_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("PLANK_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(bind) = std::env::var("PLANK_BIND") {
            config.bind_addr = bind;
        }
        config.store_url_override = std::env::var("PLANK_STORE_URL").ok();
        config.store_repo = std::env::var("PLANK_STORE_REPO").ok();
        if let Ok(path) = std::env::var("PLANK_STORE_PATH") {
            config.store_path = path;
        }
        config.store_token = std::env::var("PLANK_STORE_TOKEN").ok();
        if let Ok(base) = std::env::var("PLANK_API_BASE") {
            config.api_base = base;
        }
        if let Some(secs) = env_parse("PLANK_POLL_SECS") {
            config.poll_interval_secs = secs;
        }
        if let Some(n) = env_parse("PLANK_WRITE_ATTEMPTS") {
            config.write_attempts = n;
        }
        if let Some(n) = env_parse("PLANK_PUSH_ATTEMPTS") {
            config.push_attempts = n;
        }
        if let Some(ms) = env_parse("PLANK_PUSH_BACKOFF_MS") {
            config.push_backoff_ms = ms;
        }
        config.hook_url = std::env::var("PLANK_HOOK_URL").ok();
        config.hook_token = std::env::var("PLANK_HOOK_TOKEN").ok();
        if let Ok(weights) = std::env::var("PLANK_PLAN_WEIGHTS") {
            config.plan_weights = parse_weights(&weights);
        }
        config.debug_logging = std::env::var("PLANK_DEBUG").is_ok_and(|v| v == "1" || v == "true");
        config
    }

    /// The contents-endpoint URL for the remote document store. Empty when
    /// neither a URL nor a repo is configured; the store constructor turns
    /// that into `Misconfiguration`.
    pub fn store_url(&self) -> String {
        if let Some(ref url) = self.store_url_override {
            return url.clone();
        }
        match self.store_repo {
            Some(ref repo) => format!(
                "https://api.github.com/repos/{}/contents/{}",
                repo, self.store_path
            ),
            None => String::new(),
        }
    }

    pub fn overrides_dir(&self) -> PathBuf {
        self.data_dir.join("overrides")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse `project=40,other=25` into a weight map; malformed entries are
/// skipped.
fn parse_weights(raw: &str) -> HashMap<String, u32> {
    raw.split(',')
        .filter_map(|entry| {
            let (id, weight) = entry.split_once('=')?;
            let weight: u32 = weight.trim().parse().ok()?;
            Some((id.trim().to_string(), weight))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_url_derived_from_repo_and_path() {
        let mut config = Config::default();
        assert_eq!(config.store_url(), "");

        config.store_repo = Some("acme/board".into());
        assert_eq!(
            config.store_url(),
            "https://api.github.com/repos/acme/board/contents/public/status.json"
        );

        config.store_url_override = Some("https://store.example/doc".into());
        assert_eq!(config.store_url(), "https://store.example/doc");
    }

    #[test]
    fn weights_parse_and_skip_malformed() {
        let weights = parse_weights("alpha=40, beta=25,junk,gamma=x");
        assert_eq!(weights.get("alpha"), Some(&40));
        assert_eq!(weights.get("beta"), Some(&25));
        assert_eq!(weights.len(), 2);
    }
}
