//! Client configuration sourced from the environment.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_CHAT_TOP_K: u32 = 5;

/// How completions of overlapping operations are reconciled with the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalePolicy {
    /// Only the most recently started operation may commit; older completions are discarded.
    #[default]
    LatestStarted,
    /// Every completion commits; whichever finishes last wins.
    LastCompleted,
}

impl std::str::FromStr for StalePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest-started" | "latest_started" => Ok(StalePolicy::LatestStarted),
            "last-completed" | "last_completed" => Ok(StalePolicy::LastCompleted),
            other => Err(AppError::validation("invalid_config".to_string(), format!("unknown stale policy '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    /// Transport-level timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
    pub stale_policy: StalePolicy,
    pub chat_top_k: u32,
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> AppResult<Self> {
        Ok(Self {
            api_base_url: parse_base_url(api_base_url)?,
            request_timeout: None,
            stale_policy: StalePolicy::default(),
            chat_top_k: DEFAULT_CHAT_TOP_K,
        })
    }

    /// Reads `TEXTBOOK_API_URL`, `TEXTBOOK_HTTP_TIMEOUT_SECS`, `TEXTBOOK_STALE_POLICY`
    /// and `TEXTBOOK_CHAT_TOP_K`, falling back to defaults for unset variables.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("TEXTBOOK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut cfg = Self::new(&url)?;
        if let Some(raw) = lookup("TEXTBOOK_HTTP_TIMEOUT_SECS").filter(|s| !s.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AppError::validation("invalid_config".to_string(), format!("TEXTBOOK_HTTP_TIMEOUT_SECS is not a number: '{}'", raw))
            })?;
            cfg.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("TEXTBOOK_STALE_POLICY") {
            cfg.stale_policy = raw.parse()?;
        }
        if let Some(raw) = lookup("TEXTBOOK_CHAT_TOP_K") {
            let k: u32 = raw.trim().parse().map_err(|_| {
                AppError::validation("invalid_config".to_string(), format!("TEXTBOOK_CHAT_TOP_K is not a number: '{}'", raw))
            })?;
            if k == 0 {
                return Err(AppError::validation("invalid_config", "TEXTBOOK_CHAT_TOP_K must be at least 1"));
            }
            cfg.chat_top_k = k;
        }
        Ok(cfg)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn with_chat_top_k(mut self, k: u32) -> Self {
        self.chat_top_k = k.max(1);
        self
    }
}

fn parse_base_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::validation("invalid_config".to_string(), format!("invalid API base URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::validation("invalid_config".to_string(), format!("unsupported URL scheme '{}'", other))),
    }
}
