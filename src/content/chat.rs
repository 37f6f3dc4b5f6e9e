use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::backend::ContextualRequest;

// Selected-text questions are sent as: Context: "<selection>". Question: <question>
static CONTEXTUAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Context: "([^"]*)"\. Question: (.+)"#).expect("contextual pattern compiles")
});

/// Splits a selected-text question into its parts, or `None` for a plain question.
pub fn parse_contextual(input: &str) -> Option<ContextualRequest> {
    let caps = CONTEXTUAL_RE.captures(input)?;
    Some(ContextualRequest {
        selected_text: caps.get(1)?.as_str().to_string(),
        user_query: caps.get(2)?.as_str().trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self { sender, text: text.into(), at: Utc::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<Value>,
    /// True when the question carried selected text.
    pub contextual: bool,
}
