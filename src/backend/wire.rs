//! JSON bodies exchanged with the textbook API.
//!
//! Response types list only the fields the client relies on; required fields are
//! non-optional so a body missing them fails to decode and is reported as a
//! schema error instead of being half-applied to the session.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::identity::{Profile, User};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MeBody {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<MeBody> for User {
    fn from(b: MeBody) -> Self {
        User { id: b.id, email: b.email, name: b.name }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileBody {
    #[serde(flatten)]
    pub profile: Profile,
    /// Informational only; an unreadable timestamp is dropped rather than
    /// failing the whole profile.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` (read as UTC);
/// anything else becomes `None`.
fn lenient_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<Value>::deserialize(de)?;
    let Some(text) = raw.as_ref().and_then(Value::as_str) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok());
    Ok(naive.map(|n| n.and_utc()))
}

/// Result of a successful login or signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthReceipt {
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterProfileBody<'a> {
    pub user_id: &'a str,
    #[serde(flatten)]
    pub profile: &'a Profile,
}

/// Acknowledgement of a profile write. Every field is optional: any 2xx counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatAnswer {
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Value>,
    #[serde(default)]
    pub context_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct GeneralQueryBody<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextualRequest {
    pub user_query: String,
    pub selected_text: String,
}

/// Answer from the general and contextual query endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalizeRequest {
    pub user_id: String,
    pub chapter_id: String,
    pub module_id: String,
    /// The session profile, or an empty object when none is known.
    pub user_profile: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonalizedContent {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub original_content: String,
    pub personalized_content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateRequest {
    pub chapter_slug: String,
    pub original_content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranslatedContent {
    #[serde(default)]
    pub message: Option<String>,
    pub chapter_slug: String,
    #[serde(default)]
    pub original_content: String,
    pub translated_content: String,
}

/// Pulls a human-readable message out of an error body.
///
/// `{"detail": "..."}` yields the string verbatim; a validation-style
/// `{"detail": [{"msg": "..."}, ...]}` yields the first `msg`.
pub(crate) fn error_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|it| it.get("msg").and_then(|m| m.as_str()))
            .map(|s| s.to_string()),
        _ => None,
    }
}
