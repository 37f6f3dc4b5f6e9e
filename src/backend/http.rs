use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::wire::{
    error_detail, AuthReceipt, ChatAnswer, ChatRequest, ContextualRequest, GeneralQueryBody, MeBody, PersonalizeRequest,
    PersonalizedContent, ProfileBody, ProfileReceipt, QueryAnswer, RegisterProfileBody, TranslateRequest, TranslatedContent,
};
use super::{ContentBackend, IdentityBackend};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{Credentials, Profile, User};

/// JSON-over-HTTP client for the textbook API.
///
/// All requests share one `reqwest::Client` with a cookie store, so the session
/// cookie set by login/signup is replayed on every later call. Clones share the jar.
#[derive(Clone)]
pub struct HttpBackend {
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(cfg: &ClientConfig) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(t) = cfg.request_timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::internal("http_client_init".to_string(), e.to_string()))?;
        // Relative joins keep any path prefix of the base URL.
        let mut base = cfg.api_base_url.clone();
        if !base.path().ends_with('/') {
            let p = format!("{}/", base.path());
            base.set_path(&p);
        }
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::internal("bad_endpoint".to_string(), format!("{}: {}", path, e)))
    }

    async fn get(&self, path: &str) -> AppResult<Response> {
        let url = self.url(path)?;
        debug!(target: "textbook::backend", %url, "GET");
        Ok(self.client.get(url).send().await?)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> AppResult<Response> {
        let url = self.url(path)?;
        debug!(target: "textbook::backend", %url, "POST");
        let req = self.client.post(url);
        let req = match body {
            Some(b) => req.json(b),
            None => req.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };
        Ok(req.send().await?)
    }
}

/// Decodes a 2xx body, failing closed when required fields are missing.
async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> AppResult<T> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!(target: "textbook::backend", endpoint, error = %e, "unexpected response body");
        AppError::schema("unexpected_response".to_string(), format!("{} returned an unexpected body: {}", endpoint, e))
    })
}

/// Turns a non-success response into `AppError::Rejected`, preferring the
/// backend's `detail` message over the generic one.
async fn rejection(resp: Response, code: &str, generic: &str) -> AppError {
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    let message = error_detail(&body).unwrap_or_else(|| generic.to_string());
    warn!(target: "textbook::backend", status = status.as_u16(), code, %message, "request rejected");
    AppError::rejected(status.as_u16(), code.to_string(), message)
}

/// Rejection for content endpoints: "<Operation> failed: <detail or reason>".
async fn content_rejection(resp: Response, code: &str, operation: &str) -> AppError {
    let status = resp.status();
    let reason = status.canonical_reason().unwrap_or("error").to_string();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    let detail = error_detail(&body).unwrap_or(reason);
    warn!(target: "textbook::backend", status = status.as_u16(), code, %detail, "content request rejected");
    AppError::rejected(status.as_u16(), code.to_string(), format!("{} failed: {}", operation, detail))
}

impl IdentityBackend for HttpBackend {
    async fn current_user(&self) -> AppResult<Option<User>> {
        let resp = self.get("api/auth/me").await?;
        let status = resp.status();
        if !status.is_success() {
            if status != StatusCode::UNAUTHORIZED {
                debug!(target: "textbook::backend", status = status.as_u16(), "no session (non-401)");
            }
            return Ok(None);
        }
        let body: MeBody = decode("/api/auth/me", resp).await?;
        if body.id.trim().is_empty() {
            return Err(AppError::schema("unexpected_response", "/api/auth/me returned an empty id"));
        }
        Ok(Some(body.into()))
    }

    async fn session_active(&self) -> AppResult<bool> {
        let resp = self.get("api/auth/session").await?;
        Ok(resp.status().is_success())
    }

    async fn fetch_profile(&self, user_id: &str) -> AppResult<Option<Profile>> {
        let path = format!("user/profile/{}", urlencoding::encode(user_id));
        let resp = self.get(&path).await?;
        if !resp.status().is_success() {
            debug!(target: "textbook::backend", user_id, status = resp.status().as_u16(), "profile not found");
            return Ok(None);
        }
        let body: ProfileBody = decode("/user/profile", resp).await?;
        if let Some(at) = body.created_at {
            debug!(target: "textbook::backend", user_id, created_at = %at, "profile loaded");
        }
        Ok(Some(body.profile))
    }

    async fn login(&self, credentials: &Credentials) -> AppResult<AuthReceipt> {
        let resp = self.post("api/auth/login", Some(credentials)).await?;
        if !resp.status().is_success() {
            return Err(rejection(resp, "login_failed", "Login failed").await);
        }
        non_empty_user_id(decode("/api/auth/login", resp).await?, "/api/auth/login")
    }

    async fn signup(&self, credentials: &Credentials) -> AppResult<AuthReceipt> {
        let resp = self.post("api/auth/signup", Some(credentials)).await?;
        if !resp.status().is_success() {
            return Err(rejection(resp, "signup_failed", "Signup failed").await);
        }
        non_empty_user_id(decode("/api/auth/signup", resp).await?, "/api/auth/signup")
    }

    async fn register_profile(&self, user_id: &str, profile: &Profile) -> AppResult<ProfileReceipt> {
        let body = RegisterProfileBody { user_id, profile };
        let resp = self.post("user/register_profile", Some(&body)).await?;
        if !resp.status().is_success() {
            return Err(rejection(resp, "profile_registration_failed", "Profile registration failed").await);
        }
        // Acknowledgement only; an unreadable body still counts as success.
        Ok(resp.json().await.unwrap_or_default())
    }

    async fn logout(&self) -> AppResult<()> {
        let resp = self.post::<()>("api/auth/logout", None).await?;
        if !resp.status().is_success() {
            return Err(rejection(resp, "logout_failed", "Logout failed").await);
        }
        Ok(())
    }
}

fn non_empty_user_id(receipt: AuthReceipt, endpoint: &str) -> AppResult<AuthReceipt> {
    if receipt.user_id.trim().is_empty() {
        return Err(AppError::schema("unexpected_response".to_string(), format!("{} returned an empty userId", endpoint)));
    }
    Ok(receipt)
}

impl ContentBackend for HttpBackend {
    async fn rag_chat(&self, req: &ChatRequest) -> AppResult<ChatAnswer> {
        let resp = self.post("api/rag/chat", Some(req)).await?;
        if !resp.status().is_success() {
            return Err(content_rejection(resp, "chat_failed", "Chat").await);
        }
        decode("/api/rag/chat", resp).await
    }

    async fn general_query(&self, query: &str) -> AppResult<QueryAnswer> {
        let resp = self.post("api/query/general", Some(&GeneralQueryBody { query })).await?;
        if !resp.status().is_success() {
            return Err(content_rejection(resp, "query_failed", "Query").await);
        }
        decode("/api/query/general", resp).await
    }

    async fn contextual_query(&self, req: &ContextualRequest) -> AppResult<QueryAnswer> {
        let resp = self.post("api/query/contextual", Some(req)).await?;
        if !resp.status().is_success() {
            return Err(content_rejection(resp, "query_failed", "Contextual query").await);
        }
        decode("/api/query/contextual", resp).await
    }

    async fn personalize(&self, req: &PersonalizeRequest) -> AppResult<PersonalizedContent> {
        let resp = self.post("api/content/personalize", Some(req)).await?;
        if !resp.status().is_success() {
            return Err(content_rejection(resp, "personalization_failed", "Personalization").await);
        }
        decode("/api/content/personalize", resp).await
    }

    async fn translate_urdu(&self, req: &TranslateRequest) -> AppResult<TranslatedContent> {
        let resp = self.post("api/content/translate_urdu", Some(req)).await?;
        if !resp.status().is_success() {
            return Err(content_rejection(resp, "translation_failed", "Translation").await);
        }
        decode("/api/content/translate_urdu", resp).await
    }
}
