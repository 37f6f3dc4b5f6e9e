//! Remote collaborators of the client.
//!
//! The session manager and content service only see the `IdentityBackend` and
//! `ContentBackend` traits; `HttpBackend` is the production implementation that
//! talks JSON to the textbook API with a cookie jar carrying the session.

use std::future::Future;

use crate::error::AppResult;
use crate::identity::{Credentials, Profile, User};

mod http;
pub mod wire;

pub use http::HttpBackend;
pub use wire::{
    AuthReceipt, ChatAnswer, ChatRequest, ContextualRequest, PersonalizeRequest, PersonalizedContent,
    ProfileReceipt, QueryAnswer, TranslateRequest, TranslatedContent,
};

/// Identity endpoints: current user, login/signup/logout, profile storage.
///
/// Implementations report expected absence as `Ok(None)` / `Ok(false)` and reserve
/// `Err` for transport failures, rejections and malformed responses.
pub trait IdentityBackend: Send + Sync {
    /// `GET /api/auth/me`. `Ok(None)` for any non-success status.
    fn current_user(&self) -> impl Future<Output = AppResult<Option<User>>> + Send;

    /// `GET /api/auth/session`. `Ok(false)` for any non-success status.
    fn session_active(&self) -> impl Future<Output = AppResult<bool>> + Send;

    /// `GET /user/profile/{id}`. `Ok(None)` when the backend has no profile.
    fn fetch_profile(&self, user_id: &str) -> impl Future<Output = AppResult<Option<Profile>>> + Send;

    /// `POST /api/auth/login`.
    fn login(&self, credentials: &Credentials) -> impl Future<Output = AppResult<AuthReceipt>> + Send;

    /// `POST /api/auth/signup`.
    fn signup(&self, credentials: &Credentials) -> impl Future<Output = AppResult<AuthReceipt>> + Send;

    /// `POST /user/register_profile`.
    fn register_profile(&self, user_id: &str, profile: &Profile) -> impl Future<Output = AppResult<ProfileReceipt>> + Send;

    /// `POST /api/auth/logout`.
    fn logout(&self) -> impl Future<Output = AppResult<()>> + Send;
}

/// Retrieval, personalization and translation endpoints.
pub trait ContentBackend: Send + Sync {
    fn rag_chat(&self, req: &ChatRequest) -> impl Future<Output = AppResult<ChatAnswer>> + Send;
    fn general_query(&self, query: &str) -> impl Future<Output = AppResult<QueryAnswer>> + Send;
    fn contextual_query(&self, req: &ContextualRequest) -> impl Future<Output = AppResult<QueryAnswer>> + Send;
    fn personalize(&self, req: &PersonalizeRequest) -> impl Future<Output = AppResult<PersonalizedContent>> + Send;
    fn translate_urdu(&self, req: &TranslateRequest) -> impl Future<Output = AppResult<TranslatedContent>> + Send;
}
