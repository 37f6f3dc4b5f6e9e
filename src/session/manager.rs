use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::reducer::Action;
use super::state::{Operation, SessionState};
use super::store::{OperationGuard, SessionStore};
use crate::backend::{IdentityBackend, ProfileReceipt};
use crate::config::StalePolicy;
use crate::error::{AppError, AppResult};
use crate::identity::{validate_user_id, Credentials, Profile, SignupForm, User};

/// What a successful login, signup or session check established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSuccess {
    pub user: User,
    pub profile: Option<Profile>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Authenticated(AuthSuccess),
    NoSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOutcome {
    /// False when the logout request failed; local state is cleared regardless.
    pub remote_acknowledged: bool,
}

/// Runs session operations against an identity backend and records their
/// outcome in the shared store.
///
/// Every operation reports twice: the store's `error` field for global
/// consumers, and the returned `Result` for the caller that started it.
pub struct SessionManager<B> {
    backend: Arc<B>,
    store: Arc<SessionStore>,
}

impl<B> Clone for SessionManager<B> {
    fn clone(&self) -> Self {
        Self { backend: self.backend.clone(), store: self.store.clone() }
    }
}

impl<B: IdentityBackend> SessionManager<B> {
    pub fn new(backend: B, policy: StalePolicy) -> Self {
        Self::with_store(Arc::new(backend), Arc::new(SessionStore::new(policy)))
    }

    pub fn with_store(backend: Arc<B>, store: Arc<SessionStore>) -> Self {
        Self { backend, store }
    }

    /// Builds the manager and runs the startup session check. A failed check
    /// is already reflected in the state, so it is not returned.
    pub async fn start(backend: B, policy: StalePolicy) -> Self {
        let manager = Self::new(backend, policy);
        if let Err(e) = manager.check_session().await {
            warn!(target: "textbook::session", error = %e, "startup session check failed");
        }
        manager
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn snapshot(&self) -> SessionState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    /// Asks the backend who the current session belongs to.
    ///
    /// A non-success answer means there is no session and is not an error;
    /// only transport failures and malformed bodies set `error`.
    pub async fn check_session(&self) -> AppResult<SessionCheck> {
        let guard = self.store.begin(Operation::CheckSession);
        match self.backend.current_user().await {
            Ok(Some(user)) => {
                let profile = self.best_effort_profile(&user.id).await;
                guard.commit(Action::Authenticated { user: user.clone(), profile })?;
                info!(target: "textbook::session", user_id = %user.id, "existing session restored");
                Ok(SessionCheck::Authenticated(AuthSuccess { user, profile, session_id: None }))
            }
            Ok(None) => {
                guard.commit(Action::NoSession)?;
                info!(target: "textbook::session", "no existing session");
                Ok(SessionCheck::NoSession)
            }
            Err(e) => Err(fail(guard, e)),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthSuccess> {
        let credentials = Credentials::new(email, password);
        credentials.validate_for_login()?;

        let guard = self.store.begin(Operation::Login);
        let receipt = match self.backend.login(&credentials).await {
            Ok(r) => r,
            Err(e) => return Err(fail(guard, e)),
        };
        let profile = self.best_effort_profile(&receipt.user_id).await;
        let user = User::new(receipt.user_id).with_email(credentials.email);
        guard.commit(Action::Authenticated { user: user.clone(), profile })?;
        info!(target: "textbook::session", user_id = %user.id, has_profile = profile.is_some(), "logged in");
        Ok(AuthSuccess { user, profile, session_id: receipt.session_id })
    }

    /// Creates the identity, then registers its profile.
    ///
    /// If the second write fails the identity already exists server-side; nothing
    /// is rolled back and the caller gets `AppError::ProfileRegistration` carrying
    /// the new user id so it can retry `register_profile`.
    pub async fn signup(&self, email: &str, password: &str, profile: Profile) -> AppResult<AuthSuccess> {
        let form = SignupForm::new(Credentials::new(email, password), profile);
        form.validate()?;

        let guard = self.store.begin(Operation::Signup);
        let receipt = match self.backend.signup(&form.credentials).await {
            Ok(r) => r,
            Err(e) => return Err(fail(guard, e)),
        };
        if let Err(e) = self.backend.register_profile(&receipt.user_id, &form.profile).await {
            warn!(target: "textbook::session", user_id = %receipt.user_id, error = %e, "identity created but profile registration failed");
            let message = match &e {
                AppError::Rejected { message, .. } => message.clone(),
                other => format!("Profile registration failed: {}", other.message()),
            };
            return Err(fail(guard, AppError::profile_registration(receipt.user_id, message)));
        }
        let user = User::new(receipt.user_id).with_email(form.credentials.email);
        guard.commit(Action::Authenticated { user: user.clone(), profile: Some(form.profile) })?;
        info!(target: "textbook::session", user_id = %user.id, "signed up");
        Ok(AuthSuccess { user, profile: Some(form.profile), session_id: receipt.session_id })
    }

    /// Ends the session. Local state is cleared whatever the backend answers,
    /// and whatever other operation started meanwhile; operations still in
    /// flight when it lands are superseded.
    pub async fn logout(&self) -> AppResult<LogoutOutcome> {
        let guard = self.store.begin(Operation::Logout);
        let remote = self.backend.logout().await;
        if let Err(e) = &remote {
            warn!(target: "textbook::session", error = %e, "logout request failed; clearing local session anyway");
        }
        guard.commit(Action::SignedOut)?;
        info!(target: "textbook::session", "logged out");
        Ok(LogoutOutcome { remote_acknowledged: remote.is_ok() })
    }

    /// Writes a profile for `user_id`. Safe to repeat with the same data. The
    /// local profile is replaced only when `user_id` is the signed-in user.
    pub async fn register_profile(&self, user_id: &str, profile: Profile) -> AppResult<ProfileReceipt> {
        validate_user_id(user_id)?;

        let guard = self.store.begin(Operation::RegisterProfile);
        match self.backend.register_profile(user_id, &profile).await {
            Ok(receipt) => {
                guard.commit(Action::ProfileRegistered { user_id: user_id.to_string(), profile })?;
                info!(target: "textbook::session", user_id, "profile registered");
                Ok(receipt)
            }
            Err(e) => {
                let _ = guard.commit(Action::ProfileRejected { error: e.message().to_string() });
                Err(e)
            }
        }
    }

    /// Re-reads the signed-in user's profile. Unlike the fetch inside login,
    /// failures here are returned to the caller.
    pub async fn refresh_profile(&self) -> AppResult<Option<Profile>> {
        let Some(user_id) = self.snapshot().user_id().map(str::to_string) else {
            return Ok(None);
        };
        let profile = self.backend.fetch_profile(&user_id).await?;
        self.store.dispatch(Action::ProfileLoaded { user_id, profile });
        Ok(profile)
    }

    /// Probes the remote session. When the client believes it is signed in but
    /// the backend has no session, the local session is destroyed.
    pub async fn revalidate(&self) -> AppResult<bool> {
        let alive = self.backend.session_active().await?;
        let snap = self.snapshot();
        if !alive && snap.is_authenticated {
            info!(target: "textbook::session", user_id = ?snap.user_id(), "remote session expired; clearing local session");
            self.store.dispatch(Action::SignedOut);
        }
        Ok(alive)
    }

    /// Profile lookup whose failure only leaves the profile absent.
    async fn best_effort_profile(&self, user_id: &str) -> Option<Profile> {
        match self.backend.fetch_profile(user_id).await {
            Ok(Some(p)) => Some(p),
            Ok(None) => {
                warn!(target: "textbook::session", user_id, "user profile not found");
                None
            }
            Err(e) => {
                warn!(target: "textbook::session", user_id, error = %e, "error getting user profile");
                None
            }
        }
    }
}

/// Records a failed login/signup/check in the store and hands the error back.
fn fail(guard: OperationGuard<'_>, err: AppError) -> AppError {
    let _ = guard.commit(Action::AuthFailed { error: err.message().to_string() });
    err
}
