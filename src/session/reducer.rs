use tracing::debug;

use super::state::{Operation, Phase, SessionState};
use crate::identity::{Profile, User};

/// Every way the session can change. Applied only through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// An operation started: loading on, previous error cleared.
    Begin(Operation),
    /// Identity confirmed by the backend.
    Authenticated { user: User, profile: Option<Profile> },
    /// The backend reported no session. Not an error.
    NoSession,
    /// Login, signup or session check failed: identity cleared, error recorded.
    AuthFailed { error: String },
    /// Profile written for `user_id`; applied only when it is the current user.
    ProfileRegistered { user_id: String, profile: Profile },
    /// Profile fetched for `user_id`; applied only when it is the current user.
    ProfileLoaded { user_id: String, profile: Option<Profile> },
    /// A profile write failed; identity is kept.
    ProfileRejected { error: String },
    /// Logout, or the remote session expired.
    SignedOut,
}

pub fn reduce(state: &SessionState, action: &Action) -> SessionState {
    match action {
        Action::Begin(op) => SessionState {
            is_loading: true,
            error: None,
            phase: op.entry_phase(state.phase),
            ..state.clone()
        },
        Action::Authenticated { user, profile } => SessionState {
            user: Some(user.clone()),
            profile: *profile,
            is_authenticated: true,
            is_loading: false,
            error: None,
            phase: Phase::Authenticated,
        },
        Action::NoSession => SessionState::signed_out(),
        Action::AuthFailed { error } => SessionState {
            error: Some(error.clone()),
            ..SessionState::signed_out()
        },
        Action::ProfileRegistered { user_id, profile } => {
            let mut next = SessionState { is_loading: false, error: None, ..state.clone() };
            if state.user_id() == Some(user_id.as_str()) {
                next.profile = Some(*profile);
            } else {
                debug!(target: "textbook::session", user_id = %user_id, "registered profile is not for the current user; state profile unchanged");
            }
            next
        }
        Action::ProfileLoaded { user_id, profile } => {
            if state.user_id() != Some(user_id.as_str()) {
                return state.clone();
            }
            SessionState { profile: *profile, ..state.clone() }
        }
        Action::ProfileRejected { error } => SessionState {
            is_loading: false,
            error: Some(error.clone()),
            ..state.clone()
        },
        Action::SignedOut => SessionState::signed_out(),
    }
}

/// Applies the store's view of in-flight work: sets `is_loading`, and once nothing
/// is pending resolves a leftover transitional phase from what the state holds.
pub fn settle(state: SessionState, loading: bool) -> SessionState {
    let mut next = state;
    next.is_loading = loading;
    if !loading && next.phase.is_transitional() {
        next.phase = if next.is_authenticated { Phase::Authenticated } else { Phase::Unauthenticated };
    }
    next
}
