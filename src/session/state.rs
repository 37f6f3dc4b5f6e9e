use serde::Serialize;

use crate::identity::{Profile, User};

/// Where the session sits in its lifecycle.
///
/// `Checking`, `LoggingIn`, `SigningUp` and `LoggingOut` are transitional and only
/// observed while the matching operation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unknown,
    Checking,
    Authenticated,
    Unauthenticated,
    LoggingIn,
    SigningUp,
    LoggingOut,
}

impl Phase {
    pub fn is_transitional(&self) -> bool {
        matches!(self, Phase::Unknown | Phase::Checking | Phase::LoggingIn | Phase::SigningUp | Phase::LoggingOut)
    }
}

/// The remote operations that mutate the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CheckSession,
    Login,
    Signup,
    Logout,
    RegisterProfile,
}

impl Operation {
    /// Phase entered when the operation starts. Profile registration does not
    /// move the lifecycle, so it keeps whatever phase is current.
    pub fn entry_phase(&self, current: Phase) -> Phase {
        match self {
            Operation::CheckSession => Phase::Checking,
            Operation::Login => Phase::LoggingIn,
            Operation::Signup => Phase::SigningUp,
            Operation::Logout => Phase::LoggingOut,
            Operation::RegisterProfile => current,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CheckSession => "check_session",
            Operation::Login => "login",
            Operation::Signup => "signup",
            Operation::Logout => "logout",
            Operation::RegisterProfile => "register_profile",
        }
    }
}

/// Read-only snapshot of the session handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub phase: Phase,
}

impl SessionState {
    /// State at process start, before the first session check resolves.
    pub fn initial() -> Self {
        Self { user: None, profile: None, is_authenticated: false, is_loading: true, error: None, phase: Phase::Unknown }
    }

    /// State after logout or when the remote session is gone.
    pub fn signed_out() -> Self {
        Self { is_loading: false, phase: Phase::Unauthenticated, ..Self::initial() }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Structural invariants: authentication and a profile both require a user.
    pub fn is_consistent(&self) -> bool {
        (!self.is_authenticated || self.user.is_some()) && (self.profile.is_none() || self.user.is_some())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}
