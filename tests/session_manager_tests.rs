//! Session manager behaviour against a scripted in-memory identity backend.
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use textbook_session::backend::{AuthReceipt, IdentityBackend, ProfileReceipt};
use textbook_session::identity::{Credentials, HardwareExperience, Profile, SoftwareBackground, User};
use textbook_session::session::{Phase, SessionCheck};
use textbook_session::{AppError, AppResult, SessionManager, StalePolicy};

type Gate = Option<oneshot::Receiver<()>>;

/// Identity backend that answers from per-endpoint queues. Login and logout answers may
/// carry a gate so a test can hold the request open.
#[derive(Default)]
struct Scripted {
    me: Mutex<VecDeque<AppResult<Option<User>>>>,
    alive: Mutex<VecDeque<AppResult<bool>>>,
    profiles: Mutex<HashMap<String, AppResult<Option<Profile>>>>,
    logins: Mutex<VecDeque<(Gate, AppResult<AuthReceipt>)>>,
    signups: Mutex<VecDeque<AppResult<AuthReceipt>>>,
    registers: Mutex<VecDeque<AppResult<ProfileReceipt>>>,
    logouts: Mutex<VecDeque<(Gate, AppResult<()>)>>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn me(self, r: AppResult<Option<User>>) -> Self { self.me.lock().push_back(r); self }
    fn alive(self, r: AppResult<bool>) -> Self { self.alive.lock().push_back(r); self }
    fn profile(self, user_id: &str, r: AppResult<Option<Profile>>) -> Self { self.profiles.lock().insert(user_id.to_string(), r); self }
    fn login_ok(self, user_id: &str) -> Self { self.logins.lock().push_back((None, Ok(receipt(user_id)))); self }
    fn login_err(self, e: AppError) -> Self { self.logins.lock().push_back((None, Err(e))); self }
    fn signup(self, r: AppResult<AuthReceipt>) -> Self { self.signups.lock().push_back(r); self }
    fn register(self, r: AppResult<ProfileReceipt>) -> Self { self.registers.lock().push_back(r); self }
    fn logout(self, r: AppResult<()>) -> Self { self.logouts.lock().push_back((None, r)); self }

    /// Queues a login answer that is only delivered once the returned sender fires.
    fn gated_login(&self, r: AppResult<AuthReceipt>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.logins.lock().push_back((Some(rx), r));
        tx
    }

    fn gated_logout(&self, r: AppResult<()>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.logouts.lock().push_back((Some(rx), r));
        tx
    }

    fn calls(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().push(name.to_string());
    }
}

impl IdentityBackend for Scripted {
    async fn current_user(&self) -> AppResult<Option<User>> {
        self.record("me");
        let next = self.me.lock().pop_front();
        next.unwrap_or(Ok(None))
    }

    async fn session_active(&self) -> AppResult<bool> {
        self.record("session");
        let next = self.alive.lock().pop_front();
        next.unwrap_or(Ok(false))
    }

    async fn fetch_profile(&self, user_id: &str) -> AppResult<Option<Profile>> {
        self.record("profile");
        let found = self.profiles.lock().get(user_id).cloned();
        found.unwrap_or(Ok(None))
    }

    async fn login(&self, _credentials: &Credentials) -> AppResult<AuthReceipt> {
        self.record("login");
        let next = self.logins.lock().pop_front();
        let (gate, result) = next.expect("unexpected login call");
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn signup(&self, _credentials: &Credentials) -> AppResult<AuthReceipt> {
        self.record("signup");
        let next = self.signups.lock().pop_front();
        next.expect("unexpected signup call")
    }

    async fn register_profile(&self, _user_id: &str, _profile: &Profile) -> AppResult<ProfileReceipt> {
        self.record("register");
        let next = self.registers.lock().pop_front();
        next.unwrap_or_else(|| Ok(ProfileReceipt::default()))
    }

    async fn logout(&self) -> AppResult<()> {
        self.record("logout");
        let next = self.logouts.lock().pop_front();
        let Some((gate, result)) = next else {
            return Ok(());
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }
}

fn receipt(user_id: &str) -> AuthReceipt {
    AuthReceipt { user_id: user_id.to_string(), session_id: Some(format!("sess-{}", user_id)), message: None }
}

fn ros_beginner() -> Profile {
    Profile::new(SoftwareBackground::PythonRos, HardwareExperience::Beginner)
}

fn jetson_ml() -> Profile {
    Profile::new(SoftwareBackground::DataScienceMl, HardwareExperience::IntermediateJetson)
}

/// Yields to spawned tasks until `cond` holds.
async fn until(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn check_session_without_session_leaves_clean_state() -> Result<()> {
    let m = SessionManager::new(Scripted::default().me(Ok(None)), StalePolicy::LatestStarted);
    assert!(m.snapshot().is_loading);

    assert_eq!(m.check_session().await?, SessionCheck::NoSession);
    let s = m.snapshot();
    assert_eq!(s.user, None);
    assert!(!s.is_authenticated);
    assert!(!s.is_loading);
    assert_eq!(s.error, None);
    assert_eq!(s.phase, Phase::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn check_session_restores_user_and_profile() -> Result<()> {
    let user = User { id: "u1".into(), email: Some("a@b.com".into()), name: Some("Ada".into()) };
    let backend = Scripted::default().me(Ok(Some(user.clone()))).profile("u1", Ok(Some(ros_beginner())));
    let m = SessionManager::start(backend, StalePolicy::LatestStarted).await;

    let s = m.snapshot();
    assert_eq!(s.user, Some(user));
    assert_eq!(s.profile, Some(ros_beginner()));
    assert!(s.is_authenticated);
    assert!(!s.is_loading);
    assert_eq!(s.phase, Phase::Authenticated);
    Ok(())
}

#[tokio::test]
async fn check_session_transport_failure_is_recorded() -> Result<()> {
    let backend = Scripted::default().me(Err(AppError::transport("connect_failed", "connection refused")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let err = m.check_session().await.unwrap_err();
    assert_eq!(err.code_str(), "connect_failed");
    let s = m.snapshot();
    assert_eq!(s.error.as_deref(), Some("connection refused"));
    assert!(!s.is_authenticated);
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn login_without_profile_still_authenticates() -> Result<()> {
    let m = SessionManager::new(Scripted::default().login_ok("u1"), StalePolicy::LatestStarted);

    let ok = m.login("  a@b.com ", "secret").await?;
    assert_eq!(ok.user.id, "u1");
    assert_eq!(ok.user.email.as_deref(), Some("a@b.com"));
    assert_eq!(ok.session_id.as_deref(), Some("sess-u1"));

    let s = m.snapshot();
    assert!(s.is_authenticated);
    assert_eq!(s.user_id(), Some("u1"));
    assert_eq!(s.profile, None);
    assert_eq!(s.error, None);
    assert_eq!(m.backend().calls("profile"), 1);
    Ok(())
}

#[tokio::test]
async fn login_loads_profile_and_ignores_profile_errors() -> Result<()> {
    let backend = Scripted::default()
        .login_ok("u1")
        .profile("u1", Ok(Some(jetson_ml())))
        .login_ok("u2")
        .profile("u2", Err(AppError::transport("timeout", "profile lookup timed out")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let ok = m.login("a@b.com", "secret").await?;
    assert_eq!(ok.profile, Some(jetson_ml()));
    assert_eq!(m.snapshot().profile, Some(jetson_ml()));

    let ok = m.login("c@d.com", "secret").await?;
    assert_eq!(ok.profile, None);
    let s = m.snapshot();
    assert_eq!(s.user_id(), Some("u2"));
    assert_eq!(s.profile, None);
    assert_eq!(s.error, None);
    Ok(())
}

#[tokio::test]
async fn rejected_login_records_backend_detail() -> Result<()> {
    let backend = Scripted::default().login_err(AppError::rejected(401, "login_failed", "Invalid credentials"));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let err = m.login("a@b.com", "wrong").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    let s = m.snapshot();
    assert_eq!(s.error.as_deref(), Some("Invalid credentials"));
    assert_eq!(s.user, None);
    assert!(!s.is_authenticated);
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn validation_failures_do_not_touch_state() -> Result<()> {
    let m = SessionManager::new(Scripted::default(), StalePolicy::LatestStarted);
    m.check_session().await?;
    let before = m.snapshot();

    assert!(m.login("", "secret").await.unwrap_err().is_validation());
    assert!(m.login("a@b.com", "").await.unwrap_err().is_validation());
    let err = m.signup("a@b.com", "12345", ros_beginner()).await.unwrap_err();
    assert_eq!(err.code_str(), "password_too_short");
    assert!(m.register_profile(" ", ros_beginner()).await.unwrap_err().is_validation());

    assert_eq!(m.snapshot(), before);
    assert_eq!(m.backend().calls("login"), 0);
    assert_eq!(m.backend().calls("signup"), 0);
    assert_eq!(m.backend().calls("register"), 0);
    Ok(())
}

#[tokio::test]
async fn loading_is_visible_and_error_cleared_while_login_runs() -> Result<()> {
    let backend = Scripted::default().login_err(AppError::rejected(401, "login_failed", "Invalid credentials"));
    let release = backend.gated_login(Ok(receipt("u1")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    m.login("a@b.com", "wrong").await.unwrap_err();
    assert!(m.snapshot().error.is_some());

    let task = tokio::spawn({
        let m = m.clone();
        async move { m.login("a@b.com", "right").await }
    });
    until(|| m.backend().calls("login") == 2).await;

    let s = m.snapshot();
    assert!(s.is_loading);
    assert_eq!(s.error, None);
    assert_eq!(s.phase, Phase::LoggingIn);

    release.send(()).ok();
    task.await??;
    let s = m.snapshot();
    assert!(!s.is_loading);
    assert_eq!(s.user_id(), Some("u1"));
    Ok(())
}

#[tokio::test]
async fn cancelled_login_does_not_leave_loading_on() -> Result<()> {
    let backend = Scripted::default();
    let _held = backend.gated_login(Ok(receipt("u1")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    m.check_session().await?;

    let res = tokio::time::timeout(Duration::from_millis(20), m.login("a@b.com", "secret")).await;
    assert!(res.is_err());
    let s = m.snapshot();
    assert!(!s.is_loading);
    assert_eq!(s.phase, Phase::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_even_when_backend_fails() -> Result<()> {
    let backend = Scripted::default()
        .login_ok("u1")
        .profile("u1", Ok(Some(ros_beginner())))
        .logout(Err(AppError::transport("connect_failed", "connection refused")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    m.login("a@b.com", "secret").await?;

    let out = m.logout().await?;
    assert!(!out.remote_acknowledged);
    let s = m.snapshot();
    assert_eq!(s.user, None);
    assert_eq!(s.profile, None);
    assert!(!s.is_authenticated);
    assert!(!s.is_loading);
    assert_eq!(s.error, None);
    assert_eq!(s.phase, Phase::Unauthenticated);

    assert!(m.logout().await?.remote_acknowledged);
    Ok(())
}

#[tokio::test]
async fn logout_lands_after_a_newer_operation_completes() -> Result<()> {
    let backend = Scripted::default().login_ok("u1");
    let release = backend.gated_logout(Ok(()));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    m.login("a@b.com", "secret").await?;

    let logout = tokio::spawn({
        let m = m.clone();
        async move { m.logout().await }
    });
    until(|| m.backend().calls("logout") == 1).await;

    m.register_profile("u1", ros_beginner()).await?;
    assert!(m.snapshot().is_authenticated);

    release.send(()).ok();
    assert!(logout.await??.remote_acknowledged);
    let s = m.snapshot();
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
    assert_eq!(s.profile, None);
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn login_in_flight_cannot_undo_logout() -> Result<()> {
    let backend = Scripted::default().login_ok("u1");
    let release_login = backend.gated_login(Ok(receipt("u1")));
    let release_logout = backend.gated_logout(Ok(()));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    m.login("a@b.com", "secret").await?;

    let logout = tokio::spawn({
        let m = m.clone();
        async move { m.logout().await }
    });
    until(|| m.backend().calls("logout") == 1).await;
    let login = tokio::spawn({
        let m = m.clone();
        async move { m.login("a@b.com", "secret").await }
    });
    until(|| m.backend().calls("login") == 2).await;

    release_logout.send(()).ok();
    logout.await??;
    release_login.send(()).ok();
    assert_eq!(login.await?.unwrap_err().code_str(), "superseded");

    let s = m.snapshot();
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn rejected_signup_skips_profile_write() -> Result<()> {
    let backend = Scripted::default().signup(Err(AppError::rejected(409, "signup_failed", "User already exists")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let err = m.signup("taken@user.io", "hunter22", ros_beginner()).await.unwrap_err();
    assert_eq!(err, AppError::rejected(409, "signup_failed", "User already exists"));
    assert_eq!(m.backend().calls("register"), 0);
    let s = m.snapshot();
    assert_eq!(s.error.as_deref(), Some("User already exists"));
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn signup_registers_profile_and_authenticates() -> Result<()> {
    let backend = Scripted::default().signup(Ok(receipt("u2")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let ok = m.signup("new@user.io", "hunter22", jetson_ml()).await?;
    assert_eq!(ok.user.id, "u2");
    assert_eq!(ok.profile, Some(jetson_ml()));
    let s = m.snapshot();
    assert!(s.is_authenticated);
    assert_eq!(s.profile, Some(jetson_ml()));
    assert_eq!(m.backend().calls("register"), 1);
    Ok(())
}

#[tokio::test]
async fn signup_with_failed_profile_write_reports_created_user() -> Result<()> {
    let backend = Scripted::default()
        .signup(Ok(receipt("u2")))
        .register(Err(AppError::rejected(500, "profile_registration_failed", "Profile registration failed")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let err = m.signup("new@user.io", "hunter22", jetson_ml()).await.unwrap_err();
    match &err {
        AppError::ProfileRegistration { user_id, message, .. } => {
            assert_eq!(user_id, "u2");
            assert_eq!(message, "Profile registration failed");
        }
        other => panic!("expected profile registration error, got {:?}", other),
    }
    let s = m.snapshot();
    assert_eq!(s.error.as_deref(), Some("Profile registration failed"));
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
    assert!(!s.is_loading);

    // the identity exists server-side; the profile can be retried for it
    m.register_profile("u2", jetson_ml()).await?;
    Ok(())
}

#[tokio::test]
async fn signup_transport_failure_on_profile_write_is_prefixed() -> Result<()> {
    let backend = Scripted::default()
        .signup(Ok(receipt("u3")))
        .register(Err(AppError::transport("timeout", "operation timed out")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let err = m.signup("x@y.org", "hunter22", ros_beginner()).await.unwrap_err();
    assert_eq!(err.code_str(), "profile_registration_failed");
    assert_eq!(err.message(), "Profile registration failed: operation timed out");
    Ok(())
}

#[tokio::test]
async fn register_profile_updates_only_the_current_user() -> Result<()> {
    let m = SessionManager::new(Scripted::default().login_ok("u1"), StalePolicy::LatestStarted);
    m.login("a@b.com", "secret").await?;

    m.register_profile("u2", jetson_ml()).await?;
    let s = m.snapshot();
    assert_eq!(s.profile, None);
    assert_eq!(s.phase, Phase::Authenticated);
    assert!(!s.is_loading);

    m.register_profile("u1", jetson_ml()).await?;
    // repeating the same write is harmless
    m.register_profile("u1", jetson_ml()).await?;
    assert_eq!(m.snapshot().profile, Some(jetson_ml()));
    Ok(())
}

#[tokio::test]
async fn register_profile_failure_keeps_identity() -> Result<()> {
    let backend = Scripted::default()
        .login_ok("u1")
        .register(Err(AppError::rejected(422, "profile_registration_failed", "field required")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    m.login("a@b.com", "secret").await?;

    let err = m.register_profile("u1", ros_beginner()).await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    let s = m.snapshot();
    assert!(s.is_authenticated);
    assert_eq!(s.user_id(), Some("u1"));
    assert_eq!(s.error.as_deref(), Some("field required"));
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn refresh_profile_picks_up_remote_changes() -> Result<()> {
    let backend = Scripted::default().login_ok("u1");
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    assert_eq!(m.refresh_profile().await?, None);
    assert_eq!(m.backend().calls("profile"), 0);

    m.login("a@b.com", "secret").await?;
    m.backend().profiles.lock().insert("u1".into(), Ok(Some(ros_beginner())));
    assert_eq!(m.refresh_profile().await?, Some(ros_beginner()));
    assert_eq!(m.snapshot().profile, Some(ros_beginner()));
    Ok(())
}

#[tokio::test]
async fn revalidate_signs_out_when_remote_session_is_gone() -> Result<()> {
    let backend = Scripted::default().login_ok("u1").alive(Ok(true)).alive(Ok(false));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);
    m.login("a@b.com", "secret").await?;

    assert!(m.revalidate().await?);
    assert!(m.snapshot().is_authenticated);

    assert!(!m.revalidate().await?);
    let s = m.snapshot();
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
    assert_eq!(s.error, None);
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn overlapping_logins_keep_the_latest_started() -> Result<()> {
    let backend = Scripted::default();
    let first = backend.gated_login(Ok(receipt("first")));
    let second = backend.gated_login(Ok(receipt("second")));
    let m = SessionManager::new(backend, StalePolicy::LatestStarted);

    let a = tokio::spawn({
        let m = m.clone();
        async move { m.login("a@b.com", "secret").await }
    });
    until(|| m.backend().calls("login") == 1).await;
    let b = tokio::spawn({
        let m = m.clone();
        async move { m.login("a@b.com", "secret").await }
    });
    until(|| m.backend().calls("login") == 2).await;

    second.send(()).ok();
    assert_eq!(b.await??.user.id, "second");
    first.send(()).ok();
    let err = a.await?.unwrap_err();
    assert_eq!(err.code_str(), "superseded");

    let s = m.snapshot();
    assert_eq!(s.user_id(), Some("second"));
    assert!(!s.is_loading);
    Ok(())
}

#[tokio::test]
async fn overlapping_logins_last_completed_wins() -> Result<()> {
    let backend = Scripted::default();
    let first = backend.gated_login(Ok(receipt("first")));
    let second = backend.gated_login(Ok(receipt("second")));
    let m = SessionManager::new(backend, StalePolicy::LastCompleted);

    let a = tokio::spawn({
        let m = m.clone();
        async move { m.login("a@b.com", "secret").await }
    });
    until(|| m.backend().calls("login") == 1).await;
    let b = tokio::spawn({
        let m = m.clone();
        async move { m.login("a@b.com", "secret").await }
    });
    until(|| m.backend().calls("login") == 2).await;

    second.send(()).ok();
    b.await??;
    // the first login is still in flight
    assert!(m.snapshot().is_loading);

    first.send(()).ok();
    a.await??;
    let s = m.snapshot();
    assert_eq!(s.user_id(), Some("first"));
    assert!(!s.is_loading);
    Ok(())
}
