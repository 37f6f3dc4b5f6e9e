//! Client-side session state: a single store that owns the `SessionState`,
//! a pure reducer that describes every transition, and the manager that runs
//! the remote operations (check, login, signup, logout, profile registration).

mod state;
mod reducer;
mod store;
mod manager;

pub use state::{Operation, Phase, SessionState};
pub use reducer::{reduce, settle, Action};
pub use store::{OperationGuard, SessionStore};
pub use manager::{AuthSuccess, LogoutOutcome, SessionCheck, SessionManager};
