//! Client for the Physical AI & Humanoid Robotics textbook API.
//!
//! `session` keeps the reader's authentication state in a single store and runs
//! login/signup/logout/profile operations against the identity backend;
//! `content` adds the chat assistant, personalization and translation on top.

pub mod config;
pub mod error;
pub mod identity;
pub mod backend;
pub mod session;
pub mod content;

pub use config::{ClientConfig, StalePolicy};
pub use error::{AppError, AppResult};
pub use session::{SessionManager, SessionState};
