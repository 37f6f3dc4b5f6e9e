//! Reader-facing content features layered on the session: the textbook chat
//! assistant, chapter personalization and Urdu translation.

mod chat;
mod service;

pub use chat::{parse_contextual, ChatMessage, ChatReply, Sender};
pub use service::{ContentService, CHAT_FAILURE_REPLY, MAX_TRANSCRIPT};
