use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::chat::{parse_contextual, ChatMessage, ChatReply, Sender};
use crate::backend::{ChatRequest, ContentBackend, PersonalizeRequest, PersonalizedContent, QueryAnswer, TranslateRequest, TranslatedContent};
use crate::config::DEFAULT_CHAT_TOP_K;
use crate::error::{AppError, AppResult};
use crate::session::SessionState;

/// Oldest chat messages are dropped beyond this many.
pub const MAX_TRANSCRIPT: usize = 200;

/// Bot reply recorded when the assistant could not answer.
pub const CHAT_FAILURE_REPLY: &str = "Sorry, I encountered an error processing your request. Please try again.";

/// Chat, personalization and translation for the current reader.
///
/// Holds a read-only view of the session so personalization and translation can
/// be refused locally for signed-out readers, like the site hides those buttons.
pub struct ContentService<B> {
    backend: Arc<B>,
    session: watch::Receiver<SessionState>,
    top_k: u32,
    transcript: Mutex<Vec<ChatMessage>>,
    // chapter slug -> content before translation
    originals: Mutex<HashMap<String, String>>,
}

impl<B: ContentBackend> ContentService<B> {
    pub fn new(backend: Arc<B>, session: watch::Receiver<SessionState>) -> Self {
        Self {
            backend,
            session,
            top_k: DEFAULT_CHAT_TOP_K,
            transcript: Mutex::new(Vec::new()),
            originals: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_top_k(mut self, k: u32) -> Self {
        self.top_k = k.max(1);
        self
    }

    /// Answers a reader question. Selected-text questions go to the contextual
    /// endpoint, everything else to retrieval-augmented chat.
    pub async fn ask(&self, input: &str) -> AppResult<ChatReply> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::validation("empty_question", "Type a question first"));
        }
        self.record(ChatMessage::new(Sender::User, input));

        let reply = match parse_contextual(input) {
            Some(req) => {
                debug!(target: "textbook::content", selected_len = req.selected_text.len(), "contextual question");
                self.backend
                    .contextual_query(&req)
                    .await
                    .map(|a| ChatReply { text: a.answer, sources: a.sources, contextual: true })
            }
            None => {
                let req = ChatRequest { query: input.to_string(), top_k: self.top_k };
                self.backend
                    .rag_chat(&req)
                    .await
                    .map(|a| ChatReply { text: a.response, sources: a.sources, contextual: false })
            }
        };
        match reply {
            Ok(reply) => {
                self.record(ChatMessage::new(Sender::Bot, reply.text.clone()));
                Ok(reply)
            }
            Err(e) => {
                warn!(target: "textbook::content", error = %e, "chat request failed");
                self.record(ChatMessage::new(Sender::Bot, CHAT_FAILURE_REPLY));
                Err(e)
            }
        }
    }

    pub async fn general_query(&self, query: &str) -> AppResult<QueryAnswer> {
        if query.trim().is_empty() {
            return Err(AppError::validation("empty_question", "Type a question first"));
        }
        self.backend.general_query(query.trim()).await
    }

    /// Rewrites a chapter for the reader's profile. Requires a signed-in reader.
    pub async fn personalize(&self, module_id: &str, chapter_slug: &str) -> AppResult<PersonalizedContent> {
        let session = self.signed_in("personalize")?;
        if module_id.trim().is_empty() || chapter_slug.trim().is_empty() {
            return Err(AppError::validation("missing_chapter", "Module ID or Chapter Slug not available"));
        }
        let user_id = session.user_id().unwrap_or_default().to_string();
        let user_profile = match &session.profile {
            Some(p) => serde_json::to_value(p).unwrap_or_else(|_| Value::Object(Default::default())),
            None => Value::Object(Default::default()),
        };
        let req = PersonalizeRequest {
            user_id,
            chapter_id: chapter_slug.to_string(),
            module_id: module_id.to_string(),
            user_profile,
        };
        let out = self.backend.personalize(&req).await?;
        info!(target: "textbook::content", chapter = chapter_slug, module = module_id, "content personalized");
        Ok(out)
    }

    /// Translates chapter Markdown to Urdu and remembers the original for `revert`.
    pub async fn translate(&self, chapter_slug: &str, content: &str) -> AppResult<TranslatedContent> {
        self.signed_in("translate")?;
        if chapter_slug.trim().is_empty() || content.trim().is_empty() {
            return Err(AppError::validation("missing_chapter", "Chapter Slug or Chapter Content not available"));
        }
        let req = TranslateRequest { chapter_slug: chapter_slug.to_string(), original_content: content.to_string() };
        let out = self.backend.translate_urdu(&req).await?;
        self.originals.lock().insert(chapter_slug.to_string(), content.to_string());
        info!(target: "textbook::content", chapter = chapter_slug, "content translated");
        Ok(out)
    }

    /// Original content of a translated chapter; forgets it afterwards.
    pub fn revert(&self, chapter_slug: &str) -> Option<String> {
        self.originals.lock().remove(chapter_slug)
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    fn record(&self, msg: ChatMessage) {
        let mut t = self.transcript.lock();
        t.push(msg);
        if t.len() > MAX_TRANSCRIPT {
            let excess = t.len() - MAX_TRANSCRIPT;
            t.drain(..excess);
        }
    }

    fn signed_in(&self, action: &str) -> AppResult<SessionState> {
        let s = self.session.borrow().clone();
        if s.is_loading {
            return Err(AppError::validation(
                "session_busy".to_string(),
                format!("Session is busy; try to {} again in a moment", action),
            ));
        }
        if !s.is_authenticated || s.user.is_none() {
            return Err(AppError::validation("not_authenticated".to_string(), format!("Sign in to {} content", action)));
        }
        Ok(s)
    }
}
