use async_trait::async_trait;
use quiz_core::model::{LikertValue, QuestionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by persistence adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    #[error("persistence endpoint is unavailable")]
    Unavailable,

    #[error("answer rejected by the server: {0}")]
    Rejected(String),

    #[error("autosave request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Host-supplied capability for storing a single answer remotely.
///
/// The engine calls `token` synchronously right before each write and never
/// caches the result; `post_answer` runs on a background task.
#[async_trait]
pub trait PersistenceBridge: Send + Sync {
    /// Current anti-forgery token expected by the endpoint.
    fn token(&self) -> String;

    /// Store one answer.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` when the write did not succeed. Callers treat
    /// every error as non-fatal.
    async fn post_answer(
        &self,
        question_id: QuestionId,
        value: LikertValue,
        token: &str,
    ) -> Result<(), PersistError>;
}

/// One write observed by [`InMemoryBridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedAnswer {
    pub question_id: QuestionId,
    pub value: LikertValue,
    pub token: String,
}

#[derive(Debug, Default)]
struct InMemoryState {
    token: String,
    token_reads: usize,
    failing: bool,
    posts: Vec<PostedAnswer>,
    stored: HashMap<QuestionId, LikertValue>,
}

/// Simple in-memory bridge for testing and prototyping.
///
/// Clones share the same state, so a test can keep one handle and give the
/// other to the engine.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBridge {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.state.lock() {
            guard.token = token.into();
        }
    }

    /// Make every following write fail with `PersistError::Unavailable`
    /// (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut guard) = self.state.lock() {
            guard.failing = failing;
        }
    }

    /// Every write attempt, in arrival order, including failed ones.
    #[must_use]
    pub fn posts(&self) -> Vec<PostedAnswer> {
        self.state
            .lock()
            .map(|guard| guard.posts.clone())
            .unwrap_or_default()
    }

    /// Last successfully stored value for a question.
    #[must_use]
    pub fn stored(&self, question_id: QuestionId) -> Option<LikertValue> {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.stored.get(&question_id).copied())
    }

    #[must_use]
    pub fn token_reads(&self) -> usize {
        self.state.lock().map(|guard| guard.token_reads).unwrap_or(0)
    }
}

#[async_trait]
impl PersistenceBridge for InMemoryBridge {
    fn token(&self) -> String {
        match self.state.lock() {
            Ok(mut guard) => {
                guard.token_reads += 1;
                guard.token.clone()
            }
            Err(_) => String::new(),
        }
    }

    async fn post_answer(
        &self,
        question_id: QuestionId,
        value: LikertValue,
        token: &str,
    ) -> Result<(), PersistError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| PersistError::Rejected(e.to_string()))?;
        guard.posts.push(PostedAnswer {
            question_id,
            value,
            token: token.to_string(),
        });
        if guard.failing {
            return Err(PersistError::Unavailable);
        }
        guard.stored.insert(question_id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn likert(v: u8) -> LikertValue {
        LikertValue::new(v).unwrap()
    }

    #[tokio::test]
    async fn in_memory_bridge_records_posts_and_stores_last_value() {
        let bridge = InMemoryBridge::new().with_token("csrf-1");
        let token = bridge.token();

        bridge
            .post_answer(QuestionId::new(1), likert(2), &token)
            .await
            .unwrap();
        bridge
            .post_answer(QuestionId::new(1), likert(5), &token)
            .await
            .unwrap();

        assert_eq!(bridge.posts().len(), 2);
        assert_eq!(bridge.posts()[0].token, "csrf-1");
        assert_eq!(bridge.stored(QuestionId::new(1)), Some(likert(5)));
        assert_eq!(bridge.token_reads(), 1);
    }

    #[tokio::test]
    async fn failing_bridge_keeps_attempts_but_stores_nothing() {
        let bridge = InMemoryBridge::new();
        bridge.set_failing(true);

        let err = bridge
            .post_answer(QuestionId::new(3), likert(4), "")
            .await
            .unwrap_err();

        assert!(matches!(err, PersistError::Unavailable));
        assert_eq!(bridge.posts().len(), 1);
        assert_eq!(bridge.stored(QuestionId::new(3)), None);
    }
}
