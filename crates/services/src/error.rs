//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, RecordError};

/// Errors emitted by session state and navigation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Errors emitted while starting or driving a `QuizEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("quiz engine must be started inside a tokio runtime")]
    NoRuntime,
    #[error("invalid question payload: {0}")]
    Init(#[from] RecordError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
