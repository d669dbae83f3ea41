#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use config::EngineOptions;
pub use engine::{
    EngineEvent, FinalizeOutcome, FollowUp, KeyInput, KeyOutcome, QuizEngine, QuizEngineBuilder,
    SelectOutcome,
};
pub use error::{EngineError, SessionError};
pub use host::{HostSignal, QuizHost, RecordingHost};
pub use sessions::{NavOutcome, QuestionView, RenderFrame, SessionProgress};
