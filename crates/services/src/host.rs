//! Host bindings the engine notifies after each state change.

use std::sync::{Arc, Mutex};

use quiz_core::model::{LikertValue, QuestionId};

use crate::sessions::{RenderFrame, SessionProgress};

/// Notification surface implemented by whatever presents the quiz.
///
/// The engine never draws anything itself; it calls these hooks synchronously
/// from its command methods.
pub trait QuizHost: Send + Sync {
    fn render(&self, frame: &RenderFrame<'_>);

    /// Show or hide the "choose an option to continue" warning.
    fn must_answer(&self, visible: bool) {
        let _ = visible;
    }

    /// A background save succeeded (rate limited by the engine).
    fn saved(&self) {}

    /// The last question was answered; the host may offer final submission.
    fn ready_to_finalize(&self, progress: &SessionProgress) {
        let _ = progress;
    }
}

/// A notification captured by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    Render {
        question: Option<QuestionId>,
        answer: Option<LikertValue>,
        progress: SessionProgress,
    },
    MustAnswer(bool),
    Saved,
    ReadyToFinalize(SessionProgress),
}

/// Host that records every notification, for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    signals: Arc<Mutex<Vec<HostSignal>>>,
}

impl RecordingHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signals(&self) -> Vec<HostSignal> {
        self.signals
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.count(|s| matches!(s, HostSignal::Saved))
    }

    #[must_use]
    pub fn render_count(&self) -> usize {
        self.count(|s| matches!(s, HostSignal::Render { .. }))
    }

    /// Whether the must-answer warning is currently shown.
    #[must_use]
    pub fn warning_visible(&self) -> bool {
        self.signals()
            .iter()
            .rev()
            .find_map(|s| match s {
                HostSignal::MustAnswer(visible) => Some(*visible),
                _ => None,
            })
            .unwrap_or(false)
    }

    #[must_use]
    pub fn last_render(&self) -> Option<HostSignal> {
        self.signals()
            .into_iter()
            .rev()
            .find(|s| matches!(s, HostSignal::Render { .. }))
    }

    fn count(&self, predicate: impl Fn(&HostSignal) -> bool) -> usize {
        self.signals().iter().filter(|s| predicate(s)).count()
    }

    fn push(&self, signal: HostSignal) {
        if let Ok(mut guard) = self.signals.lock() {
            guard.push(signal);
        }
    }
}

impl QuizHost for RecordingHost {
    fn render(&self, frame: &RenderFrame<'_>) {
        self.push(HostSignal::Render {
            question: frame.question.map(|q| q.id()),
            answer: frame.question.and_then(|q| q.answer),
            progress: frame.progress,
        });
    }

    fn must_answer(&self, visible: bool) {
        self.push(HostSignal::MustAnswer(visible));
    }

    fn saved(&self) {
        self.push(HostSignal::Saved);
    }

    fn ready_to_finalize(&self, progress: &SessionProgress) {
        self.push(HostSignal::ReadyToFinalize(*progress));
    }
}
