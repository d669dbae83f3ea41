use quiz_core::model::{LikertValue, QuestionId, QuestionRecord};

use super::progress::SessionProgress;

/// Presentation-agnostic view of the question under the cursor.
///
/// Carries no markup and no pre-formatted labels beyond the counter; hosts
/// decide how to draw the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionView<'a> {
    pub index: usize,
    pub total: usize,
    pub record: &'a QuestionRecord,
    pub answer: Option<LikertValue>,
}

impl QuestionView<'_> {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.record.id()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.record.text()
    }

    /// One-based position, as shown to respondents.
    #[must_use]
    pub fn position(&self) -> usize {
        self.index + 1
    }

    /// `"{position}/{total}"` counter text.
    #[must_use]
    pub fn counter(&self) -> String {
        format!("{}/{}", self.position(), self.total)
    }
}

/// Everything a host needs to redraw after a state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame<'a> {
    /// `None` when the session has no questions.
    pub question: Option<QuestionView<'a>>,
    pub progress: SessionProgress,
    pub can_advance: bool,
    pub can_retreat: bool,
    pub can_finalize: bool,
}

impl RenderFrame<'_> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.question.is_none()
    }
}
