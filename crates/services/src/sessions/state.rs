use std::collections::HashMap;
use std::fmt;

use quiz_core::model::{LikertValue, QuestionId, QuestionRecord, ensure_unique_ids};

use crate::error::SessionError;

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Sole source of truth for an assessment in progress.
///
/// Owns the ordered questions (fixed after `build`), the cursor and the answer
/// map. Only the navigation controller moves the cursor; answers change only
/// through `set_answer` or seeding at construction.
pub struct SessionState {
    sequence: Vec<QuestionRecord>,
    index_by_id: HashMap<QuestionId, usize>,
    cursor: usize,
    answers: HashMap<QuestionId, LikertValue>,
}

impl SessionState {
    /// Build a session from already sequenced records.
    ///
    /// Seeded answers are clamped into `1..=5`. The cursor starts at the first
    /// unanswered question, or at 0 when everything is answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Record` if two records share an id.
    pub fn build(sequence: Vec<QuestionRecord>) -> Result<Self, SessionError> {
        ensure_unique_ids(&sequence)?;

        let index_by_id = sequence
            .iter()
            .enumerate()
            .map(|(index, record)| (record.id(), index))
            .collect();

        let mut answers = HashMap::new();
        for record in &sequence {
            // Zero is the "no answer yet" marker.
            let Some(raw) = record.seeded_answer().filter(|raw| *raw != 0) else {
                continue;
            };
            let clamped = raw.clamp(i64::from(LikertValue::MIN), i64::from(LikertValue::MAX));
            match LikertValue::try_from(clamped) {
                Ok(value) => {
                    answers.insert(record.id(), value);
                }
                Err(err) => {
                    tracing::debug!(question_id = %record.id(), %err, "discarding seeded answer");
                }
            }
        }

        let mut state = Self {
            sequence,
            index_by_id,
            cursor: 0,
            answers,
        };
        state.cursor = state.resume_index();
        Ok(state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn sequence(&self) -> &[QuestionRecord] {
        &self.sequence
    }

    #[must_use]
    pub fn current(&self) -> Option<&QuestionRecord> {
        self.sequence.get(self.cursor)
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        !self.is_empty() && self.cursor + 1 == self.sequence.len()
    }

    #[must_use]
    pub fn answer_for(&self, question_id: QuestionId) -> Option<LikertValue> {
        self.answers.get(&question_id).copied()
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, LikertValue> {
        &self.answers
    }

    /// Answers listed in session order, for hosts building their own submission.
    #[must_use]
    pub fn answers_in_order(&self) -> Vec<(QuestionId, LikertValue)> {
        self.sequence
            .iter()
            .filter_map(|record| self.answer_for(record.id()).map(|v| (record.id(), v)))
            .collect()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.sequence.len().saturating_sub(self.answers.len())
    }

    /// True when there is at least one question and all of them are answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.is_empty() && self.unanswered_count() == 0
    }

    #[must_use]
    pub fn is_current_answered(&self) -> bool {
        self.current()
            .is_some_and(|record| self.answers.contains_key(&record.id()))
    }

    /// Index of the first unanswered question, or 0 when all are answered.
    #[must_use]
    pub fn resume_index(&self) -> usize {
        self.sequence
            .iter()
            .position(|record| !self.answers.contains_key(&record.id()))
            .unwrap_or(0)
    }

    /// Store (or overwrite) the answer for a question in this session.
    ///
    /// Returns `true` when the stored value changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` if the id is not in the sequence.
    pub fn set_answer(
        &mut self,
        question_id: QuestionId,
        value: LikertValue,
    ) -> Result<bool, SessionError> {
        if !self.index_by_id.contains_key(&question_id) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        let previous = self.answers.insert(question_id, value);
        Ok(previous != Some(value))
    }

    pub(crate) fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.sequence.len().saturating_sub(1));
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("sequence_len", &self.sequence.len())
            .field("cursor", &self.cursor)
            .field("answered", &self.answers.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
