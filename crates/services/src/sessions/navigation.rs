use super::state::SessionState;

/// Result of a navigation attempt. Rejections are reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Moved { from: usize, to: usize },
    /// Advance refused because the current question has no answer yet.
    MustAnswer,
    AtStart,
    AtEnd,
    /// The cursor already sits on the requested question.
    Stayed,
    /// The session has no questions; navigation is off.
    Disabled,
}

impl NavOutcome {
    #[must_use]
    pub fn moved(self) -> bool {
        matches!(self, NavOutcome::Moved { .. })
    }
}

/// Guards cursor movement over a [`SessionState`].
///
/// Forward moves require the current question to be answered; backward moves
/// are always allowed above index 0. The resulting cursor is clamped into the
/// sequence bounds.
pub struct NavigationController<'a> {
    state: &'a mut SessionState,
}

impl<'a> NavigationController<'a> {
    #[must_use]
    pub fn new(state: &'a mut SessionState) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.state.is_current_answered()
    }

    pub fn advance(&mut self) -> NavOutcome {
        if self.state.is_empty() {
            return NavOutcome::Disabled;
        }
        if !self.can_advance() {
            return NavOutcome::MustAnswer;
        }
        if self.state.is_last() {
            return NavOutcome::AtEnd;
        }
        self.move_to(self.state.cursor() + 1)
    }

    pub fn retreat(&mut self) -> NavOutcome {
        if self.state.is_empty() {
            return NavOutcome::Disabled;
        }
        match self.state.cursor().checked_sub(1) {
            Some(target) => self.move_to(target),
            None => NavOutcome::AtStart,
        }
    }

    pub fn jump_to_first_unanswered(&mut self) -> NavOutcome {
        if self.state.is_empty() {
            return NavOutcome::Disabled;
        }
        let target = self.state.resume_index();
        if target == self.state.cursor() {
            return NavOutcome::Stayed;
        }
        self.move_to(target)
    }

    fn move_to(&mut self, target: usize) -> NavOutcome {
        let from = self.state.cursor();
        self.state.set_cursor(target);
        NavOutcome::Moved {
            from,
            to: self.state.cursor(),
        }
    }
}
