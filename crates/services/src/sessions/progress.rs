use std::fmt;

use super::state::SessionState;

/// Completion numbers for a session, derived on demand and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub done: usize,
    pub total: usize,
    pub percent: u8,
}

impl SessionProgress {
    /// `percent` is `round(100 * done / total)`, or 0 for an empty session.
    #[must_use]
    pub fn new(done: usize, total: usize) -> Self {
        let done = done.min(total);
        let percent = if total == 0 {
            0
        } else {
            // Integer round-half-up of 100 * done / total.
            let scaled = (200 * done + total) / (2 * total);
            u8::try_from(scaled.min(100)).unwrap_or(100)
        };
        Self {
            done,
            total,
            percent,
        }
    }

    #[must_use]
    pub fn of(state: &SessionState) -> Self {
        Self::new(state.answered_count(), state.len())
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.done
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

impl fmt::Display for SessionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}%)", self.done, self.total, self.percent)
    }
}
