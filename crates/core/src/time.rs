use chrono::{DateTime, Duration, Utc};

/// Wall-clock source used to space out "saved" confirmations.
///
/// Only the confirmation gate reads time; everything else in a session is
/// driven by user commands and the auto-advance timer. Tests pin the clock with
/// [`fixed_clock`] and move it forward explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Move a pinned clock forward. No-op on the system clock.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Time since `earlier`, never negative even if the system clock stepped back.
    #[must_use]
    pub fn elapsed_since(&self, earlier: DateTime<Utc>) -> Duration {
        (self.now() - earlier).max(Duration::zero())
    }

    /// True once at least `spacing` has passed since `last`, or when there was
    /// no previous instant.
    #[must_use]
    pub fn spaced_from(&self, last: Option<DateTime<Utc>>, spacing: Duration) -> bool {
        last.is_none_or(|last| self.elapsed_since(last) >= spacing)
    }
}

/// 2023-11-14T22:13:20Z, the instant every pinned test clock starts at.
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
