use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised when converting raw input into a [`LikertValue`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LikertError {
    #[error("likert value out of range 1..=5: {0}")]
    OutOfRange(i64),

    #[error("likert value is not numeric: {0:?}")]
    NotNumeric(String),
}

//
// ─── LIKERT VALUE ─────────────────────────────────────────────────────────────
//

/// A single answer on the five-point agreement scale.
///
/// The value is always within `1..=5`; every constructor validates its input,
/// so holding a `LikertValue` is proof the answer can be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LikertValue(u8);

impl LikertValue {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Every value on the scale, lowest first.
    pub const ALL: [LikertValue; 5] = [
        LikertValue(1),
        LikertValue(2),
        LikertValue(3),
        LikertValue(4),
        LikertValue(5),
    ];

    /// Builds a value, rejecting anything outside `1..=5`.
    ///
    /// # Errors
    ///
    /// Returns `LikertError::OutOfRange` for values outside the scale.
    pub fn new(value: u8) -> Result<Self, LikertError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LikertError::OutOfRange(i64::from(value)))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Fixed textual label shown next to the number.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "does not describe me at all",
            2 => "disagree",
            3 => "neutral",
            4 => "agree",
            _ => "describes me completely",
        }
    }
}

impl TryFrom<u8> for LikertValue {
    type Error = LikertError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for LikertValue {
    type Error = LikertError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| LikertError::OutOfRange(value))
            .and_then(Self::new)
    }
}

impl FromStr for LikertValue {
    type Err = LikertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed: i64 = s
            .trim()
            .parse()
            .map_err(|_| LikertError::NotNumeric(s.to_string()))?;
        Self::try_from(parsed)
    }
}

impl From<LikertValue> for u8 {
    fn from(value: LikertValue) -> Self {
        value.0
    }
}

impl fmt::Display for LikertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
