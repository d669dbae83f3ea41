use std::env;
use std::time::Duration;

/// Pause between a selection and the automatic move to the next question.
pub const DEFAULT_AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(140);

/// Minimum spacing between two "saved" confirmations.
pub const DEFAULT_CONFIRMATION_INTERVAL: Duration = Duration::from_secs(2);

/// Tunables for a `QuizEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Dot-separated path used to interleave questions by group.
    pub interleave_key: Option<String>,
    /// Seed for a stable per-session shuffle applied before interleaving.
    pub order_seed: Option<u64>,
    /// Zero advances synchronously inside `select_answer`.
    pub auto_advance_delay: Duration,
    pub confirmation_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            interleave_key: None,
            order_seed: None,
            auto_advance_delay: DEFAULT_AUTO_ADVANCE_DELAY,
            confirmation_interval: DEFAULT_CONFIRMATION_INTERVAL,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_interleave_key(mut self, key: impl Into<String>) -> Self {
        self.interleave_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_order_seed(mut self, seed: u64) -> Self {
        self.order_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_auto_advance_delay(mut self, delay: Duration) -> Self {
        self.auto_advance_delay = delay;
        self
    }

    #[must_use]
    pub fn with_confirmation_interval(mut self, interval: Duration) -> Self {
        self.confirmation_interval = interval;
        self
    }

    /// Read `QUIZ_INTERLEAVE_KEY`, `QUIZ_ORDER_SEED`, `QUIZ_AUTO_ADVANCE_MS`
    /// and `QUIZ_CONFIRM_INTERVAL_MS`, keeping defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`EngineOptions::from_env`] with an injectable variable source.
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(key) = lookup("QUIZ_INTERLEAVE_KEY").filter(|k| !k.trim().is_empty()) {
            options.interleave_key = Some(key.trim().to_string());
        }
        if let Some(seed) = parse_var::<u64>(&lookup, "QUIZ_ORDER_SEED") {
            options.order_seed = Some(seed);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "QUIZ_AUTO_ADVANCE_MS") {
            options.auto_advance_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "QUIZ_CONFIRM_INTERVAL_MS") {
            options.confirmation_interval = Duration::from_millis(ms);
        }

        options
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_the_survey_page() {
        let options = EngineOptions::default();
        assert_eq!(options.auto_advance_delay, Duration::from_millis(140));
        assert_eq!(options.confirmation_interval, Duration::from_secs(2));
        assert_eq!(options.interleave_key, None);
    }

    #[test]
    fn reads_overrides_from_lookup() {
        let options = EngineOptions::from_lookup(lookup(&[
            ("QUIZ_INTERLEAVE_KEY", " dimension.name "),
            ("QUIZ_ORDER_SEED", "77"),
            ("QUIZ_AUTO_ADVANCE_MS", "0"),
            ("QUIZ_CONFIRM_INTERVAL_MS", "500"),
        ]));

        assert_eq!(options.interleave_key.as_deref(), Some("dimension.name"));
        assert_eq!(options.order_seed, Some(77));
        assert_eq!(options.auto_advance_delay, Duration::ZERO);
        assert_eq!(options.confirmation_interval, Duration::from_millis(500));
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let options = EngineOptions::from_lookup(lookup(&[
            ("QUIZ_AUTO_ADVANCE_MS", "soon"),
            ("QUIZ_INTERLEAVE_KEY", "   "),
        ]));
        assert_eq!(options, EngineOptions::default());
    }
}
