use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use persistence::{PersistError, PersistenceBridge};
use quiz_core::Clock;
use quiz_core::model::{LikertValue, QuestionId};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::EngineEvent;

/// Outcome of one background write, delivered back to the event loop.
#[derive(Debug)]
pub struct AutosaveReport {
    pub question_id: QuestionId,
    pub value: LikertValue,
    pub outcome: Result<(), PersistError>,
}

/// Spaces out "saved" confirmations so rapid answers do not spam the host.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    min_interval: chrono::Duration,
    last: Option<DateTime<Utc>>,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval: chrono::Duration::from_std(min_interval)
                .unwrap_or(chrono::Duration::MAX),
            last: None,
        }
    }

    /// Returns `true` (and records the current instant) if a confirmation may
    /// be shown.
    pub fn try_confirm(&mut self, clock: &Clock) -> bool {
        if !clock.spaced_from(self.last, self.min_interval) {
            return false;
        }
        self.last = Some(clock.now());
        true
    }
}

/// Fire-and-forget persistence of single answers.
///
/// Each `dispatch` reads a fresh token and spawns exactly one write. Writes are
/// never awaited by the caller, never retried and never batched; their
/// completions may arrive in any order. Failures are logged and otherwise
/// dropped.
pub struct AutosaveDispatcher {
    bridge: Arc<dyn PersistenceBridge>,
    runtime: Handle,
    events: UnboundedSender<EngineEvent>,
    gate: ConfirmationGate,
    clock: Clock,
    in_flight: usize,
}

impl AutosaveDispatcher {
    pub(crate) fn new(
        bridge: Arc<dyn PersistenceBridge>,
        runtime: Handle,
        events: UnboundedSender<EngineEvent>,
        confirmation_interval: Duration,
        clock: Clock,
    ) -> Self {
        Self {
            bridge,
            runtime,
            events,
            gate: ConfirmationGate::new(confirmation_interval),
            clock,
            in_flight: 0,
        }
    }

    pub fn dispatch(&mut self, question_id: QuestionId, value: LikertValue) {
        let token = self.bridge.token();
        let bridge = Arc::clone(&self.bridge);
        let events = self.events.clone();
        self.in_flight += 1;
        tracing::debug!(%question_id, %value, in_flight = self.in_flight, "autosave dispatched");

        self.runtime.spawn(async move {
            let outcome = bridge.post_answer(question_id, value, &token).await;
            // A closed channel means the engine is gone; nobody is left to confirm to.
            let _ = events.send(EngineEvent::AutosaveFinished(AutosaveReport {
                question_id,
                value,
                outcome,
            }));
        });
    }

    /// Account for a finished write. Returns `true` when the host should show
    /// a "saved" confirmation.
    pub fn complete(&mut self, report: &AutosaveReport) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        match &report.outcome {
            Ok(()) => self.gate.try_confirm(&self.clock),
            Err(err) => {
                tracing::warn!(
                    question_id = %report.question_id,
                    value = %report.value,
                    %err,
                    "autosave failed"
                );
                false
            }
        }
    }

    /// Writes dispatched but not yet reported back.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::InMemoryBridge;
    use quiz_core::time::fixed_clock;
    use tokio::sync::mpsc;

    fn likert(v: u8) -> LikertValue {
        LikertValue::new(v).unwrap()
    }

    #[test]
    fn gate_enforces_minimum_spacing() {
        let mut gate = ConfirmationGate::new(Duration::from_secs(2));
        let mut clock = fixed_clock();

        assert!(gate.try_confirm(&clock));
        clock.advance(chrono::Duration::milliseconds(1999));
        assert!(!gate.try_confirm(&clock));
        clock.advance(chrono::Duration::milliseconds(1));
        assert!(gate.try_confirm(&clock));
        clock.advance(chrono::Duration::seconds(1));
        assert!(!gate.try_confirm(&clock));
    }

    #[tokio::test]
    async fn each_dispatch_posts_once_with_fresh_token() {
        let bridge = InMemoryBridge::new().with_token("csrf");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = AutosaveDispatcher::new(
            Arc::new(bridge.clone()),
            Handle::current(),
            tx,
            Duration::from_secs(2),
            fixed_clock(),
        );

        dispatcher.dispatch(QuestionId::new(1), likert(3));
        dispatcher.dispatch(QuestionId::new(1), likert(4));
        assert_eq!(dispatcher.in_flight(), 2);
        assert_eq!(bridge.token_reads(), 2);

        let mut confirmations = 0;
        for _ in 0..2 {
            let Some(EngineEvent::AutosaveFinished(report)) = rx.recv().await else {
                panic!("expected autosave report");
            };
            assert!(report.outcome.is_ok());
            if dispatcher.complete(&report) {
                confirmations += 1;
            }
        }

        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(confirmations, 1);
        assert_eq!(bridge.posts().len(), 2);
        assert!(bridge.posts().iter().all(|p| p.token == "csrf"));
    }

    #[tokio::test]
    async fn confirmation_returns_once_the_clock_moves_on() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = AutosaveDispatcher::new(
            Arc::new(InMemoryBridge::new()),
            Handle::current(),
            tx,
            Duration::from_secs(2),
            fixed_clock(),
        );

        let mut confirmations = Vec::new();
        for value in [2, 3] {
            dispatcher.dispatch(QuestionId::new(4), likert(value));
            let Some(EngineEvent::AutosaveFinished(report)) = rx.recv().await else {
                panic!("expected autosave report");
            };
            confirmations.push(dispatcher.complete(&report));
            dispatcher.clock.advance(chrono::Duration::seconds(2));
        }

        assert_eq!(confirmations, vec![true, true]);
    }

    #[tokio::test]
    async fn failures_are_swallowed_without_confirmation() {
        let bridge = InMemoryBridge::new();
        bridge.set_failing(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = AutosaveDispatcher::new(
            Arc::new(bridge),
            Handle::current(),
            tx,
            Duration::from_secs(2),
            fixed_clock(),
        );

        dispatcher.dispatch(QuestionId::new(7), likert(1));
        let Some(EngineEvent::AutosaveFinished(report)) = rx.recv().await else {
            panic!("expected autosave report");
        };

        assert!(report.outcome.is_err());
        assert!(!dispatcher.complete(&report));
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
