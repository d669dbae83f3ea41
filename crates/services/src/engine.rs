use std::sync::Arc;
use std::time::Duration;

use persistence::PersistenceBridge;
use quiz_core::Clock;
use quiz_core::model::{LikertValue, QuestionId, QuestionRecord};
use quiz_core::sequencer::{sequence, stable_shuffle};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::EngineOptions;
use crate::error::{EngineError, SessionError};
use crate::host::QuizHost;
use crate::sessions::{
    AutosaveDispatcher, AutosaveReport, NavOutcome, NavigationController, QuestionView,
    RenderFrame, SessionProgress, SessionState,
};

/// Work delivered back to the engine from background tasks.
#[derive(Debug)]
pub enum EngineEvent {
    /// The auto-advance timer with this generation fired.
    AutoAdvance { generation: u64 },
    AutosaveFinished(AutosaveReport),
}

/// What happened after a selection was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    AutoAdvanceScheduled(Duration),
    /// Zero delay: the cursor already moved.
    Advanced(NavOutcome),
    ReadyToFinalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOutcome {
    pub question_id: QuestionId,
    pub value: LikertValue,
    pub changed: bool,
    pub follow_up: Option<FollowUp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Ready,
    Blocked { missing: usize },
    NoContent,
}

/// Keyboard shortcuts understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Previous,
    Next,
    Select(LikertValue),
}

impl KeyInput {
    /// Map a key name (`ArrowLeft`, `ArrowRight`, `1`..`5`) to an input.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Self::Previous),
            "ArrowRight" => Some(Self::Next),
            other => other.parse::<LikertValue>().ok().map(Self::Select),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Navigated(NavOutcome),
    Selected(SelectOutcome),
    Ignored,
}

struct PendingAdvance {
    generation: u64,
    task: JoinHandle<()>,
}

/// Configures and starts a [`QuizEngine`].
pub struct QuizEngineBuilder {
    host: Arc<dyn QuizHost>,
    bridge: Arc<dyn PersistenceBridge>,
    options: EngineOptions,
    clock: Clock,
}

impl QuizEngineBuilder {
    #[must_use]
    pub fn new(host: Arc<dyn QuizHost>, bridge: Arc<dyn PersistenceBridge>) -> Self {
        Self {
            host,
            bridge,
            options: EngineOptions::default(),
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sequence the records, build the session and render the first frame.
    ///
    /// An empty record list starts a session in the no-content state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NoRuntime` outside a tokio runtime and
    /// `EngineError::Session` if two records share an id.
    pub fn start(self, records: Vec<QuestionRecord>) -> Result<QuizEngine, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let records = match self.options.order_seed {
            Some(seed) => stable_shuffle(records, seed),
            None => records,
        };
        let ordered = sequence(records, self.options.interleave_key.as_deref());
        let state = SessionState::build(ordered)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let autosave = AutosaveDispatcher::new(
            self.bridge,
            runtime.clone(),
            events_tx.clone(),
            self.options.confirmation_interval,
            self.clock,
        );

        tracing::info!(
            total = state.len(),
            answered = state.answered_count(),
            resume_index = state.cursor(),
            interleave_key = self.options.interleave_key.as_deref().unwrap_or("-"),
            "quiz session started"
        );

        let engine = QuizEngine {
            state,
            host: self.host,
            autosave,
            options: self.options,
            runtime,
            events_tx,
            events_rx,
            pending_advance: None,
            generation: 0,
            warning_visible: false,
        };
        engine.render();
        Ok(engine)
    }

    /// Parse a JSON question list and start from it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Init` for malformed payloads, missing or duplicate
    /// ids, plus everything [`QuizEngineBuilder::start`] can return.
    pub fn start_from_payload(self, payload: &str) -> Result<QuizEngine, EngineError> {
        let records = QuestionRecord::parse_payload(payload)?;
        self.start(records)
    }
}

/// Host-facing session driver.
///
/// Every command runs synchronously on the caller's event loop and notifies the
/// [`QuizHost`] before returning. Background work (autosaves, the auto-advance
/// timer) reports back through [`QuizEngine::next_event`], which the host feeds
/// into [`QuizEngine::handle_event`].
pub struct QuizEngine {
    state: SessionState,
    host: Arc<dyn QuizHost>,
    autosave: AutosaveDispatcher,
    options: EngineOptions,
    runtime: Handle,
    events_tx: UnboundedSender<EngineEvent>,
    events_rx: UnboundedReceiver<EngineEvent>,
    pending_advance: Option<PendingAdvance>,
    generation: u64,
    warning_visible: bool,
}

impl QuizEngine {
    #[must_use]
    pub fn builder(host: Arc<dyn QuizHost>, bridge: Arc<dyn PersistenceBridge>) -> QuizEngineBuilder {
        QuizEngineBuilder::new(host, bridge)
    }

    /// Shorthand for `builder(host, bridge).with_options(options).start(records)`.
    ///
    /// # Errors
    ///
    /// See [`QuizEngineBuilder::start`].
    pub fn start(
        records: Vec<QuestionRecord>,
        options: EngineOptions,
        host: Arc<dyn QuizHost>,
        bridge: Arc<dyn PersistenceBridge>,
    ) -> Result<Self, EngineError> {
        QuizEngineBuilder::new(host, bridge)
            .with_options(options)
            .start(records)
    }

    #[must_use]
    pub fn current(&self) -> Option<QuestionView<'_>> {
        let record = self.state.current()?;
        Some(QuestionView {
            index: self.state.cursor(),
            total: self.state.len(),
            record,
            answer: self.state.answer_for(record.id()),
        })
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::of(&self.state)
    }

    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.state.is_current_answered()
    }

    #[must_use]
    pub fn can_retreat(&self) -> bool {
        !self.state.is_empty() && self.state.cursor() > 0
    }

    #[must_use]
    pub fn can_finalize(&self) -> bool {
        self.state.is_complete()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn answers_in_order(&self) -> Vec<(QuestionId, LikertValue)> {
        self.state.answers_in_order()
    }

    #[must_use]
    pub fn autosaves_in_flight(&self) -> usize {
        self.autosave.in_flight()
    }

    #[must_use]
    pub fn pending_auto_advance(&self) -> bool {
        self.pending_advance.is_some()
    }

    /// Record `value` for the current question and persist it in the background.
    ///
    /// Cancels any pending auto-advance, then either schedules a new one, moves
    /// immediately (zero delay), or signals readiness on the last question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` (wrapped) when there is no question.
    pub fn select_answer(&mut self, value: LikertValue) -> Result<SelectOutcome, EngineError> {
        let question_id = self
            .state
            .current()
            .map(QuestionRecord::id)
            .ok_or(SessionError::Empty)?;

        self.cancel_auto_advance();
        let changed = self.state.set_answer(question_id, value)?;
        self.autosave.dispatch(question_id, value);
        self.set_warning(false);
        self.render();

        let follow_up = if self.state.is_last() {
            self.host.ready_to_finalize(&self.progress());
            Some(FollowUp::ReadyToFinalize)
        } else if self.options.auto_advance_delay.is_zero() {
            Some(FollowUp::Advanced(self.move_forward()))
        } else {
            Some(FollowUp::AutoAdvanceScheduled(self.schedule_auto_advance()))
        };

        Ok(SelectOutcome {
            question_id,
            value,
            changed,
            follow_up,
        })
    }

    pub fn advance(&mut self) -> NavOutcome {
        self.cancel_auto_advance();
        self.move_forward()
    }

    pub fn retreat(&mut self) -> NavOutcome {
        self.cancel_auto_advance();
        let outcome = NavigationController::new(&mut self.state).retreat();
        self.apply_navigation(outcome)
    }

    pub fn jump_to_first_unanswered(&mut self) -> NavOutcome {
        self.cancel_auto_advance();
        let outcome = NavigationController::new(&mut self.state).jump_to_first_unanswered();
        self.apply_navigation(outcome)
    }

    /// Dispatch a key name; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`QuizEngine::select_answer`].
    pub fn handle_key(&mut self, key: &str) -> Result<KeyOutcome, EngineError> {
        let Some(input) = KeyInput::parse(key) else {
            return Ok(KeyOutcome::Ignored);
        };
        Ok(match input {
            KeyInput::Previous => KeyOutcome::Navigated(self.retreat()),
            KeyInput::Next => KeyOutcome::Navigated(self.advance()),
            KeyInput::Select(value) => KeyOutcome::Selected(self.select_answer(value)?),
        })
    }

    /// Check whether every question is answered. A blocked request raises the
    /// must-answer warning.
    pub fn request_finalize(&mut self) -> FinalizeOutcome {
        if self.state.is_empty() {
            return FinalizeOutcome::NoContent;
        }
        let missing = self.state.unanswered_count();
        if missing > 0 {
            tracing::warn!(missing, "finalization blocked");
            self.set_warning(true);
            return FinalizeOutcome::Blocked { missing };
        }
        FinalizeOutcome::Ready
    }

    /// Wait for the next background event. Cancel-safe, for use in `tokio::select!`.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::AutoAdvance { generation } => {
                let live = self
                    .pending_advance
                    .as_ref()
                    .is_some_and(|pending| pending.generation == generation);
                if !live {
                    tracing::debug!(generation, "ignoring stale auto-advance");
                    return;
                }
                self.pending_advance = None;
                self.move_forward();
            }
            EngineEvent::AutosaveFinished(report) => {
                if self.autosave.complete(&report) {
                    self.host.saved();
                }
            }
        }
    }

    /// Await and apply one background event. Returns `false` if the queue closed.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until every dispatched autosave has reported back.
    pub async fn flush_autosaves(&mut self) {
        while self.autosave.in_flight() > 0 {
            if !self.process_next().await {
                break;
            }
        }
    }

    fn move_forward(&mut self) -> NavOutcome {
        let outcome = NavigationController::new(&mut self.state).advance();
        self.apply_navigation(outcome)
    }

    fn apply_navigation(&mut self, outcome: NavOutcome) -> NavOutcome {
        match outcome {
            NavOutcome::Moved { from, to } => {
                tracing::debug!(from, to, "cursor moved");
                self.set_warning(false);
                self.render();
            }
            NavOutcome::MustAnswer => self.set_warning(true),
            NavOutcome::AtStart | NavOutcome::AtEnd | NavOutcome::Stayed | NavOutcome::Disabled => {}
        }
        outcome
    }

    fn schedule_auto_advance(&mut self) -> Duration {
        let delay = self.options.auto_advance_delay;
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let events = self.events_tx.clone();

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(EngineEvent::AutoAdvance { generation });
        });
        self.pending_advance = Some(PendingAdvance { generation, task });
        delay
    }

    fn cancel_auto_advance(&mut self) {
        if let Some(pending) = self.pending_advance.take() {
            pending.task.abort();
            tracing::debug!(generation = pending.generation, "auto-advance cancelled");
        }
    }

    fn set_warning(&mut self, visible: bool) {
        if self.warning_visible != visible {
            self.warning_visible = visible;
            self.host.must_answer(visible);
        }
    }

    fn frame(&self) -> RenderFrame<'_> {
        RenderFrame {
            question: self.current(),
            progress: self.progress(),
            can_advance: self.can_advance(),
            can_retreat: self.can_retreat(),
            can_finalize: self.can_finalize(),
        }
    }

    fn render(&self) {
        let frame = self.frame();
        tracing::debug!(
            cursor = self.state.cursor(),
            progress = %frame.progress,
            "render"
        );
        self.host.render(&frame);
    }
}

impl Drop for QuizEngine {
    fn drop(&mut self) {
        self.cancel_auto_advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostSignal, RecordingHost};
    use persistence::InMemoryBridge;
    use quiz_core::time::fixed_clock;

    fn likert(v: u8) -> LikertValue {
        LikertValue::new(v).unwrap()
    }

    fn questions(ids: &[u64]) -> Vec<QuestionRecord> {
        ids.iter()
            .map(|id| QuestionRecord::new(QuestionId::new(*id), format!("Question {id}")))
            .collect()
    }

    fn start(
        records: Vec<QuestionRecord>,
        options: EngineOptions,
    ) -> (QuizEngine, RecordingHost, InMemoryBridge) {
        let host = RecordingHost::new();
        let bridge = InMemoryBridge::new().with_token("tok");
        let engine = QuizEngine::builder(Arc::new(host.clone()), Arc::new(bridge.clone()))
            .with_options(options)
            .with_clock(fixed_clock())
            .start(records)
            .unwrap();
        (engine, host, bridge)
    }

    fn immediate() -> EngineOptions {
        EngineOptions::default().with_auto_advance_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn answer_then_advance_then_refuse() {
        let (mut engine, host, _bridge) = start(questions(&[10, 20, 30]), EngineOptions::default());
        assert_eq!(engine.current().unwrap().index, 0);

        let outcome = engine.select_answer(likert(4)).unwrap();
        assert_eq!(
            outcome.follow_up,
            Some(FollowUp::AutoAdvanceScheduled(Duration::from_millis(140)))
        );
        assert_eq!(engine.answers_in_order(), vec![(QuestionId::new(10), likert(4))]);
        assert!(engine.can_advance());
        assert_eq!(engine.progress().percent, 33);

        assert_eq!(engine.advance(), NavOutcome::Moved { from: 0, to: 1 });
        assert!(!engine.pending_auto_advance());
        assert_eq!(engine.advance(), NavOutcome::MustAnswer);
        assert_eq!(engine.current().unwrap().index, 1);
        assert!(host.warning_visible());
    }

    #[tokio::test]
    async fn seeded_answers_resume_and_are_not_posted() {
        let records = vec![
            QuestionRecord::new(QuestionId::new(1), "a").with_seeded_answer(2),
            QuestionRecord::new(QuestionId::new(2), "b"),
            QuestionRecord::new(QuestionId::new(3), "c").with_seeded_answer(5),
        ];
        let (mut engine, host, bridge) = start(records, immediate());

        let view = engine.current().unwrap();
        assert_eq!(view.id(), QuestionId::new(2));
        assert_eq!(view.counter(), "2/3");
        assert_eq!(engine.progress().to_string(), "2/3 (67%)");
        assert_eq!(host.render_count(), 1);

        engine.flush_autosaves().await;
        assert!(bridge.posts().is_empty());
    }

    #[tokio::test]
    async fn deferred_advance_fires_through_event_loop() {
        let options = EngineOptions::default().with_auto_advance_delay(Duration::from_millis(10));
        let (mut engine, _host, _bridge) = start(questions(&[1, 2]), options);

        engine.select_answer(likert(3)).unwrap();
        assert!(engine.pending_auto_advance());
        assert_eq!(engine.current().unwrap().index, 0);

        while engine.pending_auto_advance() {
            assert!(engine.process_next().await);
        }
        assert_eq!(engine.current().unwrap().index, 1);
    }

    #[tokio::test]
    async fn reselecting_cancels_previous_timer() {
        let options = EngineOptions::default().with_auto_advance_delay(Duration::from_secs(60));
        let (mut engine, _host, _bridge) = start(questions(&[1, 2]), options);

        engine.select_answer(likert(3)).unwrap();
        let first = engine.generation;
        engine.select_answer(likert(4)).unwrap();
        assert_ne!(engine.generation, first);

        engine.handle_event(EngineEvent::AutoAdvance { generation: first });
        assert_eq!(engine.current().unwrap().index, 0);

        engine.retreat();
        assert!(!engine.pending_auto_advance());
    }

    #[tokio::test]
    async fn zero_delay_advances_immediately() {
        let (mut engine, _host, _bridge) = start(questions(&[1, 2, 3]), immediate());
        let outcome = engine.select_answer(likert(5)).unwrap();
        assert_eq!(
            outcome.follow_up,
            Some(FollowUp::Advanced(NavOutcome::Moved { from: 0, to: 1 }))
        );
        assert!(!engine.pending_auto_advance());
    }

    #[tokio::test]
    async fn saved_confirmation_is_rate_limited() {
        let (mut engine, host, bridge) = start(questions(&[1, 2, 3]), immediate());
        engine.select_answer(likert(1)).unwrap();
        engine.select_answer(likert(2)).unwrap();
        assert_eq!(engine.autosaves_in_flight(), 2);

        engine.flush_autosaves().await;
        assert_eq!(engine.autosaves_in_flight(), 0);
        assert_eq!(bridge.posts().len(), 2);
        assert_eq!(host.saved_count(), 1);
    }

    #[tokio::test]
    async fn failed_autosave_keeps_the_answer() {
        let (mut engine, host, bridge) = start(questions(&[1, 2]), immediate());
        bridge.set_failing(true);

        engine.select_answer(likert(4)).unwrap();
        engine.flush_autosaves().await;

        assert_eq!(host.saved_count(), 0);
        assert_eq!(engine.state().answer_for(QuestionId::new(1)), Some(likert(4)));
    }

    #[tokio::test]
    async fn finalize_waits_for_every_answer() {
        let (mut engine, host, _bridge) = start(questions(&[1, 2]), immediate());
        assert_eq!(engine.request_finalize(), FinalizeOutcome::Blocked { missing: 2 });
        assert!(host.warning_visible());

        engine.select_answer(likert(2)).unwrap();
        assert!(!host.warning_visible());
        let last = engine.select_answer(likert(3)).unwrap();

        assert_eq!(last.follow_up, Some(FollowUp::ReadyToFinalize));
        assert!(engine.can_finalize());
        assert_eq!(engine.request_finalize(), FinalizeOutcome::Ready);
        assert!(host.signals().iter().any(|s| matches!(
            s,
            HostSignal::ReadyToFinalize(progress) if progress.percent == 100
        )));
    }

    #[tokio::test]
    async fn last_question_signals_ready_even_with_gaps() {
        let (mut engine, host, _bridge) = start(questions(&[1, 2]), immediate());
        engine.state.set_cursor(1);

        let outcome = engine.select_answer(likert(3)).unwrap();
        assert_eq!(outcome.follow_up, Some(FollowUp::ReadyToFinalize));
        assert!(!engine.pending_auto_advance());
        assert!(host.signals().iter().any(|s| matches!(
            s,
            HostSignal::ReadyToFinalize(progress) if progress.done == 1 && progress.total == 2
        )));

        assert!(!engine.can_finalize());
        assert_eq!(engine.request_finalize(), FinalizeOutcome::Blocked { missing: 1 });
    }

    #[tokio::test]
    async fn empty_session_is_no_content() {
        let (mut engine, host, _bridge) = start(Vec::new(), EngineOptions::default());
        assert!(engine.is_empty());
        assert!(engine.current().is_none());
        assert_eq!(engine.progress().total, 0);
        assert_eq!(engine.advance(), NavOutcome::Disabled);
        assert_eq!(engine.retreat(), NavOutcome::Disabled);
        assert!(matches!(
            engine.select_answer(likert(3)),
            Err(EngineError::Session(SessionError::Empty))
        ));
        assert_eq!(engine.request_finalize(), FinalizeOutcome::NoContent);
        assert!(matches!(
            host.last_render(),
            Some(HostSignal::Render { question: None, .. })
        ));
    }

    #[tokio::test]
    async fn keys_map_to_commands() {
        let (mut engine, _host, _bridge) = start(questions(&[1, 2]), immediate());

        assert_eq!(
            engine.handle_key("ArrowRight").unwrap(),
            KeyOutcome::Navigated(NavOutcome::MustAnswer)
        );
        assert!(matches!(engine.handle_key("4").unwrap(), KeyOutcome::Selected(_)));
        assert_eq!(
            engine.handle_key("ArrowLeft").unwrap(),
            KeyOutcome::Navigated(NavOutcome::Moved { from: 1, to: 0 })
        );
        assert_eq!(engine.handle_key("9").unwrap(), KeyOutcome::Ignored);
        assert_eq!(engine.handle_key("Enter").unwrap(), KeyOutcome::Ignored);
    }

    #[tokio::test]
    async fn interleave_key_orders_the_session() {
        let records = vec![
            QuestionRecord::new(QuestionId::new(1), "a1").with_group_key("A"),
            QuestionRecord::new(QuestionId::new(2), "a2").with_group_key("A"),
            QuestionRecord::new(QuestionId::new(3), "a3").with_group_key("A"),
            QuestionRecord::new(QuestionId::new(4), "b1").with_group_key("B"),
        ];
        let (engine, _host, _bridge) =
            start(records, EngineOptions::default().with_interleave_key("groupKey"));

        let order: Vec<u64> = engine.state().sequence().iter().map(|r| r.id().value()).collect();
        assert_eq!(order, vec![1, 4, 2, 3]);
    }

    #[tokio::test]
    async fn bad_payload_refuses_to_start() {
        let builder = QuizEngine::builder(
            Arc::new(RecordingHost::new()),
            Arc::new(InMemoryBridge::new()),
        );
        assert!(matches!(
            builder.start_from_payload("{not json"),
            Err(EngineError::Init(_))
        ));
    }

    #[test]
    fn starting_outside_a_runtime_fails() {
        let result = QuizEngine::start(
            questions(&[1]),
            EngineOptions::default(),
            Arc::new(RecordingHost::new()),
            Arc::new(InMemoryBridge::new()),
        );
        assert!(matches!(result, Err(EngineError::NoRuntime)));
    }
}
