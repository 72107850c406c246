//! Transition controller for one course session.
//!
//! Every mutation of `SessionState` goes through `CoursePlayer`. At most one
//! transition (bootstrap, advance, answer, revision start, dialog message)
//! runs at a time; a second one is rejected with `Busy` instead of queued.
//! The state lock is never held across an await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backend::{Advance, BackendError, CourseBackend};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use playback_core::model::{
    AdvanceMode, Answer, CourseElement, CourseId, DialogReply, ElementId, ElementKind,
    InputOutcome, MultiChoiceOutcome, QuestionOutcome, QuizOutcome, RevisionResult, TestResult,
};
use playback_core::{Clock, Phase, RecordedOutcome, SessionState, TranscriptEntry};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::ResultCache;
use super::events::{Operation, PlaybackEvent};
use super::guard::TransitionGuard;
use super::timer::{self, TimerSlot};
use crate::config::PlaybackConfig;
use crate::error::{
    AnswerSubmissionError, LookupError, PlaybackFailure, StartupError, TransitionError,
};

/// Result of a successful advance.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A new element was appended to the transcript.
    Shown(TranscriptEntry),
    /// The backend has nothing more; the session is now completed.
    Completed { message: Option<String> },
}

/// Drives a course session against a `CourseBackend`.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CoursePlayer {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    clock: Clock,
    backend: Arc<dyn CourseBackend>,
    config: PlaybackConfig,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
    timer: Mutex<TimerSlot>,
    shutdown: CancellationToken,
    tests: ResultCache<TestResult>,
    revisions: ResultCache<RevisionResult>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl std::fmt::Debug for CoursePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoursePlayer")
            .field("phase", &self.phase())
            .field("busy", &self.is_busy())
            .field("pending_advance", &self.pending_advance())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum LookupKind {
    Test,
    Revision,
}

impl CoursePlayer {
    #[must_use]
    pub fn new(clock: Clock, backend: Arc<dyn CourseBackend>, config: PlaybackConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(PlayerInner {
                clock,
                backend,
                config,
                state: Mutex::new(SessionState::new()),
                in_flight: AtomicBool::new(false),
                timer: Mutex::new(TimerSlot::default()),
                shutdown: CancellationToken::new(),
                tests: ResultCache::new(),
                revisions: ResultCache::new(),
                events,
            }),
        }
    }

    // ─── Reads ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the session for rendering.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.lock_state().clone()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.lock_state().phase()
    }

    #[must_use]
    pub fn current(&self) -> Option<TranscriptEntry> {
        self.inner.lock_state().current().cloned()
    }

    #[must_use]
    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    /// True while a transition holds the in-flight slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Transcript position of the armed auto-advance, if any.
    #[must_use]
    pub fn pending_advance(&self) -> Option<usize> {
        self.inner.lock_timer().armed_position()
    }

    #[must_use]
    pub fn is_occurrence_in_active_revision_chain(&self, id: &ElementId, position: usize) -> bool {
        self.inner
            .lock_state()
            .is_occurrence_in_active_revision_chain(id, position)
    }

    #[must_use]
    pub fn cached_test_result(&self, id: &ElementId) -> Option<Arc<TestResult>> {
        self.inner.tests.peek(id)
    }

    #[must_use]
    pub fn cached_revision_result(&self, id: &ElementId) -> Option<Arc<RevisionResult>> {
        self.inner.revisions.peek(id)
    }

    /// A lookup for `id` is in flight.
    #[must_use]
    pub fn is_loading_result(&self, id: &ElementId) -> bool {
        self.inner.tests.is_loading(id) || self.inner.revisions.is_loading(id)
    }

    // ─── Transitions ─────────────────────────────────────────────────────────

    /// Start (or resume) `course_id` and show its current element.
    ///
    /// Calling again for the same course returns the current entry without
    /// touching the backend.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` when the course is unknown, the backend fails,
    /// another transition is running, or the session plays another course.
    pub async fn begin(&self, course_id: CourseId) -> Result<TranscriptEntry, StartupError> {
        let result = self.inner.begin(course_id).await;
        self.inner.finish(Operation::Begin, result)
    }

    /// Fetch and show the next element.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` when the session is not active, another
    /// transition is running, or the backend fails. The transcript is left
    /// unchanged on error.
    pub async fn advance(&self) -> Result<Step, TransitionError> {
        let result = match TransitionGuard::try_acquire(&self.inner.in_flight) {
            Some(guard) => self.inner.advance_with_guard(guard).await,
            None => Err(TransitionError::Busy),
        };
        self.inner.finish(Operation::Advance, result)
    }

    /// Follow an inline option of the current message.
    ///
    /// Options only move the course forward; the choice itself is not stored.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::InvalidOption` when the current element has
    /// no option at `index`, and the errors of [`CoursePlayer::advance`].
    pub async fn select_option(&self, index: usize) -> Result<Step, TransitionError> {
        let result = self.inner.select_option(index).await;
        self.inner.finish(Operation::SelectOption, result)
    }

    /// Grade `answer` for the current element and record the verdict.
    ///
    /// # Errors
    ///
    /// Returns `AnswerSubmissionError` when `element_id` is not on screen, the
    /// answer does not fit the element, the element already has feedback in
    /// this pass, or grading fails. Nothing is recorded on error.
    pub async fn submit_answer(
        &self,
        element_id: &ElementId,
        answer: Answer,
    ) -> Result<RecordedOutcome, AnswerSubmissionError> {
        let result = self.inner.submit_answer(element_id, answer).await;
        self.inner.finish(Operation::SubmitAnswer, result)
    }

    /// Replay the mistakes of the revision element on screen.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` when `revision_id` is not the current
    /// revision, its result has not been loaded, it has nothing to replay, or
    /// the backend fails.
    pub async fn start_revision(
        &self,
        revision_id: &ElementId,
    ) -> Result<TranscriptEntry, TransitionError> {
        let result = self.inner.start_revision(revision_id).await;
        self.inner.finish(Operation::StartRevision, result)
    }

    /// Send one user turn to the dialog on screen.
    ///
    /// A reply with `stop` schedules the advance past the dialog.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` when `element_id` is not the current dialog
    /// or the backend fails.
    pub async fn send_dialog_message(
        &self,
        element_id: &ElementId,
        text: &str,
    ) -> Result<DialogReply, TransitionError> {
        let result = self.inner.send_dialog_message(element_id, text).await;
        self.inner.finish(Operation::DialogMessage, result)
    }

    // ─── Lookups ─────────────────────────────────────────────────────────────

    /// Score summary for a test element, fetched once per session.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` when the session is not running or the fetch
    /// fails. Failures are not cached.
    pub async fn test_result(&self, id: &ElementId) -> Result<Arc<TestResult>, LookupError> {
        let result = self.inner.lookup_test(id).await;
        self.inner.finish(Operation::TestLookup, result)
    }

    /// Mistake summary for a revision element, fetched once per session.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` when the session is not running or the fetch
    /// fails. Failures are not cached.
    pub async fn revision_result(
        &self,
        id: &ElementId,
    ) -> Result<Arc<RevisionResult>, LookupError> {
        let result = self.inner.lookup_revision(id).await;
        self.inner.finish(Operation::RevisionLookup, result)
    }

    /// Close the session: cancels the pending auto-advance and any running
    /// lookup, and rejects every later transition.
    pub fn shutdown(&self) {
        self.inner.close();
    }
}

impl PlayerInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, TimerSlot> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Record a failed operation on the session before handing it back.
    fn finish<T, E>(&self, operation: Operation, result: Result<T, E>) -> Result<T, E>
    where
        E: PlaybackFailure + std::fmt::Display,
    {
        if let Err(err) = &result {
            if err.is_busy() {
                debug!(%operation, "rejected while another transition is in flight");
            } else {
                warn!(%operation, error = %err, "playback operation failed");
                let message = err.user_message();
                self.lock_state().set_error(message.clone());
                self.emit(PlaybackEvent::TransitionFailed { operation, message });
            }
        }
        result
    }

    //
    // ─── BOOTSTRAP ─────────────────────────────────────────────────────────────
    //

    async fn begin(self: &Arc<Self>, course_id: CourseId) -> Result<TranscriptEntry, StartupError> {
        if let Some(entry) = self.started_entry(&course_id)? {
            return Ok(entry);
        }
        let guard = TransitionGuard::try_acquire(&self.in_flight).ok_or(StartupError::Busy)?;
        // A concurrent `begin` may have finished while we raced for the slot.
        if let Some(entry) = self.started_entry(&course_id)? {
            return Ok(entry);
        }

        let first = self.fetch_first_element(&course_id).await?;
        let entry = {
            let mut state = self.lock_state();
            if state.phase() == Phase::Closed {
                return Err(StartupError::Closed);
            }
            let entry = state.start(course_id, first, self.clock.now()).clone();
            state.clear_error();
            entry
        };
        drop(guard);

        info!(element = %entry.element_id(), "course started");
        self.on_appended(&entry);
        Ok(entry)
    }

    fn started_entry(&self, course_id: &CourseId) -> Result<Option<TranscriptEntry>, StartupError> {
        let state = self.lock_state();
        match state.phase() {
            Phase::NotStarted => Ok(None),
            Phase::Closed => Err(StartupError::Closed),
            Phase::Active | Phase::Completed => match state.course_id() {
                Some(current) if current == course_id => Ok(state.current().cloned()),
                Some(current) => Err(StartupError::AlreadyStarted(current.clone())),
                None => Ok(None),
            },
        }
    }

    async fn fetch_first_element(&self, course_id: &CourseId) -> Result<CourseElement, StartupError> {
        let exists = self
            .backend
            .check_course_exists(course_id)
            .await
            .map_err(StartupError::from_backend)?;
        if !exists {
            return Err(StartupError::CourseNotFound(course_id.clone()));
        }
        self.backend
            .start_course(course_id)
            .await
            .map_err(StartupError::from_backend)?;
        self.backend
            .current_element(course_id)
            .await
            .map_err(StartupError::from_backend)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    async fn advance_with_guard(
        self: &Arc<Self>,
        guard: TransitionGuard<'_>,
    ) -> Result<Step, TransitionError> {
        let course_id = {
            let state = self.lock_state();
            active_course(&state)?
        };
        self.lock_timer().cancel();

        match self.backend.advance_element(&course_id).await? {
            Advance::Element(element) => {
                let entry = {
                    let mut state = self.lock_state();
                    ensure_active(&state)?;
                    let entry = state.append(element, self.clock.now()).clone();
                    state.clear_error();
                    entry
                };
                drop(guard);

                debug!(element = %entry.element_id(), position = entry.position, "element appended");
                self.on_appended(&entry);
                Ok(Step::Shown(entry))
            }
            Advance::Completed { message } => {
                {
                    let mut state = self.lock_state();
                    ensure_active(&state)?;
                    state.complete();
                    state.clear_error();
                    self.lock_timer().cancel();
                }
                drop(guard);

                info!("course completed");
                self.emit(PlaybackEvent::Completed {
                    message: message.clone(),
                });
                Ok(Step::Completed { message })
            }
        }
    }

    async fn select_option(self: &Arc<Self>, index: usize) -> Result<Step, TransitionError> {
        let guard = TransitionGuard::try_acquire(&self.in_flight).ok_or(TransitionError::Busy)?;
        {
            let state = self.lock_state();
            ensure_active(&state)?;
            let available = match state.current().map(|entry| &entry.element) {
                Some(CourseElement::Message(message)) => message.options.len(),
                _ => 0,
            };
            if index >= available {
                return Err(TransitionError::InvalidOption { index, available });
            }
        }
        self.advance_with_guard(guard).await
    }

    /// Timer callback. Acts only if the timer still owns the slot, no
    /// transition is running, and `position` is still on screen.
    async fn auto_advance(self: &Arc<Self>, position: usize) {
        if !self.lock_timer().disarm(position) {
            return;
        }
        let Some(guard) = TransitionGuard::try_acquire(&self.in_flight) else {
            debug!(position, "auto-advance dropped, transition in flight");
            return;
        };
        {
            let state = self.lock_state();
            if state.phase() != Phase::Active || state.transcript().len() != position + 1 {
                return;
            }
        }
        let result = self.advance_with_guard(guard).await;
        let _ = self.finish(Operation::AutoAdvance, result);
    }

    /// Arm the auto-advance for `position` if it is still the current entry.
    fn schedule_advance(self: &Arc<Self>, position: usize, delay: Duration) -> bool {
        let token = {
            let state = self.lock_state();
            if state.phase() != Phase::Active || state.transcript().len() != position + 1 {
                return false;
            }
            let token = self.shutdown.child_token();
            self.lock_timer().arm(position, token.clone());
            token
        };

        let player = Arc::downgrade(self);
        timer::spawn_delayed(token, delay, async move {
            if let Some(player) = player.upgrade() {
                player.auto_advance(position).await;
            }
        });
        debug!(position, ?delay, "auto-advance armed");
        self.emit(PlaybackEvent::AdvanceScheduled { position, delay });
        true
    }

    fn on_appended(self: &Arc<Self>, entry: &TranscriptEntry) {
        self.emit(PlaybackEvent::ElementAppended {
            key: entry.render_key(),
            kind: entry.element.kind(),
        });

        if let AdvanceMode::OnDisplay(timer) = entry.element.advance_mode() {
            self.schedule_advance(entry.position, self.config.display_delay(timer));
        }

        if self.config.prefetch_results {
            match entry.element.kind() {
                ElementKind::Test => self.prefetch(LookupKind::Test, entry.element_id()),
                ElementKind::Revision => self.prefetch(LookupKind::Revision, entry.element_id()),
                _ => {}
            }
        }
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    async fn submit_answer(
        self: &Arc<Self>,
        element_id: &ElementId,
        answer: Answer,
    ) -> Result<RecordedOutcome, AnswerSubmissionError> {
        let guard =
            TransitionGuard::try_acquire(&self.in_flight).ok_or(AnswerSubmissionError::Busy)?;
        let kind = answer.kind();
        let (course_id, position) = {
            let state = self.lock_state();
            let course_id = answerable_course(&state)?;
            let current = state.current().ok_or(AnswerSubmissionError::NotStarted)?;
            if current.element_id() != element_id {
                return Err(AnswerSubmissionError::NotCurrent {
                    requested: element_id.clone(),
                });
            }
            let element_kind = current.element.kind();
            if element_kind.answer_kind() != Some(kind) {
                return Err(AnswerSubmissionError::KindMismatch {
                    kind: element_kind,
                    answer: kind,
                });
            }
            if state.is_answered(kind, element_id) {
                return Err(AnswerSubmissionError::AlreadyAnswered(element_id.clone()));
            }
            if let Some(reason) = answer.invalid_reason(&current.element) {
                return Err(AnswerSubmissionError::InvalidAnswer(reason));
            }
            (course_id, current.position)
        };

        let outcome = self.grade(&course_id, element_id, answer).await?;
        {
            let mut state = self.lock_state();
            answerable_course(&state)?;
            state.record_outcome(element_id.clone(), outcome.clone());
            state.clear_error();
        }
        drop(guard);

        debug!(element = %element_id, correctness = ?outcome.correctness(), "answer recorded");
        self.emit(PlaybackEvent::AnswerRecorded {
            element_id: element_id.clone(),
            kind,
            correctness: outcome.correctness(),
        });
        self.schedule_advance(position, self.config.feedback_delay(kind));
        Ok(outcome)
    }

    async fn grade(
        &self,
        course_id: &CourseId,
        element_id: &ElementId,
        answer: Answer,
    ) -> Result<RecordedOutcome, BackendError> {
        let backend = &self.backend;
        Ok(match answer {
            Answer::Quiz { answer_index } => {
                let verdict = backend
                    .submit_quiz_answer(course_id, element_id, answer_index)
                    .await?;
                RecordedOutcome::Quiz(QuizOutcome::from_verdict(answer_index, verdict))
            }
            Answer::Input { text } => {
                let verdict = backend
                    .submit_input_answer(course_id, element_id, &text)
                    .await?;
                RecordedOutcome::Input(InputOutcome::from_verdict(text, verdict))
            }
            Answer::Question { answer_index } => {
                let verdict = backend
                    .submit_question_answer(course_id, element_id, answer_index)
                    .await?;
                RecordedOutcome::Question(QuestionOutcome::from_verdict(answer_index, verdict))
            }
            Answer::MultiChoice { answer_indices } => {
                let verdict = backend
                    .submit_multi_choice_answer(course_id, element_id, &answer_indices)
                    .await?;
                RecordedOutcome::MultiChoice(MultiChoiceOutcome::from_verdict(
                    answer_indices,
                    verdict,
                ))
            }
        })
    }

    //
    // ─── REVISION & DIALOG ─────────────────────────────────────────────────────
    //

    async fn start_revision(
        self: &Arc<Self>,
        revision_id: &ElementId,
    ) -> Result<TranscriptEntry, TransitionError> {
        let guard = TransitionGuard::try_acquire(&self.in_flight).ok_or(TransitionError::Busy)?;
        let course_id = {
            let state = self.lock_state();
            let course_id = active_course(&state)?;
            let current = state.current().ok_or(TransitionError::NotStarted)?;
            if current.element_id() != revision_id {
                return Err(TransitionError::NotCurrent {
                    requested: revision_id.clone(),
                });
            }
            if current.element.kind() != ElementKind::Revision {
                return Err(TransitionError::NotARevision(revision_id.clone()));
            }
            course_id
        };
        let result = self
            .revisions
            .peek(revision_id)
            .ok_or_else(|| TransitionError::MissingRevisionResult(revision_id.clone()))?;
        if !result.is_replayable() {
            return Err(TransitionError::NoMistakes(revision_id.clone()));
        }

        self.lock_timer().cancel();
        let first = self.backend.start_revision(&course_id, revision_id).await?;
        let chain = result.chain_element_ids.clone();
        let entry = {
            let mut state = self.lock_state();
            ensure_active(&state)?;
            let entry = state
                .begin_revision_pass(revision_id.clone(), chain.clone(), first, self.clock.now())
                .clone();
            state.clear_error();
            entry
        };
        drop(guard);

        info!(revision = %revision_id, chain = chain.len(), "revision started");
        self.emit(PlaybackEvent::RevisionStarted {
            revision_id: revision_id.clone(),
            chain,
        });
        self.on_appended(&entry);
        Ok(entry)
    }

    async fn send_dialog_message(
        self: &Arc<Self>,
        element_id: &ElementId,
        text: &str,
    ) -> Result<DialogReply, TransitionError> {
        let guard = TransitionGuard::try_acquire(&self.in_flight).ok_or(TransitionError::Busy)?;
        let (course_id, position) = {
            let state = self.lock_state();
            let course_id = active_course(&state)?;
            let current = state.current().ok_or(TransitionError::NotStarted)?;
            if current.element_id() != element_id {
                return Err(TransitionError::NotCurrent {
                    requested: element_id.clone(),
                });
            }
            if current.element.kind() != ElementKind::Dialog {
                return Err(TransitionError::NotADialog(element_id.clone()));
            }
            (course_id, current.position)
        };

        let reply = self
            .backend
            .send_dialog_message(&course_id, element_id, text)
            .await?;
        {
            let mut state = self.lock_state();
            ensure_active(&state)?;
            state.clear_error();
        }
        drop(guard);

        self.emit(PlaybackEvent::DialogReplied {
            element_id: element_id.clone(),
            stop: reply.stop,
        });
        if reply.stop {
            debug!(element = %element_id, "dialog finished");
            self.schedule_advance(position, self.config.dialog_delay(&reply.reply));
        }
        Ok(reply)
    }

    //
    // ─── LOOKUPS ───────────────────────────────────────────────────────────────
    //

    fn lookup_course(&self) -> Result<CourseId, LookupError> {
        let state = self.lock_state();
        match state.phase() {
            Phase::Closed => Err(LookupError::Closed),
            Phase::NotStarted => Err(LookupError::NotStarted),
            Phase::Active | Phase::Completed => {
                state.course_id().cloned().ok_or(LookupError::NotStarted)
            }
        }
    }

    async fn fetch_cached<T, F>(
        &self,
        cache: &ResultCache<T>,
        id: &ElementId,
        fetch: F,
    ) -> Result<Arc<T>, LookupError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(
                Arc<dyn CourseBackend>,
                CourseId,
                ElementId,
            ) -> BoxFuture<'static, Result<T, BackendError>>
            + Send,
    {
        let course_id = self.lookup_course()?;
        let backend = Arc::clone(&self.backend);
        let shutdown = self.shutdown.clone();
        let element_id = id.clone();

        cache
            .get_or_fetch(id, move || {
                let request = fetch(backend, course_id, element_id);
                async move {
                    tokio::select! {
                        () = shutdown.cancelled() => Err(LookupError::Closed),
                        fetched = request => fetched.map_err(LookupError::from),
                    }
                }
            })
            .await
    }

    async fn lookup_test(&self, id: &ElementId) -> Result<Arc<TestResult>, LookupError> {
        let result = self
            .fetch_cached(&self.tests, id, |backend, course_id, element_id| {
                async move { backend.test_result(&course_id, &element_id).await }.boxed()
            })
            .await?;
        let fresh = {
            let mut state = self.lock_state();
            let fresh = state.test_result(id).is_none();
            state.cache_test_result(id.clone(), TestResult::clone(&result));
            fresh
        };
        if fresh {
            self.result_loaded(id);
        }
        Ok(result)
    }

    async fn lookup_revision(&self, id: &ElementId) -> Result<Arc<RevisionResult>, LookupError> {
        let result = self
            .fetch_cached(&self.revisions, id, |backend, course_id, element_id| {
                async move { backend.revision_result(&course_id, &element_id).await }.boxed()
            })
            .await?;
        let fresh = {
            let mut state = self.lock_state();
            let fresh = state.revision_result(id).is_none();
            state.cache_revision_result(id.clone(), RevisionResult::clone(&result));
            fresh
        };
        if fresh {
            self.result_loaded(id);
        }
        Ok(result)
    }

    fn result_loaded(&self, id: &ElementId) {
        debug!(element = %id, "result loaded");
        self.emit(PlaybackEvent::ResultLoaded {
            element_id: id.clone(),
        });
    }

    fn prefetch(self: &Arc<Self>, kind: LookupKind, id: &ElementId) {
        let player = Arc::downgrade(self);
        let id = id.clone();
        tokio::spawn(async move {
            let Some(player) = player.upgrade() else {
                return;
            };
            let result = match kind {
                LookupKind::Test => player.lookup_test(&id).await.map(|_| ()),
                LookupKind::Revision => player.lookup_revision(&id).await.map(|_| ()),
            };
            if let Err(err) = result {
                debug!(element = %id, error = %err, "prefetch failed");
            }
        });
    }

    //
    // ─── SHUTDOWN ──────────────────────────────────────────────────────────────
    //

    fn close(&self) {
        let was_open = {
            let mut state = self.lock_state();
            if state.phase() == Phase::Closed {
                false
            } else {
                state.close();
                self.lock_timer().cancel();
                true
            }
        };
        self.shutdown.cancel();
        if was_open {
            info!("playback closed");
            self.emit(PlaybackEvent::Closed);
        }
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn ensure_active(state: &SessionState) -> Result<(), TransitionError> {
    match state.phase() {
        Phase::Active => Ok(()),
        Phase::NotStarted => Err(TransitionError::NotStarted),
        Phase::Completed => Err(TransitionError::Completed),
        Phase::Closed => Err(TransitionError::Closed),
    }
}

fn active_course(state: &SessionState) -> Result<CourseId, TransitionError> {
    ensure_active(state)?;
    state.course_id().cloned().ok_or(TransitionError::NotStarted)
}

fn answerable_course(state: &SessionState) -> Result<CourseId, AnswerSubmissionError> {
    match state.phase() {
        Phase::Active => state
            .course_id()
            .cloned()
            .ok_or(AnswerSubmissionError::NotStarted),
        Phase::NotStarted => Err(AnswerSubmissionError::NotStarted),
        Phase::Completed => Err(AnswerSubmissionError::Completed),
        Phase::Closed => Err(AnswerSubmissionError::Closed),
    }
}
