use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::answers::{AnswerRecord, AnswerStates, RecordedOutcome};
use crate::instances::InstanceCounter;
use crate::model::{AnswerKind, CourseElement, CourseId, ElementId, RevisionResult, TestResult};
use crate::revision::{self, ChainSpans};
use crate::transcript::{RenderKey, Transcript, TranscriptEntry};

/// Lifecycle of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NotStarted,
    Active,
    /// The backend reported the course finished. Terminal.
    Completed,
    /// The owner shut the session down. Terminal.
    Closed,
}

impl Phase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Closed)
    }
}

/// What a transcript entry should display for its answer area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnswerView<'a> {
    /// Interactive and waiting for input.
    Pristine,
    /// Show the recorded outcome with its feedback.
    Answered(AnswerRecord<'a>),
}

/// Everything a front-end needs to render a course session.
///
/// Owned by the playback controller; front-ends receive clones.
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: Uuid,
    course_id: Option<CourseId>,
    phase: Phase,
    transcript: Transcript,
    answers: AnswerStates,
    instances: InstanceCounter,
    spans: ChainSpans,
    revision_results: HashMap<ElementId, RevisionResult>,
    test_results: HashMap<ElementId, TestResult>,
    last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            course_id: None,
            phase: Phase::NotStarted,
            transcript: Transcript::new(),
            answers: AnswerStates::default(),
            instances: InstanceCounter::default(),
            spans: ChainSpans::default(),
            revision_results: HashMap::new(),
            test_results: HashMap::new(),
            last_error: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn course_id(&self) -> Option<&CourseId> {
        self.course_id.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStates {
        &self.answers
    }

    #[must_use]
    pub fn instances(&self) -> &InstanceCounter {
        &self.instances
    }

    #[must_use]
    pub fn spans(&self) -> &ChainSpans {
        &self.spans
    }

    /// The element currently on screen.
    #[must_use]
    pub fn current(&self) -> Option<&TranscriptEntry> {
        self.transcript.last()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn revision_result(&self, id: &ElementId) -> Option<&RevisionResult> {
        self.revision_results.get(id)
    }

    #[must_use]
    pub fn test_result(&self, id: &ElementId) -> Option<&TestResult> {
        self.test_results.get(id)
    }

    // ─── Transitions ─────────────────────────────────────────────────────────

    /// Enter the active phase with the first element of `course_id`.
    pub fn start(
        &mut self,
        course_id: CourseId,
        first: CourseElement,
        shown_at: DateTime<Utc>,
    ) -> &TranscriptEntry {
        self.course_id = Some(course_id);
        self.phase = Phase::Active;
        self.append(first, shown_at)
    }

    /// Append an element, applying the answer reset rule for chain members.
    ///
    /// A chain member keeps its record only when it was already answered in
    /// the current pass; otherwise the record is cleared before the entry
    /// becomes interactive.
    pub fn append(&mut self, element: CourseElement, shown_at: DateTime<Utc>) -> &TranscriptEntry {
        let id = element.element_id().clone();
        let position = self.transcript.len();
        self.spans.observe(position, &id);

        if let Some(kind) = element.kind().answer_kind()
            && self.spans.contains(position, &id)
            && !self.answers.is_visible(kind, &id)
        {
            self.answers.clear(kind, &id);
        }

        let instance = self.instances.get(&id);
        self.transcript.append(element, instance, shown_at)
    }

    /// Start a fresh pass over `chain` and append its first element.
    ///
    /// Every chain id moves to a new instance and loses its live answer
    /// record; the previous outcome stays readable for older entries.
    pub fn begin_revision_pass(
        &mut self,
        revision_id: ElementId,
        chain: Vec<ElementId>,
        first: CourseElement,
        shown_at: DateTime<Utc>,
    ) -> &TranscriptEntry {
        let mut seen = Vec::with_capacity(chain.len());
        for id in &chain {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            self.instances.bump(id);
            self.answers.clear_all_kinds(id);
        }
        self.spans.open(revision_id, chain, self.transcript.len());
        self.append(first, shown_at)
    }

    pub fn complete(&mut self) {
        self.spans.close_open(self.transcript.len());
        self.phase = Phase::Completed;
    }

    pub fn close(&mut self) {
        self.spans.close_open(self.transcript.len());
        self.phase = Phase::Closed;
    }

    /// Store a confirmed verdict for `id` under its current instance.
    pub fn record_outcome(&mut self, id: ElementId, outcome: RecordedOutcome) {
        let instance = self.instances.get(&id);
        self.answers.record(id, instance, outcome);
    }

    /// True when `id` already has visible feedback in the current pass.
    #[must_use]
    pub fn is_answered(&self, kind: AnswerKind, id: &ElementId) -> bool {
        self.answers.is_visible(kind, id)
    }

    pub fn cache_revision_result(&mut self, id: ElementId, result: RevisionResult) {
        self.revision_results.entry(id).or_insert(result);
    }

    pub fn cache_test_result(&mut self, id: ElementId, result: TestResult) {
        self.test_results.entry(id).or_insert(result);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// True iff the entry at `position` was shown as part of a revision
    /// replay whose chain names `id`.
    #[must_use]
    pub fn is_occurrence_in_active_revision_chain(&self, id: &ElementId, position: usize) -> bool {
        self.spans.contains(position, id)
    }

    /// Same question answered by walking back to the nearest `Revision`
    /// element and consulting its cached result.
    #[must_use]
    pub fn scan_membership(&self, id: &ElementId, position: usize) -> bool {
        revision::scan_membership(&self.transcript, &self.revision_results, id, position)
    }

    #[must_use]
    pub fn render_key(&self, position: usize) -> Option<RenderKey> {
        self.transcript.get(position).map(TranscriptEntry::render_key)
    }

    /// Answer area for the entry at `position`.
    ///
    /// Returns `None` for non-interactive entries. Entries from the current
    /// pass read the live record; entries from older passes read the record
    /// archived when their pass ended.
    #[must_use]
    pub fn answer_view(&self, position: usize) -> Option<AnswerView<'_>> {
        let entry = self.transcript.get(position)?;
        let kind = entry.element.kind().answer_kind()?;
        let id = entry.element_id();

        let record = if entry.instance == self.instances.get(id) {
            self.answers.live(kind, id).filter(AnswerRecord::visible)
        } else {
            self.answers.for_instance(kind, id, entry.instance)
        };
        Some(record.map_or(AnswerView::Pristine, AnswerView::Answered))
    }
}
