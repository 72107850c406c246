//! Per-kind answer records keyed by element id.
//!
//! Records are written only after the backend confirmed a verdict. A revision
//! pass clears the live record; the outcome it held is archived under the
//! instance it was given in so older transcript entries still display it.

use std::collections::HashMap;

use crate::model::{
    AnswerKind, Correctness, ElementId, InputOutcome, MultiChoiceOutcome, Outcome,
    QuestionOutcome, QuizOutcome,
};

/// Interaction outcome for one element during one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerState<T> {
    outcome: Option<T>,
    visible: bool,
    instance: u32,
}

impl<T> Default for AnswerState<T> {
    fn default() -> Self {
        Self {
            outcome: None,
            visible: false,
            instance: 0,
        }
    }
}

impl<T> AnswerState<T> {
    #[must_use]
    pub fn has_answered(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&T> {
        self.outcome.as_ref()
    }

    /// Whether feedback is shown.
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Instance counter value the outcome was recorded under.
    #[must_use]
    pub fn instance(&self) -> u32 {
        self.instance
    }
}

/// Answer records for one interactive kind.
#[derive(Debug, Clone)]
pub struct AnswerStore<T> {
    live: HashMap<ElementId, AnswerState<T>>,
    archive: HashMap<(ElementId, u32), AnswerState<T>>,
}

impl<T> Default for AnswerStore<T> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
            archive: HashMap::new(),
        }
    }
}

impl<T> AnswerStore<T> {
    pub fn record(&mut self, id: ElementId, instance: u32, outcome: T) -> &AnswerState<T> {
        let state = self.live.entry(id).or_default();
        state.outcome = Some(outcome);
        state.visible = true;
        state.instance = instance;
        state
    }

    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&AnswerState<T>> {
        self.live.get(id)
    }

    #[must_use]
    pub fn is_visible(&self, id: &ElementId) -> bool {
        self.live.get(id).is_some_and(AnswerState::visible)
    }

    /// Reset the live record to a pristine state.
    ///
    /// The entry is kept (cleared, not deleted). Returns true when an outcome
    /// was archived.
    pub fn clear(&mut self, id: &ElementId) -> bool {
        let Some(state) = self.live.get_mut(id) else {
            return false;
        };
        let previous = std::mem::take(state);
        if previous.outcome.is_none() {
            return false;
        }
        self.archive.insert((id.clone(), previous.instance), previous);
        true
    }

    #[must_use]
    pub fn archived(&self, id: &ElementId, instance: u32) -> Option<&AnswerState<T>> {
        self.archive.get(&(id.clone(), instance))
    }

    /// Record for `id` as it stood during pass `instance`.
    #[must_use]
    pub fn for_instance(&self, id: &ElementId, instance: u32) -> Option<&AnswerState<T>> {
        match self.live.get(id) {
            Some(state) if state.has_answered() && state.instance == instance => Some(state),
            _ => self.archived(id, instance),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// A confirmed outcome for any interactive kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOutcome {
    Quiz(QuizOutcome),
    Input(InputOutcome),
    Question(QuestionOutcome),
    MultiChoice(MultiChoiceOutcome),
}

impl RecordedOutcome {
    #[must_use]
    pub fn kind(&self) -> AnswerKind {
        match self {
            RecordedOutcome::Quiz(_) => AnswerKind::Quiz,
            RecordedOutcome::Input(_) => AnswerKind::Input,
            RecordedOutcome::Question(_) => AnswerKind::Question,
            RecordedOutcome::MultiChoice(_) => AnswerKind::MultiChoice,
        }
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        match self {
            RecordedOutcome::Quiz(o) => &o.feedback,
            RecordedOutcome::Input(o) => &o.feedback,
            RecordedOutcome::Question(o) => &o.feedback,
            RecordedOutcome::MultiChoice(o) => &o.feedback,
        }
    }

    #[must_use]
    pub fn correctness(&self) -> Correctness {
        match self {
            RecordedOutcome::Quiz(o) => o.correctness(),
            RecordedOutcome::Input(o) => o.correctness(),
            RecordedOutcome::Question(o) => o.correctness(),
            RecordedOutcome::MultiChoice(o) => o.correctness(),
        }
    }
}

/// Borrowed answer record of any kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnswerRecord<'a> {
    Quiz(&'a AnswerState<QuizOutcome>),
    Input(&'a AnswerState<InputOutcome>),
    Question(&'a AnswerState<QuestionOutcome>),
    MultiChoice(&'a AnswerState<MultiChoiceOutcome>),
}

impl AnswerRecord<'_> {
    #[must_use]
    pub fn visible(&self) -> bool {
        match self {
            AnswerRecord::Quiz(s) => s.visible(),
            AnswerRecord::Input(s) => s.visible(),
            AnswerRecord::Question(s) => s.visible(),
            AnswerRecord::MultiChoice(s) => s.visible(),
        }
    }
}

/// One store per interactive kind.
#[derive(Debug, Clone, Default)]
pub struct AnswerStates {
    pub quiz: AnswerStore<QuizOutcome>,
    pub input: AnswerStore<InputOutcome>,
    pub question: AnswerStore<QuestionOutcome>,
    pub multi_choice: AnswerStore<MultiChoiceOutcome>,
}

impl AnswerStates {
    pub fn record(&mut self, id: ElementId, instance: u32, outcome: RecordedOutcome) {
        match outcome {
            RecordedOutcome::Quiz(o) => {
                self.quiz.record(id, instance, o);
            }
            RecordedOutcome::Input(o) => {
                self.input.record(id, instance, o);
            }
            RecordedOutcome::Question(o) => {
                self.question.record(id, instance, o);
            }
            RecordedOutcome::MultiChoice(o) => {
                self.multi_choice.record(id, instance, o);
            }
        }
    }

    #[must_use]
    pub fn is_visible(&self, kind: AnswerKind, id: &ElementId) -> bool {
        match kind {
            AnswerKind::Quiz => self.quiz.is_visible(id),
            AnswerKind::Input => self.input.is_visible(id),
            AnswerKind::Question => self.question.is_visible(id),
            AnswerKind::MultiChoice => self.multi_choice.is_visible(id),
        }
    }

    pub fn clear(&mut self, kind: AnswerKind, id: &ElementId) -> bool {
        match kind {
            AnswerKind::Quiz => self.quiz.clear(id),
            AnswerKind::Input => self.input.clear(id),
            AnswerKind::Question => self.question.clear(id),
            AnswerKind::MultiChoice => self.multi_choice.clear(id),
        }
    }

    /// Clear `id` in every store; revision chains carry ids without kinds.
    pub fn clear_all_kinds(&mut self, id: &ElementId) -> usize {
        [
            AnswerKind::Quiz,
            AnswerKind::Input,
            AnswerKind::Question,
            AnswerKind::MultiChoice,
        ]
        .into_iter()
        .filter(|kind| self.clear(*kind, id))
        .count()
    }

    #[must_use]
    pub fn live(&self, kind: AnswerKind, id: &ElementId) -> Option<AnswerRecord<'_>> {
        match kind {
            AnswerKind::Quiz => self.quiz.get(id).map(AnswerRecord::Quiz),
            AnswerKind::Input => self.input.get(id).map(AnswerRecord::Input),
            AnswerKind::Question => self.question.get(id).map(AnswerRecord::Question),
            AnswerKind::MultiChoice => self.multi_choice.get(id).map(AnswerRecord::MultiChoice),
        }
    }

    #[must_use]
    pub fn for_instance(
        &self,
        kind: AnswerKind,
        id: &ElementId,
        instance: u32,
    ) -> Option<AnswerRecord<'_>> {
        match kind {
            AnswerKind::Quiz => self.quiz.for_instance(id, instance).map(AnswerRecord::Quiz),
            AnswerKind::Input => self.input.for_instance(id, instance).map(AnswerRecord::Input),
            AnswerKind::Question => self
                .question
                .for_instance(id, instance)
                .map(AnswerRecord::Question),
            AnswerKind::MultiChoice => self
                .multi_choice
                .for_instance(id, instance)
                .map(AnswerRecord::MultiChoice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_outcome(correct: bool) -> QuizOutcome {
        QuizOutcome {
            selected_answer: usize::from(correct),
            feedback: if correct { "Yes" } else { "No" }.into(),
            is_correct: correct,
        }
    }

    #[test]
    fn record_makes_feedback_visible() {
        let mut store = AnswerStore::default();
        let id = ElementId::new("q1");
        store.record(id.clone(), 0, quiz_outcome(false));

        let state = store.get(&id).unwrap();
        assert!(state.has_answered());
        assert!(state.visible());
        assert!(store.is_visible(&id));
    }

    #[test]
    fn clear_keeps_entry_and_archives_outcome() {
        let mut store = AnswerStore::default();
        let id = ElementId::new("q1");
        store.record(id.clone(), 0, quiz_outcome(false));

        assert!(store.clear(&id));
        let state = store.get(&id).expect("entry is cleared, not deleted");
        assert!(!state.visible());
        assert!(!state.has_answered());
        assert_eq!(store.len(), 1);

        let archived = store.archived(&id, 0).unwrap();
        assert!(!archived.outcome().unwrap().is_correct);
    }

    #[test]
    fn clearing_pristine_record_archives_nothing() {
        let mut store: AnswerStore<QuizOutcome> = AnswerStore::default();
        assert!(!store.clear(&ElementId::new("missing")));
    }

    #[test]
    fn for_instance_prefers_matching_live_record() {
        let mut store = AnswerStore::default();
        let id = ElementId::new("q1");
        store.record(id.clone(), 0, quiz_outcome(false));
        store.clear(&id);
        store.record(id.clone(), 1, quiz_outcome(true));

        assert!(!store.for_instance(&id, 0).unwrap().outcome().unwrap().is_correct);
        assert!(store.for_instance(&id, 1).unwrap().outcome().unwrap().is_correct);
        assert!(store.for_instance(&id, 2).is_none());
    }

    #[test]
    fn clear_all_kinds_touches_only_answered_stores() {
        let mut states = AnswerStates::default();
        let id = ElementId::new("x");
        states.record(id.clone(), 0, RecordedOutcome::Quiz(quiz_outcome(true)));
        assert_eq!(states.clear_all_kinds(&id), 1);
        assert!(!states.is_visible(AnswerKind::Quiz, &id));
    }
}
