//! Offline course server.
//!
//! Serves `CourseScript`s with the same verdict, summary and revision rules as
//! the HTTP server. Used by the demo binary and as the test double for the
//! playback controller; latency, failures and call counts are controllable per
//! endpoint.

mod grading;
mod script;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use playback_core::model::element::DialogTurn;
use playback_core::model::{
    AnswerKind, CourseElement, CourseId, DialogReply, ElementId, ElementKind, InputVerdict,
    MultiChoiceVerdict, QuestionVerdict, QuizVerdict, RevisionResult, TestResult,
};
use tracing::debug;

use crate::{Advance, BackendError, CourseBackend, Endpoint};
use grading::{Score, bad_request, not_found};

pub use script::CourseScript;

const COURSE_FINISHED: &str = "Course finished";
const DEFAULT_DIALOG_TURNS: usize = 3;

#[derive(Debug)]
struct Replay {
    revision_index: usize,
    chain: Vec<ElementId>,
    cursor: usize,
}

/// A learner's progress through one course.
#[derive(Debug, Default)]
struct Run {
    position: usize,
    replay: Option<Replay>,
    completed: bool,
    /// Latest score per answered element.
    scores: HashMap<ElementId, Score>,
    dialogs: HashMap<ElementId, Vec<DialogTurn>>,
}

impl Run {
    fn current<'s>(&self, script: &'s CourseScript) -> Result<&'s CourseElement, BackendError> {
        let element = match &self.replay {
            Some(replay) => replay
                .chain
                .get(replay.cursor)
                .and_then(|id| script.find(id)),
            None => script.get(self.position),
        };
        element.ok_or_else(|| BackendError::Status {
            status: 500,
            message: "Run points past the course".into(),
        })
    }
}

#[derive(Debug)]
struct RuntimeState {
    courses: HashMap<CourseId, CourseScript>,
    runs: HashMap<CourseId, Run>,
    latency: HashMap<Endpoint, Duration>,
    failures: HashMap<Endpoint, VecDeque<BackendError>>,
    calls: HashMap<Endpoint, usize>,
    offline: bool,
    dialog_turn_limit: usize,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            courses: HashMap::new(),
            runs: HashMap::new(),
            latency: HashMap::new(),
            failures: HashMap::new(),
            calls: HashMap::new(),
            offline: false,
            dialog_turn_limit: DEFAULT_DIALOG_TURNS,
        }
    }
}

fn is_scored(kind: ElementKind) -> bool {
    matches!(
        kind,
        ElementKind::Quiz | ElementKind::Input | ElementKind::MultiChoice
    )
}

/// Scored elements whose id starts with `prefix`, in course order.
fn scored_with_prefix<'s>(
    script: &'s CourseScript,
    prefix: &'s str,
) -> impl Iterator<Item = &'s CourseElement> + 's {
    script
        .elements()
        .iter()
        .filter(move |e| e.element_id().has_prefix(prefix) && is_scored(e.kind()))
}

fn mistakes(script: &CourseScript, run: &Run, prefix: &str) -> Vec<ElementId> {
    scored_with_prefix(script, prefix)
        .filter(|e| {
            run.scores
                .get(e.element_id())
                .is_some_and(|s| s.is_mistake(e.kind() == ElementKind::MultiChoice))
        })
        .map(|e| e.element_id().clone())
        .collect()
}

fn totals(script: &CourseScript, run: &Run, prefix: &str) -> Option<Score> {
    let mut any = false;
    let mut totals = Score {
        score: 0.0,
        max: 0.0,
    };
    for element in scored_with_prefix(script, prefix) {
        any = true;
        if let Some(score) = run.scores.get(element.element_id()) {
            totals.score += score.score;
            totals.max += score.max;
        }
    }
    any.then_some(totals)
}

impl RuntimeState {
    fn script(&self, course: &CourseId) -> Result<&CourseScript, BackendError> {
        self.courses
            .get(course)
            .ok_or_else(|| not_found("Course not found"))
    }

    fn run(&self, course: &CourseId) -> Result<(&CourseScript, &Run), BackendError> {
        let script = self.script(course)?;
        let run = self
            .runs
            .get(course)
            .ok_or_else(|| not_found("No active run. Start the course first."))?;
        Ok((script, run))
    }

    fn run_mut(&mut self, course: &CourseId) -> Result<(&CourseScript, &mut Run), BackendError> {
        let script = self
            .courses
            .get(course)
            .ok_or_else(|| not_found("Course not found"))?;
        let run = self
            .runs
            .get_mut(course)
            .ok_or_else(|| not_found("No active run. Start the course first."))?;
        Ok((script, run))
    }

    fn start(&mut self, course: &CourseId) -> Result<(), BackendError> {
        self.script(course)?;
        self.runs.entry(course.clone()).or_default();
        Ok(())
    }

    fn next(&mut self, course: &CourseId) -> Result<Advance, BackendError> {
        let (script, run) = self.run_mut(course)?;
        let completed = Advance::Completed {
            message: Some(COURSE_FINISHED.to_string()),
        };
        if run.completed {
            return Ok(completed);
        }

        if let Some(replay) = &mut run.replay {
            replay.cursor += 1;
            if replay.cursor < replay.chain.len() {
                return run.current(script).cloned().map(Advance::Element);
            }
            run.position = replay.revision_index + 1;
            run.replay = None;
        } else if matches!(script.get(run.position), Some(CourseElement::End(_))) {
            run.completed = true;
            return Ok(completed);
        } else {
            run.position += 1;
        }

        match script.get(run.position) {
            Some(element) => Ok(Advance::Element(element.clone())),
            None => {
                run.completed = true;
                Ok(completed)
            }
        }
    }

    /// Current element, checked against the id and kind an answer targets.
    fn answer_target(
        &mut self,
        course: &CourseId,
        element: &ElementId,
        kind: AnswerKind,
    ) -> Result<(CourseElement, &mut Run), BackendError> {
        let (script, run) = self.run_mut(course)?;
        let current = run.current(script)?.clone();
        if current.kind() != kind.element_kind() {
            return Err(bad_request(format!("Current element is not a {kind}")));
        }
        if current.element_id() != element {
            return Err(bad_request("Invalid element_id"));
        }
        Ok((current, run))
    }

    fn quiz(
        &mut self,
        course: &CourseId,
        element: &ElementId,
        index: usize,
    ) -> Result<QuizVerdict, BackendError> {
        let (current, run) = self.answer_target(course, element, AnswerKind::Quiz)?;
        let CourseElement::Quiz(quiz) = &current else {
            return Err(bad_request("Current element is not a quiz"));
        };
        let (verdict, score) = grading::grade_quiz(quiz, index)?;
        run.scores.insert(element.clone(), score);
        Ok(verdict)
    }

    fn input(
        &mut self,
        course: &CourseId,
        element: &ElementId,
        text: &str,
    ) -> Result<InputVerdict, BackendError> {
        let (current, run) = self.answer_target(course, element, AnswerKind::Input)?;
        let CourseElement::Input(input) = &current else {
            return Err(bad_request("Current element is not an input"));
        };
        let (verdict, score) = grading::grade_input(input, text)?;
        run.scores.insert(element.clone(), score);
        Ok(verdict)
    }

    fn question(
        &mut self,
        course: &CourseId,
        element: &ElementId,
        index: usize,
    ) -> Result<QuestionVerdict, BackendError> {
        let (current, _) = self.answer_target(course, element, AnswerKind::Question)?;
        let CourseElement::Question(question) = &current else {
            return Err(bad_request("Current element is not a question"));
        };
        grading::grade_question(question, index)
    }

    fn multi_choice(
        &mut self,
        course: &CourseId,
        element: &ElementId,
        indices: &[usize],
    ) -> Result<MultiChoiceVerdict, BackendError> {
        let (current, run) = self.answer_target(course, element, AnswerKind::MultiChoice)?;
        let CourseElement::MultiChoice(multi) = &current else {
            return Err(bad_request("Current element is not a multi_choice"));
        };
        let (verdict, score) = grading::grade_multi_choice(multi, indices)?;
        run.scores.insert(element.clone(), score);
        Ok(verdict)
    }

    fn test_result(&self, course: &CourseId, element: &ElementId) -> Result<TestResult, BackendError> {
        let (script, run) = self.run(course)?;
        let Some(CourseElement::Test(test)) = script.find(element) else {
            return Err(not_found("Test element not found"));
        };
        if test.prefix.is_empty() {
            return Err(bad_request("Test element has no prefix"));
        }
        Ok(grading::test_summary(test, totals(script, run, &test.prefix)))
    }

    fn revision_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<RevisionResult, BackendError> {
        let (script, run) = self.run(course)?;
        let Some(CourseElement::Revision(revision)) = script.find(element) else {
            return Err(not_found("Revision element not found"));
        };
        if revision.prefix.is_empty() {
            return Err(bad_request("Revision element has no prefix"));
        }
        Ok(grading::revision_summary(
            revision,
            mistakes(script, run, &revision.prefix),
        ))
    }

    fn start_revision(
        &mut self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<CourseElement, BackendError> {
        let result = self.revision_result(course, element)?;
        if !result.is_replayable() {
            return Err(bad_request("Nothing to revise"));
        }
        let (script, run) = self.run_mut(course)?;
        let revision_index = script
            .position_of(element)
            .ok_or_else(|| not_found("Revision element not found"))?;
        run.replay = Some(Replay {
            revision_index,
            chain: result.chain_element_ids,
            cursor: 0,
        });
        run.current(script).cloned()
    }

    fn dialog(
        &mut self,
        course: &CourseId,
        element: &ElementId,
        message: &str,
    ) -> Result<DialogReply, BackendError> {
        let turn_limit = self.dialog_turn_limit;
        let (script, run) = self.run_mut(course)?;
        let Some(CourseElement::Dialog(dialog)) = script.find(element) else {
            return Err(not_found(format!("Dialog element {element} not found")));
        };
        let text = message.trim();
        if text.is_empty() {
            return Err(bad_request("Message must not be empty"));
        }

        let conversation = run
            .dialogs
            .entry(element.clone())
            .or_insert_with(|| dialog.conversation.clone());
        conversation.push(DialogTurn {
            role: "user".into(),
            content: text.to_string(),
        });
        let user_turns = conversation.iter().filter(|t| t.role == "user").count();

        let (reply, stop) = if text.eq_ignore_ascii_case("stop") {
            (String::new(), true)
        } else if user_turns >= turn_limit {
            ("Thanks, that's all for now.".to_string(), true)
        } else {
            (format!("You said: {text}"), false)
        };
        if !reply.is_empty() {
            conversation.push(DialogTurn {
                role: "assistant".into(),
                content: reply.clone(),
            });
        }
        Ok(DialogReply {
            reply,
            stop,
            conversation: conversation.clone(),
        })
    }
}

/// In-process `CourseBackend`.
///
/// Clones share the same courses, runs and fault settings.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuntime {
    state: Arc<Mutex<RuntimeState>>,
}

impl InMemoryRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_course(self, script: CourseScript) -> Self {
        self.add_course(script);
        self
    }

    pub fn add_course(&self, script: CourseScript) {
        self.lock().courses.insert(script.course_id().clone(), script);
    }

    /// Delay every call to `endpoint` by `delay` (tokio time).
    pub fn set_latency(&self, endpoint: Endpoint, delay: Duration) {
        self.lock().latency.insert(endpoint, delay);
    }

    /// Fail the next call to `endpoint` with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, endpoint: Endpoint, error: BackendError) {
        self.lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    /// While offline every call fails with `BackendError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Number of user turns after which a dialog stops on its own.
    pub fn set_dialog_turn_limit(&self, turns: usize) {
        self.lock().dialog_turn_limit = turns.max(1);
    }

    /// Calls received by `endpoint`, including failed ones.
    #[must_use]
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, apply latency, then consume any injected failure.
    async fn enter(&self, endpoint: Endpoint) -> Result<(), BackendError> {
        let latency = {
            let mut state = self.lock();
            *state.calls.entry(endpoint).or_insert(0) += 1;
            state.latency.get(&endpoint).copied()
        };
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.offline {
            return Err(BackendError::Unavailable("course runtime is offline".into()));
        }
        if let Some(error) = state
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            debug!(%endpoint, %error, "injected failure");
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl CourseBackend for InMemoryRuntime {
    async fn check_course_exists(&self, course: &CourseId) -> Result<bool, BackendError> {
        self.enter(Endpoint::CheckCourse).await?;
        Ok(self.lock().courses.contains_key(course))
    }

    async fn start_course(&self, course: &CourseId) -> Result<(), BackendError> {
        self.enter(Endpoint::StartCourse).await?;
        self.lock().start(course)
    }

    async fn current_element(&self, course: &CourseId) -> Result<CourseElement, BackendError> {
        self.enter(Endpoint::CurrentElement).await?;
        let state = self.lock();
        let (script, run) = state.run(course)?;
        run.current(script).cloned()
    }

    async fn advance_element(&self, course: &CourseId) -> Result<Advance, BackendError> {
        self.enter(Endpoint::NextElement).await?;
        self.lock().next(course)
    }

    async fn submit_quiz_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_index: usize,
    ) -> Result<QuizVerdict, BackendError> {
        self.enter(Endpoint::QuizAnswer).await?;
        self.lock().quiz(course, element, answer_index)
    }

    async fn submit_input_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        text: &str,
    ) -> Result<InputVerdict, BackendError> {
        self.enter(Endpoint::InputAnswer).await?;
        self.lock().input(course, element, text)
    }

    async fn submit_question_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_index: usize,
    ) -> Result<QuestionVerdict, BackendError> {
        self.enter(Endpoint::QuestionAnswer).await?;
        self.lock().question(course, element, answer_index)
    }

    async fn submit_multi_choice_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_indices: &[usize],
    ) -> Result<MultiChoiceVerdict, BackendError> {
        self.enter(Endpoint::MultiChoiceAnswer).await?;
        self.lock().multi_choice(course, element, answer_indices)
    }

    async fn test_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<TestResult, BackendError> {
        self.enter(Endpoint::TestResult).await?;
        self.lock().test_result(course, element)
    }

    async fn revision_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<RevisionResult, BackendError> {
        self.enter(Endpoint::RevisionResult).await?;
        self.lock().revision_result(course, element)
    }

    async fn start_revision(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<CourseElement, BackendError> {
        self.enter(Endpoint::StartRevision).await?;
        self.lock().start_revision(course, element)
    }

    async fn send_dialog_message(
        &self,
        course: &CourseId,
        element: &ElementId,
        message: &str,
    ) -> Result<DialogReply, BackendError> {
        self.enter(Endpoint::DialogMessage).await?;
        self.lock().dialog(course, element, message)
    }
}
