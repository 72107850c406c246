#![forbid(unsafe_code)]

//! Request/response boundary to the course server.

use std::fmt;

use async_trait::async_trait;
use playback_core::model::{
    CourseElement, CourseId, DialogReply, ElementId, InputVerdict, MultiChoiceVerdict,
    QuestionVerdict, QuizVerdict, RevisionResult, TestResult,
};

mod error;
pub mod http;
pub mod memory;
mod wire;

pub use error::BackendError;
pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::{CourseScript, InMemoryRuntime};

/// Result of asking the server for the next element.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Element(CourseElement),
    /// The course is over; nothing follows.
    Completed { message: Option<String> },
}

/// Server operations, used for logging and by test doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CheckCourse,
    StartCourse,
    CurrentElement,
    NextElement,
    QuizAnswer,
    InputAnswer,
    QuestionAnswer,
    MultiChoiceAnswer,
    TestResult,
    RevisionResult,
    StartRevision,
    DialogMessage,
}

impl Endpoint {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::CheckCourse => "check_course",
            Endpoint::StartCourse => "start",
            Endpoint::CurrentElement => "current",
            Endpoint::NextElement => "next",
            Endpoint::QuizAnswer => "quiz_answer",
            Endpoint::InputAnswer => "input_answer",
            Endpoint::QuestionAnswer => "question_answer",
            Endpoint::MultiChoiceAnswer => "multichoice_answer",
            Endpoint::TestResult => "test_result",
            Endpoint::RevisionResult => "revision_result",
            Endpoint::StartRevision => "revision_start",
            Endpoint::DialogMessage => "dialog_message",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract every course server adapter fulfils.
///
/// All calls are scoped to the learner's active run of `course`.
#[async_trait]
pub trait CourseBackend: Send + Sync {
    /// Whether the course exists.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the server cannot answer; a missing course is
    /// `Ok(false)`.
    async fn check_course_exists(&self, course: &CourseId) -> Result<bool, BackendError>;

    /// Create the learner's run. Calling it on an existing run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the run cannot be created.
    async fn start_course(&self, course: &CourseId) -> Result<(), BackendError>;

    /// Element the run is currently positioned on.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if there is no run or the element is malformed.
    async fn current_element(&self, course: &CourseId) -> Result<CourseElement, BackendError>;

    /// Move the run forward.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the server cannot move the run.
    async fn advance_element(&self, course: &CourseId) -> Result<Advance, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` if the answer is refused or the call fails.
    async fn submit_quiz_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_index: usize,
    ) -> Result<QuizVerdict, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` if the answer is refused or the call fails.
    async fn submit_input_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        text: &str,
    ) -> Result<InputVerdict, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` if the answer is refused or the call fails.
    async fn submit_question_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_index: usize,
    ) -> Result<QuestionVerdict, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` if the answer is refused or the call fails.
    async fn submit_multi_choice_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_indices: &[usize],
    ) -> Result<MultiChoiceVerdict, BackendError>;

    /// Score summary for a `Test` element.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the element is unknown or the call fails.
    async fn test_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<TestResult, BackendError>;

    /// Mistake lookup for a `Revision` element.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the element is unknown or the call fails.
    async fn revision_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<RevisionResult, BackendError>;

    /// Begin replaying mistakes; returns the first chain element.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` (400) when there is nothing to replay.
    async fn start_revision(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<CourseElement, BackendError>;

    /// Forward a learner message to a dialog element.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the dialog is unknown or the call fails.
    async fn send_dialog_message(
        &self,
        course: &CourseId,
        element: &ElementId,
        message: &str,
    ) -> Result<DialogReply, BackendError>;
}
