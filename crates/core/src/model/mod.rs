mod answer;
pub mod element;
mod ids;
mod results;

pub use answer::{
    Answer, Correctness, IndividualFeedback, InputOutcome, InputVerdict, MultiChoiceOutcome,
    MultiChoiceVerdict, Outcome, QuestionOutcome, QuestionVerdict, QuizOutcome, QuizVerdict,
};
pub use element::{
    AdvanceMode, AnswerKind, CourseElement, DisplayTimer, ElementError, ElementKind,
};
pub use ids::{CourseId, ElementId, ParseIdError};
pub use results::{DialogReply, RevisionResult, TestResult};
