use serde::{Deserialize, Serialize};

use crate::model::element::{AnswerKind, CourseElement};

//
// ─── ANSWER PAYLOADS ──────────────────────────────────────────────────────────
//

/// A user's answer to an interactive element, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Quiz { answer_index: usize },
    Input { text: String },
    Question { answer_index: usize },
    MultiChoice { answer_indices: Vec<usize> },
}

impl Answer {
    #[must_use]
    pub fn kind(&self) -> AnswerKind {
        match self {
            Answer::Quiz { .. } => AnswerKind::Quiz,
            Answer::Input { .. } => AnswerKind::Input,
            Answer::Question { .. } => AnswerKind::Question,
            Answer::MultiChoice { .. } => AnswerKind::MultiChoice,
        }
    }

    /// Checks indices against the element's answer list.
    ///
    /// Returns a human-readable reason when the answer cannot apply to `element`.
    #[must_use]
    pub fn invalid_reason(&self, element: &CourseElement) -> Option<String> {
        let count = element.answer_count().unwrap_or(0);
        match self {
            Answer::Quiz { answer_index } | Answer::Question { answer_index } => {
                (*answer_index >= count)
                    .then(|| format!("answer {answer_index} is out of range (0..{count})"))
            }
            Answer::MultiChoice { answer_indices } => {
                if answer_indices.is_empty() {
                    return Some("select at least one answer".into());
                }
                answer_indices
                    .iter()
                    .find(|idx| **idx >= count)
                    .map(|idx| format!("answer {idx} is out of range (0..{count})"))
            }
            Answer::Input { text } => text
                .trim()
                .is_empty()
                .then(|| "answer must not be empty".to_string()),
        }
    }
}

//
// ─── VERDICTS ─────────────────────────────────────────────────────────────────
//

/// Server verdict for a quiz answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizVerdict {
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub score: u8,
}

/// Server verdict for a free-text answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVerdict {
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub score: u8,
}

/// Server verdict for an ungraded question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionVerdict {
    #[serde(default)]
    pub feedback: String,
}

/// Feedback attached to one selected multi-choice answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualFeedback {
    pub answer_index: usize,
    pub answer_text: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Server verdict for a multi-choice answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChoiceVerdict {
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub individual_feedbacks: Vec<IndividualFeedback>,
    /// 1.0 fully correct, 0.5 partial, 0.0 incorrect.
    #[serde(default)]
    pub score: f64,
}

//
// ─── OUTCOMES ─────────────────────────────────────────────────────────────────
//

/// Coarse correctness of a recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    Partial,
    Incorrect,
    Ungraded,
}

/// Common view over the per-kind outcome records.
pub trait Outcome {
    fn feedback(&self) -> &str;
    fn correctness(&self) -> Correctness;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub selected_answer: usize,
    pub feedback: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputOutcome {
    pub submitted_answer: String,
    pub feedback: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub selected_answer: usize,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChoiceOutcome {
    pub selected_answers: Vec<usize>,
    pub feedback: String,
    pub individual_feedbacks: Vec<IndividualFeedback>,
    pub is_correct: bool,
    pub score: f64,
}

impl QuizOutcome {
    #[must_use]
    pub fn from_verdict(selected_answer: usize, verdict: QuizVerdict) -> Self {
        Self {
            selected_answer,
            feedback: verdict.feedback,
            is_correct: verdict.is_correct,
        }
    }
}

impl InputOutcome {
    #[must_use]
    pub fn from_verdict(submitted_answer: String, verdict: InputVerdict) -> Self {
        Self {
            submitted_answer,
            feedback: verdict.feedback,
            is_correct: verdict.is_correct,
        }
    }
}

impl QuestionOutcome {
    #[must_use]
    pub fn from_verdict(selected_answer: usize, verdict: QuestionVerdict) -> Self {
        Self {
            selected_answer,
            feedback: verdict.feedback,
        }
    }
}

impl MultiChoiceOutcome {
    #[must_use]
    pub fn from_verdict(selected_answers: Vec<usize>, verdict: MultiChoiceVerdict) -> Self {
        Self {
            selected_answers,
            feedback: verdict.feedback,
            individual_feedbacks: verdict.individual_feedbacks,
            is_correct: verdict.is_correct,
            score: verdict.score,
        }
    }
}

impl Outcome for QuizOutcome {
    fn feedback(&self) -> &str {
        &self.feedback
    }

    fn correctness(&self) -> Correctness {
        if self.is_correct {
            Correctness::Correct
        } else {
            Correctness::Incorrect
        }
    }
}

impl Outcome for InputOutcome {
    fn feedback(&self) -> &str {
        &self.feedback
    }

    fn correctness(&self) -> Correctness {
        if self.is_correct {
            Correctness::Correct
        } else {
            Correctness::Incorrect
        }
    }
}

impl Outcome for QuestionOutcome {
    fn feedback(&self) -> &str {
        &self.feedback
    }

    fn correctness(&self) -> Correctness {
        Correctness::Ungraded
    }
}

impl Outcome for MultiChoiceOutcome {
    fn feedback(&self) -> &str {
        &self.feedback
    }

    fn correctness(&self) -> Correctness {
        if self.is_correct {
            Correctness::Correct
        } else if self.score > 0.0 {
            Correctness::Partial
        } else {
            Correctness::Incorrect
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
