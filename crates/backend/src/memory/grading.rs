//! Verdict and summary rules of the course server.

use std::collections::BTreeMap;

use playback_core::model::element::{
    InputElement, InputType, MultiChoiceElement, QuestionElement, QuizElement, RevisionElement,
    TestElement,
};
use playback_core::model::{
    ElementId, IndividualFeedback, InputVerdict, MultiChoiceVerdict, QuestionVerdict,
    QuizVerdict, RevisionResult, TestResult,
};

use crate::BackendError;

/// Points recorded for one answered element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Score {
    pub score: f64,
    pub max: f64,
}

impl Score {
    /// Only elements with a positive maximum can count as mistakes.
    pub fn is_mistake(&self, multi_choice: bool) -> bool {
        if self.max <= 0.0 {
            return false;
        }
        if multi_choice {
            self.score < 1.0
        } else {
            (self.score - 1.0).abs() > f64::EPSILON
        }
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> BackendError {
    BackendError::Status {
        status: 400,
        message: message.into(),
    }
}

pub(crate) fn not_found(message: impl Into<String>) -> BackendError {
    BackendError::Status {
        status: 404,
        message: message.into(),
    }
}

fn check_index(index: usize, len: usize) -> Result<(), BackendError> {
    if index >= len {
        return Err(bad_request(format!("Invalid answer index: {index}")));
    }
    Ok(())
}

// ─── Answers ────────────────────────────────────────────────────────────────

pub(crate) fn grade_quiz(quiz: &QuizElement, index: usize) -> Result<(QuizVerdict, Score), BackendError> {
    check_index(index, quiz.answers.len())?;
    let correct_index = quiz
        .answers
        .iter()
        .position(|answer| answer.is_correct())
        .ok_or_else(|| BackendError::Status {
            status: 500,
            message: format!("Quiz {} has no correct answer", quiz.element_id),
        })?;

    let is_correct = index == correct_index;
    let feedback = quiz.answers[index]
        .feedback
        .clone()
        .unwrap_or_else(|| "Answer accepted".to_string());
    let score = u8::from(is_correct);
    let verdict = QuizVerdict {
        is_correct,
        feedback,
        score,
    };
    Ok((
        verdict,
        Score {
            score: f64::from(score),
            max: 1.0,
        },
    ))
}

fn normalize_input(answer: &str, input_type: InputType) -> String {
    match input_type {
        InputType::Sequence => answer.chars().filter(char::is_ascii_digit).collect(),
        InputType::Text => answer.trim().to_lowercase(),
    }
}

pub(crate) fn grade_input(input: &InputElement, text: &str) -> Result<(InputVerdict, Score), BackendError> {
    if text.trim().is_empty() {
        return Err(bad_request("Answer must not be empty"));
    }
    let Some(expected) = input.correct_answer.as_deref().filter(|a| !a.is_empty()) else {
        let verdict = InputVerdict {
            is_correct: false,
            feedback: "Answer accepted".to_string(),
            score: 0,
        };
        return Ok((verdict, Score { score: 0.0, max: 0.0 }));
    };

    let is_correct =
        normalize_input(text, input.input_type) == normalize_input(expected, input.input_type);
    let feedback = if is_correct {
        input.feedback_correct.clone().unwrap_or_else(|| "Correct!".to_string())
    } else {
        input
            .feedback_incorrect
            .clone()
            .unwrap_or_else(|| "Incorrect.".to_string())
    };
    let score = u8::from(is_correct);
    Ok((
        InputVerdict {
            is_correct,
            feedback,
            score,
        },
        Score {
            score: f64::from(score),
            max: 1.0,
        },
    ))
}

pub(crate) fn grade_question(question: &QuestionElement, index: usize) -> Result<QuestionVerdict, BackendError> {
    check_index(index, question.answers.len())?;
    Ok(QuestionVerdict {
        feedback: question.answers[index].feedback.clone().unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultiChoiceGrade {
    Correct,
    Partial,
    Incorrect,
}

fn classify_multi_choice(multi: &MultiChoiceElement, selected: &[usize]) -> MultiChoiceGrade {
    let correct: Vec<usize> = (0..multi.answers.len())
        .filter(|i| multi.answers[*i].is_correct())
        .collect();
    let incorrect: Vec<usize> = (0..multi.answers.len())
        .filter(|i| multi.answers[*i].is_marked_incorrect())
        .collect();
    let selected_correct = selected.iter().filter(|i| correct.contains(*i)).count();
    let selected_incorrect = selected.iter().filter(|i| incorrect.contains(*i)).count();

    if selected_correct == correct.len() && selected_incorrect == 0 {
        MultiChoiceGrade::Correct
    } else if selected_correct > 0 || selected_incorrect < incorrect.len() {
        MultiChoiceGrade::Partial
    } else {
        MultiChoiceGrade::Incorrect
    }
}

fn or_default(text: &str, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

pub(crate) fn grade_multi_choice(
    multi: &MultiChoiceElement,
    selected: &[usize],
) -> Result<(MultiChoiceVerdict, Score), BackendError> {
    if selected.is_empty() {
        return Err(bad_request("Select at least one answer"));
    }
    for index in selected {
        check_index(*index, multi.answers.len())?;
    }

    let (is_correct, feedback, score) = match classify_multi_choice(multi, selected) {
        MultiChoiceGrade::Correct => (true, or_default(&multi.feedback_correct, "Correct!"), 1.0),
        MultiChoiceGrade::Partial => (
            false,
            or_default(&multi.feedback_partial, "Partially correct."),
            0.5,
        ),
        MultiChoiceGrade::Incorrect => {
            (false, or_default(&multi.feedback_incorrect, "Incorrect."), 0.0)
        }
    };
    let individual_feedbacks = selected
        .iter()
        .map(|index| IndividualFeedback {
            answer_index: *index,
            answer_text: multi.answers[*index].text.clone(),
            feedback: multi.answers[*index].feedback.clone(),
        })
        .collect();

    Ok((
        MultiChoiceVerdict {
            is_correct,
            feedback,
            individual_feedbacks,
            score,
        },
        Score { score, max: 1.0 },
    ))
}

// ─── Summaries ──────────────────────────────────────────────────────────────

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One decimal, trailing zeros dropped: 3.0 → "3", 2.5 → "2.5".
fn format_score(value: f64) -> String {
    let formatted = format!("{value:.1}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// First message whose key is ≥ `error_percentage`, else the largest key.
pub(crate) fn select_feedback(error_percentage: f64, table: &BTreeMap<u32, String>) -> String {
    table
        .iter()
        .find(|(key, _)| error_percentage <= f64::from(**key))
        .or_else(|| table.iter().next_back())
        .map_or_else(|| "Result received.".to_string(), |(_, message)| message.clone())
}

/// `totals` is `None` when no scored element carries the prefix.
pub(crate) fn test_summary(test: &TestElement, totals: Option<Score>) -> TestResult {
    let Score { score, max } = match totals {
        Some(Score { score, max }) if max <= 0.0 => Score { score, max: 1.0 },
        Some(totals) => totals,
        None => Score { score: 0.0, max: 0.0 },
    };
    let error_percentage = if max <= 0.0 {
        100.0
    } else {
        round2((max - score) / max * 100.0)
    };
    let result_text = test
        .text
        .replace("{score}", &format_score(score))
        .replace("{maxscore}", &format_score(max));

    TestResult {
        total_score: score,
        total_max_score: max,
        error_percentage,
        result_text,
        feedback_message: select_feedback(error_percentage, &test.score_table),
    }
}

pub(crate) fn revision_summary(revision: &RevisionElement, mistakes: Vec<ElementId>) -> RevisionResult {
    let has_mistakes = !mistakes.is_empty();
    let message = if has_mistakes {
        revision
            .text
            .replace("{mistakes_count}", &mistakes.len().to_string())
    } else {
        revision.no_mistakes_text.clone()
    };
    RevisionResult {
        has_mistakes,
        message,
        mistakes_count: mistakes.len(),
        chain_element_ids: mistakes,
    }
}
