use serde::{Deserialize, Serialize};

use crate::model::element::DialogTurn;
use crate::model::ids::ElementId;

/// Score summary computed server-side for a `Test` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub total_score: f64,
    pub total_max_score: f64,
    pub error_percentage: f64,
    /// Element text with `{score}` and `{maxscore}` substituted.
    pub result_text: String,
    /// Message picked from the element's score table.
    pub feedback_message: String,
}

impl TestResult {
    /// Score as a percentage of the maximum (0 when nothing was scored).
    #[must_use]
    pub fn score_percentage(&self) -> f64 {
        if self.total_max_score <= 0.0 {
            return 0.0;
        }
        (self.total_score / self.total_max_score) * 100.0
    }
}

/// Mistake lookup computed server-side for a `Revision` element.
///
/// Fetched once per revision element id and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionResult {
    pub has_mistakes: bool,
    /// Completion text: the element text when there are mistakes, otherwise the
    /// "no mistakes" text.
    pub message: String,
    pub mistakes_count: usize,
    /// Element ids to replay, in order.
    pub chain_element_ids: Vec<ElementId>,
}

impl RevisionResult {
    /// True when the replay chain names this element.
    #[must_use]
    pub fn chain_contains(&self, id: &ElementId) -> bool {
        self.chain_element_ids.iter().any(|chained| chained == id)
    }

    /// True when a replay would have anything to show.
    #[must_use]
    pub fn is_replayable(&self) -> bool {
        self.has_mistakes && !self.chain_element_ids.is_empty()
    }
}

/// Reply from the dialog endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogReply {
    pub reply: String,
    /// The conversation is over and the course should move on.
    pub stop: bool,
    #[serde(default)]
    pub conversation: Vec<DialogTurn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_percentage_handles_zero_max() {
        let result = TestResult {
            total_score: 0.0,
            total_max_score: 0.0,
            error_percentage: 100.0,
            result_text: String::new(),
            feedback_message: String::new(),
        };
        assert!(result.score_percentage().abs() < f64::EPSILON);
    }

    #[test]
    fn replayable_requires_mistakes_and_chain() {
        let mut result = RevisionResult {
            has_mistakes: true,
            message: "Let's retry".into(),
            mistakes_count: 1,
            chain_element_ids: vec![ElementId::new("q1")],
        };
        assert!(result.is_replayable());
        assert!(result.chain_contains(&ElementId::new("q1")));

        result.chain_element_ids.clear();
        assert!(!result.is_replayable());
    }
}
