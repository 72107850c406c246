//! JSON shapes exchanged with the course server.

use playback_core::model::{CourseElement, ElementId, RevisionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Advance, BackendError};

#[derive(Debug, Serialize)]
pub(crate) struct IndexAnswerBody<'a> {
    pub element_id: &'a ElementId,
    pub selected_answer_index: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct InputAnswerBody<'a> {
    pub element_id: &'a ElementId,
    pub user_answer: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MultiChoiceAnswerBody<'a> {
    pub element_id: &'a ElementId,
    pub selected_answer_indices: &'a [usize],
}

#[derive(Debug, Serialize)]
pub(crate) struct DialogMessageBody<'a> {
    pub element_id: &'a ElementId,
    pub message: &'a str,
}

/// `revision_chain` entries are single-key objects `{element_id: {element_data}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RevisionResultResponse {
    pub has_mistakes: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mistakes_count: usize,
    #[serde(default)]
    pub revision_chain: Vec<Map<String, Value>>,
}

impl From<RevisionResultResponse> for RevisionResult {
    fn from(response: RevisionResultResponse) -> Self {
        let chain_element_ids = response
            .revision_chain
            .into_iter()
            .flat_map(|entry| entry.into_iter().map(|(id, _)| ElementId::new(id)))
            .collect();
        RevisionResult {
            has_mistakes: response.has_mistakes,
            message: response.message,
            mistakes_count: response.mistakes_count,
            chain_element_ids,
        }
    }
}

pub(crate) fn decode_element(value: Value) -> Result<CourseElement, BackendError> {
    CourseElement::try_from(value).map_err(|err| BackendError::Decode(err.to_string()))
}

/// `/next` answers either with an element or `{"completed": true, "message": …}`.
pub(crate) fn decode_advance(value: Value) -> Result<Advance, BackendError> {
    let completed = value
        .get("completed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if completed {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned);
        return Ok(Advance::Completed { message });
    }
    decode_element(value).map(Advance::Element)
}

/// Human-readable message from an error body.
///
/// Understands `{"detail": "…"}` and validation lists
/// `{"detail": [{"msg": "…"}, …]}`; anything else is returned trimmed.
pub(crate) fn error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    match value.get("detail") {
        Some(Value::String(detail)) => detail.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_payload_decodes_as_completion() {
        let advance = decode_advance(json!({"completed": true, "message": "Course finished"}))
            .unwrap();
        assert_eq!(
            advance,
            Advance::Completed {
                message: Some("Course finished".into())
            }
        );
    }

    #[test]
    fn untyped_element_decodes_as_message() {
        let advance = decode_advance(json!({"element_id": "m1", "text": "Hi"})).unwrap();
        let Advance::Element(CourseElement::Message(message)) = advance else {
            panic!("expected message element");
        };
        assert_eq!(message.text, "Hi");
    }

    #[test]
    fn revision_chain_is_reduced_to_ordered_ids() {
        let response: RevisionResultResponse = serde_json::from_value(json!({
            "has_mistakes": true,
            "message": "You made 2 mistakes",
            "mistakes_count": 2,
            "revision_chain": [
                {"q2": {"element_data": {"type": "quiz"}}},
                {"q1": {"element_data": {"type": "input"}}}
            ]
        }))
        .unwrap();
        let result = RevisionResult::from(response);
        assert_eq!(
            result.chain_element_ids,
            vec![ElementId::new("q2"), ElementId::new("q1")]
        );
    }

    #[test]
    fn error_detail_understands_fastapi_shapes() {
        assert_eq!(error_detail(r#"{"detail":"Course not found"}"#), "Course not found");
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"field required"},{"msg":"bad index"}]}"#),
            "field required; bad index"
        );
        assert_eq!(error_detail("  Bad Gateway \n"), "Bad Gateway");
    }
}
