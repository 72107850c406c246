use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::ElementId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while decoding or validating a course element.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ElementError {
    #[error("course element must be a JSON object")]
    NotAnObject,

    #[error("malformed course element: {0}")]
    Malformed(String),

    #[error("course element has an empty element_id")]
    MissingId,

    #[error("audio element {0} has no media")]
    AudioWithoutMedia(ElementId),

    #[error("element {id} of kind {kind} has no answers")]
    NoAnswers { id: ElementId, kind: ElementKind },
}

//
// ─── KINDS ────────────────────────────────────────────────────────────────────
//

/// Discriminant of a `CourseElement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Message,
    Quiz,
    Audio,
    Input,
    Question,
    MultiChoice,
    Unimplemented,
    Test,
    End,
    Revision,
    Dialog,
}

impl ElementKind {
    /// Wire name of the kind, as used in the `type` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Message => "message",
            ElementKind::Quiz => "quiz",
            ElementKind::Audio => "audio",
            ElementKind::Input => "input",
            ElementKind::Question => "question",
            ElementKind::MultiChoice => "multi_choice",
            ElementKind::Unimplemented => "unimplemented",
            ElementKind::Test => "test",
            ElementKind::End => "end",
            ElementKind::Revision => "revision",
            ElementKind::Dialog => "dialog",
        }
    }

    /// The answer store used by this kind, if it accepts answers.
    #[must_use]
    pub fn answer_kind(self) -> Option<AnswerKind> {
        match self {
            ElementKind::Quiz => Some(AnswerKind::Quiz),
            ElementKind::Input => Some(AnswerKind::Input),
            ElementKind::Question => Some(AnswerKind::Question),
            ElementKind::MultiChoice => Some(AnswerKind::MultiChoice),
            ElementKind::Message
            | ElementKind::Audio
            | ElementKind::Unimplemented
            | ElementKind::Test
            | ElementKind::End
            | ElementKind::Revision
            | ElementKind::Dialog => None,
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interactive element kinds; each one owns an answer store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Quiz,
    Input,
    Question,
    MultiChoice,
}

impl AnswerKind {
    #[must_use]
    pub fn element_kind(self) -> ElementKind {
        match self {
            AnswerKind::Quiz => ElementKind::Quiz,
            AnswerKind::Input => ElementKind::Input,
            AnswerKind::Question => ElementKind::Question,
            AnswerKind::MultiChoice => ElementKind::MultiChoice,
        }
    }
}

impl std::fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.element_kind().as_str())
    }
}

/// Which on-display timer applies to an auto-advancing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTimer {
    Message,
    Audio,
}

/// How the session moves past an element once it is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceMode {
    /// Advance automatically after the display delay.
    OnDisplay(DisplayTimer),
    /// Wait for a confirmed answer, then advance after the feedback delay.
    AfterAnswer(AnswerKind),
    /// Wait for an explicit user action (button, inline option, revision start).
    Manual,
    /// The dialog sub-component decides when the conversation is over.
    Delegated,
    /// Nothing follows in the normal flow.
    Terminal,
}

//
// ─── PAYLOADS ─────────────────────────────────────────────────────────────────
//

fn default_parse_mode() -> String {
    "MARKDOWN".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Accepts `"yes"`/`"no"` (authoring format) as well as booleans.
fn yes_no_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[allow(clippy::ref_option)]
fn yes_no_out<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(true) => serializer.serialize_str("yes"),
        Some(false) => serializer.serialize_str("no"),
        None => serializer.serialize_none(),
    }
}

/// Inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineOption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageElement {
    pub element_id: ElementId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<InlineOption>,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
}

impl MessageElement {
    /// Messages without a button and without inline options advance on their own.
    #[must_use]
    pub fn waits_for_click(&self) -> bool {
        self.button.is_some() || !self.options.is_empty()
    }
}

/// One choice of a quiz or multi-choice element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceAnswer {
    pub text: String,
    #[serde(
        default,
        deserialize_with = "yes_no_flag",
        serialize_with = "yes_no_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ChoiceAnswer {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.correct == Some(true)
    }

    #[must_use]
    pub fn is_marked_incorrect(&self) -> bool {
        self.correct == Some(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizElement {
    pub element_id: ElementId,
    pub text: String,
    pub answers: Vec<ChoiceAnswer>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioElement {
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<String>,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
}

/// How free-text answers are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    Text,
    /// Comma/space separated sequences; separators are ignored when comparing.
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputElement {
    pub element_id: ElementId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_correct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_incorrect: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_type: InputType,
}

/// One choice of an ungraded question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionElement {
    pub element_id: ElementId,
    pub text: String,
    pub answers: Vec<QuestionAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiChoiceElement {
    pub element_id: ElementId,
    pub text: String,
    pub answers: Vec<ChoiceAnswer>,
    #[serde(default)]
    pub feedback_correct: String,
    #[serde(default)]
    pub feedback_partial: String,
    #[serde(default)]
    pub feedback_incorrect: String,
}

/// Placeholder for element kinds the web player cannot show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnimplementedElement {
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_name: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
}

/// Score summary over every graded element sharing `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestElement {
    pub element_id: ElementId,
    #[serde(default)]
    pub text: String,
    pub prefix: String,
    /// Error percentage threshold → message.
    #[serde(rename = "score", default, deserialize_with = "null_as_default")]
    pub score_table: BTreeMap<u32, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndElement {
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Entry point of a revision loop over mistakes made on elements sharing `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionElement {
    pub element_id: ElementId,
    #[serde(default)]
    pub text: String,
    pub prefix: String,
    #[serde(rename = "no_mistakes", default)]
    pub no_mistakes_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
}

/// One turn of an AI dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogTurn {
    pub role: String,
    pub content: String,
}

/// Conversational element driven by an external dialog component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogElement {
    pub element_id: ElementId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_start: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversation: Vec<DialogTurn>,
}

//
// ─── COURSE ELEMENT ───────────────────────────────────────────────────────────
//

/// One unit of course content.
///
/// Decoding accepts the backend's wire shape: a `type` discriminant in
/// snake_case, where a missing (or null) `type` means `Message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "Value")]
pub enum CourseElement {
    Message(MessageElement),
    Quiz(QuizElement),
    Audio(AudioElement),
    Input(InputElement),
    Question(QuestionElement),
    MultiChoice(MultiChoiceElement),
    Unimplemented(UnimplementedElement),
    Test(TestElement),
    End(EndElement),
    Revision(RevisionElement),
    Dialog(DialogElement),
}

/// Derive-only mirror used to decode once the discriminant is normalized.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedElement {
    Message(MessageElement),
    Quiz(QuizElement),
    Audio(AudioElement),
    Input(InputElement),
    Question(QuestionElement),
    MultiChoice(MultiChoiceElement),
    Unimplemented(UnimplementedElement),
    Test(TestElement),
    End(EndElement),
    Revision(RevisionElement),
    Dialog(DialogElement),
}

impl From<TaggedElement> for CourseElement {
    fn from(tagged: TaggedElement) -> Self {
        match tagged {
            TaggedElement::Message(e) => Self::Message(e),
            TaggedElement::Quiz(e) => Self::Quiz(e),
            TaggedElement::Audio(e) => Self::Audio(e),
            TaggedElement::Input(e) => Self::Input(e),
            TaggedElement::Question(e) => Self::Question(e),
            TaggedElement::MultiChoice(e) => Self::MultiChoice(e),
            TaggedElement::Unimplemented(e) => Self::Unimplemented(e),
            TaggedElement::Test(e) => Self::Test(e),
            TaggedElement::End(e) => Self::End(e),
            TaggedElement::Revision(e) => Self::Revision(e),
            TaggedElement::Dialog(e) => Self::Dialog(e),
        }
    }
}

impl TryFrom<Value> for CourseElement {
    type Error = ElementError;

    fn try_from(mut value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = &mut value else {
            return Err(ElementError::NotAnObject);
        };
        if matches!(map.get("type"), None | Some(Value::Null)) {
            map.insert("type".into(), Value::String("message".into()));
        }

        let tagged: TaggedElement =
            serde_json::from_value(value).map_err(|e| ElementError::Malformed(e.to_string()))?;
        let element = CourseElement::from(tagged);
        element.validate()?;
        Ok(element)
    }
}

impl CourseElement {
    #[must_use]
    pub fn element_id(&self) -> &ElementId {
        match self {
            CourseElement::Message(e) => &e.element_id,
            CourseElement::Quiz(e) => &e.element_id,
            CourseElement::Audio(e) => &e.element_id,
            CourseElement::Input(e) => &e.element_id,
            CourseElement::Question(e) => &e.element_id,
            CourseElement::MultiChoice(e) => &e.element_id,
            CourseElement::Unimplemented(e) => &e.element_id,
            CourseElement::Test(e) => &e.element_id,
            CourseElement::End(e) => &e.element_id,
            CourseElement::Revision(e) => &e.element_id,
            CourseElement::Dialog(e) => &e.element_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            CourseElement::Message(_) => ElementKind::Message,
            CourseElement::Quiz(_) => ElementKind::Quiz,
            CourseElement::Audio(_) => ElementKind::Audio,
            CourseElement::Input(_) => ElementKind::Input,
            CourseElement::Question(_) => ElementKind::Question,
            CourseElement::MultiChoice(_) => ElementKind::MultiChoice,
            CourseElement::Unimplemented(_) => ElementKind::Unimplemented,
            CourseElement::Test(_) => ElementKind::Test,
            CourseElement::End(_) => ElementKind::End,
            CourseElement::Revision(_) => ElementKind::Revision,
            CourseElement::Dialog(_) => ElementKind::Dialog,
        }
    }

    /// Primary text shown for the element, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            CourseElement::Message(e) => Some(&e.text),
            CourseElement::Quiz(e) => Some(&e.text),
            CourseElement::Audio(e) => e.text.as_deref(),
            CourseElement::Input(e) => Some(&e.text),
            CourseElement::Question(e) => Some(&e.text),
            CourseElement::MultiChoice(e) => Some(&e.text),
            CourseElement::Unimplemented(e) => Some(&e.text),
            CourseElement::Test(e) => Some(&e.text),
            CourseElement::End(e) => e.text.as_deref(),
            CourseElement::Revision(e) => Some(&e.text),
            CourseElement::Dialog(e) => Some(&e.text),
        }
    }

    /// Label of the explicit "continue" button, if the element has one.
    #[must_use]
    pub fn button(&self) -> Option<&str> {
        match self {
            CourseElement::Message(e) if e.options.is_empty() => e.button.as_deref(),
            CourseElement::Unimplemented(e) => e.button.as_deref(),
            CourseElement::Test(e) => e.button.as_deref(),
            CourseElement::Revision(e) => e.button.as_deref(),
            _ => None,
        }
    }

    /// Number of selectable answers for interactive kinds.
    #[must_use]
    pub fn answer_count(&self) -> Option<usize> {
        match self {
            CourseElement::Quiz(e) => Some(e.answers.len()),
            CourseElement::Question(e) => Some(e.answers.len()),
            CourseElement::MultiChoice(e) => Some(e.answers.len()),
            _ => None,
        }
    }

    #[must_use]
    pub fn advance_mode(&self) -> AdvanceMode {
        match self {
            CourseElement::Message(m) if m.waits_for_click() => AdvanceMode::Manual,
            CourseElement::Message(_) => AdvanceMode::OnDisplay(DisplayTimer::Message),
            CourseElement::Audio(_) => AdvanceMode::OnDisplay(DisplayTimer::Audio),
            CourseElement::Quiz(_) => AdvanceMode::AfterAnswer(AnswerKind::Quiz),
            CourseElement::Input(_) => AdvanceMode::AfterAnswer(AnswerKind::Input),
            CourseElement::Question(_) => AdvanceMode::AfterAnswer(AnswerKind::Question),
            CourseElement::MultiChoice(_) => AdvanceMode::AfterAnswer(AnswerKind::MultiChoice),
            CourseElement::Unimplemented(_)
            | CourseElement::Test(_)
            | CourseElement::Revision(_) => AdvanceMode::Manual,
            CourseElement::Dialog(_) => AdvanceMode::Delegated,
            CourseElement::End(_) => AdvanceMode::Terminal,
        }
    }

    /// Check structural rules the wire format cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ElementError` for a blank id, audio without media, or a
    /// choice element without answers.
    pub fn validate(&self) -> Result<(), ElementError> {
        if self.element_id().as_str().trim().is_empty() {
            return Err(ElementError::MissingId);
        }
        match self {
            CourseElement::Audio(audio) if audio.media.is_empty() => {
                Err(ElementError::AudioWithoutMedia(audio.element_id.clone()))
            }
            CourseElement::Quiz(_) | CourseElement::Question(_) | CourseElement::MultiChoice(_)
                if self.answer_count() == Some(0) =>
            {
                Err(ElementError::NoAnswers {
                    id: self.element_id().clone(),
                    kind: self.kind(),
                })
            }
            _ => Ok(()),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<CourseElement, ElementError> {
        CourseElement::try_from(value)
    }

    #[test]
    fn untyped_object_decodes_as_message() {
        let element = decode(json!({
            "element_id": "m1",
            "text": "Welcome",
            "options": null,
            "media": null
        }))
        .unwrap();

        let CourseElement::Message(message) = &element else {
            panic!("expected message, got {element:?}");
        };
        assert_eq!(message.parse_mode, "MARKDOWN");
        assert!(message.options.is_empty());
        assert_eq!(
            element.advance_mode(),
            AdvanceMode::OnDisplay(DisplayTimer::Message)
        );
    }

    #[test]
    fn message_with_options_waits_for_click() {
        let element = decode(json!({
            "element_id": "m2",
            "text": "Pick one",
            "options": [{"text": "Go", "goto": "m5"}]
        }))
        .unwrap();
        assert_eq!(element.advance_mode(), AdvanceMode::Manual);
        assert_eq!(element.button(), None);
    }

    #[test]
    fn quiz_accepts_yes_and_bool_flags() {
        let element = decode(json!({
            "type": "quiz",
            "element_id": "q1",
            "text": "2+2?",
            "answers": [
                {"text": "3"},
                {"text": "4", "correct": "yes", "feedback": "Right"},
                {"text": "5", "correct": false}
            ]
        }))
        .unwrap();
        let CourseElement::Quiz(quiz) = element else {
            panic!("expected quiz");
        };
        assert!(!quiz.answers[0].is_correct());
        assert!(quiz.answers[1].is_correct());
        assert!(quiz.answers[2].is_marked_incorrect());
    }

    #[test]
    fn test_element_parses_score_table_keys() {
        let element = decode(json!({
            "type": "test",
            "element_id": "t1",
            "text": "You scored {score}/{maxscore}",
            "prefix": "q_",
            "score": {"10": "Great", "50": "Okay", "100": "Try again"}
        }))
        .unwrap();
        let CourseElement::Test(test) = element else {
            panic!("expected test");
        };
        assert_eq!(test.score_table.get(&50).map(String::as_str), Some("Okay"));
        assert_eq!(test.score_table.len(), 3);
    }

    #[test]
    fn audio_without_media_is_rejected() {
        let err = decode(json!({"type": "audio", "element_id": "a1", "media": []})).unwrap_err();
        assert_eq!(err, ElementError::AudioWithoutMedia(ElementId::new("a1")));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = decode(json!({"type": "hologram", "element_id": "x"})).unwrap_err();
        assert!(matches!(err, ElementError::Malformed(_)));
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(decode(json!([1, 2])).unwrap_err(), ElementError::NotAnObject);
    }

    #[test]
    fn serialization_round_trips_through_wire_shape() {
        let element = CourseElement::Revision(RevisionElement {
            element_id: ElementId::new("r1"),
            text: "You made {mistakes_count} mistakes".into(),
            prefix: "q".into(),
            no_mistakes_text: "Perfect".into(),
            button: Some("Review".into()),
        });
        let value = serde_json::to_value(&element).unwrap();
        assert_eq!(value["type"], "revision");
        assert_eq!(value["no_mistakes"], "Perfect");

        let back: CourseElement = serde_json::from_value(value).unwrap();
        assert_eq!(back, element);
    }

    #[test]
    fn advance_modes_follow_kind() {
        let end = CourseElement::End(EndElement {
            element_id: ElementId::new("e"),
            text: None,
        });
        assert_eq!(end.advance_mode(), AdvanceMode::Terminal);

        let input = decode(json!({"type": "input", "element_id": "i1", "text": "Name?"})).unwrap();
        assert_eq!(
            input.advance_mode(),
            AdvanceMode::AfterAnswer(AnswerKind::Input)
        );
        assert_eq!(input.kind().answer_kind(), Some(AnswerKind::Input));
    }
}
