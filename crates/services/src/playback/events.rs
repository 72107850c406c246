use std::fmt;
use std::time::Duration;

use playback_core::RenderKey;
use playback_core::model::{AnswerKind, Correctness, ElementId, ElementKind};

/// Controller operation named in failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Begin,
    Advance,
    AutoAdvance,
    SelectOption,
    SubmitAnswer,
    StartRevision,
    DialogMessage,
    TestLookup,
    RevisionLookup,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Begin => "begin",
            Operation::Advance => "advance",
            Operation::AutoAdvance => "auto_advance",
            Operation::SelectOption => "select_option",
            Operation::SubmitAnswer => "submit_answer",
            Operation::StartRevision => "start_revision",
            Operation::DialogMessage => "dialog_message",
            Operation::TestLookup => "test_lookup",
            Operation::RevisionLookup => "revision_lookup",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change notifications for front-ends. Read the full state through
/// `CoursePlayer::snapshot`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    ElementAppended {
        key: RenderKey,
        kind: ElementKind,
    },
    AnswerRecorded {
        element_id: ElementId,
        kind: AnswerKind,
        correctness: Correctness,
    },
    RevisionStarted {
        revision_id: ElementId,
        chain: Vec<ElementId>,
    },
    DialogReplied {
        element_id: ElementId,
        stop: bool,
    },
    AdvanceScheduled {
        position: usize,
        delay: Duration,
    },
    ResultLoaded {
        element_id: ElementId,
    },
    TransitionFailed {
        operation: Operation,
        message: String,
    },
    Completed {
        message: Option<String>,
    },
    Closed,
}
