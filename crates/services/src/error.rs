//! Shared error types for the services crate.

use thiserror::Error;

use backend::BackendError;
use playback_core::model::{AnswerKind, CourseId, ElementId, ElementKind};

/// Common surface of the playback errors, used to record failures on the
/// session.
pub trait PlaybackFailure {
    /// Text suitable for an error banner.
    fn user_message(&self) -> String;

    /// Rejected because another transition was in flight.
    fn is_busy(&self) -> bool;
}

/// Errors emitted by `CoursePlayer::begin`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StartupError {
    #[error("course {0} does not exist")]
    CourseNotFound(CourseId),
    #[error("course server is unreachable")]
    Unreachable(#[source] BackendError),
    #[error(transparent)]
    Backend(BackendError),
    #[error("session is already playing course {0}")]
    AlreadyStarted(CourseId),
    #[error("another operation is in progress")]
    Busy,
    #[error("session is closed")]
    Closed,
}

impl StartupError {
    #[must_use]
    pub fn from_backend(err: BackendError) -> Self {
        if err.is_retryable() {
            Self::Unreachable(err)
        } else {
            Self::Backend(err)
        }
    }

    /// Retrying the same `begin` call cannot succeed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_) | Self::AlreadyStarted(_) | Self::Closed
        )
    }
}

impl PlaybackFailure for StartupError {
    fn user_message(&self) -> String {
        match self {
            Self::CourseNotFound(course) => format!("Course \"{course}\" was not found."),
            Self::Unreachable(_) => "Could not reach the course server. Try again.".to_string(),
            Self::Backend(err) => err.user_message(),
            Self::AlreadyStarted(_) | Self::Busy | Self::Closed => self.to_string(),
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Errors emitted by navigation operations (`advance`, `select_option`,
/// `start_revision`, `send_dialog_message`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("another operation is in progress")]
    Busy,
    #[error("session has not started")]
    NotStarted,
    #[error("course is already finished")]
    Completed,
    #[error("session is closed")]
    Closed,
    #[error("element {requested} is not the current element")]
    NotCurrent { requested: ElementId },
    #[error("element {0} is not a revision")]
    NotARevision(ElementId),
    #[error("element {0} is not a dialog")]
    NotADialog(ElementId),
    #[error("revision result for {0} has not been loaded")]
    MissingRevisionResult(ElementId),
    #[error("revision {0} has nothing to replay")]
    NoMistakes(ElementId),
    #[error("option {index} does not exist ({available} available)")]
    InvalidOption { index: usize, available: usize },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl PlaybackFailure for TransitionError {
    fn user_message(&self) -> String {
        match self {
            Self::Backend(err) => err.user_message(),
            _ => self.to_string(),
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Errors emitted by `CoursePlayer::submit_answer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerSubmissionError {
    #[error("another operation is in progress")]
    Busy,
    #[error("session has not started")]
    NotStarted,
    #[error("course is already finished")]
    Completed,
    #[error("session is closed")]
    Closed,
    #[error("element {requested} is not the current element")]
    NotCurrent { requested: ElementId },
    #[error("{kind} element does not accept a {answer} answer")]
    KindMismatch { kind: ElementKind, answer: AnswerKind },
    #[error("element {0} is already answered")]
    AlreadyAnswered(ElementId),
    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl PlaybackFailure for AnswerSubmissionError {
    fn user_message(&self) -> String {
        match self {
            Self::Backend(err) => err.user_message(),
            _ => self.to_string(),
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Errors emitted by the test and revision result lookups.
///
/// `Clone` because one failed fetch is handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LookupError {
    #[error("session has not started")]
    NotStarted,
    #[error("session is closed")]
    Closed,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl PlaybackFailure for LookupError {
    fn user_message(&self) -> String {
        match self {
            Self::Backend(err) => err.user_message(),
            _ => self.to_string(),
        }
    }

    fn is_busy(&self) -> bool {
        false
    }
}

/// Errors emitted while reading `PlaybackConfig` from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be true or false, got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}
