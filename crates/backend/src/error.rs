use thiserror::Error;

/// Errors surfaced by backend adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Status { status: 404, .. })
    }

    /// Failures that may go away on their own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Transport(_) | BackendError::Unavailable(_) => true,
            BackendError::Status { status, .. } => *status >= 500,
            BackendError::Decode(_) | BackendError::InvalidConfig(_) => false,
        }
    }

    /// Text suitable for showing to a learner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Transport(_) | BackendError::Unavailable(_) => {
                "The course server cannot be reached. Please try again.".to_string()
            }
            BackendError::Status { message, .. } if !message.trim().is_empty() => message.clone(),
            BackendError::Status { status, .. } => format!("The course server returned {status}."),
            BackendError::Decode(_) => {
                "The course server sent a response that could not be read.".to_string()
            }
            BackendError::InvalidConfig(_) => "The course player is misconfigured.".to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_is_shown_to_users() {
        let err = BackendError::Status {
            status: 404,
            message: "Course not found".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "Course not found");
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = BackendError::Status {
            status: 503,
            message: String::new(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), "The course server returned 503.");
    }
}
