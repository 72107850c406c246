#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod playback;

pub use config::PlaybackConfig;
pub use error::{
    AnswerSubmissionError, ConfigError, LookupError, PlaybackFailure, StartupError,
    TransitionError,
};
pub use playback::{CoursePlayer, Operation, PlaybackEvent, ResultCache, Step};
pub use playback_core::{Clock, Phase, SessionState};
