//! Playback timing and prefetch settings.

use std::env;
use std::time::Duration;

use playback_core::model::{AnswerKind, DisplayTimer};

use crate::error::ConfigError;

const MESSAGE_DELAY_ENV: &str = "COURSE_MESSAGE_DELAY_MS";
const AUDIO_DELAY_ENV: &str = "COURSE_AUDIO_DELAY_MS";
const ANSWER_DELAY_ENV: &str = "COURSE_ANSWER_DELAY_MS";
const MULTI_CHOICE_DELAY_ENV: &str = "COURSE_MULTI_CHOICE_DELAY_MS";
const DIALOG_DELAY_ENV: &str = "COURSE_DIALOG_DELAY_MS";
const PREFETCH_ENV: &str = "COURSE_PREFETCH_RESULTS";
const EVENT_CAPACITY_ENV: &str = "COURSE_EVENT_CAPACITY";

/// Delays and switches used by `CoursePlayer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Message without button or options.
    pub message_delay: Duration,
    pub audio_delay: Duration,
    /// After quiz, input and question feedback.
    pub answer_delay: Duration,
    pub multi_choice_delay: Duration,
    /// After a dialog ends with a closing reply. An empty closing reply
    /// advances immediately.
    pub dialog_stop_delay: Duration,
    /// Fetch test and revision results as soon as their element is shown.
    pub prefetch_results: bool,
    /// Buffer of the playback event channel.
    pub event_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            message_delay: Duration::from_millis(2_500),
            audio_delay: Duration::from_millis(3_000),
            answer_delay: Duration::from_millis(2_000),
            multi_choice_delay: Duration::from_millis(3_000),
            dialog_stop_delay: Duration::from_millis(1_500),
            prefetch_results: true,
            event_capacity: 64,
        }
    }
}

impl PlaybackConfig {
    /// Read overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`PlaybackConfig::from_env`] with an explicit lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |name: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                Some(raw) => parse_number(name, &raw).map(Duration::from_millis),
                None => Ok(fallback),
            }
        };

        let prefetch_results = match lookup(PREFETCH_ENV) {
            Some(raw) => parse_flag(PREFETCH_ENV, &raw)?,
            None => defaults.prefetch_results,
        };
        let event_capacity = match lookup(EVENT_CAPACITY_ENV) {
            Some(raw) => usize::try_from(parse_number(EVENT_CAPACITY_ENV, &raw)?)
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidNumber {
                    name: EVENT_CAPACITY_ENV,
                    value: raw,
                })?,
            None => defaults.event_capacity,
        };

        Ok(Self {
            message_delay: millis(MESSAGE_DELAY_ENV, defaults.message_delay)?,
            audio_delay: millis(AUDIO_DELAY_ENV, defaults.audio_delay)?,
            answer_delay: millis(ANSWER_DELAY_ENV, defaults.answer_delay)?,
            multi_choice_delay: millis(MULTI_CHOICE_DELAY_ENV, defaults.multi_choice_delay)?,
            dialog_stop_delay: millis(DIALOG_DELAY_ENV, defaults.dialog_stop_delay)?,
            prefetch_results,
            event_capacity,
        })
    }

    #[must_use]
    pub fn with_prefetch(mut self, prefetch_results: bool) -> Self {
        self.prefetch_results = prefetch_results;
        self
    }

    #[must_use]
    pub fn display_delay(&self, timer: DisplayTimer) -> Duration {
        match timer {
            DisplayTimer::Message => self.message_delay,
            DisplayTimer::Audio => self.audio_delay,
        }
    }

    #[must_use]
    pub fn feedback_delay(&self, kind: AnswerKind) -> Duration {
        match kind {
            AnswerKind::Quiz | AnswerKind::Input | AnswerKind::Question => self.answer_delay,
            AnswerKind::MultiChoice => self.multi_choice_delay,
        }
    }

    /// Delay after a dialog reply that ends the conversation.
    #[must_use]
    pub fn dialog_delay(&self, closing_reply: &str) -> Duration {
        if closing_reply.trim().is_empty() {
            Duration::ZERO
        } else {
            self.dialog_stop_delay
        }
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    })
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: raw.to_string(),
        }),
    }
}
