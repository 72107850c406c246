//! Wall-clock source for transcript timestamps.
//!
//! Auto-advance delays run on tokio's clock. This one only stamps when an
//! entry was shown.

use chrono::{DateTime, Utc};

/// Where `TranscriptEntry::shown_at` comes from.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    /// Every entry is stamped with the same instant, so transcripts from
    /// two runs compare equal.
    Pinned(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn pinned(at: DateTime<Utc>) -> Self {
        Self::Pinned(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Pinned(at) => *at,
        }
    }
}

/// 2024-01-01T09:00:00Z, used by tests as the moment a lesson starts.
pub const LESSON_START: i64 = 1_704_099_600;

#[must_use]
pub fn lesson_start() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(LESSON_START, 0).unwrap_or_default()
}

/// Clock pinned to `lesson_start`.
#[must_use]
pub fn pinned_clock() -> Clock {
    Clock::pinned(lesson_start())
}
