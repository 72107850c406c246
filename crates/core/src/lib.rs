#![forbid(unsafe_code)]

//! Course playback model: elements, transcript, answer records and revision
//! chain bookkeeping. No I/O happens here.

pub mod answers;
pub mod instances;
pub mod model;
pub mod revision;
pub mod session;
pub mod time;
pub mod transcript;

pub use answers::{AnswerRecord, AnswerState, AnswerStates, AnswerStore, RecordedOutcome};
pub use instances::InstanceCounter;
pub use revision::{ChainSpan, ChainSpans, scan_membership};
pub use session::{AnswerView, Phase, SessionState};
pub use time::Clock;
pub use transcript::{RenderKey, Transcript, TranscriptEntry};
