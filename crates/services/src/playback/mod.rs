//! Course playback: the transition controller and its supporting pieces.

mod cache;
mod controller;
mod events;
mod guard;
mod timer;

pub use cache::ResultCache;
pub use controller::{CoursePlayer, Step};
pub use events::{Operation, PlaybackEvent};
