#![allow(dead_code)]

use std::sync::Arc;

use backend::{CourseScript, InMemoryRuntime};
use playback_core::TranscriptEntry;
use playback_core::model::{Answer, CourseId, ElementId};
use playback_core::time::pinned_clock;
use services::{CoursePlayer, PlaybackConfig, SessionState, Step};

pub const COURSE: &str = r#"[
    {"element_id": "welcome", "text": "Welcome"},
    {"type": "quiz", "element_id": "q1", "text": "2+2?", "answers": [
        {"text": "3", "correct": "no", "feedback": "Too small"},
        {"text": "4", "correct": "yes", "feedback": "Right"}
    ]},
    {"type": "input", "element_id": "q2", "text": "Capital of France?",
     "correct_answer": "Paris", "feedback_correct": "Yes", "feedback_incorrect": "No"},
    {"element_id": "menu", "text": "Ready?", "options": [{"text": "Go on"}]},
    {"type": "test", "element_id": "t1", "text": "{score}/{maxscore}", "prefix": "q",
     "score": {"0": "Perfect", "50": "Half way", "100": "Start over"}},
    {"type": "revision", "element_id": "r1", "text": "{mistakes_count} to fix",
     "prefix": "q", "no_mistakes": "Nothing to fix"},
    {"element_id": "recap", "text": "Recap", "button": "Continue"},
    {"type": "dialog", "element_id": "d1", "text": "Chat", "prompt": "Be kind"},
    {"type": "end", "element_id": "end", "text": "Bye"}
]"#;

pub const SHORT: &str = r#"[
    {"element_id": "hello", "text": "Hi"},
    {"type": "end", "element_id": "end", "text": "Bye"}
]"#;

pub const CHAT: &str = r#"[
    {"type": "dialog", "element_id": "d1", "text": "Chat", "prompt": "Be kind"},
    {"type": "end", "element_id": "end", "text": "Bye"}
]"#;

pub const MEDIA: &str = r#"[
    {"type": "audio", "element_id": "a1", "text": "Listen", "media": ["greeting.ogg"]},
    {"type": "multi_choice", "element_id": "mc", "text": "Which are even?", "answers": [
        {"text": "2", "correct": "yes", "feedback": "Even"},
        {"text": "3", "correct": "no", "feedback": "Odd"},
        {"text": "8", "correct": "yes", "feedback": "Even"}
    ], "feedback_correct": "All found", "feedback_partial": "Some missing",
     "feedback_incorrect": "Look again"},
    {"type": "end", "element_id": "end", "text": "Bye"}
]"#;

pub fn course() -> CourseId {
    CourseId::new("c1")
}

pub fn short_course() -> CourseId {
    CourseId::new("short")
}

pub fn chat_course() -> CourseId {
    CourseId::new("chat")
}

pub fn media_course() -> CourseId {
    CourseId::new("media")
}

pub fn id(raw: &str) -> ElementId {
    ElementId::new(raw)
}

pub fn runtime() -> InMemoryRuntime {
    let runtime = InMemoryRuntime::new();
    for (course_id, json) in [
        (course(), COURSE),
        (short_course(), SHORT),
        (chat_course(), CHAT),
        (media_course(), MEDIA),
    ] {
        runtime.add_course(CourseScript::from_json(course_id, json).unwrap());
    }
    runtime
}

pub fn player(runtime: &InMemoryRuntime) -> CoursePlayer {
    player_with(runtime, PlaybackConfig::default())
}

pub fn player_with(runtime: &InMemoryRuntime, config: PlaybackConfig) -> CoursePlayer {
    CoursePlayer::new(pinned_clock(), Arc::new(runtime.clone()), config)
}

pub fn transcript_ids(state: &SessionState) -> Vec<String> {
    state
        .transcript()
        .iter()
        .map(|entry| entry.element_id().to_string())
        .collect()
}

/// Advance manually and check which element came up.
pub async fn advance_to(player: &CoursePlayer, expected: &str) -> TranscriptEntry {
    match player.advance().await.unwrap() {
        Step::Shown(entry) => {
            assert_eq!(entry.element_id().as_str(), expected);
            entry
        }
        Step::Completed { .. } => panic!("course completed before {expected}"),
    }
}

/// Play `c1` up to the revision element, answering q1 with `q1_answer` and
/// q2 correctly.
pub async fn walk_to_revision(player: &CoursePlayer, q1_answer: usize) {
    walk_to_revision_with(player, q1_answer, " paris ").await;
}

/// Like `walk_to_revision`, with a chosen input for q2.
pub async fn walk_to_revision_with(player: &CoursePlayer, q1_answer: usize, q2_text: &str) {
    player.begin(course()).await.unwrap();
    advance_to(player, "q1").await;
    player
        .submit_answer(&id("q1"), Answer::Quiz { answer_index: q1_answer })
        .await
        .unwrap();
    advance_to(player, "q2").await;
    player
        .submit_answer(
            &id("q2"),
            Answer::Input {
                text: q2_text.into(),
            },
        )
        .await
        .unwrap();
    advance_to(player, "menu").await;
    match player.select_option(0).await.unwrap() {
        Step::Shown(entry) => assert_eq!(entry.element_id().as_str(), "t1"),
        Step::Completed { .. } => panic!("course completed at menu"),
    }
    advance_to(player, "r1").await;
}
