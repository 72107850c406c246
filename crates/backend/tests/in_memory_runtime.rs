use std::time::Duration;

use backend::{Advance, BackendError, CourseBackend, CourseScript, Endpoint, InMemoryRuntime};
use playback_core::model::{CourseElement, CourseId, ElementId};

const COURSE: &str = r#"[
    {"element_id": "intro", "text": "Welcome"},
    {"type": "quiz", "element_id": "q1", "text": "2+2?", "answers": [
        {"text": "3", "correct": "no", "feedback": "Too small"},
        {"text": "4", "correct": "yes", "feedback": "Right"}
    ]},
    {"type": "input", "element_id": "q2", "text": "Capital of France?",
     "correct_answer": "Paris", "feedback_correct": "Yes", "feedback_incorrect": "No"},
    {"type": "test", "element_id": "t1", "text": "{score}/{maxscore}", "prefix": "q",
     "score": {"0": "Perfect", "50": "Half way", "100": "Start over"}},
    {"type": "revision", "element_id": "r1", "text": "{mistakes_count} to fix",
     "prefix": "q", "no_mistakes": "Nothing to fix"},
    {"type": "dialog", "element_id": "d1", "text": "Chat", "prompt": "Be kind"},
    {"type": "end", "element_id": "end", "text": "Bye"}
]"#;

fn course() -> CourseId {
    CourseId::new("intro-course")
}

fn runtime() -> InMemoryRuntime {
    let script = CourseScript::from_json(course(), COURSE).unwrap();
    InMemoryRuntime::new().with_course(script)
}

async fn next_id(runtime: &InMemoryRuntime) -> String {
    match runtime.advance_element(&course()).await.unwrap() {
        Advance::Element(element) => element.element_id().to_string(),
        Advance::Completed { .. } => "<completed>".to_string(),
    }
}

/// Walk to `r1` answering q1 wrong and q2 right.
async fn walk_to_revision(runtime: &InMemoryRuntime) {
    runtime.start_course(&course()).await.unwrap();
    assert_eq!(next_id(runtime).await, "q1");
    runtime
        .submit_quiz_answer(&course(), &ElementId::new("q1"), 0)
        .await
        .unwrap();
    assert_eq!(next_id(runtime).await, "q2");
    runtime
        .submit_input_answer(&course(), &ElementId::new("q2"), " paris ")
        .await
        .unwrap();
    assert_eq!(next_id(runtime).await, "t1");
    assert_eq!(next_id(runtime).await, "r1");
}

#[tokio::test]
async fn unknown_course_does_not_exist() {
    let runtime = runtime();
    assert!(runtime.check_course_exists(&course()).await.unwrap());
    assert!(!runtime.check_course_exists(&CourseId::new("nope")).await.unwrap());

    let err = runtime.start_course(&CourseId::new("nope")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn start_is_idempotent() {
    let runtime = runtime();
    runtime.start_course(&course()).await.unwrap();
    assert_eq!(next_id(&runtime).await, "q1");

    runtime.start_course(&course()).await.unwrap();
    let current = runtime.current_element(&course()).await.unwrap();
    assert_eq!(current.element_id(), &ElementId::new("q1"));
}

#[tokio::test]
async fn current_without_run_is_not_found() {
    let err = runtime().current_element(&course()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn answers_must_target_the_current_element() {
    let runtime = runtime();
    runtime.start_course(&course()).await.unwrap();
    next_id(&runtime).await;

    let err = runtime
        .submit_input_answer(&course(), &ElementId::new("q2"), "Paris")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 400, .. }));

    let verdict = runtime
        .submit_quiz_answer(&course(), &ElementId::new("q1"), 1)
        .await
        .unwrap();
    assert!(verdict.is_correct);
    assert_eq!(verdict.feedback, "Right");
}

#[tokio::test]
async fn test_and_revision_results_reflect_answers() {
    let runtime = runtime();
    walk_to_revision(&runtime).await;

    let test = runtime
        .test_result(&course(), &ElementId::new("t1"))
        .await
        .unwrap();
    assert_eq!(test.result_text, "1/2");
    assert!((test.error_percentage - 50.0).abs() < f64::EPSILON);
    assert_eq!(test.feedback_message, "Half way");

    let revision = runtime
        .revision_result(&course(), &ElementId::new("r1"))
        .await
        .unwrap();
    assert!(revision.has_mistakes);
    assert_eq!(revision.message, "1 to fix");
    assert_eq!(revision.chain_element_ids, vec![ElementId::new("q1")]);
}

#[tokio::test]
async fn revision_replays_mistakes_then_resumes_after_revision() {
    let runtime = runtime();
    walk_to_revision(&runtime).await;

    let first = runtime
        .start_revision(&course(), &ElementId::new("r1"))
        .await
        .unwrap();
    assert_eq!(first.element_id(), &ElementId::new("q1"));
    assert!(matches!(first, CourseElement::Quiz(_)));

    runtime
        .submit_quiz_answer(&course(), &ElementId::new("q1"), 1)
        .await
        .unwrap();
    assert_eq!(next_id(&runtime).await, "d1");

    let clean = runtime
        .revision_result(&course(), &ElementId::new("r1"))
        .await
        .unwrap();
    assert!(!clean.has_mistakes);
    assert_eq!(clean.message, "Nothing to fix");
}

#[tokio::test]
async fn revision_without_mistakes_is_refused() {
    let runtime = runtime();
    runtime.start_course(&course()).await.unwrap();
    let err = runtime
        .start_revision(&course(), &ElementId::new("r1"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 400, .. }));
}

#[tokio::test]
async fn next_after_end_reports_completion() {
    let runtime = runtime();
    walk_to_revision(&runtime).await;
    assert_eq!(next_id(&runtime).await, "d1");
    assert_eq!(next_id(&runtime).await, "end");
    assert_eq!(next_id(&runtime).await, "<completed>");
    assert_eq!(next_id(&runtime).await, "<completed>");
}

#[tokio::test]
async fn dialog_stops_on_request_or_turn_limit() {
    let runtime = runtime();
    runtime.set_dialog_turn_limit(2);
    runtime.start_course(&course()).await.unwrap();
    let dialog = ElementId::new("d1");

    let reply = runtime
        .send_dialog_message(&course(), &dialog, "hello")
        .await
        .unwrap();
    assert!(!reply.stop);
    assert_eq!(reply.conversation.len(), 2);

    let reply = runtime
        .send_dialog_message(&course(), &dialog, "more")
        .await
        .unwrap();
    assert!(reply.stop);
    assert!(!reply.reply.is_empty());

    let reply = runtime
        .send_dialog_message(&course(), &dialog, "STOP")
        .await
        .unwrap();
    assert!(reply.stop);
    assert!(reply.reply.is_empty());
}

#[tokio::test]
async fn injected_failures_are_consumed_once() {
    let runtime = runtime();
    runtime.fail_next(
        Endpoint::StartCourse,
        BackendError::Transport("connection reset".into()),
    );

    let err = runtime.start_course(&course()).await.unwrap_err();
    assert!(err.is_retryable());
    runtime.start_course(&course()).await.unwrap();
    assert_eq!(runtime.calls(Endpoint::StartCourse), 2);
}

#[tokio::test]
async fn offline_runtime_is_unavailable() {
    let runtime = runtime();
    runtime.set_offline(true);
    let err = runtime.check_course_exists(&course()).await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn latency_delays_calls() {
    let runtime = runtime();
    runtime.set_latency(Endpoint::CheckCourse, Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    runtime.check_course_exists(&course()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(runtime.total_calls(), 1);
}
