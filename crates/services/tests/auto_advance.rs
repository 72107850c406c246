mod support;

use std::time::Duration;

use backend::Endpoint;
use playback_core::model::{Answer, ElementKind};
use services::{Phase, PlaybackEvent, StartupError, Step, TransitionError};
use tokio::time::sleep;

use support::{
    advance_to, chat_course, course, id, media_course, player, runtime, short_course,
    transcript_ids,
};

#[tokio::test(start_paused = true)]
async fn message_advances_once_after_its_delay() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(course()).await.unwrap();

    sleep(Duration::from_millis(2_400)).await;
    assert_eq!(player.snapshot().transcript().len(), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(transcript_ids(&player.snapshot()), ["welcome", "q1"]);

    // q1 waits for an answer.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(player.snapshot().transcript().len(), 2);
    assert_eq!(runtime.calls(Endpoint::NextElement), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_advance_cancels_the_timer() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(course()).await.unwrap();
    assert_eq!(player.pending_advance(), Some(0));

    advance_to(&player, "q1").await;
    assert_eq!(player.pending_advance(), None);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(player.snapshot().transcript().len(), 2);
    assert_eq!(runtime.calls(Endpoint::NextElement), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_advances_append_one_element() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(course()).await.unwrap();
    runtime.set_latency(Endpoint::NextElement, Duration::from_millis(100));

    let (a, b) = tokio::join!(player.advance(), player.advance());
    let shown = [&a, &b]
        .iter()
        .filter(|result| matches!(result, Ok(Step::Shown(_))))
        .count();
    let busy = [&a, &b]
        .iter()
        .filter(|result| matches!(result, Err(TransitionError::Busy)))
        .count();
    assert_eq!((shown, busy), (1, 1));
    assert_eq!(player.snapshot().transcript().len(), 2);
    assert_eq!(runtime.calls(Endpoint::NextElement), 1);
    // Busy rejections are not reported as failures.
    assert_eq!(player.snapshot().last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn click_during_auto_advance_is_rejected() {
    let runtime = runtime();
    runtime.set_latency(Endpoint::NextElement, Duration::from_secs(1));
    let player = player(&runtime);
    player.begin(course()).await.unwrap();

    sleep(Duration::from_millis(2_600)).await;
    assert!(player.is_busy());
    assert!(matches!(
        player.advance().await,
        Err(TransitionError::Busy)
    ));

    sleep(Duration::from_secs(1)).await;
    assert!(!player.is_busy());
    assert_eq!(transcript_ids(&player.snapshot()), ["welcome", "q1"]);
    assert_eq!(runtime.calls(Endpoint::NextElement), 1);
}

#[tokio::test(start_paused = true)]
async fn feedback_delay_follows_the_answer() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(course()).await.unwrap();
    advance_to(&player, "q1").await;

    player
        .submit_answer(&id("q1"), Answer::Quiz { answer_index: 0 })
        .await
        .unwrap();
    sleep(Duration::from_millis(1_900)).await;
    assert_eq!(player.snapshot().transcript().len(), 2);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(transcript_ids(&player.snapshot())[2], "q2");
}

#[tokio::test(start_paused = true)]
async fn audio_advances_after_its_own_delay() {
    let runtime = runtime();
    let player = player(&runtime);
    let audio = player.begin(media_course()).await.unwrap();
    assert_eq!(audio.element.kind(), ElementKind::Audio);
    assert_eq!(player.pending_advance(), Some(0));

    sleep(Duration::from_millis(2_900)).await;
    assert_eq!(runtime.calls(Endpoint::NextElement), 0);
    assert_eq!(player.snapshot().transcript().len(), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(transcript_ids(&player.snapshot()), ["a1", "mc"]);
    assert_eq!(player.pending_advance(), None);
}

#[tokio::test(start_paused = true)]
async fn multi_choice_feedback_stays_longer() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(media_course()).await.unwrap();
    advance_to(&player, "mc").await;

    player
        .submit_answer(
            &id("mc"),
            Answer::MultiChoice {
                answer_indices: vec![0, 2],
            },
        )
        .await
        .unwrap();
    assert_eq!(player.pending_advance(), Some(1));

    // Past the quiz delay, still showing the feedback.
    sleep(Duration::from_millis(2_900)).await;
    assert_eq!(player.current().unwrap().element_id(), &id("mc"));
    assert_eq!(runtime.calls(Endpoint::NextElement), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(player.current().unwrap().element_id(), &id("end"));
    assert_eq!(transcript_ids(&player.snapshot()), ["a1", "mc", "end"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_pending_advance() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(course()).await.unwrap();
    assert!(player.pending_advance().is_some());

    player.shutdown();
    assert_eq!(player.phase(), Phase::Closed);
    assert_eq!(player.pending_advance(), None);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(player.snapshot().transcript().len(), 1);
    assert_eq!(runtime.calls(Endpoint::NextElement), 0);
    assert!(matches!(player.advance().await, Err(TransitionError::Closed)));
    assert!(matches!(
        player.begin(course()).await,
        Err(StartupError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_player_stops_its_timers() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(short_course()).await.unwrap();
    drop(player);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(runtime.calls(Endpoint::NextElement), 0);
}

#[tokio::test(start_paused = true)]
async fn dialog_stop_request_advances_immediately() {
    let runtime = runtime();
    let player = player(&runtime);
    let dialog = player.begin(chat_course()).await.unwrap();
    assert_eq!(dialog.element.kind(), ElementKind::Dialog);
    assert_eq!(player.pending_advance(), None);

    let reply = player
        .send_dialog_message(&id("d1"), "hello")
        .await
        .unwrap();
    assert!(!reply.stop);
    assert_eq!(reply.reply, "You said: hello");

    let reply = player.send_dialog_message(&id("d1"), "stop").await.unwrap();
    assert!(reply.stop);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(transcript_ids(&player.snapshot()), ["d1", "end"]);
}

#[tokio::test(start_paused = true)]
async fn dialog_closing_reply_is_shown_before_advancing() {
    let runtime = runtime();
    runtime.set_dialog_turn_limit(1);
    let player = player(&runtime);
    player.begin(chat_course()).await.unwrap();

    let reply = player.send_dialog_message(&id("d1"), "hi").await.unwrap();
    assert!(reply.stop);
    assert!(!reply.reply.is_empty());

    sleep(Duration::from_millis(1_400)).await;
    assert_eq!(player.snapshot().transcript().len(), 1);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(player.snapshot().transcript().len(), 2);
}

#[tokio::test]
async fn dialog_messages_need_the_dialog_on_screen() {
    let runtime = runtime();
    let player = player(&runtime);
    player.begin(course()).await.unwrap();

    let err = player
        .send_dialog_message(&id("d1"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::NotCurrent { .. }));

    let err = player
        .send_dialog_message(&id("welcome"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::NotADialog(_)));
    assert_eq!(runtime.calls(Endpoint::DialogMessage), 0);
}

#[tokio::test(start_paused = true)]
async fn events_describe_each_transition() {
    let runtime = runtime();
    let player = player(&runtime);
    let mut events = player.subscribe();

    player.begin(course()).await.unwrap();
    sleep(Duration::from_millis(2_600)).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(
        &seen[0],
        PlaybackEvent::ElementAppended { key, kind: ElementKind::Message }
            if key.element_id == id("welcome") && key.position == 0
    ));
    assert!(matches!(
        &seen[1],
        PlaybackEvent::AdvanceScheduled { position: 0, .. }
    ));
    assert!(matches!(
        &seen[2],
        PlaybackEvent::ElementAppended { kind: ElementKind::Quiz, .. }
    ));
    assert_eq!(seen.len(), 3);
}
