//! Line-based front-end: prints transcript entries as they arrive and turns
//! typed lines into player operations.

use std::io::{self, Write};

use playback_core::TranscriptEntry;
use playback_core::model::{Answer, CourseElement, ElementId};
use playback_core::{AnswerView, RecordedOutcome};
use services::{CoursePlayer, Operation, PlaybackEvent, PlaybackFailure};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// Run until the course completes, the session closes, or stdin ends.
///
/// # Errors
///
/// Returns the I/O error of reading stdin.
pub async fn play(
    player: &CoursePlayer,
    mut events: broadcast::Receiver<PlaybackEvent>,
) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Result element on screen whose summary is still loading.
    let mut awaiting: Option<ElementId> = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PlaybackEvent::ElementAppended { key, .. }) => {
                    let entry = player.snapshot().transcript().get(key.position).cloned();
                    if let Some(entry) = entry {
                        awaiting = show_entry(player, &entry);
                    }
                }
                Ok(PlaybackEvent::ResultLoaded { element_id }) => {
                    if awaiting.as_ref() == Some(&element_id) {
                        awaiting = None;
                        let current = player.current().filter(|e| e.element_id() == &element_id);
                        if let Some(entry) = current {
                            show_result(player, &entry.element);
                        }
                    }
                }
                Ok(PlaybackEvent::Completed { message }) => {
                    println!("\n{}", message.as_deref().unwrap_or("Course finished."));
                    return Ok(());
                }
                Ok(PlaybackEvent::TransitionFailed { operation, message }) => {
                    eprintln!("! {message}");
                    if matches!(operation, Operation::TestLookup | Operation::RevisionLookup)
                        && awaiting.take().is_some()
                    {
                        if operation == Operation::TestLookup {
                            prompt("[Enter] continue");
                        } else {
                            prompt("[Enter] retry");
                        }
                    }
                }
                Ok(PlaybackEvent::Closed) | Err(RecvError::Closed) => return Ok(()),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "terminal fell behind"),
            },
            line = lines.next_line() => match line? {
                Some(line) => respond(player, line.trim(), &mut awaiting).await,
                None => return Ok(()),
            },
        }
    }
}

fn prompt(text: &str) {
    print!("{text} > ");
    // Best effort; a closed stdout ends the session on the next read anyway.
    let _ = io::stdout().flush();
}

fn numbered<'a>(items: impl Iterator<Item = &'a str>) {
    for (index, text) in items.enumerate() {
        println!("  {}. {text}", index + 1);
    }
}

/// Print an entry. Returns the id of a result element whose summary was not
/// cached yet; it is printed once `ResultLoaded` arrives.
fn show_entry(player: &CoursePlayer, entry: &TranscriptEntry) -> Option<ElementId> {
    let id = entry.element_id();
    if player.is_occurrence_in_active_revision_chain(id, entry.position) {
        println!("\n(review)");
    } else {
        println!();
    }

    match &entry.element {
        CourseElement::Message(message) => {
            println!("{}", message.text);
            if !message.options.is_empty() {
                numbered(message.options.iter().map(|o| o.text.as_str()));
                prompt("option");
            } else if let Some(button) = &message.button {
                prompt(&format!("[Enter] {button}"));
            }
        }
        CourseElement::Audio(audio) => {
            println!("(audio: {})", audio.media.join(", "));
            if let Some(text) = &audio.text {
                println!("{text}");
            }
        }
        CourseElement::Quiz(quiz) => {
            println!("{}", quiz.text);
            numbered(quiz.answers.iter().map(|a| a.text.as_str()));
            prompt("answer");
        }
        CourseElement::Question(question) => {
            println!("{}", question.text);
            numbered(question.answers.iter().map(|a| a.text.as_str()));
            prompt("answer");
        }
        CourseElement::MultiChoice(multi) => {
            println!("{}", multi.text);
            numbered(multi.answers.iter().map(|a| a.text.as_str()));
            prompt("answers, comma separated");
        }
        CourseElement::Input(input) => {
            println!("{}", input.text);
            prompt("answer");
        }
        CourseElement::Unimplemented(unsupported) => {
            let kind = unsupported.original_type.as_deref().unwrap_or("element");
            println!("[{kind} is not supported here] {}", unsupported.text);
            prompt("[Enter] continue");
        }
        CourseElement::Test(_) | CourseElement::Revision(_) => {
            if !show_result(player, &entry.element) {
                println!("(loading results)");
                request_result(player, &entry.element);
                return Some(id.clone());
            }
        }
        CourseElement::Dialog(dialog) => {
            println!("{}", dialog.text);
            prompt("you");
        }
        CourseElement::End(end) => {
            println!("{}", end.text.as_deref().unwrap_or("The end."));
            prompt("[Enter] finish");
        }
    }
    None
}

/// Print a cached test or revision summary. False when nothing is cached.
fn show_result(player: &CoursePlayer, element: &CourseElement) -> bool {
    let id = element.element_id();
    match element {
        CourseElement::Test(_) => {
            let Some(result) = player.cached_test_result(id) else {
                return false;
            };
            println!("{}", result.result_text);
            println!("{}", result.feedback_message);
            prompt("[Enter] continue");
        }
        CourseElement::Revision(_) => {
            let Some(result) = player.cached_revision_result(id) else {
                return false;
            };
            println!("{}", result.message);
            if result.is_replayable() {
                prompt("[Enter] start the review");
            } else {
                prompt("[Enter] continue");
            }
        }
        _ => return false,
    }
    true
}

/// Fetch a summary off the input loop. Success arrives as `ResultLoaded`,
/// failure as `TransitionFailed`.
fn request_result(player: &CoursePlayer, element: &CourseElement) {
    let player = player.clone();
    let id = element.element_id().clone();
    let is_test = matches!(element, CourseElement::Test(_));
    tokio::spawn(async move {
        let failed = if is_test {
            player.test_result(&id).await.err()
        } else {
            player.revision_result(&id).await.err()
        };
        if let Some(err) = failed {
            debug!(element = %id, error = %err, "result lookup failed");
        }
    });
}

fn show_outcome(outcome: &RecordedOutcome) {
    println!("-> {}", outcome.feedback());
    if let RecordedOutcome::MultiChoice(multi) = outcome {
        for item in &multi.individual_feedbacks {
            if let Some(feedback) = &item.feedback {
                println!("   {}: {feedback}", item.answer_text);
            }
        }
    }
}

/// 1-based choice typed by the user, as an index below `count`.
fn parse_choice(line: &str, count: usize) -> Option<usize> {
    line.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .filter(|index| *index < count)
}

fn parse_choices(line: &str, count: usize) -> Option<Vec<usize>> {
    let mut picked = Vec::new();
    for part in line.split([',', ' ']).filter(|p| !p.is_empty()) {
        let index = parse_choice(part, count)?;
        if !picked.contains(&index) {
            picked.push(index);
        }
    }
    (!picked.is_empty()).then_some(picked)
}

/// Failures other than `Busy` already reach the user through
/// `TransitionFailed`.
fn report<T, E: PlaybackFailure>(result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            if err.is_busy() {
                eprintln!("! still working, try again in a moment");
            }
            None
        }
    }
}

async fn respond(player: &CoursePlayer, line: &str, awaiting: &mut Option<ElementId>) {
    let Some(entry) = player.current() else {
        return;
    };
    let id = entry.element_id().clone();

    // Answered elements wait for their feedback timer; Enter skips it.
    if matches!(
        player.snapshot().answer_view(entry.position),
        Some(AnswerView::Answered(_))
    ) {
        report(player.advance().await);
        return;
    }

    let answer = match &entry.element {
        CourseElement::Message(message) if !message.options.is_empty() => {
            match parse_choice(line, message.options.len()) {
                Some(index) => {
                    report(player.select_option(index).await);
                }
                None => prompt("pick one of the numbered options"),
            }
            return;
        }
        CourseElement::Quiz(quiz) => {
            parse_choice(line, quiz.answers.len()).map(|answer_index| Answer::Quiz { answer_index })
        }
        CourseElement::Question(question) => parse_choice(line, question.answers.len())
            .map(|answer_index| Answer::Question { answer_index }),
        CourseElement::MultiChoice(multi) => parse_choices(line, multi.answers.len())
            .map(|answer_indices| Answer::MultiChoice { answer_indices }),
        CourseElement::Input(_) => (!line.is_empty()).then(|| Answer::Input {
            text: line.to_string(),
        }),
        CourseElement::Revision(_) => {
            let replayable = player
                .cached_revision_result(&id)
                .is_some_and(|result| result.is_replayable());
            if replayable {
                report(player.start_revision(&id).await);
            } else if player.cached_revision_result(&id).is_none() {
                if awaiting.is_none() {
                    request_result(player, &entry.element);
                    *awaiting = Some(id.clone());
                }
            } else {
                report(player.advance().await);
            }
            return;
        }
        CourseElement::Dialog(_) => {
            if line.is_empty() {
                prompt("you");
                return;
            }
            if let Some(reply) = report(player.send_dialog_message(&id, line).await) {
                if !reply.reply.is_empty() {
                    println!("{}", reply.reply);
                }
                if !reply.stop {
                    prompt("you");
                }
            }
            return;
        }
        CourseElement::Message(_)
        | CourseElement::Audio(_)
        | CourseElement::Unimplemented(_)
        | CourseElement::Test(_)
        | CourseElement::End(_) => {
            report(player.advance().await);
            return;
        }
    };

    match answer {
        Some(answer) => {
            if let Some(outcome) = report(player.submit_answer(&id, answer).await) {
                show_outcome(&outcome);
            }
        }
        None => prompt("that is not a valid answer"),
    }
}
