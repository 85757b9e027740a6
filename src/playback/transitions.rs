use super::{PlaybackController, PlaybackEffect, PlaybackState};
use crate::speech::UtteranceId;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(super) enum PlaybackEvent {
    Start,
    StartFrom(usize),
    Stop,
    Move(isize),
    /// Chunk size changed; re-snap the cursor.
    Regrid,
    SpeechDone(UtteranceId),
    SpeechFailed {
        utterance: Option<UtteranceId>,
        error: String,
    },
}

pub(super) fn transition(
    controller: &mut PlaybackController,
    event: PlaybackEvent,
) -> Vec<PlaybackEffect> {
    let mut effects = Vec::new();
    match event {
        PlaybackEvent::Start => on_start(controller, &mut effects),
        PlaybackEvent::StartFrom(unit_index) => on_start_from(controller, unit_index, &mut effects),
        PlaybackEvent::Stop => on_stop(controller, &mut effects),
        PlaybackEvent::Move(offset) => on_move(controller, offset, &mut effects),
        PlaybackEvent::Regrid => on_regrid(controller, &mut effects),
        PlaybackEvent::SpeechDone(utterance) => on_speech_done(controller, utterance, &mut effects),
        PlaybackEvent::SpeechFailed { utterance, error } => {
            on_speech_failed(controller, utterance, &error, &mut effects)
        }
    }
    effects
}

fn on_start(controller: &mut PlaybackController, effects: &mut Vec<PlaybackEffect>) {
    if controller.is_speaking() {
        debug!("Ignoring start while already speaking");
        return;
    }
    if controller.texts.is_empty() {
        debug!("Nothing to read on this screen");
        return;
    }
    info!(chunk_start = controller.cursor, "Starting read-aloud");
    speak_from(controller, controller.cursor, effects);
}

fn on_start_from(
    controller: &mut PlaybackController,
    unit_index: usize,
    effects: &mut Vec<PlaybackEffect>,
) {
    if controller.texts.is_empty() {
        return;
    }
    cancel_in_flight(controller, effects);
    let chunk_start = controller.snap(unit_index);
    info!(unit_index, chunk_start, "Starting read-aloud from unit");
    speak_from(controller, chunk_start, effects);
}

fn on_stop(controller: &mut PlaybackController, effects: &mut Vec<PlaybackEffect>) {
    if !controller.is_speaking() {
        return;
    }
    cancel_in_flight(controller, effects);
    info!(chunk_start = controller.cursor, "Stopped read-aloud");
    effects.push(PlaybackEffect::ReadingStopped);
}

fn on_move(controller: &mut PlaybackController, offset: isize, effects: &mut Vec<PlaybackEffect>) {
    let count = controller.texts.len();
    if count == 0 {
        return;
    }
    let step = offset.saturating_mul(controller.chunk_size as isize);
    let last = (count - 1) as isize;
    let target = (controller.cursor as isize)
        .saturating_add(step)
        .clamp(0, last) as usize;
    let target = controller.snap(target);
    debug!(offset, from = controller.cursor, to = target, "Moving read-aloud cursor");

    if controller.is_speaking() {
        cancel_in_flight(controller, effects);
        speak_from(controller, target, effects);
    } else {
        controller.cursor = target;
        effects.push(PlaybackEffect::BlockSpoken(target));
        effects.push(PlaybackEffect::PersistPosition(controller.position()));
    }
}

fn on_regrid(controller: &mut PlaybackController, effects: &mut Vec<PlaybackEffect>) {
    let target = controller.snap(controller.cursor);
    debug!(chunk_size = controller.chunk_size, cursor = target, "Regridded chunks");
    if controller.is_speaking() {
        cancel_in_flight(controller, effects);
        speak_from(controller, target, effects);
    } else {
        controller.cursor = target;
    }
}

fn on_speech_done(
    controller: &mut PlaybackController,
    utterance: UtteranceId,
    effects: &mut Vec<PlaybackEffect>,
) {
    match controller.state {
        PlaybackState::Speaking {
            chunk_start,
            request_id,
        } if is_current(utterance, chunk_start, request_id) => {
            let next = chunk_start.saturating_add(controller.chunk_size);
            debug!(chunk_start, next, "Chunk finished");
            speak_from(controller, next, effects);
        }
        _ => debug!(%utterance, "Ignoring stale speech completion"),
    }
}

fn on_speech_failed(
    controller: &mut PlaybackController,
    utterance: Option<UtteranceId>,
    error: &str,
    effects: &mut Vec<PlaybackEffect>,
) {
    let PlaybackState::Speaking {
        chunk_start,
        request_id,
    } = controller.state
    else {
        debug!(error, "Ignoring speech failure while idle");
        return;
    };
    if let Some(utterance) = utterance {
        if !is_current(utterance, chunk_start, request_id) {
            debug!(%utterance, error, "Ignoring stale speech failure");
            return;
        }
    }
    warn!(chunk_start, error, "Speech engine failed; stopping read-aloud");
    controller.state = PlaybackState::Idle;
    controller.request_id = controller.request_id.wrapping_add(1);
    effects.push(PlaybackEffect::ReadingStopped);
}

fn is_current(utterance: UtteranceId, chunk_start: usize, request_id: u64) -> bool {
    utterance.request == request_id && utterance.chunk_start == chunk_start
}

fn cancel_in_flight(controller: &mut PlaybackController, effects: &mut Vec<PlaybackEffect>) {
    if controller.is_speaking() {
        controller.state = PlaybackState::Idle;
        controller.request_id = controller.request_id.wrapping_add(1);
        effects.push(PlaybackEffect::CancelSpeech);
    }
}

/// Speak the first non-blank chunk at or after `start`, or finish the screen.
/// Bounded by the unit count.
fn speak_from(controller: &mut PlaybackController, start: usize, effects: &mut Vec<PlaybackEffect>) {
    controller.request_id = controller.request_id.wrapping_add(1);
    let request_id = controller.request_id;

    let mut chunk_start = start;
    while chunk_start < controller.texts.len() {
        let text = controller.chunk_text(chunk_start);
        if !text.is_empty() {
            controller.cursor = chunk_start;
            controller.state = PlaybackState::Speaking {
                chunk_start,
                request_id,
            };
            effects.push(PlaybackEffect::BlockSpoken(chunk_start));
            effects.push(PlaybackEffect::PersistPosition(controller.position()));
            effects.push(PlaybackEffect::Speak {
                text,
                utterance: UtteranceId {
                    request: request_id,
                    chunk_start,
                },
            });
            debug!(chunk_start, request_id, "Speaking chunk");
            return;
        }
        debug!(chunk_start, "Skipping blank chunk");
        chunk_start = chunk_start.saturating_add(controller.chunk_size);
    }

    controller.state = PlaybackState::Idle;
    info!(units = controller.texts.len(), "Finished reading screen");
    effects.push(PlaybackEffect::ReadingFinished);
}
