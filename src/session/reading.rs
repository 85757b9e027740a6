use super::{HostEvent, ReaderSession};
use crate::highlight::HighlightCoordinator;
use crate::playback::PlaybackEffect;
use crate::speech::SpeechEvent;
use std::collections::VecDeque;
use tracing::{debug, warn};

impl ReaderSession {
    /// Start reading at the resume point of the current screen.
    pub fn start(&mut self) -> Vec<HostEvent> {
        if self.closed {
            return Vec::new();
        }
        if self.units.is_none() {
            debug!("Units pending; starting once they arrive");
            self.autoplay = true;
            return Vec::new();
        }
        let effects = self.playback.start();
        self.run_effects(effects)
    }

    pub fn stop(&mut self) -> Vec<HostEvent> {
        self.autoplay = false;
        let effects = self.playback.stop();
        self.run_effects(effects)
    }

    /// Read from the chunk containing `unit_index` of the current screen.
    pub fn start_from(&mut self, unit_index: usize) -> Vec<HostEvent> {
        if self.closed || self.units.is_none() {
            return Vec::new();
        }
        let effects = self.playback.start_from(unit_index);
        self.run_effects(effects)
    }

    pub fn move_by(&mut self, offset_in_chunks: isize) -> Vec<HostEvent> {
        if self.closed || self.units.is_none() {
            return Vec::new();
        }
        let effects = self.playback.move_by(offset_in_chunks);
        self.run_effects(effects)
    }

    /// Carry out playback effects in order. Effects produced while doing so
    /// (a failed `speak`) are queued behind the current ones.
    pub(super) fn run_effects(&mut self, effects: Vec<PlaybackEffect>) -> Vec<HostEvent> {
        let mut queue = VecDeque::from(effects);
        let mut out = Vec::new();
        while let Some(effect) = queue.pop_front() {
            match effect {
                PlaybackEffect::Speak { text, utterance } => {
                    if let Err(err) = self.engine.speak(&text, utterance) {
                        warn!(%utterance, "Speech engine rejected chunk: {err}");
                        queue.extend(self.playback.on_speech_event(SpeechEvent::Failed {
                            utterance: Some(utterance),
                            error: err.to_string(),
                        }));
                    }
                }
                PlaybackEffect::CancelSpeech => self.engine.stop(),
                PlaybackEffect::BlockSpoken(chunk_start) => {
                    if let Some(event) = self.block_spoken(chunk_start) {
                        out.push(event);
                    }
                }
                PlaybackEffect::ReadingStopped => out.push(HostEvent::ReadingStopped),
                PlaybackEffect::ReadingFinished => out.extend(self.advance_after_finish()),
                PlaybackEffect::PersistPosition(position) => {
                    self.positions.save(&position);
                    self.resume = Some(position);
                }
            }
        }
        out
    }

    fn block_spoken(&mut self, chunk_start: usize) -> Option<HostEvent> {
        let geometry = self.geometry();
        let units = self.units.as_ref()?;
        let highlight = HighlightCoordinator::plan(
            units,
            chunk_start,
            self.playback.chunk_size(),
            &geometry,
            &mut self.viewport,
        );
        Some(HostEvent::BlockSpoken {
            chunk_start,
            highlight,
        })
    }
}
