//! Chunked read-aloud state machine.
//!
//! The controller owns no threads and performs no I/O: every operation
//! returns the [`PlaybackEffect`]s the host must carry out, in order. Speech
//! completions come back in through [`PlaybackController::on_speech_event`];
//! a completion for anything but the chunk currently being spoken is dropped.

mod transitions;

use crate::position::ReadingPosition;
use crate::speech::{SpeechEvent, UtteranceId};
use tracing::debug;
use transitions::{PlaybackEvent, transition};

pub const DEFAULT_CHUNK_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking { chunk_start: usize, request_id: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEffect {
    Speak { text: String, utterance: UtteranceId },
    CancelSpeech,
    BlockSpoken(usize),
    ReadingStopped,
    ReadingFinished,
    PersistPosition(ReadingPosition),
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    document_id: String,
    chunk_size: usize,
    texts: Vec<String>,
    absolute_page: usize,
    /// Chunk start of the current (or last) block.
    cursor: usize,
    state: PlaybackState,
    request_id: u64,
}

impl PlaybackController {
    pub fn new(document_id: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_size: chunk_size.max(1),
            texts: Vec::new(),
            absolute_page: 0,
            cursor: 0,
            state: PlaybackState::Idle,
            request_id: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.state, PlaybackState::Speaking { .. })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn unit_count(&self) -> usize {
        self.texts.len()
    }

    pub fn current_chunk(&self) -> usize {
        self.cursor
    }

    pub fn absolute_page(&self) -> usize {
        self.absolute_page
    }

    pub fn position(&self) -> ReadingPosition {
        ReadingPosition {
            document_id: self.document_id.clone(),
            absolute_page: self.absolute_page,
            screen_unit: self.cursor,
        }
    }

    /// Replace the screen's units. Speech in flight is cancelled without a
    /// stopped notification; the cursor moves to the chunk containing
    /// `resume_index`.
    pub fn load_screen(
        &mut self,
        texts: Vec<String>,
        absolute_page: usize,
        resume_index: usize,
    ) -> Vec<PlaybackEffect> {
        let mut effects = Vec::new();
        if self.is_speaking() {
            self.request_id = self.request_id.wrapping_add(1);
            effects.push(PlaybackEffect::CancelSpeech);
        }
        self.state = PlaybackState::Idle;
        self.texts = texts;
        self.absolute_page = absolute_page;
        self.cursor = self.snap(resume_index);
        debug!(
            units = self.texts.len(),
            absolute_page,
            cursor = self.cursor,
            "Loaded screen into playback"
        );
        effects
    }

    pub fn start(&mut self) -> Vec<PlaybackEffect> {
        transition(self, PlaybackEvent::Start)
    }

    pub fn start_from(&mut self, unit_index: usize) -> Vec<PlaybackEffect> {
        transition(self, PlaybackEvent::StartFrom(unit_index))
    }

    pub fn stop(&mut self) -> Vec<PlaybackEffect> {
        transition(self, PlaybackEvent::Stop)
    }

    pub fn move_by(&mut self, offset_in_chunks: isize) -> Vec<PlaybackEffect> {
        transition(self, PlaybackEvent::Move(offset_in_chunks))
    }

    pub fn on_speech_event(&mut self, event: SpeechEvent) -> Vec<PlaybackEffect> {
        match event {
            SpeechEvent::Done(utterance) => transition(self, PlaybackEvent::SpeechDone(utterance)),
            SpeechEvent::Failed { utterance, error } => {
                transition(self, PlaybackEvent::SpeechFailed { utterance, error })
            }
            SpeechEvent::VoiceRejected { .. } => Vec::new(),
        }
    }

    /// Change the chunk size; the current block restarts on the new grid.
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> Vec<PlaybackEffect> {
        let chunk_size = chunk_size.max(1);
        if chunk_size == self.chunk_size {
            return Vec::new();
        }
        self.chunk_size = chunk_size;
        transition(self, PlaybackEvent::Regrid)
    }

    /// Chunk start containing `index`, clamped to the last unit.
    fn snap(&self, index: usize) -> usize {
        if self.texts.is_empty() {
            return 0;
        }
        let index = index.min(self.texts.len() - 1);
        index - index % self.chunk_size
    }

    fn chunk_text(&self, start: usize) -> String {
        let end = start.saturating_add(self.chunk_size).min(self.texts.len());
        self.texts[start.min(end)..end]
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
