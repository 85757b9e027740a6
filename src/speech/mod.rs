//! Speech engine seam.
//!
//! Engines run their own worker and report completion through a
//! [`SpeechSink`], from whatever thread they like. The sink normally wraps
//! the session's channel sender so results are applied on the event loop.

mod console;
#[cfg(feature = "piper")]
mod piper;

pub use console::ConsoleSpeechEngine;
#[cfg(feature = "piper")]
pub use piper::PiperSpeechEngine;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Identifies one chunk utterance: the playback request it belongs to and
/// the chunk's first unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtteranceId {
    pub request: u64,
    pub chunk_start: usize,
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk-{}-{}", self.request, self.chunk_start)
    }
}

impl FromStr for UtteranceId {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SpeechError::InvalidUtterance(s.to_string());
        let rest = s.strip_prefix("chunk-").ok_or_else(invalid)?;
        let (request, chunk_start) = rest.split_once('-').ok_or_else(invalid)?;
        Ok(UtteranceId {
            request: request.parse().map_err(|_| invalid())?,
            chunk_start: chunk_start.parse().map_err(|_| invalid())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Done(UtteranceId),
    Failed {
        utterance: Option<UtteranceId>,
        error: String,
    },
    /// A voice change requested through `set_voice` could not be applied.
    /// The engine keeps speaking with its previous voice.
    VoiceRejected { voice: String, error: String },
}

pub type SpeechSink = Arc<dyn Fn(SpeechEvent) + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpeechError {
    #[error("Speech engine failed to initialize: {0}")]
    Init(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("Malformed utterance id: {0}")]
    InvalidUtterance(String),
}

pub trait SpeechEngine {
    /// Queue `text`; completion is reported through the sink with `utterance`.
    /// Replaces any utterance still in flight.
    fn speak(&mut self, text: &str, utterance: UtteranceId) -> Result<(), SpeechError>;

    /// Cancel the current utterance. No completion is reported for it.
    fn stop(&mut self);

    fn set_rate(&mut self, rate: f32);

    /// Must not block on loading the voice; failures found later are
    /// reported as [`SpeechEvent::VoiceRejected`].
    fn set_voice(&mut self, voice: &str) -> Result<(), SpeechError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_ids_render_and_parse() {
        let id = UtteranceId {
            request: 7,
            chunk_start: 15,
        };
        assert_eq!(id.to_string(), "chunk-7-15");
        assert_eq!("chunk-7-15".parse::<UtteranceId>(), Ok(id));
    }

    #[test]
    fn malformed_utterance_ids_are_rejected() {
        for raw in ["sentence_3", "chunk-7", "chunk-x-1", "chunk-1-"] {
            assert!(matches!(
                raw.parse::<UtteranceId>(),
                Err(SpeechError::InvalidUtterance(_))
            ));
        }
    }
}
