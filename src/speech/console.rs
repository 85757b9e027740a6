//! Speech engine that "speaks" by printing, finishing each utterance after
//! the time a reader would need for it.

use super::{SpeechEngine, SpeechError, SpeechEvent, SpeechSink, UtteranceId};
use crate::cancellation::CancellationToken;
use crate::config::{MAX_TTS_RATE, MIN_TTS_RATE};
use crate::text_utils::word_count;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Speaking pace at rate 1.0.
pub const BASE_WPM: f32 = 170.0;

pub struct ConsoleSpeechEngine {
    sink: SpeechSink,
    rate: f32,
    words_per_minute: f32,
    voice: Option<String>,
    echo: bool,
    current: Option<CancellationToken>,
}

impl ConsoleSpeechEngine {
    pub fn new(sink: SpeechSink) -> Self {
        Self {
            sink,
            rate: 1.0,
            words_per_minute: BASE_WPM,
            voice: None,
            echo: true,
            current: None,
        }
    }

    /// Do not print utterances; only time them.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn with_words_per_minute(mut self, words_per_minute: f32) -> Self {
        self.words_per_minute = words_per_minute.max(1.0);
        self
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }
}

pub(crate) fn estimate_duration(text: &str, rate: f32, words_per_minute: f32) -> Duration {
    let words = word_count(text) as f32;
    let per_minute = (words_per_minute * rate).max(1.0);
    Duration::from_secs_f32(words * 60.0 / per_minute)
}

impl SpeechEngine for ConsoleSpeechEngine {
    fn speak(&mut self, text: &str, utterance: UtteranceId) -> Result<(), SpeechError> {
        self.stop();
        let token = CancellationToken::new();
        self.current = Some(token.clone());

        let duration = estimate_duration(text, self.rate, self.words_per_minute);
        if self.echo {
            match &self.voice {
                Some(voice) => println!("[{voice}] {text}"),
                None => println!("{text}"),
            }
        }
        debug!(%utterance, millis = duration.as_millis(), "Speaking utterance");

        let sink = self.sink.clone();
        thread::Builder::new()
            .name(format!("speech-{utterance}"))
            .spawn(move || {
                if token.sleep(duration) {
                    sink(SpeechEvent::Done(utterance));
                } else {
                    trace!(%utterance, "Utterance cancelled");
                }
            })
            .map_err(|err| SpeechError::Synthesis(err.to_string()))?;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(MIN_TTS_RATE, MAX_TTS_RATE);
    }

    fn set_voice(&mut self, voice: &str) -> Result<(), SpeechError> {
        let voice = voice.trim();
        if voice.is_empty() {
            return Err(SpeechError::UnknownVoice(voice.to_string()));
        }
        self.voice = Some(voice.to_string());
        Ok(())
    }
}

impl Drop for ConsoleSpeechEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
