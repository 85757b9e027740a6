//! Fakes shared by unit tests.

use crate::document::{
    DocumentBackend, LayoutConfig, LayoutKind, PageContent, RawOutlineItem, StructuredLine,
};
use crate::geometry::{Rect, Size};
use crate::position::{KeyValueStore, MemoryStore, Scalar, StoreError};
use crate::speech::{SpeechEngine, SpeechError, SpeechEvent, SpeechSink, UtteranceId};
use anyhow::{Result, anyhow};
use image::{Rgba, RgbaImage};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FAKE_PAGE_SIZE: Size = Size::new(200.0, 300.0);

#[derive(Debug, Clone)]
pub struct FakePage {
    lines: Option<Vec<StructuredLine>>,
}

impl FakePage {
    /// Lines at the given tops, each box `(10, top)..(190, top + 12)`.
    pub fn lines(lines: &[(&str, f32)]) -> Self {
        Self {
            lines: Some(
                lines
                    .iter()
                    .map(|(text, top)| StructuredLine {
                        text: text.to_string(),
                        bbox: Rect::new(10.0, *top, 190.0, top + 12.0),
                    })
                    .collect(),
            ),
        }
    }

    /// A page whose structured text cannot be extracted.
    pub fn failing() -> Self {
        Self { lines: None }
    }
}

/// Fixed-layout backend with counters shared between clones.
#[derive(Debug, Clone)]
pub struct FakeFixedBackend {
    pages: Vec<FakePage>,
    outline: Vec<RawOutlineItem>,
    content_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

impl FakeFixedBackend {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            outline: Vec::new(),
            content_calls: Arc::new(AtomicUsize::new(0)),
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_outline(mut self, outline: Vec<RawOutlineItem>) -> Self {
        self.outline = outline;
        self
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl DocumentBackend for FakeFixedBackend {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Fixed
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Option<Size> {
        (index < self.pages.len()).then_some(FAKE_PAGE_SIZE)
    }

    fn layout(&mut self, _config: &LayoutConfig) -> Result<()> {
        Ok(())
    }

    fn page_content(&mut self, index: usize) -> Result<PageContent> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        let page = self
            .pages
            .get(index)
            .ok_or_else(|| anyhow!("no page {index}"))?;
        page.lines
            .clone()
            .map(PageContent::Lines)
            .ok_or_else(|| anyhow!("structured text unavailable"))
    }

    fn render_page(&mut self, _index: usize, _scale: f32) -> Result<RgbaImage> {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        Ok(image)
    }

    fn outline(&mut self) -> Result<Vec<RawOutlineItem>> {
        Ok(self.outline.clone())
    }

    fn resolve_outline_target(&self, target: &str) -> Option<usize> {
        target.parse().ok()
    }

    fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store whose every read and write fails.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<Scalar>, StoreError> {
        Err(StoreError::Io(io::Error::other("disk on fire")))
    }

    fn set(&mut self, _key: &str, _value: Scalar) -> Result<(), StoreError> {
        Err(StoreError::Io(io::Error::other("disk on fire")))
    }
}

/// In-memory store that accepts `writes_allowed` writes and fails every
/// write after that. Reads always succeed.
pub struct FlakyStore {
    inner: MemoryStore,
    writes_allowed: usize,
}

impl FlakyStore {
    pub fn failing_after(writes_allowed: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            writes_allowed,
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<Scalar>, StoreError> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: Scalar) -> Result<(), StoreError> {
        if self.writes_allowed == 0 {
            return Err(StoreError::Io(io::Error::other("disk full")));
        }
        self.writes_allowed -= 1;
        self.inner.set(key, value)
    }
}

#[derive(Debug, Default)]
pub struct EngineLog {
    pub spoken: Vec<(String, UtteranceId)>,
    pub stops: usize,
    pub rate: Option<f32>,
    pub voice: Option<String>,
    pub fail_next: bool,
    pub reject_voices: bool,
}

/// Engine that records calls and completes only when told to. Clones share
/// the log, so a test keeps one clone to inspect.
#[derive(Clone)]
pub struct RecordingEngine {
    sink: SpeechSink,
    log: Arc<Mutex<EngineLog>>,
}

impl RecordingEngine {
    pub fn new(sink: SpeechSink) -> Self {
        Self {
            sink,
            log: Arc::new(Mutex::new(EngineLog::default())),
        }
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, EngineLog> {
        self.log.lock().expect("engine log poisoned")
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.log().spoken.iter().map(|(text, _)| text.clone()).collect()
    }

    pub fn last_utterance(&self) -> Option<UtteranceId> {
        self.log().spoken.last().map(|(_, utterance)| *utterance)
    }

    /// Report the most recent utterance as finished.
    pub fn complete_last(&self) {
        let utterance = self.last_utterance().expect("nothing was spoken");
        (self.sink)(SpeechEvent::Done(utterance));
    }

    pub fn fail_next_speak(&self) {
        self.log().fail_next = true;
    }

    /// Accept later `set_voice` calls, then report them as failed loads.
    pub fn reject_voice_changes(&self) {
        self.log().reject_voices = true;
    }
}

impl SpeechEngine for RecordingEngine {
    fn speak(&mut self, text: &str, utterance: UtteranceId) -> Result<(), SpeechError> {
        let mut log = self.log();
        if std::mem::take(&mut log.fail_next) {
            return Err(SpeechError::Synthesis("no audio device".into()));
        }
        log.spoken.push((text.to_string(), utterance));
        Ok(())
    }

    fn stop(&mut self) {
        self.log().stops += 1;
    }

    fn set_rate(&mut self, rate: f32) {
        self.log().rate = Some(rate);
    }

    fn set_voice(&mut self, voice: &str) -> Result<(), SpeechError> {
        let rejected = self.log().reject_voices;
        if rejected {
            (self.sink)(SpeechEvent::VoiceRejected {
                voice: voice.to_string(),
                error: "model failed to load".into(),
            });
        } else {
            self.log().voice = Some(voice.to_string());
        }
        Ok(())
    }
}
