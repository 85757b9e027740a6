//! The host-facing reading session.
//!
//! `ReaderSession` lives on the host's event loop. Document work happens on a
//! [`DocumentWorker`] and speech on the engine's own thread; both report back
//! through one channel that [`ReaderSession::pump`] drains. Every operation
//! returns the [`HostEvent`]s the host should apply, in order.

mod events;
mod gestures;
mod navigation;
mod reading;

pub use events::{HostEvent, ReaderEvent, SessionEvents};

use crate::config::ReaderConfig;
use crate::document::{Document, DocumentError, DocumentSource, LayoutConfig, LayoutKind, OutlineEntry, Page};
use crate::geometry::Size;
use crate::highlight::ScreenGeometry;
use crate::indexer::{Composition, ScreenPages, ScreenUnits};
use crate::playback::PlaybackController;
use crate::position::{PositionStore, ReadingPosition};
use crate::speech::{SpeechEngine, SpeechEvent};
use crate::viewport::Viewport;
use crate::worker::{DocumentWorker, WorkerReply};
use anyhow::Result;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct ReaderSession {
    config: ReaderConfig,
    document_id: String,
    worker: DocumentWorker,
    inbox: Receiver<ReaderEvent>,
    engine: Box<dyn SpeechEngine>,
    positions: PositionStore,
    playback: PlaybackController,
    composition: Composition,
    viewport: Viewport,
    kind: Option<LayoutKind>,
    pages: Vec<Page>,
    outline: Vec<OutlineEntry>,
    screen: Option<ScreenPages>,
    /// Units of the active screen; `None` while extraction is pending.
    units: Option<ScreenUnits>,
    next_ticket: u64,
    extract_ticket: u64,
    layout_ticket: Option<u64>,
    /// Most recent saved position, used to resume within a screen.
    resume: Option<ReadingPosition>,
    /// Start reading as soon as the pending screen's units arrive.
    autoplay: bool,
    closed: bool,
}

impl ReaderSession {
    /// Open `source` on a worker thread. Results arrive through [`pump`](Self::pump).
    pub fn open(
        config: ReaderConfig,
        source: DocumentSource,
        engine: impl SpeechEngine + 'static,
        positions: PositionStore,
        events: SessionEvents,
    ) -> Result<Self> {
        let document_id = source.name.clone();
        Self::open_with(
            config,
            document_id,
            move || Document::open(source),
            engine,
            positions,
            events,
        )
    }

    /// Open with a caller-supplied document constructor, e.g. a host backend.
    pub fn open_with<F>(
        config: ReaderConfig,
        document_id: impl Into<String>,
        opener: F,
        engine: impl SpeechEngine + 'static,
        positions: PositionStore,
        events: SessionEvents,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<Document, DocumentError> + Send + 'static,
    {
        let config = config.sanitized();
        let document_id = document_id.into();
        let worker = DocumentWorker::spawn(opener, LayoutConfig::from(&config), events.worker_sink())?;

        let mut engine: Box<dyn SpeechEngine> = Box::new(engine);
        engine.set_rate(config.tts_rate);
        if let Some(voice) = &config.tts_voice {
            if let Err(err) = engine.set_voice(voice) {
                warn!(voice, "Keeping default voice: {err}");
            }
        }

        let resume = positions.load(&document_id);
        let view = Size::new(config.viewport_width, config.viewport_height);
        info!(document = %document_id, resume_page = ?resume.as_ref().map(|p| p.absolute_page), "Opening reading session");

        Ok(Self {
            playback: PlaybackController::new(document_id.clone(), config.chunk_size),
            composition: Composition::from(config.orientation),
            viewport: Viewport::new(view, view),
            config,
            document_id,
            worker,
            inbox: events.receiver,
            engine,
            positions,
            kind: None,
            pages: Vec::new(),
            outline: Vec::new(),
            screen: None,
            units: None,
            next_ticket: 0,
            extract_ticket: 0,
            layout_ticket: None,
            resume,
            autoplay: false,
            closed: false,
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn kind(&self) -> Option<LayoutKind> {
        self.kind
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn screen_count(&self) -> usize {
        self.composition.screen_count(self.pages.len())
    }

    pub fn outline(&self) -> &[OutlineEntry] {
        &self.outline
    }

    pub fn current_screen(&self) -> Option<ScreenPages> {
        self.screen
    }

    pub fn units(&self) -> Option<&ScreenUnits> {
        self.units.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_speaking(&self) -> bool {
        self.playback.is_speaking()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// What the position store currently holds for this document.
    pub fn saved_position(&self) -> Option<ReadingPosition> {
        self.positions.load(&self.document_id)
    }

    /// Apply every event that has already arrived.
    pub fn pump(&mut self) -> Vec<HostEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.inbox.try_recv() {
            out.extend(self.handle(event));
        }
        out
    }

    /// Block up to `timeout` for the next event, then drain the rest.
    pub fn wait(&mut self, timeout: Duration) -> Vec<HostEvent> {
        self.next_batch(timeout).unwrap_or_default()
    }

    /// `None` once every sender is gone and nothing more can arrive.
    fn next_batch(&mut self, timeout: Duration) -> Option<Vec<HostEvent>> {
        match self.inbox.recv_timeout(timeout) {
            Ok(event) => {
                let mut out = self.handle(event);
                out.extend(self.pump());
                Some(out)
            }
            Err(RecvTimeoutError::Timeout) => Some(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Pump until an event matching `done` is produced or `timeout` passes.
    /// Returns everything produced along the way.
    pub fn wait_for(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&HostEvent) -> bool,
    ) -> Vec<HostEvent> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return out;
            }
            let Some(batch) = self.next_batch(remaining) else {
                debug!("Event channel disconnected");
                return out;
            };
            let finished = batch.iter().any(&mut done);
            out.extend(batch);
            if finished {
                return out;
            }
        }
    }

    /// Stop speech, close the document and join the worker. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.autoplay = false;
        if self.playback.is_speaking() {
            self.playback.load_screen(Vec::new(), 0, 0);
        }
        self.engine.stop();
        self.units = None;
        self.worker.close();
        info!(document = %self.document_id, "Closed reading session");
    }

    fn handle(&mut self, event: ReaderEvent) -> Vec<HostEvent> {
        if self.closed {
            return Vec::new();
        }
        match event {
            ReaderEvent::Speech(SpeechEvent::VoiceRejected { voice, error }) => {
                warn!(voice, "Keeping previous voice: {error}");
                Vec::new()
            }
            ReaderEvent::Speech(event) => {
                let effects = self.playback.on_speech_event(event);
                self.run_effects(effects)
            }
            ReaderEvent::Worker(reply) => self.on_worker_reply(reply),
        }
    }

    fn on_worker_reply(&mut self, reply: WorkerReply) -> Vec<HostEvent> {
        match reply {
            WorkerReply::Opened {
                kind,
                pages,
                outline,
            } => self.on_opened(kind, pages, outline),
            WorkerReply::OpenFailed(error) => {
                warn!(document = %self.document_id, "Document failed to open: {error}");
                self.closed = true;
                vec![HostEvent::DocumentFailed { error }]
            }
            WorkerReply::LaidOut {
                ticket,
                pages,
                outline,
            } => self.on_laid_out(ticket, pages, outline),
            WorkerReply::LayoutFailed { ticket, error } => {
                if self.layout_ticket == Some(ticket) {
                    self.layout_ticket = None;
                    warn!(ticket, "Re-layout failed; keeping previous pages: {error}");
                    let page = self.current_page();
                    return self.show_page(page);
                }
                Vec::new()
            }
            WorkerReply::ScreenReady {
                ticket,
                units,
                page_texts,
            } => self.on_screen_ready(ticket, units, page_texts),
            WorkerReply::PageImage { page, image } => vec![HostEvent::PageImage { page, image }],
            WorkerReply::RenderFailed { page, error } => {
                debug!(page, "Page image unavailable: {error}");
                Vec::new()
            }
        }
    }

    fn on_opened(
        &mut self,
        kind: LayoutKind,
        pages: Vec<Page>,
        outline: Vec<OutlineEntry>,
    ) -> Vec<HostEvent> {
        info!(document = %self.document_id, ?kind, pages = pages.len(), "Document opened");
        self.kind = Some(kind);
        self.pages = pages;
        self.outline = outline;
        let mut out = vec![HostEvent::DocumentOpened {
            kind,
            page_count: self.pages.len(),
            outline: self.outline.clone(),
        }];
        let page = self.resume.as_ref().map_or(0, |position| position.absolute_page);
        out.extend(self.show_page(page));
        out
    }

    fn on_laid_out(
        &mut self,
        ticket: u64,
        pages: Vec<Page>,
        outline: Vec<OutlineEntry>,
    ) -> Vec<HostEvent> {
        if self.layout_ticket != Some(ticket) {
            debug!(ticket, "Ignoring stale layout");
            return Vec::new();
        }
        self.layout_ticket = None;
        let page = self.current_page();
        self.pages = pages;
        self.outline = outline;
        let mut out = vec![HostEvent::Repaginated {
            page_count: self.pages.len(),
            outline: self.outline.clone(),
        }];
        out.extend(self.show_page(page));
        out
    }

    fn on_screen_ready(
        &mut self,
        ticket: u64,
        units: ScreenUnits,
        page_texts: Vec<String>,
    ) -> Vec<HostEvent> {
        if ticket != self.extract_ticket || self.layout_ticket.is_some() {
            debug!(ticket, current = self.extract_ticket, "Dropping stale screen units");
            return Vec::new();
        }
        let pages = units.pages();
        let resume_index = self
            .resume
            .as_ref()
            .map_or(0, |position| resume_unit(position, &units));

        let effects = self
            .playback
            .load_screen(units.texts(), pages.left, resume_index);
        let mut out = self.run_effects(effects);
        out.push(HostEvent::ScreenReady {
            pages,
            unit_count: units.len(),
            page_texts,
        });
        self.units = Some(units);

        if std::mem::take(&mut self.autoplay) {
            if self.playback.unit_count() == 0 {
                debug!(screen = pages.screen, "Screen has no text; advancing");
                out.extend(self.advance_after_finish());
            } else {
                let effects = self.playback.start();
                out.extend(self.run_effects(effects));
            }
        }
        out
    }

    fn geometry(&self) -> ScreenGeometry {
        let size_of = |page: Option<usize>| {
            page.and_then(|index| self.pages.get(index))
                .and_then(|page| page.size)
        };
        let (left, right) = match self.screen {
            Some(pages) => (size_of(Some(pages.left)), size_of(pages.right)),
            None => (None, None),
        };
        ScreenGeometry::new(
            self.composition,
            Size::new(self.config.viewport_width, self.config.viewport_height),
            self.config.page_separator_width,
            left,
            right,
        )
    }

    /// Absolute page the reader is on, in single-page terms.
    fn current_page(&self) -> usize {
        self.screen.map_or_else(
            || self.resume.as_ref().map_or(0, |position| position.absolute_page),
            |pages| pages.left,
        )
    }

    fn next_ticket(&mut self) -> u64 {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.next_ticket
    }
}

/// Where to resume inside freshly built units. The saved index counts from
/// the saved page, which led the screen it was saved on. An index within
/// that page's own units means the same text in either composition; one
/// beyond them can only come from a two-page screen and is kept only on
/// another two-page screen. Anything else starts at 0.
fn resume_unit(position: &ReadingPosition, units: &ScreenUnits) -> usize {
    let pages = units.pages();
    if position.absolute_page != pages.left {
        return 0;
    }
    let left_units = units
        .units()
        .iter()
        .take_while(|unit| unit.owner_page == pages.left)
        .count();
    let fits = position.screen_unit < left_units
        || (pages.right.is_some() && position.screen_unit < units.len());
    if fits {
        position.screen_unit
    } else {
        debug!(
            page = position.absolute_page,
            unit = position.screen_unit,
            left_units,
            "Saved unit does not fit this screen; starting at the top"
        );
        0
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.close();
    }
}
