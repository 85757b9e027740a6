use super::{HostEvent, ReaderSession};
use crate::config::{Orientation, ReaderConfig};
use crate::document::LayoutConfig;
use crate::geometry::Size;
use crate::indexer::Composition;
use crate::position::ReadingPosition;
use tracing::{debug, info, warn};

impl ReaderSession {
    pub fn go_to_screen(&mut self, screen: usize) -> Vec<HostEvent> {
        if self.closed || screen >= self.screen_count() {
            return Vec::new();
        }
        self.autoplay = false;
        let mut out = self.stop();
        out.extend(self.show_screen(screen));
        out
    }

    pub fn next_screen(&mut self) -> Vec<HostEvent> {
        match self.screen {
            Some(pages) => self.go_to_screen(pages.screen + 1),
            None => Vec::new(),
        }
    }

    pub fn previous_screen(&mut self) -> Vec<HostEvent> {
        match self.screen {
            Some(pages) if pages.screen > 0 => self.go_to_screen(pages.screen - 1),
            _ => Vec::new(),
        }
    }

    /// Jump to an absolute page, e.g. an outline target. Reading resumes at
    /// the top of the page's screen.
    pub fn go_to_page(&mut self, page: usize) -> Vec<HostEvent> {
        if self.closed || page >= self.pages.len() {
            return Vec::new();
        }
        self.remember(page, 0);
        self.go_to_screen(self.composition.screen_for_page(page))
    }

    /// Switch between one and two pages per screen, keeping the page.
    pub fn set_orientation(&mut self, orientation: Orientation) -> Vec<HostEvent> {
        if self.closed || orientation == self.config.orientation {
            return Vec::new();
        }
        let page = self.current_page();
        self.autoplay = false;
        let mut out = self.stop();
        self.config.orientation = orientation;
        self.composition = Composition::from(orientation);
        self.remember(page, 0);
        info!(?orientation, page, "Recomposed screens");
        out.extend(self.show_page(page));
        out
    }

    /// Single entry point for settings updates.
    pub fn apply_settings(&mut self, config: ReaderConfig) -> Vec<HostEvent> {
        if self.closed {
            return Vec::new();
        }
        let config = config.sanitized();
        let change = self.config.diff(&config);
        if change.is_empty() {
            self.config = config;
            return Vec::new();
        }
        debug!(?change, "Applying settings");

        let mut out = Vec::new();
        if change.speech {
            self.engine.set_rate(config.tts_rate);
            if let Some(voice) = &config.tts_voice {
                if let Err(err) = self.engine.set_voice(voice) {
                    warn!(voice, "Keeping previous voice: {err}");
                }
            }
        }
        if change.chunking {
            let effects = self.playback.set_chunk_size(config.chunk_size);
            out.extend(self.run_effects(effects));
        }

        let orientation = config.orientation;
        let page = self.current_page();
        if change.relayout {
            self.autoplay = false;
            out.extend(self.stop());
            self.config = config;
            self.composition = Composition::from(orientation);
            if change.recompose {
                self.remember(page, 0);
            }
            let view = Size::new(self.config.viewport_width, self.config.viewport_height);
            self.viewport.set_view_size(view);
            self.viewport.set_content_size(view);
            self.request_layout();
        } else if change.recompose {
            self.config = ReaderConfig {
                orientation: self.config.orientation,
                ..config
            };
            out.extend(self.set_orientation(orientation));
        } else {
            self.config = config;
        }
        out
    }

    /// Persist the first page of the current screen as the bookmark.
    pub fn save_bookmark(&mut self) {
        if let Some(pages) = self.screen {
            self.positions.save_bookmark(&self.document_id, pages.left);
            info!(page = pages.left, "Saved bookmark");
        }
    }

    pub fn load_bookmark(&mut self) -> Vec<HostEvent> {
        match self.positions.load_bookmark(&self.document_id) {
            Some(page) => self.go_to_page(page),
            None => Vec::new(),
        }
    }

    /// Ask the worker for a page raster; it arrives as [`HostEvent::PageImage`].
    pub fn request_page_image(&mut self, page: usize, scale: f32) {
        if !self.closed {
            self.worker.render_page(page, scale, self.config.night_mode());
        }
    }

    /// Show the screen containing `page`, clamped to the document.
    pub(super) fn show_page(&mut self, page: usize) -> Vec<HostEvent> {
        if self.pages.is_empty() {
            return Vec::new();
        }
        let page = page.min(self.pages.len() - 1);
        self.show_screen(self.composition.screen_for_page(page))
    }

    /// Make `screen` active and request its units. Playback must already be
    /// idle; any in-flight extraction becomes stale.
    pub(super) fn show_screen(&mut self, screen: usize) -> Vec<HostEvent> {
        let Some(pages) = self.composition.screen_pages(screen, self.pages.len()) else {
            return Vec::new();
        };
        self.screen = Some(pages);
        self.units = None;
        self.viewport.reset();
        let effects = self.playback.load_screen(Vec::new(), pages.left, 0);
        self.run_effects(effects);

        self.extract_ticket = self.next_ticket();
        self.worker.extract(self.extract_ticket, pages);
        debug!(screen, left = pages.left, right = ?pages.right, ticket = self.extract_ticket, "Requested screen units");
        vec![HostEvent::ScreenChanged {
            pages,
            screen_count: self.screen_count(),
        }]
    }

    /// Called when a screen finishes. Moves on with autoplay, or reports
    /// the end of reading.
    pub(super) fn advance_after_finish(&mut self) -> Vec<HostEvent> {
        let next = self.screen.map(|pages| pages.screen + 1);
        match next {
            Some(screen) if self.config.auto_advance && screen < self.screen_count() => {
                info!(screen, "Advancing to next screen");
                self.autoplay = true;
                self.show_screen(screen)
            }
            _ => {
                self.autoplay = false;
                vec![HostEvent::ReadingFinished]
            }
        }
    }

    /// Units stay unavailable until the new pages arrive.
    fn request_layout(&mut self) {
        let ticket = self.next_ticket();
        self.layout_ticket = Some(ticket);
        self.units = None;
        self.worker.layout(ticket, LayoutConfig::from(&self.config));
        info!(ticket, font_size = self.config.font_size, "Requested re-layout");
    }

    /// Record `(page, unit)` as the reading position, in memory and in the store.
    fn remember(&mut self, page: usize, unit: usize) {
        let position = ReadingPosition {
            document_id: self.document_id.clone(),
            absolute_page: page,
            screen_unit: unit,
        };
        self.positions.save(&position);
        self.resume = Some(position);
    }
}
