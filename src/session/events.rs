use crate::document::{LayoutKind, OutlineEntry};
use crate::highlight::HighlightPlan;
use crate::indexer::ScreenPages;
use crate::speech::{SpeechEvent, SpeechSink};
use crate::viewport::ViewportState;
use crate::worker::WorkerReply;
use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

/// Everything that reaches the event loop from another thread.
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    Speech(SpeechEvent),
    Worker(WorkerReply),
}

/// Notifications for the host UI, in the order they must be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    DocumentOpened {
        kind: LayoutKind,
        page_count: usize,
        outline: Vec<OutlineEntry>,
    },
    DocumentFailed {
        error: String,
    },
    /// Pagination changed after a settings update.
    Repaginated {
        page_count: usize,
        outline: Vec<OutlineEntry>,
    },
    ScreenChanged {
        pages: ScreenPages,
        screen_count: usize,
    },
    ScreenReady {
        pages: ScreenPages,
        unit_count: usize,
        page_texts: Vec<String>,
    },
    BlockSpoken {
        chunk_start: usize,
        highlight: HighlightPlan,
    },
    ReadingStopped,
    ReadingFinished,
    ToggleChrome,
    ViewportChanged(ViewportState),
    PageImage {
        page: usize,
        #[serde(skip)]
        image: RgbaImage,
    },
}

/// The session's inbound channel. Create it first so engines can be given
/// a [`SpeechSink`] before the session exists.
pub struct SessionEvents {
    pub(super) sender: Sender<ReaderEvent>,
    pub(super) receiver: Receiver<ReaderEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn speech_sink(&self) -> SpeechSink {
        let sender = self.sender.clone();
        Arc::new(move |event| {
            let _ = sender.send(ReaderEvent::Speech(event));
        })
    }

    pub(super) fn worker_sink(&self) -> impl Fn(WorkerReply) + Send + 'static {
        let sender = self.sender.clone();
        move |reply| {
            let _ = sender.send(ReaderEvent::Worker(reply));
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
