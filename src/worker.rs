//! Background owner of the open document.
//!
//! The native handle is not safe for concurrent use, so one thread opens it,
//! serves requests strictly in arrival order and closes it. Replies go out
//! through a sink, normally the session's event channel.

use crate::document::{Document, DocumentError, LayoutConfig, LayoutKind, OutlineEntry, Page};
use crate::indexer::{ScreenPages, ScreenUnits, build_screen_units};
use anyhow::{Context, Result};
use image::RgbaImage;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Layout { ticket: u64, config: LayoutConfig },
    Extract { ticket: u64, pages: ScreenPages },
    RenderPage { page: usize, scale: f32, night: bool },
    Close,
}

#[derive(Debug, Clone)]
pub enum WorkerReply {
    Opened {
        kind: LayoutKind,
        pages: Vec<Page>,
        outline: Vec<OutlineEntry>,
    },
    OpenFailed(String),
    LaidOut {
        ticket: u64,
        pages: Vec<Page>,
        outline: Vec<OutlineEntry>,
    },
    LayoutFailed {
        ticket: u64,
        error: String,
    },
    ScreenReady {
        ticket: u64,
        units: ScreenUnits,
        /// Text of each reflowable page on the screen, left first; empty for
        /// fixed layouts.
        page_texts: Vec<String>,
    },
    PageImage {
        page: usize,
        image: RgbaImage,
    },
    RenderFailed {
        page: usize,
        error: String,
    },
}

pub struct DocumentWorker {
    requests: Sender<WorkerRequest>,
    handle: Option<JoinHandle<()>>,
}

impl DocumentWorker {
    /// Open the document on a new thread and lay it out with `layout` before
    /// reporting `Opened`.
    pub fn spawn<F, S>(opener: F, layout: LayoutConfig, sink: S) -> Result<Self>
    where
        F: FnOnce() -> Result<Document, DocumentError> + Send + 'static,
        S: Fn(WorkerReply) + Send + 'static,
    {
        let (requests, inbox) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("document-worker".into())
            .spawn(move || run(opener, layout, inbox, sink))
            .context("Failed to spawn document worker")?;
        Ok(Self {
            requests,
            handle: Some(handle),
        })
    }

    pub fn layout(&self, ticket: u64, config: LayoutConfig) {
        self.send(WorkerRequest::Layout { ticket, config });
    }

    pub fn extract(&self, ticket: u64, pages: ScreenPages) {
        self.send(WorkerRequest::Extract { ticket, pages });
    }

    pub fn render_page(&self, page: usize, scale: f32, night: bool) {
        self.send(WorkerRequest::RenderPage { page, scale, night });
    }

    /// Close the document and wait for the thread. Idempotent.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.requests.send(WorkerRequest::Close);
        if handle.join().is_err() {
            warn!("Document worker panicked");
        }
    }

    fn send(&self, request: WorkerRequest) {
        if self.requests.send(request).is_err() {
            debug!("Document worker is gone; dropping request");
        }
    }
}

impl Drop for DocumentWorker {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<F, S>(opener: F, layout: LayoutConfig, inbox: Receiver<WorkerRequest>, sink: S)
where
    F: FnOnce() -> Result<Document, DocumentError>,
    S: Fn(WorkerReply),
{
    let mut document = match opener() {
        Ok(document) => document,
        Err(err) => {
            warn!("Failed to open document: {err}");
            sink(WorkerReply::OpenFailed(err.to_string()));
            return;
        }
    };
    if let Err(err) = document.layout(&layout) {
        warn!(document = document.id(), "Initial layout failed: {err}");
        sink(WorkerReply::OpenFailed(err.to_string()));
        return;
    }
    sink(WorkerReply::Opened {
        kind: document.kind(),
        pages: document.pages(),
        outline: document.outline(),
    });

    for request in inbox {
        match request {
            WorkerRequest::Layout { ticket, config } => match document.layout(&config) {
                Ok(()) => sink(WorkerReply::LaidOut {
                    ticket,
                    pages: document.pages(),
                    outline: document.outline(),
                }),
                Err(err) => {
                    warn!(ticket, "Layout failed: {err}");
                    sink(WorkerReply::LayoutFailed {
                        ticket,
                        error: err.to_string(),
                    });
                }
            },
            WorkerRequest::Extract { ticket, pages } => {
                let units = build_screen_units(&mut document, pages);
                let page_texts = match document.kind() {
                    LayoutKind::Fixed => Vec::new(),
                    LayoutKind::Reflowable => pages
                        .pages()
                        .map(|page| {
                            document.page_text(page).unwrap_or_else(|err| {
                                warn!(page, "Page text unavailable: {err}");
                                String::new()
                            })
                        })
                        .collect(),
                };
                let last = pages.right.unwrap_or(pages.left);
                document.release_outside(pages.left..last + 1);
                sink(WorkerReply::ScreenReady {
                    ticket,
                    units,
                    page_texts,
                });
            }
            WorkerRequest::RenderPage { page, scale, night } => {
                match document.load_page_image(page, scale, night) {
                    Ok(image) => sink(WorkerReply::PageImage { page, image }),
                    Err(err) => {
                        warn!(page, "Render failed: {err}");
                        sink(WorkerReply::RenderFailed {
                            page,
                            error: err.to_string(),
                        });
                    }
                }
            }
            WorkerRequest::Close => break,
        }
    }

    document.close();
    info!("Document worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSource;
    use crate::test_support::{FakeFixedBackend, FakePage};
    use std::time::Duration;

    fn spawn(backend: FakeFixedBackend) -> (DocumentWorker, Receiver<WorkerReply>) {
        let (tx, rx) = mpsc::channel();
        let worker = DocumentWorker::spawn(
            move || Ok(Document::with_backend("fake.pdf", Box::new(backend))),
            LayoutConfig::default(),
            move |reply| {
                let _ = tx.send(reply);
            },
        )
        .expect("spawn");
        (worker, rx)
    }

    fn next(rx: &Receiver<WorkerReply>) -> WorkerReply {
        rx.recv_timeout(Duration::from_secs(5)).expect("worker reply")
    }

    #[test]
    fn opens_then_serves_requests_in_order() {
        let backend = FakeFixedBackend::new(vec![
            FakePage::lines(&[("One", 10.0)]),
            FakePage::lines(&[("Two", 10.0), ("Three", 40.0)]),
        ]);
        let (worker, rx) = spawn(backend);
        match next(&rx) {
            WorkerReply::Opened { kind, pages, .. } => {
                assert_eq!(kind, LayoutKind::Fixed);
                assert_eq!(pages.len(), 2);
            }
            other => panic!("unexpected reply {other:?}"),
        }

        worker.extract(1, ScreenPages::single(0, 0));
        worker.extract(2, ScreenPages::single(1, 1));
        let tickets: Vec<_> = (0..2)
            .map(|_| match next(&rx) {
                WorkerReply::ScreenReady { ticket, units, page_texts } => {
                    assert!(page_texts.is_empty());
                    (ticket, units.len())
                }
                other => panic!("unexpected reply {other:?}"),
            })
            .collect();
        assert_eq!(tickets, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn reflowable_screens_carry_their_page_text() {
        let (tx, rx) = mpsc::channel();
        let worker = DocumentWorker::spawn(
            || {
                Document::open(DocumentSource::from_bytes(
                    "notes.txt",
                    b"Hello there. General Kenobi!".to_vec(),
                ))
            },
            LayoutConfig::default(),
            move |reply| {
                let _ = tx.send(reply);
            },
        )
        .expect("spawn");
        assert!(matches!(next(&rx), WorkerReply::Opened { .. }));

        worker.extract(1, ScreenPages::single(0, 0));
        match next(&rx) {
            WorkerReply::ScreenReady { units, page_texts, .. } => {
                assert_eq!(units.len(), 2);
                assert_eq!(page_texts, vec!["Hello there. General Kenobi!".to_string()]);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn open_failure_is_reported() {
        let (tx, rx) = mpsc::channel();
        let _worker = DocumentWorker::spawn(
            || Err(DocumentError::Unreadable("truncated".into())),
            LayoutConfig::default(),
            move |reply| {
                let _ = tx.send(reply);
            },
        )
        .expect("spawn");
        assert!(matches!(next(&rx), WorkerReply::OpenFailed(message) if message.contains("truncated")));
    }

    #[test]
    fn dropping_the_worker_closes_the_document() {
        let backend = FakeFixedBackend::new(vec![FakePage::lines(&[])]);
        let counters = backend.clone();
        let (worker, rx) = spawn(backend);
        assert!(matches!(next(&rx), WorkerReply::Opened { .. }));
        drop(worker);
        assert_eq!(counters.close_calls(), 1);
    }

    #[test]
    fn render_failure_names_the_page() {
        let (worker, rx) = spawn(FakeFixedBackend::new(vec![FakePage::lines(&[])]));
        next(&rx);
        worker.render_page(3, 1.0, false);
        assert!(matches!(next(&rx), WorkerReply::RenderFailed { page: 3, .. }));
    }
}
