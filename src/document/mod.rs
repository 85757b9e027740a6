//! Document content model.
//!
//! A [`Document`] exclusively owns one backend session and exposes its pages
//! as ordered [`TextUnit`]s, optional page rasters and a resolved outline.
//! Derived per-page resources live in a [`PageArena`] and are released on
//! re-layout, on `close` and on drop.

mod arena;
mod backend;
mod epub;
mod model;
mod reflow;
mod text;

pub use arena::PageArena;
pub use backend::{DocumentBackend, PageContent, RawOutlineItem, StructuredLine};
pub use model::{LayoutConfig, LayoutKind, OutlineEntry, Page, TextUnit, UnitBounds};
pub use reflow::ReflowBackend;
pub use text::clean_text;

use crate::text_utils::sentence_spans;
use image::RgbaImage;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document is unreadable: {0}")]
    Unreadable(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Page {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Page images are only available for fixed-layout documents")]
    NotFixedLayout,

    #[error("Document is closed")]
    Closed,

    #[error("Extraction failed for page {page}: {message}")]
    Extraction { page: usize, message: String },
}

/// Opaque byte stream plus the name it is known by.
pub struct DocumentSource {
    pub name: String,
    pub reader: Box<dyn Read + Send>,
}

impl DocumentSource {
    pub fn new(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, Cursor::new(bytes))
    }

    /// Open a file; the document id is its file name.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, File::open(path)?))
    }
}

impl std::fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Epub,
    PlainText,
    Pdf,
}

fn detect_format(name: &str, bytes: &[u8]) -> Option<SourceFormat> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("epub") => return Some(SourceFormat::Epub),
        Some("txt" | "text" | "md" | "markdown") => return Some(SourceFormat::PlainText),
        Some("pdf") => return Some(SourceFormat::Pdf),
        _ => {}
    }
    if bytes.starts_with(b"%PDF") {
        Some(SourceFormat::Pdf)
    } else if bytes.starts_with(b"PK\x03\x04") {
        Some(SourceFormat::Epub)
    } else if std::str::from_utf8(bytes).is_ok() {
        Some(SourceFormat::PlainText)
    } else {
        None
    }
}

pub struct Document {
    id: String,
    backend: Box<dyn DocumentBackend>,
    arena: PageArena,
    layout: LayoutConfig,
    closed: bool,
}

impl Document {
    /// Read the whole source and open it with a bundled backend.
    pub fn open(mut source: DocumentSource) -> Result<Self, DocumentError> {
        let mut bytes = Vec::new();
        source.reader.read_to_end(&mut bytes)?;
        let format = detect_format(&source.name, &bytes)
            .ok_or_else(|| DocumentError::UnsupportedFormat(source.name.clone()))?;
        info!(document = %source.name, ?format, bytes = bytes.len(), "Opening document");

        let backend: Box<dyn DocumentBackend> = match format {
            SourceFormat::Epub => Box::new(
                epub::load_epub(Cursor::new(bytes))
                    .map_err(|err| DocumentError::Unreadable(format!("{err:#}")))?,
            ),
            SourceFormat::PlainText => {
                let text = String::from_utf8(bytes)
                    .map_err(|err| DocumentError::Unreadable(err.to_string()))?;
                Box::new(ReflowBackend::from_text(&text))
            }
            SourceFormat::Pdf => {
                return Err(DocumentError::UnsupportedFormat(format!(
                    "{} (no bundled PDF renderer)",
                    source.name
                )));
            }
        };
        Ok(Self::with_backend(source.name, backend))
    }

    /// Wrap a host-supplied backend.
    pub fn with_backend(id: impl Into<String>, backend: Box<dyn DocumentBackend>) -> Self {
        Document {
            id: id.into(),
            backend,
            arena: PageArena::new(),
            layout: LayoutConfig::default(),
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> LayoutKind {
        self.backend.kind()
    }

    pub fn page_count(&self) -> usize {
        if self.closed {
            0
        } else {
            self.backend.page_count()
        }
    }

    pub fn page(&self, index: usize) -> Result<Page, DocumentError> {
        self.check_page(index)?;
        Ok(Page {
            index,
            size: self.backend.page_size(index),
        })
    }

    pub fn pages(&self) -> Vec<Page> {
        (0..self.page_count())
            .map(|index| Page {
                index,
                size: self.backend.page_size(index),
            })
            .collect()
    }

    pub fn layout_config(&self) -> LayoutConfig {
        self.layout
    }

    /// Re-flow reflowable content. Every previously extracted unit and raster
    /// is released, even for fixed layouts.
    pub fn layout(&mut self, config: &LayoutConfig) -> Result<(), DocumentError> {
        self.ensure_open()?;
        self.arena.clear();
        self.backend
            .layout(config)
            .map_err(|err| DocumentError::Unreadable(format!("{err:#}")))?;
        self.layout = *config;
        info!(
            document = %self.id,
            font_size = config.font_size,
            width = config.viewport_width,
            height = config.viewport_height,
            pages = self.backend.page_count(),
            "Laid out document"
        );
        Ok(())
    }

    pub fn load_page_units(&mut self, index: usize) -> Result<Vec<TextUnit>, DocumentError> {
        self.extract(index)?;
        Ok(self.arena.units(index).map(<[TextUnit]>::to_vec).unwrap_or_default())
    }

    /// Page text as the host's text layout sees it. Shares the extraction
    /// with [`Document::load_page_units`].
    pub fn page_text(&mut self, index: usize) -> Result<String, DocumentError> {
        self.extract(index)?;
        Ok(self.arena.text(index).map(str::to_string).unwrap_or_default())
    }

    /// Pull a page's structured content once; later calls hit the arena.
    fn extract(&mut self, index: usize) -> Result<(), DocumentError> {
        self.check_page(index)?;
        if self.arena.units(index).is_some() {
            return Ok(());
        }
        let content = self
            .backend
            .page_content(index)
            .map_err(|err| DocumentError::Extraction {
                page: index,
                message: format!("{err:#}"),
            })?;
        let text = content_text(&content);
        let units = units_from_content(index, content);
        debug!(page = index, units = units.len(), "Extracted page units");
        self.arena.store_extraction(index, text, units);
        Ok(())
    }

    pub fn load_page_image(
        &mut self,
        index: usize,
        scale: f32,
        night: bool,
    ) -> Result<RgbaImage, DocumentError> {
        self.check_page(index)?;
        if self.backend.kind() != LayoutKind::Fixed {
            return Err(DocumentError::NotFixedLayout);
        }
        if let Some(image) = self.arena.image(index, scale, night) {
            return Ok(image.clone());
        }

        let mut image =
            self.backend
                .render_page(index, scale)
                .map_err(|err| DocumentError::Extraction {
                    page: index,
                    message: format!("{err:#}"),
                })?;
        apply_theme(&mut image, night);
        debug!(
            page = index,
            scale,
            night,
            width = image.width(),
            height = image.height(),
            "Rendered page"
        );
        self.arena.store_image(index, scale, night, image.clone());
        Ok(image)
    }

    /// Chapter tree with targets resolved to page indices. Entries that do
    /// not resolve are dropped; their children are kept in their place.
    pub fn outline(&mut self) -> Vec<OutlineEntry> {
        if self.closed {
            return Vec::new();
        }
        let raw = match self.backend.outline() {
            Ok(items) => items,
            Err(err) => {
                warn!(document = %self.id, "Outline unavailable: {err:#}");
                return Vec::new();
            }
        };
        let mut resolved = Vec::new();
        resolve_outline(
            self.backend.as_ref(),
            self.backend.page_count(),
            raw,
            &mut resolved,
        );
        resolved
    }

    /// Keep derived resources only for pages in `window`.
    pub fn release_outside(&mut self, window: std::ops::Range<usize>) {
        self.arena.retain_window(window);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.arena.clear();
        self.backend.close();
        self.closed = true;
        info!(document = %self.id, "Closed document");
    }

    fn ensure_open(&self) -> Result<(), DocumentError> {
        if self.closed {
            Err(DocumentError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_page(&self, index: usize) -> Result<(), DocumentError> {
        self.ensure_open()?;
        let count = self.backend.page_count();
        if index >= count {
            return Err(DocumentError::PageOutOfRange { index, count });
        }
        Ok(())
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("kind", &self.backend.kind())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn content_text(content: &PageContent) -> String {
    match content {
        PageContent::Text(text) => text.clone(),
        PageContent::Lines(lines) => lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn units_from_content(page: usize, content: PageContent) -> Vec<TextUnit> {
    match content {
        PageContent::Lines(lines) => lines
            .into_iter()
            .filter_map(|line| {
                let text = line.text.trim();
                (!text.is_empty()).then(|| TextUnit::spatial(text, line.bbox, page))
            })
            .collect(),
        PageContent::Text(text) => sentence_spans(&text)
            .into_iter()
            .map(|span| TextUnit::char_range(span.text, span.chars, page))
            .collect(),
    }
}

fn resolve_outline(
    backend: &dyn DocumentBackend,
    page_count: usize,
    items: Vec<RawOutlineItem>,
    out: &mut Vec<OutlineEntry>,
) {
    for item in items {
        let mut children = Vec::new();
        resolve_outline(backend, page_count, item.children, &mut children);
        match backend
            .resolve_outline_target(&item.target)
            .filter(|page| *page < page_count)
        {
            Some(target_page) => out.push(OutlineEntry {
                title: item.title,
                target_page,
                children,
            }),
            None => {
                warn!(title = %item.title, target = %item.target, "Dropping unresolved outline entry");
                out.extend(children);
            }
        }
    }
}

/// Night mode inverts colours; day mode turns near-white paper transparent
/// so the host background shows through.
fn apply_theme(image: &mut RgbaImage, night: bool) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if night {
            pixel.0 = [255 - r, 255 - g, 255 - b, a];
        } else if r > 240 && g > 240 && b > 240 {
            pixel.0[3] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::test_support::{FakeFixedBackend, FakePage};
    use image::Rgba;

    fn fixed_document() -> (Document, FakeFixedBackend) {
        let backend = FakeFixedBackend::new(vec![
            FakePage::lines(&[("First line", 10.0), ("  ", 30.0), ("Second line", 50.0)]),
            FakePage::failing(),
        ]);
        let counters = backend.clone();
        (Document::with_backend("fixed.pdf", Box::new(backend)), counters)
    }

    #[test]
    fn opens_plain_text_and_splits_sentences() {
        let source = DocumentSource::from_bytes("notes.txt", b"Hello there. General Kenobi!".to_vec());
        let mut doc = Document::open(source).expect("text opens");
        assert_eq!(doc.kind(), LayoutKind::Reflowable);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page(0).expect("page").size, None);
        let units = doc.load_page_units(0).expect("units");
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].text, "General Kenobi!");
        assert_eq!(units[1].bounds, UnitBounds::CharRange(13..28));
    }

    #[test]
    fn pdf_without_backend_is_unsupported() {
        let source = DocumentSource::from_bytes("paper.bin", b"%PDF-1.7 ...".to_vec());
        assert!(matches!(
            Document::open(source),
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn corrupt_epub_is_unreadable() {
        let source = DocumentSource::from_bytes("book.epub", b"not a zip".to_vec());
        assert!(matches!(
            Document::open(source),
            Err(DocumentError::Unreadable(_))
        ));
    }

    #[test]
    fn binary_garbage_is_unsupported() {
        let source = DocumentSource::from_bytes("blob", vec![0xff, 0xfe, 0x00, 0x81]);
        assert!(matches!(
            Document::open(source),
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn fixed_lines_keep_native_boxes_and_skip_blanks() {
        let (mut doc, _) = fixed_document();
        let units = doc.load_page_units(0).expect("units");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "First line");
        assert_eq!(
            units[1].bounds,
            UnitBounds::Spatial(Rect::new(10.0, 50.0, 190.0, 62.0))
        );
        assert!(units.iter().all(|unit| unit.owner_page == 0));
    }

    #[test]
    fn extraction_failure_is_reported_per_page() {
        let (mut doc, _) = fixed_document();
        assert!(matches!(
            doc.load_page_units(1),
            Err(DocumentError::Extraction { page: 1, .. })
        ));
        assert!(matches!(
            doc.load_page_units(7),
            Err(DocumentError::PageOutOfRange { index: 7, count: 2 })
        ));
    }

    #[test]
    fn units_are_cached_until_layout() {
        let (mut doc, counters) = fixed_document();
        doc.load_page_units(0).expect("units");
        doc.load_page_units(0).expect("units");
        assert_eq!(counters.content_calls(), 1);
        doc.layout(&LayoutConfig::default()).expect("layout");
        doc.load_page_units(0).expect("units");
        assert_eq!(counters.content_calls(), 2);
    }

    #[test]
    fn page_text_shares_the_unit_extraction() {
        let (mut doc, counters) = fixed_document();
        doc.load_page_units(0).expect("units");
        assert_eq!(
            doc.page_text(0).expect("text"),
            "First line\n  \nSecond line"
        );
        assert_eq!(counters.content_calls(), 1);
    }

    #[test]
    fn page_images_follow_theme() {
        let (mut doc, _) = fixed_document();
        let day = doc.load_page_image(0, 1.0, false).expect("day image");
        assert_eq!(day.get_pixel(0, 0), &Rgba([255, 255, 255, 0]));
        assert_eq!(day.get_pixel(1, 0), &Rgba([10, 20, 30, 255]));

        let night = doc.load_page_image(0, 1.0, true).expect("night image");
        assert_eq!(night.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(night.get_pixel(1, 0), &Rgba([245, 235, 225, 255]));
    }

    #[test]
    fn reflowable_pages_have_no_image() {
        let source = DocumentSource::from_bytes("a.txt", b"text".to_vec());
        let mut doc = Document::open(source).expect("opens");
        assert!(matches!(
            doc.load_page_image(0, 1.0, false),
            Err(DocumentError::NotFixedLayout)
        ));
    }

    #[test]
    fn unresolved_outline_entries_promote_children() {
        let backend = FakeFixedBackend::new(vec![FakePage::lines(&[]); 4]).with_outline(vec![
            RawOutlineItem {
                title: "Part I".into(),
                target: "missing".into(),
                children: vec![
                    RawOutlineItem {
                        title: "Chapter 1".into(),
                        target: "1".into(),
                        children: Vec::new(),
                    },
                    RawOutlineItem {
                        title: "Chapter 2".into(),
                        target: "9".into(),
                        children: Vec::new(),
                    },
                ],
            },
            RawOutlineItem {
                title: "Part II".into(),
                target: "3".into(),
                children: Vec::new(),
            },
        ]);
        let mut doc = Document::with_backend("outline.pdf", Box::new(backend));
        let outline = doc.outline();
        let titles: Vec<_> = OutlineEntry::flatten(&outline)
            .into_iter()
            .map(|(depth, entry)| (depth, entry.title.as_str(), entry.target_page))
            .collect();
        assert_eq!(titles, vec![(0, "Chapter 1", 1), (0, "Part II", 3)]);
    }

    #[test]
    fn close_is_idempotent_and_runs_on_drop() {
        let (mut doc, counters) = fixed_document();
        doc.close();
        doc.close();
        assert_eq!(counters.close_calls(), 1);
        assert_eq!(doc.page_count(), 0);
        assert!(matches!(doc.load_page_units(0), Err(DocumentError::Closed)));
        drop(doc);
        assert_eq!(counters.close_calls(), 1);

        let (doc, counters) = fixed_document();
        drop(doc);
        assert_eq!(counters.close_calls(), 1);
    }
}
