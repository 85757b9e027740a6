//! Backend for formats without native pagination (plain text, EPUB).
//!
//! The whole text is held in memory and sliced by the paginator on every
//! layout. Chapter anchors are byte offsets into the text so outline targets
//! can be resolved against the current pagination.

use super::backend::{DocumentBackend, PageContent, RawOutlineItem};
use super::model::{LayoutConfig, LayoutKind};
use super::text::clean_text;
use crate::geometry::Size;
use crate::pagination::page_spans;
use anyhow::{Result, bail};
use image::RgbaImage;
use std::ops::Range;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChapterAnchor {
    pub path: String,
    pub offset: usize,
}

#[derive(Debug)]
pub struct ReflowBackend {
    text: String,
    chapters: Vec<ChapterAnchor>,
    toc: Vec<RawOutlineItem>,
    pages: Vec<Range<usize>>,
}

impl ReflowBackend {
    pub fn from_text(raw: &str) -> Self {
        Self::with_chapters(clean_text(raw), Vec::new(), Vec::new())
    }

    pub(crate) fn with_chapters(
        text: String,
        chapters: Vec<ChapterAnchor>,
        toc: Vec<RawOutlineItem>,
    ) -> Self {
        let mut backend = ReflowBackend {
            text,
            chapters,
            toc,
            pages: Vec::new(),
        };
        backend.repaginate(LayoutConfig::default().approx_chars_per_page());
        backend
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn repaginate(&mut self, chars_per_page: usize) {
        self.pages = page_spans(&self.text, chars_per_page);
        debug!(
            chars_per_page,
            pages = self.pages.len(),
            total_chars = self.text.len(),
            "Paginated reflowable text"
        );
    }

    fn page_for_offset(&self, offset: usize) -> usize {
        self.pages
            .iter()
            .rposition(|span| span.start <= offset)
            .unwrap_or(0)
    }
}

impl DocumentBackend for ReflowBackend {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Reflowable
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, _index: usize) -> Option<Size> {
        None
    }

    fn layout(&mut self, config: &LayoutConfig) -> Result<()> {
        self.repaginate(config.approx_chars_per_page());
        Ok(())
    }

    fn page_content(&mut self, index: usize) -> Result<PageContent> {
        let Some(span) = self.pages.get(index) else {
            bail!("page {index} is past the end of the text");
        };
        Ok(PageContent::Text(self.text[span.clone()].to_string()))
    }

    fn render_page(&mut self, index: usize, _scale: f32) -> Result<RgbaImage> {
        bail!("reflowable page {index} has no raster form")
    }

    fn outline(&mut self) -> Result<Vec<RawOutlineItem>> {
        Ok(self.toc.clone())
    }

    fn resolve_outline_target(&self, target: &str) -> Option<usize> {
        let path = target.split('#').next().unwrap_or(target);
        let anchor = self.chapters.iter().find(|chapter| chapter.path == path)?;
        Some(self.page_for_offset(anchor.offset))
    }

    fn close(&mut self) {
        self.pages.clear();
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReflowBackend {
        let text = "one two three four five six seven eight".to_string();
        let chapters = vec![
            ChapterAnchor {
                path: "ch1.xhtml".into(),
                offset: 0,
            },
            ChapterAnchor {
                path: "ch2.xhtml".into(),
                offset: 24,
            },
        ];
        let toc = vec![RawOutlineItem {
            title: "Two".into(),
            target: "ch2.xhtml#start".into(),
            children: Vec::new(),
        }];
        ReflowBackend::with_chapters(text, chapters, toc)
    }

    #[test]
    fn relayout_changes_page_count() {
        let mut backend = sample();
        assert_eq!(backend.page_count(), 1);
        backend
            .layout(&LayoutConfig {
                font_size: 24,
                ..LayoutConfig::default()
            })
            .expect("layout");
        assert_eq!(backend.page_count(), 1);
        backend.repaginate(10);
        assert_eq!(backend.page_count(), 5);
    }

    #[test]
    fn outline_targets_follow_pagination() {
        let mut backend = sample();
        backend.repaginate(10);
        assert_eq!(backend.resolve_outline_target("ch2.xhtml#start"), Some(2));
        assert_eq!(backend.resolve_outline_target("ch1.xhtml"), Some(0));
        assert_eq!(backend.resolve_outline_target("missing.xhtml"), None);
    }

    #[test]
    fn text_pages_expose_plain_content() {
        let mut backend = ReflowBackend::from_text("  Hello\r\nworld  ");
        assert_eq!(
            backend.page_content(0).expect("page"),
            PageContent::Text("Hello\nworld".into())
        );
        assert!(backend.page_content(3).is_err());
        assert!(backend.render_page(0, 1.0).is_err());
    }
}
