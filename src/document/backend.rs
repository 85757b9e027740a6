//! Seam to the external parsing/rendering library.
//!
//! Backends are not required to be `Send` or `Sync`: native renderers are
//! rarely thread-safe, so a document is opened and used on one worker thread.

use super::model::{LayoutConfig, LayoutKind};
use crate::geometry::{Rect, Size};
use anyhow::Result;
use image::RgbaImage;

/// One line of a fixed-layout page's structured text.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredLine {
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// Lines with native geometry, in reading order.
    Lines(Vec<StructuredLine>),
    /// Plain page text without geometry.
    Text(String),
}

/// An outline item as the backend reports it, before its target is resolved
/// to a page index.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutlineItem {
    pub title: String,
    pub target: String,
    pub children: Vec<RawOutlineItem>,
}

pub trait DocumentBackend {
    fn kind(&self) -> LayoutKind;

    fn page_count(&self) -> usize;

    /// Intrinsic page size; `None` for reflowable pages.
    fn page_size(&self, index: usize) -> Option<Size>;

    /// Re-flow for the given viewport and font. No-op for fixed layouts.
    fn layout(&mut self, config: &LayoutConfig) -> Result<()>;

    fn page_content(&mut self, index: usize) -> Result<PageContent>;

    /// Raster of a page at `scale` device pixels per document unit.
    fn render_page(&mut self, index: usize, scale: f32) -> Result<RgbaImage>;

    fn outline(&mut self) -> Result<Vec<RawOutlineItem>>;

    fn resolve_outline_target(&self, target: &str) -> Option<usize>;

    /// Release native resources. Called exactly once by `Document`.
    fn close(&mut self);
}
