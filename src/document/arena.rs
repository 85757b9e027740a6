//! Per-page derived resources.
//!
//! Extracted text with its units, and rendered rasters, are held here, keyed
//! by page index.
//! Storing a new value for a page drops the old one; `clear` drops
//! everything and runs on re-layout and on close.

use super::model::TextUnit;
use image::RgbaImage;
use std::collections::HashMap;
use std::ops::Range;
use tracing::trace;

#[derive(Debug)]
struct RenderedPage {
    scale: f32,
    night: bool,
    image: RgbaImage,
}

#[derive(Debug)]
struct Extraction {
    text: String,
    units: Vec<TextUnit>,
}

#[derive(Debug, Default)]
struct PageResources {
    extraction: Option<Extraction>,
    image: Option<RenderedPage>,
}

#[derive(Debug, Default)]
pub struct PageArena {
    pages: HashMap<usize, PageResources>,
}

impl PageArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self, page: usize) -> Option<&[TextUnit]> {
        Some(&self.pages.get(&page)?.extraction.as_ref()?.units)
    }

    pub fn text(&self, page: usize) -> Option<&str> {
        Some(&self.pages.get(&page)?.extraction.as_ref()?.text)
    }

    /// Keep one page's text and the units cut from it.
    pub fn store_extraction(&mut self, page: usize, text: String, units: Vec<TextUnit>) {
        let slot = self.pages.entry(page).or_default();
        if slot.extraction.is_some() {
            trace!(page, "Releasing previous page text");
        }
        slot.extraction = Some(Extraction { text, units });
    }

    pub fn image(&self, page: usize, scale: f32, night: bool) -> Option<&RgbaImage> {
        let rendered = self.pages.get(&page)?.image.as_ref()?;
        ((rendered.scale - scale).abs() <= f32::EPSILON && rendered.night == night)
            .then_some(&rendered.image)
    }

    pub fn store_image(&mut self, page: usize, scale: f32, night: bool, image: RgbaImage) {
        let slot = self.pages.entry(page).or_default();
        if slot.image.is_some() {
            trace!(page, "Releasing previous page raster");
        }
        slot.image = Some(RenderedPage { scale, night, image });
    }

    /// Drop resources for pages outside `window`.
    pub fn retain_window(&mut self, window: Range<usize>) {
        self.pages.retain(|page, _| window.contains(page));
    }

    pub fn clear(&mut self) {
        if !self.pages.is_empty() {
            trace!(pages = self.pages.len(), "Releasing page resources");
        }
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::TextUnit;

    #[test]
    fn storing_extraction_replaces_previous_entry() {
        let mut arena = PageArena::new();
        arena.store_extraction(2, "old".into(), vec![TextUnit::char_range("old", 0..3, 2)]);
        arena.store_extraction(2, "new".into(), vec![TextUnit::char_range("new", 0..3, 2)]);
        let units = arena.units(2).expect("cached units");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "new");
        assert_eq!(arena.text(2), Some("new"));
    }

    #[test]
    fn image_lookup_matches_scale_and_mode() {
        let mut arena = PageArena::new();
        arena.store_image(0, 2.0, false, RgbaImage::new(4, 4));
        assert!(arena.image(0, 2.0, false).is_some());
        assert!(arena.image(0, 2.0, true).is_none());
        assert!(arena.image(0, 1.5, false).is_none());
    }

    #[test]
    fn retain_window_releases_far_pages() {
        let mut arena = PageArena::new();
        for page in 0..6 {
            arena.store_extraction(page, String::new(), Vec::new());
        }
        arena.retain_window(2..4);
        assert_eq!(arena.len(), 2);
        assert!(arena.units(1).is_none());
        arena.clear();
        assert!(arena.is_empty());
    }
}
