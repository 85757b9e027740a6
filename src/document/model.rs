use crate::config::{ReaderConfig, approx_chars_per_page};
use crate::geometry::{Rect, Size};
use serde::Serialize;
use std::ops::Range;

/// Whether pages carry intrinsic geometry or are produced by the paginator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    Fixed,
    Reflowable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Page {
    pub index: usize,
    /// Intrinsic size in document space; absent for reflowable pages.
    pub size: Option<Size>,
}

/// Where a unit sits on its page. Callers must branch on the kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitBounds {
    /// Renderer-native box in document space.
    Spatial(Rect),
    /// Half-open char range within the page text.
    CharRange(Range<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextUnit {
    pub text: String,
    pub bounds: UnitBounds,
    pub owner_page: usize,
}

impl TextUnit {
    pub fn spatial(text: impl Into<String>, rect: Rect, owner_page: usize) -> Self {
        Self {
            text: text.into(),
            bounds: UnitBounds::Spatial(rect),
            owner_page,
        }
    }

    pub fn char_range(text: impl Into<String>, chars: Range<usize>, owner_page: usize) -> Self {
        Self {
            text: text.into(),
            bounds: UnitBounds::CharRange(chars),
            owner_page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub title: String,
    pub target_page: usize,
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    /// Depth-first `(depth, entry)` pairs, for flat chapter lists.
    pub fn flatten(entries: &[OutlineEntry]) -> Vec<(usize, &OutlineEntry)> {
        fn walk<'a>(entries: &'a [OutlineEntry], depth: usize, out: &mut Vec<(usize, &'a OutlineEntry)>) {
            for entry in entries {
                out.push((depth, entry));
                walk(&entry.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(entries, 0, &mut out);
        out
    }
}

/// Inputs to a re-layout of reflowable content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub font_size: u32,
}

impl LayoutConfig {
    pub fn approx_chars_per_page(&self) -> usize {
        approx_chars_per_page(self.font_size)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig::from(&ReaderConfig::default())
    }
}

impl From<&ReaderConfig> for LayoutConfig {
    fn from(config: &ReaderConfig) -> Self {
        LayoutConfig {
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            font_size: config.font_size,
        }
    }
}
