//! Screen composition and the per-screen unit index space.
//!
//! A screen shows one page in portrait and two pages side by side in
//! landscape. Units of all pages on a screen are concatenated, left page
//! first, into one flat 0-based sequence that playback and highlighting
//! address.

use crate::config::Orientation;
use crate::document::{Document, DocumentError, TextUnit};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Composition {
    Single,
    Double,
}

impl From<Orientation> for Composition {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => Composition::Single,
            Orientation::Landscape => Composition::Double,
        }
    }
}

impl Composition {
    pub fn pages_per_screen(self) -> usize {
        match self {
            Composition::Single => 1,
            Composition::Double => 2,
        }
    }

    pub fn screen_count(self, page_count: usize) -> usize {
        page_count.div_ceil(self.pages_per_screen())
    }

    pub fn screen_for_page(self, page: usize) -> usize {
        page / self.pages_per_screen()
    }

    pub fn first_page(self, screen: usize) -> usize {
        screen * self.pages_per_screen()
    }

    /// Pages shown on `screen`, or `None` past the end of the document.
    pub fn screen_pages(self, screen: usize, page_count: usize) -> Option<ScreenPages> {
        let left = self.first_page(screen);
        if left >= page_count {
            return None;
        }
        let right = match self {
            Composition::Single => None,
            Composition::Double => Some(left + 1).filter(|right| *right < page_count),
        };
        Some(ScreenPages {
            screen,
            left,
            right,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScreenPages {
    pub screen: usize,
    pub left: usize,
    pub right: Option<usize>,
}

impl ScreenPages {
    pub fn single(screen: usize, page: usize) -> Self {
        Self {
            screen,
            left: page,
            right: None,
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.left).chain(self.right)
    }

    pub fn contains(&self, page: usize) -> bool {
        self.side_of(page).is_some()
    }

    pub fn side_of(&self, page: usize) -> Option<Side> {
        if page == self.left {
            Some(Side::Left)
        } else if self.right == Some(page) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn page_on(&self, side: Side) -> Option<usize> {
        match side {
            Side::Left => Some(self.left),
            Side::Right => self.right,
        }
    }
}

/// Anything that can hand out the ordered units of one page.
pub trait PageUnitSource {
    fn page_units(&mut self, page: usize) -> Result<Vec<TextUnit>, DocumentError>;
}

impl PageUnitSource for Document {
    fn page_units(&mut self, page: usize) -> Result<Vec<TextUnit>, DocumentError> {
        self.load_page_units(page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenUnits {
    pages: ScreenPages,
    units: Vec<TextUnit>,
}

impl ScreenUnits {
    pub fn new(pages: ScreenPages, units: Vec<TextUnit>) -> Self {
        Self { pages, units }
    }

    pub fn pages(&self) -> ScreenPages {
        self.pages
    }

    pub fn units(&self) -> &[TextUnit] {
        &self.units
    }

    pub fn get(&self, index: usize) -> Option<&TextUnit> {
        self.units.get(index)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.text.clone()).collect()
    }

    /// Units `[start, min(start + size, len))`; empty past the end.
    pub fn chunk(&self, start: usize, size: usize) -> &[TextUnit] {
        let start = start.min(self.units.len());
        let end = start.saturating_add(size).min(self.units.len());
        &self.units[start..end]
    }

    pub fn side_of(&self, index: usize) -> Option<Side> {
        self.pages.side_of(self.units.get(index)?.owner_page)
    }
}

/// Collect the units of every page on a screen, left page first.
///
/// A page whose extraction fails contributes no units; reading continues
/// with the rest of the screen.
pub fn build_screen_units(source: &mut impl PageUnitSource, pages: ScreenPages) -> ScreenUnits {
    let mut units = Vec::new();
    for page in pages.pages() {
        match source.page_units(page) {
            Ok(mut page_units) => units.append(&mut page_units),
            Err(err) => warn!(page, "Skipping page units: {err}"),
        }
    }
    debug!(
        screen = pages.screen,
        left = pages.left,
        right = ?pages.right,
        units = units.len(),
        "Built screen units"
    );
    ScreenUnits { pages, units }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSource(HashMap<usize, Result<Vec<TextUnit>, ()>>);

    impl PageUnitSource for MapSource {
        fn page_units(&mut self, page: usize) -> Result<Vec<TextUnit>, DocumentError> {
            match self.0.get(&page) {
                Some(Ok(units)) => Ok(units.clone()),
                _ => Err(DocumentError::Extraction {
                    page,
                    message: "boom".into(),
                }),
            }
        }
    }

    fn units(page: usize, count: usize) -> Vec<TextUnit> {
        (0..count)
            .map(|i| TextUnit::char_range(format!("p{page}u{i}"), i..i + 1, page))
            .collect()
    }

    #[test]
    fn double_composition_pairs_pages() {
        let composition = Composition::from(Orientation::Landscape);
        assert_eq!(composition.screen_count(5), 3);
        assert_eq!(composition.screen_for_page(3), 1);
        assert_eq!(composition.first_page(2), 4);
        assert_eq!(
            composition.screen_pages(2, 5),
            Some(ScreenPages {
                screen: 2,
                left: 4,
                right: None
            })
        );
        assert_eq!(composition.screen_pages(1, 5).and_then(|p| p.right), Some(3));
        assert_eq!(composition.screen_pages(3, 5), None);
    }

    #[test]
    fn single_composition_is_identity() {
        let composition = Composition::Single;
        assert_eq!(composition.screen_count(5), 5);
        assert_eq!(composition.screen_for_page(3), 3);
        assert_eq!(composition.screen_count(0), 0);
    }

    #[test]
    fn left_units_precede_right_units() {
        let mut source = MapSource(HashMap::from([(2, Ok(units(2, 2))), (3, Ok(units(3, 3)))]));
        let screen = build_screen_units(
            &mut source,
            ScreenPages {
                screen: 1,
                left: 2,
                right: Some(3),
            },
        );
        assert_eq!(screen.len(), 5);
        assert_eq!(screen.texts()[..3], ["p2u0", "p2u1", "p3u0"]);
        assert_eq!(screen.side_of(1), Some(Side::Left));
        assert_eq!(screen.side_of(2), Some(Side::Right));
        assert_eq!(screen.side_of(9), None);
    }

    #[test]
    fn failed_page_contributes_nothing() {
        let mut source = MapSource(HashMap::from([(0, Err(())), (1, Ok(units(1, 2)))]));
        let screen = build_screen_units(
            &mut source,
            ScreenPages {
                screen: 0,
                left: 0,
                right: Some(1),
            },
        );
        assert_eq!(screen.len(), 2);
        assert!(screen.units().iter().all(|unit| unit.owner_page == 1));
    }

    #[test]
    fn chunks_are_clipped_to_the_unit_count() {
        let screen = ScreenUnits::new(ScreenPages::single(0, 0), units(0, 12));
        assert_eq!(screen.chunk(0, 5).len(), 5);
        assert_eq!(screen.chunk(10, 5).len(), 2);
        assert!(screen.chunk(12, 5).is_empty());
        assert!(screen.chunk(40, 5).is_empty());
    }
}
