//! Mapping between speech chunks, units and what is drawn on screen.
//!
//! Three coordinate spaces meet here: page space (a unit's native box),
//! content space (the unzoomed screen with its one or two page containers)
//! and screen space (content after the viewport's zoom and pan).

use crate::geometry::{Point, Rect, Size};
use crate::indexer::{Composition, ScreenUnits, Side};
use crate::document::UnitBounds;
use crate::viewport::{Viewport, ViewportState};
use serde::Serialize;
use std::ops::Range;
use tracing::trace;

/// Placement of a screen's page containers in content space.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenGeometry {
    composition: Composition,
    view: Size,
    separator: f32,
    left: Option<Size>,
    right: Option<Size>,
}

impl ScreenGeometry {
    /// `left`/`right` are intrinsic page sizes; `None` for reflowable pages.
    pub fn new(
        composition: Composition,
        view: Size,
        separator: f32,
        left: Option<Size>,
        right: Option<Size>,
    ) -> Self {
        Self {
            composition,
            view,
            separator: separator.max(0.0),
            left,
            right,
        }
    }

    /// The whole screen is the content the viewport zooms.
    pub fn content_size(&self) -> Size {
        self.view
    }

    pub fn container_size(&self) -> Size {
        match self.composition {
            Composition::Single => self.view,
            Composition::Double => Size::new(
                ((self.view.width - self.separator) / 2.0).max(0.0),
                self.view.height,
            ),
        }
    }

    fn container_origin(&self, side: Side) -> Point {
        match side {
            Side::Left => Point::new(0.0, 0.0),
            Side::Right => Point::new(self.container_size().width + self.separator, 0.0),
        }
    }

    fn page_size(&self, side: Side) -> Option<Size> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
        .filter(|size| !size.is_empty())
    }

    /// Scale that fits the page inside its container.
    pub fn fit_scale(&self, side: Side) -> f32 {
        let container = self.container_size();
        self.page_size(side)
            .map(|page| (container.width / page.width).min(container.height / page.height))
            .unwrap_or(1.0)
    }

    /// Top-left of the fitted, centered page in content space.
    fn page_origin(&self, side: Side) -> Point {
        let origin = self.container_origin(side);
        let container = self.container_size();
        match self.page_size(side) {
            Some(page) => {
                let fit = self.fit_scale(side);
                Point::new(
                    origin.x + (container.width - page.width * fit) / 2.0,
                    origin.y + (container.height - page.height * fit) / 2.0,
                )
            }
            None => origin,
        }
    }

    pub fn document_to_content(&self, side: Side, rect: Rect) -> Rect {
        let origin = self.page_origin(side);
        rect.scale(self.fit_scale(side)).translate(origin.x, origin.y)
    }

    /// Resolve a content-space point to the side it falls on and its page
    /// space coordinates. The midline sits in the middle of the separator.
    pub fn content_to_page(&self, point: Point) -> (Side, Point) {
        let side = match self.composition {
            Composition::Single => Side::Left,
            Composition::Double => {
                let midline = self.container_size().width + self.separator / 2.0;
                if point.x < midline { Side::Left } else { Side::Right }
            }
        };
        let origin = self.page_origin(side);
        let fit = self.fit_scale(side);
        (
            side,
            Point::new((point.x - origin.x) / fit, (point.y - origin.y) / fit),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideHighlight {
    #[default]
    None,
    /// Screen-space rectangles of spatial units.
    Rects(Vec<Rect>),
    /// Char span `[min_start, max_end)` of text units.
    TextSpan(Range<usize>),
}

impl SideHighlight {
    fn add_rect(&mut self, rect: Rect) {
        match self {
            SideHighlight::Rects(rects) => rects.push(rect),
            _ => *self = SideHighlight::Rects(vec![rect]),
        }
    }

    fn add_span(&mut self, chars: &Range<usize>) {
        match self {
            SideHighlight::TextSpan(span) => {
                span.start = span.start.min(chars.start);
                span.end = span.end.max(chars.end);
            }
            _ => *self = SideHighlight::TextSpan(chars.clone()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SideHighlight::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightPlan {
    pub chunk_start: usize,
    pub left: SideHighlight,
    pub right: SideHighlight,
    /// Whether the viewport panned to reveal the chunk.
    pub scrolled: bool,
    pub viewport: ViewportState,
}

pub struct HighlightCoordinator;

impl HighlightCoordinator {
    /// Highlight for the chunk starting at `chunk_start`. When zoomed, the
    /// viewport first pans so the chunk's first box is visible.
    pub fn plan(
        units: &ScreenUnits,
        chunk_start: usize,
        chunk_size: usize,
        geometry: &ScreenGeometry,
        viewport: &mut Viewport,
    ) -> HighlightPlan {
        let chunk = units.chunk(chunk_start, chunk_size);
        let first_box = chunk.iter().enumerate().find_map(|(offset, unit)| {
            let side = units.side_of(chunk_start + offset)?;
            match &unit.bounds {
                UnitBounds::Spatial(rect) => Some(geometry.document_to_content(side, *rect)),
                UnitBounds::CharRange(_) => None,
            }
        });
        let scrolled = first_box
            .map(|rect| viewport.ensure_visible(rect))
            .unwrap_or(false);

        let mut left = SideHighlight::None;
        let mut right = SideHighlight::None;
        for (offset, unit) in chunk.iter().enumerate() {
            let Some(side) = units.side_of(chunk_start + offset) else {
                continue;
            };
            let target = match side {
                Side::Left => &mut left,
                Side::Right => &mut right,
            };
            match &unit.bounds {
                UnitBounds::Spatial(rect) => {
                    let content = geometry.document_to_content(side, *rect);
                    target.add_rect(viewport.to_screen_rect(content));
                }
                UnitBounds::CharRange(chars) => target.add_span(chars),
            }
        }

        trace!(chunk_start, scrolled, "Planned highlight");
        HighlightPlan {
            chunk_start,
            left,
            right,
            scrolled,
            viewport: viewport.state(),
        }
    }
}

/// Resolves a point on a reflowable page to a char offset in its text. The
/// point is relative to the page container's top-left.
pub trait TextLayout {
    fn offset_at(&self, side: Side, point: Point) -> Option<usize>;
}

/// For screens without reflowable text.
pub struct NoTextLayout;

impl TextLayout for NoTextLayout {
    fn offset_at(&self, _side: Side, _point: Point) -> Option<usize> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitTest {
    Unit(usize),
    /// Nothing under the tap; the host shows or hides its chrome.
    ToggleChrome,
}

pub fn hit_test(
    units: &ScreenUnits,
    geometry: &ScreenGeometry,
    viewport: &Viewport,
    screen_point: Point,
    layout: &dyn TextLayout,
) -> HitTest {
    let content = viewport.to_document_point(screen_point);
    let (side, page_point) = geometry.content_to_page(content);
    let Some(page) = units.pages().page_on(side) else {
        return HitTest::ToggleChrome;
    };

    let mut offset: Option<Option<usize>> = None;
    for (index, unit) in units.units().iter().enumerate() {
        if unit.owner_page != page {
            continue;
        }
        let hit = match &unit.bounds {
            UnitBounds::Spatial(rect) => rect.contains(page_point),
            UnitBounds::CharRange(chars) => offset
                .get_or_insert_with(|| layout.offset_at(side, page_point))
                .is_some_and(|at| chars.contains(&at)),
        };
        if hit {
            trace!(index, page, "Tap hit unit");
            return HitTest::Unit(index);
        }
    }
    HitTest::ToggleChrome
}
