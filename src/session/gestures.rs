use super::{HostEvent, ReaderSession};
use crate::geometry::Point;
use crate::highlight::{HitTest, TextLayout, hit_test};
use crate::viewport::Viewport;
use tracing::debug;

impl ReaderSession {
    /// Tap-to-read: start at the unit under `point`, or ask the host to
    /// toggle its chrome when nothing is there.
    pub fn tap(&mut self, point: Point, layout: &dyn TextLayout) -> Vec<HostEvent> {
        let Some(units) = self.units.as_ref() else {
            return vec![HostEvent::ToggleChrome];
        };
        let geometry = self.geometry();
        match hit_test(units, &geometry, &self.viewport, point, layout) {
            HitTest::Unit(index) => {
                debug!(index, x = point.x, y = point.y, "Tap hit unit");
                self.start_from(index)
            }
            HitTest::ToggleChrome => vec![HostEvent::ToggleChrome],
        }
    }

    pub fn pinch(&mut self, factor: f32, focus: Point) -> Vec<HostEvent> {
        self.viewport_event(|viewport| viewport.zoom(factor, focus))
    }

    /// Pan by a drag delta; ignored unless zoomed in.
    pub fn drag(&mut self, dx: f32, dy: f32) -> Vec<HostEvent> {
        self.viewport_event(|viewport| viewport.pan(dx, dy))
    }

    pub fn reset_zoom(&mut self) -> Vec<HostEvent> {
        self.viewport_event(|viewport| {
            let changed = viewport.is_zoomed();
            viewport.reset();
            changed
        })
    }

    fn viewport_event(
        &mut self,
        update: impl FnOnce(&mut Viewport) -> bool,
    ) -> Vec<HostEvent> {
        if update(&mut self.viewport) {
            vec![HostEvent::ViewportChanged(self.viewport.state())]
        } else {
            Vec::new()
        }
    }
}
