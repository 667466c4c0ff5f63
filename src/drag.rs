use crate::foundation::core::{NormPoint, Point};
use crate::model::LayerId;

/// Pixel dimensions of the surface a drag is measured against.
///
/// Callers construct a fresh value on every pointer move so that mid-drag
/// container resizes are reflected immediately; nothing here is cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceBounds {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl SurfaceBounds {
    /// New bounds from pixel dimensions.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// One in-progress drag of a single text layer.
///
/// Lives from pointer-down on a selected layer until pointer-up and is never
/// part of undo history. The mapping is anchored: every move is computed from
/// the pointer position and layer position captured at `begin`, not from the
/// previous intermediate result, so accumulated rounding cannot drift the
/// layer.
#[derive(Clone, Copy, Debug)]
pub struct DragSession {
    layer: LayerId,
    start_pointer: Point,
    start_position: NormPoint,
    moved: bool,
}

impl DragSession {
    /// Start a drag for `layer`, anchored at the pointer-down position and
    /// the layer's position at that instant.
    pub fn begin(layer: LayerId, start_pointer: Point, start_position: NormPoint) -> Self {
        Self {
            layer,
            start_pointer,
            start_position,
            moved: false,
        }
    }

    /// The layer being dragged.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Whether at least one intermediate position was produced. Decides if
    /// release commits an undo step.
    pub fn moved(&self) -> bool {
        self.moved
    }

    /// Map the current pointer position to the layer's new normalized
    /// position.
    ///
    /// The pixel delta from the anchor is divided by the surface dimensions
    /// and added to the anchored position, each axis clamped to `[0, 1]`. A
    /// non-positive (or non-finite) dimension contributes a zero delta on
    /// that axis rather than an error.
    pub fn position_for(&mut self, pointer: Point, bounds: SurfaceBounds) -> NormPoint {
        let dx = if bounds.width > 0.0 {
            (pointer.x - self.start_pointer.x) / bounds.width
        } else {
            0.0
        };
        let dy = if bounds.height > 0.0 {
            (pointer.y - self.start_pointer.y) / bounds.height
        } else {
            0.0
        };
        self.moved = true;
        NormPoint::new(self.start_position.x + dx, self.start_position.y + dy).clamp_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(x: f64, y: f64) -> DragSession {
        DragSession::begin(LayerId(1), Point::new(100.0, 100.0), NormPoint::new(x, y))
    }

    #[test]
    fn delta_is_normalized_by_bounds() {
        let mut drag = session_at(0.5, 0.5);
        let pos = drag.position_for(Point::new(300.0, 150.0), SurfaceBounds::new(800.0, 500.0));
        assert_eq!(pos, NormPoint::new(0.5 + 200.0 / 800.0, 0.5 + 50.0 / 500.0));
    }

    #[test]
    fn position_clamps_per_axis() {
        let mut drag = session_at(0.95, 0.95);
        // Raw result would be (1.2, 1.3); both axes clamp to 1.
        let pos = drag.position_for(Point::new(350.0, 450.0), SurfaceBounds::new(1000.0, 1000.0));
        assert_eq!(pos, NormPoint::new(1.0, 1.0));

        let mut drag = session_at(0.1, 0.5);
        let pos = drag.position_for(Point::new(-900.0, 100.0), SurfaceBounds::new(1000.0, 1000.0));
        assert_eq!(pos, NormPoint::new(0.0, 0.5));
    }

    #[test]
    fn fresh_bounds_apply_to_each_move() {
        let mut drag = session_at(0.0, 0.0);
        let wide = drag.position_for(Point::new(600.0, 100.0), SurfaceBounds::new(1000.0, 1000.0));
        let narrow = drag.position_for(Point::new(600.0, 100.0), SurfaceBounds::new(500.0, 1000.0));
        assert_eq!(wide.x, 0.5);
        assert_eq!(narrow.x, 1.0);
    }

    #[test]
    fn degenerate_bounds_freeze_that_axis() {
        let mut drag = session_at(0.3, 0.3);
        let pos = drag.position_for(Point::new(500.0, 300.0), SurfaceBounds::new(0.0, 400.0));
        assert_eq!(pos.x, 0.3);
        assert_eq!(pos.y, 0.8);

        let pos = drag.position_for(Point::new(500.0, 300.0), SurfaceBounds::new(-5.0, f64::NAN));
        assert_eq!(pos, NormPoint::new(0.3, 0.3));
    }

    #[test]
    fn moved_flips_only_after_a_move() {
        let mut drag = session_at(0.5, 0.5);
        assert!(!drag.moved());
        drag.position_for(Point::new(101.0, 100.0), SurfaceBounds::new(100.0, 100.0));
        assert!(drag.moved());
    }
}
