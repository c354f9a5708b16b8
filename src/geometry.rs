//! Mirror coordinate mapping and shared 2D math.
//!
//! The camera preview is horizontally flipped so the user sees themselves
//! as in a mirror, while the tracker reports landmarks in unflipped
//! detector space. Every x-coordinate is passed through [`mirror`] before
//! any distance, angle, or position computation, so that all geometry
//! happens in the same frame as the canvas being drawn to. Y-coordinates
//! are never mirrored.

use glam::Vec2;

/// Canvas pixel dimensions for one try-on session.
///
/// The tracker's source frame matches the canvas, so the same dimensions
/// serve both detector space and canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Map a detector-space x-coordinate into canvas space.
    pub fn mirror_x(&self, x: f32) -> f32 {
        mirror(x, self.width)
    }

    /// Mirror only the x component of a point.
    pub fn mirror_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(mirror(p.x, self.width), p.y)
    }
}

/// `mirror(x, w) = w - x`.
///
/// Involutive: `mirror(mirror(x, w), w) == x`.
pub fn mirror(x: f32, canvas_width: f32) -> f32 {
    canvas_width - x
}

/// Midpoint of two points.
pub fn midpoint(a: Vec2, b: Vec2) -> Vec2 {
    (a + b) * 0.5
}

/// Rotation of the segment `a -> b`, in radians, via `atan2(dy, dx)`.
pub fn segment_angle(a: Vec2, b: Vec2) -> f32 {
    (b.y - a.y).atan2(b.x - a.x)
}

/// Euclidean distance between two points, floored at `min` so coincident
/// landmarks never produce a degenerate zero-area draw.
pub fn floored_distance(a: Vec2, b: Vec2, min: f32) -> f32 {
    a.distance(b).max(min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mirror_is_involutive() {
        for &w in &[0.0f32, 1.0, 100.0, 1920.0] {
            for &x in &[-10.0f32, 0.0, 0.5, 37.25, w] {
                assert_relative_eq!(mirror(mirror(x, w), w), x);
            }
        }
    }

    #[test]
    fn test_mirror_matches_convention() {
        assert_eq!(mirror(10.0, 100.0), 90.0);
        assert_eq!(mirror(30.0, 100.0), 70.0);
    }

    #[test]
    fn test_mirror_point_leaves_y_alone() {
        let canvas = CanvasSize::new(100.0, 50.0);
        let p = canvas.mirror_point(Vec2::new(30.0, 42.0));
        assert_eq!(p, Vec2::new(70.0, 42.0));
    }

    #[test]
    fn test_segment_angle() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 1.0);
        assert_relative_eq!(segment_angle(a, b), std::f32::consts::FRAC_PI_4);

        // Mirrored eye pair from the reference fixture: canvas 100 wide,
        // leftEye (30, 40), rightEye (70, 50).
        let canvas = CanvasSize::new(100.0, 50.0);
        let left = canvas.mirror_point(Vec2::new(30.0, 40.0));
        let right = canvas.mirror_point(Vec2::new(70.0, 50.0));
        assert_relative_eq!(
            segment_angle(left, right),
            10.0f32.atan2((100.0 - 70.0) - (100.0 - 30.0)),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_floored_distance_handles_coincident_points() {
        let p = Vec2::new(5.0, 5.0);
        assert_eq!(floored_distance(p, p, 1.0), 1.0);
        assert_relative_eq!(
            floored_distance(Vec2::ZERO, Vec2::new(3.0, 4.0), 1.0),
            5.0
        );
    }
}
