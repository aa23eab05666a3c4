//! Cubic bezier segments and adaptive flattening.

use crate::geometry::Point2D;

/// One segment of the closed mask outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSegment {
    pub p0: Point2D,
    pub p1: Point2D,
    pub p2: Point2D,
    pub p3: Point2D,
}

impl CubicSegment {
    pub fn new(p0: Point2D, p1: Point2D, p2: Point2D, p3: Point2D) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// A straight segment expressed as a cubic with control points on the ends.
    pub fn line(a: Point2D, b: Point2D) -> Self {
        Self::new(a, a, b, b)
    }

    /// Evaluate the curve at `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point2D {
        let (left, _) = self.split(t);
        left.p3
    }

    /// De Casteljau split at `t`.
    pub fn split(&self, t: f64) -> (CubicSegment, CubicSegment) {
        let p01 = Point2D::lerp(&self.p0, &self.p1, t);
        let p12 = Point2D::lerp(&self.p1, &self.p2, t);
        let p23 = Point2D::lerp(&self.p2, &self.p3, t);
        let p012 = Point2D::lerp(&p01, &p12, t);
        let p123 = Point2D::lerp(&p12, &p23, t);
        let mid = Point2D::lerp(&p012, &p123, t);
        (
            CubicSegment::new(self.p0, p01, p012, mid),
            CubicSegment::new(mid, p123, p23, self.p3),
        )
    }

    /// Largest distance of the inner control points from the chord `p0–p3`.
    ///
    /// This bounds the distance of the curve itself from the chord.
    pub fn flatness(&self) -> f64 {
        distance_to_segment(self.p1, self.p0, self.p3)
            .max(distance_to_segment(self.p2, self.p0, self.p3))
    }

    /// Append the flattened curve to `out`, excluding `p0`.
    ///
    /// Subdivides until every piece is within `tolerance` of its chord or
    /// `max_depth` halvings have been applied.
    pub fn flatten_into(&self, tolerance: f64, max_depth: u32, out: &mut Vec<Point2D>) {
        if max_depth == 0 || self.flatness() <= tolerance {
            out.push(self.p3);
            return;
        }
        let (left, right) = self.split(0.5);
        left.flatten_into(tolerance, max_depth - 1, out);
        right.flatten_into(tolerance, max_depth - 1, out);
    }
}

fn distance_to_segment(p: Point2D, a: Point2D, b: Point2D) -> f64 {
    let ab = b - a;
    let len_sq = ab.dx * ab.dx + ab.dy * ab.dy;
    if len_sq <= f64::EPSILON {
        return p.distance_to(&a);
    }
    let ap = p - a;
    let t = ((ap.dx * ab.dx + ap.dy * ab.dy) / len_sq).clamp(0.0, 1.0);
    p.distance_to(&Point2D::lerp(&a, &b, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_flattens_to_single_point() {
        let seg = CubicSegment::line(Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0));
        let mut out = Vec::new();
        seg.flatten_into(1e-4, 12, &mut out);
        assert_eq!(out, vec![Point2D::new(1.0, 0.0)]);
    }

    #[test]
    fn test_curve_flattening_stays_within_tolerance() {
        let seg = CubicSegment::new(
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, 0.0),
        );
        let tolerance = 1e-3;
        let mut out = vec![seg.p0];
        seg.flatten_into(tolerance, 16, &mut out);
        assert!(out.len() > 8);
        assert_eq!(*out.last().unwrap(), seg.p3);

        // Sample the true curve and check it is close to the polyline.
        for i in 0..=100 {
            let p = seg.point_at(i as f64 / 100.0);
            let nearest = out
                .windows(2)
                .map(|w| distance_to_segment(p, w[0], w[1]))
                .fold(f64::MAX, f64::min);
            assert!(nearest <= tolerance * 1.01, "deviation {nearest} at sample {i}");
        }
    }

    #[test]
    fn test_depth_cap_bounds_output() {
        let seg = CubicSegment::new(
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, 0.0),
        );
        let mut out = Vec::new();
        seg.flatten_into(0.0, 3, &mut out);
        assert_eq!(out.len(), 8);
    }
}
