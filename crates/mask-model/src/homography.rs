//! 3×3 homogeneous transforms.
//!
//! Convention used throughout gPHYX: matrices are stored row-major and act
//! on column vectors, `p' = H · [x, y, 1]ᵀ`. An alignment homography maps
//! reference-frame coordinates to the coordinates of the frame it is
//! recorded for, so chaining `A` (F1→F2) then `B` (F2→F3) gives `B · A`.

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;

/// Below this magnitude the homogeneous `w` is treated as a point at infinity.
const W_EPSILON: f64 = 1e-12;

/// A projective 2D transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Homography {
    rows: [[f64; 3]; 3],
}

impl Homography {
    pub const IDENTITY: Homography = Homography {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { rows }
    }

    /// Build from nine values in row-major order.
    pub fn from_row_major(m: &[f64; 9]) -> Self {
        Self {
            rows: [[m[0], m[1], m[2]], [m[3], m[4], m[5]], [m[6], m[7], m[8]]],
        }
    }

    /// Build from nine values in column-major order (the layout of
    /// `simd_float3x3`-style matrices).
    pub fn from_column_major(m: &[f64; 9]) -> Self {
        Self {
            rows: [[m[0], m[3], m[6]], [m[1], m[4], m[7]], [m[2], m[5], m[8]]],
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_rows([[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]])
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::from_rows([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn rows(&self) -> &[[f64; 3]; 3] {
        &self.rows
    }

    pub fn to_row_major(&self) -> [f64; 9] {
        let r = &self.rows;
        [
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        ]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_finite(&self) -> bool {
        self.rows.iter().flatten().all(|v| v.is_finite())
    }

    /// Matrix product `self · other` (apply `other` first).
    pub fn compose(&self, other: &Homography) -> Homography {
        let a = &self.rows;
        let b = &other.rows;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Homography { rows: out }
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.rows;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Homography> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-15 {
            return None;
        }
        let m = &self.rows;
        let inv_det = 1.0 / det;
        let cof = [
            [
                m[1][1] * m[2][2] - m[1][2] * m[2][1],
                m[0][2] * m[2][1] - m[0][1] * m[2][2],
                m[0][1] * m[1][2] - m[0][2] * m[1][1],
            ],
            [
                m[1][2] * m[2][0] - m[1][0] * m[2][2],
                m[0][0] * m[2][2] - m[0][2] * m[2][0],
                m[0][2] * m[1][0] - m[0][0] * m[1][2],
            ],
            [
                m[1][0] * m[2][1] - m[1][1] * m[2][0],
                m[0][1] * m[2][0] - m[0][0] * m[2][1],
                m[0][0] * m[1][1] - m[0][1] * m[1][0],
            ],
        ];
        let rows = cof.map(|row| row.map(|v| v * inv_det));
        Some(Homography { rows })
    }

    /// Scale so that the bottom-right element is 1 (when it is non-zero).
    pub fn normalized(&self) -> Homography {
        let h22 = self.rows[2][2];
        if h22.abs() < W_EPSILON || h22 == 1.0 {
            return *self;
        }
        let mut rows = self.rows;
        for v in rows.iter_mut().flatten() {
            *v /= h22;
        }
        Homography { rows }
    }

    /// Transform a point. Returns `None` for points mapped to infinity.
    pub fn apply(&self, p: Point2D) -> Option<Point2D> {
        let m = &self.rows;
        let x = m[0][0] * p.x + m[0][1] * p.y + m[0][2];
        let y = m[1][0] * p.x + m[1][1] * p.y + m[1][2];
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w.abs() < W_EPSILON {
            return None;
        }
        Some(Point2D::new(x / w, y / w))
    }

    /// Element-wise comparison after normalizing both matrices.
    pub fn approx_eq(&self, other: &Homography, epsilon: f64) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a.rows
            .iter()
            .flatten()
            .zip(b.rows.iter().flatten())
            .all(|(x, y)| (x - y).abs() <= epsilon)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Homography {
    type Output = Homography;

    fn mul(self, rhs: Homography) -> Homography {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Homography {
        Homography::from_rows([[1.02, 0.01, 0.03], [-0.02, 0.98, -0.01], [0.001, 0.002, 1.0]])
    }

    #[test]
    fn test_identity_apply() {
        let p = Point2D::new(0.3, 0.7);
        assert_eq!(Homography::IDENTITY.apply(p), Some(p));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let h = sample();
        let inv = h.inverse().unwrap();
        assert!((h * inv).approx_eq(&Homography::IDENTITY, 1e-12));

        let p = Point2D::new(0.25, 0.6);
        let q = inv.apply(h.apply(p).unwrap()).unwrap();
        assert!(p.distance_to(&q) < 1e-12);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let h = Homography::scale(0.0, 1.0);
        assert!(h.inverse().is_none());
    }

    #[test]
    fn test_composition_order() {
        let a = Homography::translation(0.1, 0.0);
        let b = Homography::scale(2.0, 2.0);
        let p = Point2D::new(0.5, 0.5);
        // Apply `a` first, then `b`.
        let composed = (b * a).apply(p).unwrap();
        let stepwise = b.apply(a.apply(p).unwrap()).unwrap();
        assert!(composed.distance_to(&stepwise) < 1e-12);
        assert!((composed.x - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_column_major_matches_row_major_transpose() {
        let h = sample();
        let r = h.to_row_major();
        let col = [r[0], r[3], r[6], r[1], r[4], r[7], r[2], r[5], r[8]];
        assert_eq!(Homography::from_column_major(&col), h);
    }

    #[test]
    fn test_point_at_infinity() {
        let h = Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(h.apply(Point2D::new(0.0, 0.5)).is_none());
    }
}
