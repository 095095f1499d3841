//! 3×3 affine matrix for 2D transforms.

use serde::{Deserialize, Serialize};

use crate::Vec2;

/// Row-major 3×3 matrix. The bottom row is `[0, 0, 1]` for every affine
/// transform this engine produces, but it is stored anyway so chained
/// multiplications stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat3 {
    m: [f64; 9],
}

impl Mat3 {
    pub fn new(m: [f64; 9]) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self::new([
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ])
    }

    pub fn translate(x: f64, y: f64) -> Self {
        Self::new([
            1.0, 0.0, x, //
            0.0, 1.0, y, //
            0.0, 0.0, 1.0,
        ])
    }

    pub fn scale(x: f64, y: f64) -> Self {
        Self::new([
            x, 0.0, 0.0, //
            0.0, y, 0.0, //
            0.0, 0.0, 1.0,
        ])
    }

    /// Counter-clockwise rotation by `angle` radians.
    pub fn rotate(angle: f64) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        Self::new([
            c, -s, 0.0, //
            s, c, 0.0, //
            0.0, 0.0, 1.0,
        ])
    }

    /// Shear by the given angles (radians); the matrix entries are the
    /// tangents of the angles.
    pub fn shear(x_angle: f64, y_angle: f64) -> Self {
        let x = x_angle.tan();
        let y = y_angle.tan();
        Self::new([
            1.0, x, 0.0, //
            y, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ])
    }

    pub fn mul(&self, other: &Mat3) -> Mat3 {
        let a = &self.m;
        let b = &other.m;
        let mut m = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                m[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Mat3::new(m)
    }

    /// Transform a point (homogeneous w = 1, translation applies).
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x * self.m[0] + p.y * self.m[1] + self.m[2],
            p.x * self.m[3] + p.y * self.m[4] + self.m[5],
        )
    }

    /// Transform a direction (homogeneous w = 0, translation ignored).
    pub fn transform_direction(&self, d: Vec2) -> Vec2 {
        Vec2::new(
            d.x * self.m[0] + d.y * self.m[1],
            d.x * self.m[3] + d.y * self.m[4],
        )
    }

    /// Full 3×3 inverse via cofactor expansion. Returns `None` for a
    /// singular matrix (zero determinant), e.g. a scale of 0.
    pub fn invert(&self) -> Option<Mat3> {
        let m = &self.m;
        let det01 = m[8] * m[4] - m[5] * m[7];
        let det11 = -m[8] * m[3] + m[5] * m[6];
        let det21 = m[7] * m[3] - m[4] * m[6];

        let det = m[0] * det01 + m[1] * det11 + m[2] * det21;
        if det == 0.0 {
            return None;
        }
        let det = 1.0 / det;

        Some(Mat3::new([
            det01 * det,
            (-m[8] * m[1] + m[2] * m[7]) * det,
            (m[5] * m[1] - m[2] * m[4]) * det,
            det11 * det,
            (m[8] * m[0] - m[2] * m[6]) * det,
            (-m[5] * m[0] + m[2] * m[3]) * det,
            det21 * det,
            (-m[7] * m[0] + m[1] * m[6]) * det,
            (m[4] * m[0] - m[1] * m[3]) * det,
        ]))
    }

    /// The six affine coefficients `(a, b, c, d, e, f)` in the column
    /// order used by SVG and canvas APIs.
    pub fn abcdef(&self) -> [f64; 6] {
        [self.m[0], self.m[3], self.m[1], self.m[4], self.m[2], self.m[5]]
    }

    pub fn as_array(&self) -> &[f64; 9] {
        &self.m
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Mat3 {
    type Output = Mat3;

    fn mul(self, other: Mat3) -> Mat3 {
        Mat3::mul(&self, &other)
    }
}

impl std::fmt::Display for Mat3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.m;
        write!(
            f,
            "Mat3({:.1} {:.1} {:.1} {:.1} {:.1} {:.1} {:.1} {:.1} {:.1})",
            m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8]
        )
    }
}
