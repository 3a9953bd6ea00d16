//! 4x4 matrix storage and the two operations the resolver needs.
//!
//! Matrices are stored row-major for row vectors: a point is transformed as
//! `p * M`, so `view * proj` applies the view transform first. Read as
//! column-major, the same sixteen floats are the transposed matrix that
//! `glam` uses for column vectors, which is how [`StandardMath`] maps onto
//! `glam::Mat4` without copying element by element.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Matrix4(pub [f32; 16]);

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.0[12] = x;
        m.0[13] = y;
        m.0[14] = z;
        m
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.0[0] = x;
        m.0[5] = y;
        m.0[10] = z;
        m
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Element at `row`, `col` in the row-major layout.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.0[row * 4 + col]
    }

    /// Transforms a row vector.
    pub fn transform(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (col, slot) in out.iter_mut().enumerate() {
            *slot = (0..4).map(|row| v[row] * self.at(row, col)).sum();
        }
        out
    }

    fn to_glam(self) -> Mat4 {
        Mat4::from_cols_array(&self.0)
    }

    fn from_glam(m: Mat4) -> Self {
        Matrix4(m.to_cols_array())
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Matrix primitives supplied to the resolver.
pub trait MatrixOps {
    /// `a * b`: transforms by `a`, then by `b`.
    fn mul(&self, a: &Matrix4, b: &Matrix4) -> Matrix4;

    fn inverse(&self, m: &Matrix4) -> Matrix4;
}

/// `glam`-backed implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardMath;

impl MatrixOps for StandardMath {
    fn mul(&self, a: &Matrix4, b: &Matrix4) -> Matrix4 {
        Matrix4::from_glam(b.to_glam() * a.to_glam())
    }

    fn inverse(&self, m: &Matrix4) -> Matrix4 {
        Matrix4::from_glam(m.to_glam().inverse())
    }
}

impl<M: MatrixOps + ?Sized> MatrixOps for &M {
    fn mul(&self, a: &Matrix4, b: &Matrix4) -> Matrix4 {
        (**self).mul(a, b)
    }

    fn inverse(&self, m: &Matrix4) -> Matrix4 {
        (**self).inverse(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &Matrix4, b: &Matrix4) -> bool {
        a.0.iter().zip(b.0.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn product_applies_left_operand_first() {
        let math = StandardMath;
        let view = Matrix4::translation(1.0, 2.0, 3.0);
        let proj = Matrix4::scale(2.0, 2.0, 2.0);
        let view_proj = math.mul(&view, &proj);

        assert_eq!(view_proj.transform([0.0, 0.0, 0.0, 1.0]), [2.0, 4.0, 6.0, 1.0]);
        let chained = proj.transform(view.transform([1.0, 1.0, 1.0, 1.0]));
        assert_eq!(view_proj.transform([1.0, 1.0, 1.0, 1.0]), chained);
    }

    #[test]
    fn inverse_undoes_transform() {
        let math = StandardMath;
        let m = math.mul(
            &Matrix4::scale(2.0, 4.0, 8.0),
            &Matrix4::translation(-3.0, 5.0, 0.5),
        );
        let inv = math.inverse(&m);
        assert!(approx(&math.mul(&m, &inv), &Matrix4::IDENTITY));
        assert!(approx(&inv, &math.mul(
            &Matrix4::translation(3.0, -5.0, -0.5),
            &Matrix4::scale(0.5, 0.25, 0.125),
        )));
    }
}
