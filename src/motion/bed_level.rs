// src/motion/bed_level.rs
use std::sync::Arc;

/// Corrects a raw Cartesian point for tilt of the print surface.
pub trait BedLevelTransform {
    fn transform(&self, xyz: [f64; 3]) -> [f64; 3];
}

/// Leaves points untouched; for machines with a trammed bed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdentityLevel;

impl BedLevelTransform for IdentityLevel {
    #[inline]
    fn transform(&self, xyz: [f64; 3]) -> [f64; 3] {
        xyz
    }
}

/// Linear bed-level correction, applied as `M * [x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x3 {
    rows: [[f64; 3]; 3],
}

impl Matrix3x3 {
    pub const IDENTITY: Matrix3x3 = Matrix3x3 {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[[f64; 3]; 3] {
        &self.rows
    }
}

impl Default for Matrix3x3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BedLevelTransform for Matrix3x3 {
    fn transform(&self, xyz: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = xyz;
        self.rows.map(|[a, b, c]| a * x + b * y + c * z)
    }
}

impl<T: BedLevelTransform + ?Sized> BedLevelTransform for Arc<T> {
    fn transform(&self, xyz: [f64; 3]) -> [f64; 3] {
        (**self).transform(xyz)
    }
}
