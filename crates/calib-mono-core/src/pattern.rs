use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Planar checkerboard layout: interior corner grid plus physical square size.
///
/// Fixed before any detection; the object-point grid derived from it is
/// shared by every frame of a calibration run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Interior corners per row.
    pub cols: usize,
    /// Interior corners per column.
    pub rows: usize,
    /// Physical square edge length (arbitrary unit, typically millimeters).
    pub square_size: f64,
}

impl PatternSpec {
    pub fn new(cols: usize, rows: usize, square_size: f64) -> Result<Self, CalibrationError> {
        if cols < 2 || rows < 2 {
            return Err(CalibrationError::Input(format!(
                "pattern needs at least 2x2 interior corners, got {cols}x{rows}"
            )));
        }
        if !square_size.is_finite() || square_size <= 0.0 {
            return Err(CalibrationError::Input(format!(
                "pattern square size must be positive, got {square_size}"
            )));
        }
        Ok(Self {
            cols,
            rows,
            square_size,
        })
    }

    pub fn corner_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Canonical object-point grid `(i*s, j*s, 0)`, row-major with `i`
    /// (column index) fastest. Index `j*cols + i` matches the detector's
    /// canonical corner order.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        let mut points = Vec::with_capacity(self.corner_count());
        for j in 0..self.rows {
            for i in 0..self.cols {
                points.push(Point3::new(
                    i as f64 * self.square_size,
                    j as f64 * self.square_size,
                    0.0,
                ));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_points_are_row_major() {
        let spec = PatternSpec::new(3, 2, 10.0).unwrap();
        let pts = spec.object_points();
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[2], Point3::new(20.0, 0.0, 0.0));
        assert_eq!(pts[3], Point3::new(0.0, 10.0, 0.0));
        assert_eq!(pts[5], Point3::new(20.0, 10.0, 0.0));
    }

    #[test]
    fn rejects_degenerate_specs() {
        assert!(PatternSpec::new(1, 6, 10.0).is_err());
        assert!(PatternSpec::new(9, 6, 0.0).is_err());
        assert!(PatternSpec::new(9, 6, -1.0).is_err());
        assert!(PatternSpec::new(9, 6, f64::NAN).is_err());
    }
}
