use nalgebra::{Matrix3, Vector2};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics with zero skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in pixels along X.
    pub fx: f64,
    /// Focal length in pixels along Y.
    pub fy: f64,
    /// Principal point X coordinate in pixels.
    pub cx: f64,
    /// Principal point Y coordinate in pixels.
    pub cy: f64,
}

impl CameraIntrinsics {
    /// The 3x3 camera matrix K (row-major: fx at [0][0], fy at [1][1],
    /// cx at [0][2], cy at [1][2]).
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Extract (fx, fy, cx, cy) from a camera matrix, dropping any skew term.
    pub fn from_k_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    #[inline]
    pub fn normalized_to_pixel(&self, n: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    #[inline]
    pub fn pixel_to_normalized(&self, p: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }

    /// Rescale intrinsics for deployment at a different image width.
    ///
    /// Linear approximation: fx, fy, cx, cy scale with the width ratio and
    /// distortion coefficients are left untouched, ignoring their nonlinear
    /// interaction with the new scale. Adequate for moderate rescaling;
    /// recalibrate at the target resolution when accuracy matters.
    pub fn scaled_by(&self, ratio: f64) -> Self {
        Self {
            fx: self.fx * ratio,
            fy: self.fy * ratio,
            cx: self.cx * ratio,
            cy: self.cy * ratio,
        }
    }
}
