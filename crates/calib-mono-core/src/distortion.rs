use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Brown-Conrady lens distortion: radial k1, k2, k3 and tangential p1, p2.
///
/// Operates on normalized (sensor-plane) coordinates, before intrinsics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0 && self.k3 == 0.0
    }

    /// Coefficients in the serialization order (k1, k2, p1, p2, k3).
    pub fn as_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    /// Apply the forward distortion model to a normalized point.
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        let x = n.x;
        let y = n.y;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert the distortion by fixed-point iteration.
    ///
    /// Converges quickly for the moderate coefficient magnitudes this model
    /// is valid for; 8 iterations match the forward model to well below a
    /// hundredth of a pixel at typical focal lengths.
    pub fn undistort(&self, d: &Vector2<f64>) -> Vector2<f64> {
        if self.is_none() {
            return *d;
        }

        let mut x = d.x;
        let mut y = d.y;
        for _ in 0..8 {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
            let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let x_new = (d.x - x_tan) / radial;
            let y_new = (d.y - y_tan) / radial;
            let delta = (x_new - x).abs() + (y_new - y).abs();
            x = x_new;
            y = y_new;
            if delta < 1e-12 {
                break;
            }
        }
        Vector2::new(x, y)
    }
}
