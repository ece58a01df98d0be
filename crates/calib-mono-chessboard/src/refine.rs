//! Sub-pixel corner refinement.
//!
//! Iterative gradient-symmetry search: inside the window around the current
//! estimate, every image gradient g at point q contributes the constraint
//! g . (q - c) = 0 (the gradient at a point on a black/white edge is
//! orthogonal to the vector from the true saddle point). Accumulating the
//! weighted normal equations and solving the 2x2 system repositions the
//! estimate; iterate until the update drops below a tolerance or the
//! iteration cap is reached.

use nalgebra::{Matrix2, Point2, Vector2};

use calib_mono_core::{sample_bilinear, GrayImageView};

pub(crate) fn refine_corner(
    img: &GrayImageView<'_>,
    start: Point2<f64>,
    half_window: usize,
    max_iters: usize,
    epsilon: f64,
) -> Point2<f64> {
    let half = half_window as i32;
    let sigma2 = {
        let s = half_window as f64 * 0.5;
        2.0 * s * s
    };

    let mut center = start;

    for _ in 0..max_iters {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();

        for wy in -half..=half {
            for wx in -half..=half {
                let q = Vector2::new(wx as f64, wy as f64);
                let x = (center.x + q.x) as f32;
                let y = (center.y + q.y) as f32;

                let gx = 0.5
                    * (sample_bilinear(img, x + 1.0, y) - sample_bilinear(img, x - 1.0, y))
                        as f64;
                let gy = 0.5
                    * (sample_bilinear(img, x, y + 1.0) - sample_bilinear(img, x, y - 1.0))
                        as f64;

                let w = (-(q.x * q.x + q.y * q.y) / sigma2).exp();
                let gxx = w * gx * gx;
                let gyy = w * gy * gy;
                let gxy = w * gx * gy;

                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b.x += gxx * q.x + gxy * q.y;
                b.y += gxy * q.x + gyy * q.y;
            }
        }

        let Some(inv) = a.try_inverse() else {
            break; // textureless window
        };
        let shift = inv * b;
        if !shift.x.is_finite() || !shift.y.is_finite() {
            break;
        }

        center += shift;
        if shift.norm() < epsilon {
            break;
        }
        // A corner this far from the initial estimate belongs to a
        // different feature; stop rather than wander.
        if (center - start).norm() > half_window as f64 {
            break;
        }
    }

    center
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_mono_core::GrayImage;

    // Checkerboard X-junction at (cx, cy), box-filtered over unit pixels.
    fn junction_image(size: usize, cx: f64, cy: f64) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let fx = (x as f64 + 0.5 - cx).clamp(0.0, 1.0);
                let fy = (y as f64 + 0.5 - cy).clamp(0.0, 1.0);
                // Coverage of the two dark quadrants over the pixel.
                let dark = fx * fy + (1.0 - fx) * (1.0 - fy);
                let v = 230.0 - 210.0 * dark;
                img.data[y * size + x] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        img
    }

    #[test]
    fn recovers_subpixel_junction_position() {
        let truth = (15.3, 16.7);
        let img = junction_image(32, truth.0, truth.1);
        let refined = refine_corner(
            &img.as_view(),
            Point2::new(15.0, 17.0),
            5,
            30,
            1e-4,
        );
        assert!(
            (refined.x - truth.0).abs() < 0.1,
            "x off by {}",
            (refined.x - truth.0).abs()
        );
        assert!(
            (refined.y - truth.1).abs() < 0.1,
            "y off by {}",
            (refined.y - truth.1).abs()
        );
    }

    #[test]
    fn flat_window_returns_start() {
        let img = GrayImage::new(32, 32);
        let start = Point2::new(16.0, 16.0);
        let refined = refine_corner(&img.as_view(), start, 5, 30, 1e-4);
        assert_eq!(refined, start);
    }
}
