//! Undistortion remap helper.
//!
//! Builds per-pixel lookup tables from undistorted output coordinates to
//! distorted source coordinates, for rendering corrected previews. Boundary
//! utility for visualization collaborators; the numerical core does not
//! depend on it.

use nalgebra::Vector2;

use calib_mono_core::{sample_bilinear_u8, CameraIntrinsics, Distortion, GrayImage, GrayImageView};

/// Axis-aligned crop of fully valid output pixels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-pixel remap from undistorted to distorted coordinates, same
/// intrinsics on both sides.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    pub width: u32,
    pub height: u32,
    /// Source x coordinate per output pixel, row-major.
    pub map_x: Vec<f32>,
    /// Source y coordinate per output pixel, row-major.
    pub map_y: Vec<f32>,
}

impl UndistortMap {
    /// Build the remap tables for an output of `size` pixels.
    ///
    /// Each output pixel is sent through the forward distortion (output is
    /// the ideal pinhole image, the source is distorted), so building the
    /// map costs one distortion evaluation per pixel and `remap_gray` only
    /// does bilinear lookups.
    pub fn build(intrinsics: &CameraIntrinsics, distortion: &Distortion, size: (u32, u32)) -> Self {
        let (width, height) = size;
        let n = width as usize * height as usize;
        let mut map_x = vec![0.0f32; n];
        let mut map_y = vec![0.0f32; n];

        for y in 0..height {
            for x in 0..width {
                let ideal = Vector2::new(x as f64, y as f64);
                let n_ideal = intrinsics.pixel_to_normalized(&ideal);
                let src = intrinsics.normalized_to_pixel(&distortion.distort(&n_ideal));
                let idx = y as usize * width as usize + x as usize;
                map_x[idx] = src.x as f32;
                map_y[idx] = src.y as f32;
            }
        }

        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    #[inline]
    fn is_valid(&self, idx: usize, src_w: f32, src_h: f32) -> bool {
        let x = self.map_x[idx];
        let y = self.map_y[idx];
        x >= 0.0 && y >= 0.0 && x <= src_w - 1.0 && y <= src_h - 1.0
    }

    /// Largest centered rectangle whose every pixel samples inside a source
    /// of the map's own size, or `None` if no row is fully usable.
    ///
    /// Row-wise scan: the crop spans the rows that contain valid pixels and
    /// the intersection of their valid column ranges.
    pub fn valid_region(&self) -> Option<CropRect> {
        let w = self.width as usize;
        let src_w = self.width as f32;
        let src_h = self.height as f32;

        let mut y0 = None;
        let mut y1 = 0usize;
        let mut x0 = 0usize;
        let mut x1 = w - 1;

        for y in 0..self.height as usize {
            let mut first = None;
            let mut last = None;
            for x in 0..w {
                if self.is_valid(y * w + x, src_w, src_h) {
                    if first.is_none() {
                        first = Some(x);
                    }
                    last = Some(x);
                }
            }
            let (Some(first), Some(last)) = (first, last) else {
                continue;
            };
            if y0.is_none() {
                y0 = Some(y);
            }
            y1 = y;
            x0 = x0.max(first);
            x1 = x1.min(last);
        }

        let y0 = y0?;
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some(CropRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0 + 1) as u32,
            height: (y1 - y0 + 1) as u32,
        })
    }

    /// Resample the source through the map; out-of-source pixels go black.
    pub fn remap_gray(&self, src: &GrayImageView<'_>) -> GrayImage {
        let w = self.width as usize;
        let h = self.height as usize;
        let src_w = src.width as f32;
        let src_h = src.height as f32;
        let mut out = GrayImage::new(w, h);

        for idx in 0..w * h {
            let x = self.map_x[idx];
            let y = self.map_y[idx];
            out.data[idx] = if x >= 0.0 && y >= 0.0 && x <= src_w - 1.0 && y <= src_h - 1.0 {
                sample_bilinear_u8(src, x, y)
            } else {
                0
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intr() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 300.0,
            fy: 300.0,
            cx: 160.0,
            cy: 120.0,
        }
    }

    #[test]
    fn zero_distortion_is_identity_map() {
        let map = UndistortMap::build(&intr(), &Distortion::none(), (320, 240));
        let idx = 120 * 320 + 160;
        assert!((map.map_x[idx] - 160.0).abs() < 1e-5);
        assert!((map.map_y[idx] - 120.0).abs() < 1e-5);
        assert_eq!(
            map.valid_region(),
            Some(CropRect {
                x: 0,
                y: 0,
                width: 320,
                height: 240
            })
        );
    }

    #[test]
    fn pincushion_map_shrinks_valid_region() {
        // Positive k1 pushes border samples outside the source frame.
        let dist = Distortion {
            k1: 0.4,
            ..Distortion::none()
        };
        let map = UndistortMap::build(&intr(), &dist, (320, 240));
        let crop = map.valid_region().expect("some interior stays valid");
        assert!(crop.width < 320 || crop.height < 240);
        assert!(crop.width > 100 && crop.height > 80);
    }

    #[test]
    fn remap_preserves_center_of_flat_image() {
        let mut src = GrayImage::new(320, 240);
        src.data.fill(128);
        let dist = Distortion {
            k1: -0.1,
            ..Distortion::none()
        };
        let map = UndistortMap::build(&intr(), &dist, (320, 240));
        let out = map.remap_gray(&src.as_view());
        assert_eq!(out.data[120 * 320 + 160], 128);
    }
}
