use log::debug;
use nalgebra::Point2;

use calib_mono_core::GrayImageView;

use crate::grid::assemble_grid;
use crate::params::DetectorParams;
use crate::refine::refine_corner;
use crate::response::find_corner_candidates;

/// Checkerboard interior-corner detector for one grayscale frame.
///
/// `detect` returns the full grid of sub-pixel corners in canonical
/// row-major order (index `j*cols + i` is grid position (i, j)), or `None`
/// when the pattern is not found. Failure is per-frame and expected:
/// occlusion, blur, poor contrast, or a partially visible board all reject
/// the frame without affecting the rest of the pipeline.
pub struct ChessboardDetector {
    pub params: DetectorParams,
}

impl ChessboardDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn detect(
        &self,
        image: &GrayImageView<'_>,
        cols: usize,
        rows: usize,
    ) -> Option<Vec<Point2<f64>>> {
        let needed = cols * rows;
        let candidates = find_corner_candidates(image, &self.params);
        if candidates.len() < needed {
            debug!(
                "chessboard: {} corner candidates, need {}",
                candidates.len(),
                needed
            );
            return None;
        }

        let Some(order) = assemble_grid(
            &candidates,
            cols,
            rows,
            self.params.orientation_tolerance_deg,
        ) else {
            debug!(
                "chessboard: no unambiguous {}x{} grid among {} candidates",
                cols,
                rows,
                candidates.len()
            );
            return None;
        };

        let corners = order
            .iter()
            .map(|&idx| {
                let p = candidates[idx].position;
                refine_corner(
                    image,
                    Point2::new(p.x as f64, p.y as f64),
                    self.params.refine_half_window,
                    self.params.refine_max_iters,
                    self.params.refine_epsilon,
                )
            })
            .collect();
        Some(corners)
    }
}

impl Default for ChessboardDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default())
    }
}
