use serde::{Deserialize, Serialize};

/// Tuning knobs for the checkerboard detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Radius of the 16-point sampling ring of the corner response, in
    /// pixels.
    pub response_radius: f32,

    /// Keep response maxima above `threshold_rel * max_response`.
    pub threshold_rel: f32,

    /// Absolute response floor, in intensity units. Guards against frames
    /// where the relative threshold would promote noise (no board in view).
    pub min_strength: f32,

    /// Square radius of non-maximum suppression.
    pub nms_radius: usize,

    /// Upper bound on candidates fed to grid assembly, strongest first.
    pub max_candidates: usize,

    /// Angular tolerance for grid-neighbor links, degrees.
    pub orientation_tolerance_deg: f32,

    /// Half size of the sub-pixel refinement window (5 gives 11x11).
    pub refine_half_window: usize,

    /// Iteration cap of the sub-pixel refinement.
    pub refine_max_iters: usize,

    /// Positional update (pixels) below which refinement stops.
    pub refine_epsilon: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            response_radius: 5.0,
            threshold_rel: 0.2,
            min_strength: 40.0,
            nms_radius: 4,
            max_candidates: 512,
            orientation_tolerance_deg: 25.0,
            refine_half_window: 5,
            refine_max_iters: 30,
            refine_epsilon: 1e-3,
        }
    }
}
