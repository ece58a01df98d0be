//! Planar intrinsic calibration solver.
//!
//! Two-phase estimation from accumulated board/image correspondences:
//! 1. Closed-form initialization: per-frame plane homographies, Zhang's
//!    linear solve for the camera matrix, homography decomposition for the
//!    per-frame poses, zero distortion (`init`).
//! 2. Joint Levenberg-Marquardt refinement of intrinsics, distortion and
//!    all poses against the pixel reprojection residuals (`lm`, `problem`).
//!
//! Also hosts the reprojection-error evaluator and the undistortion remap
//! helper, which consume the same entities the solver produces.

mod init;
mod lm;
mod problem;
mod reprojection;
mod undistort;

pub use lm::{LmOptions, LmReport};
pub use problem::{solve_intrinsics, SolvedCalibration, SolverOptions};
pub use reprojection::{evaluate_reprojection, ReprojectionStats};
pub use undistort::{CropRect, UndistortMap};
