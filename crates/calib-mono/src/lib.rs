//! High-level facade crate for the `calib-mono-*` workspace.
//!
//! Derives a monocular camera's intrinsics, distortion coefficients, and
//! reprojection-error figure from checkerboard frames: per-frame corner
//! detection feeds an append-only correspondence accumulator, a two-phase
//! solver (closed-form init + Levenberg-Marquardt) fits the camera model,
//! and the reprojection evaluator scores the result.
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_mono::{calibrate, CalibrationParams, FrameData, PatternSpec};
//! use calib_mono::core::NullObserver;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = PatternSpec::new(9, 6, 20.0)?;
//! let frames: Vec<FrameData> = calib_mono::load_frames_from_dir("frames", Some(30))?;
//! let outcome = calibrate(&frames, &spec, &CalibrationParams::default(), &mut NullObserver)?;
//! println!("rms reprojection error: {:.4} px", outcome.result.reprojection_error);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `calib_mono::core`: shared types (pattern, intrinsics, distortion,
//!   homography, report, observer).
//! - `calib_mono::chessboard`: checkerboard corner detection.
//! - `calib_mono::solver`: calibration solve, reprojection evaluation,
//!   undistortion maps.
//! - crate root: the pipeline (`calibrate`) plus frame loading and the CLI
//!   binary behind the `image`/`cli` features.

pub use calib_mono_chessboard as chessboard;
pub use calib_mono_core as core;
pub use calib_mono_solver as solver;

mod pipeline;

#[cfg(feature = "image")]
mod frames;

pub use pipeline::{
    calibrate, CalibrationOutcome, CalibrationParams, CorrespondenceSet, DetectedFrame,
    DetectionReport, FrameData, LogObserver,
};

#[cfg(feature = "image")]
pub use frames::load_frames_from_dir;

pub use calib_mono_chessboard::{ChessboardDetector, DetectorParams};
pub use calib_mono_core::{
    CalibrationError, CalibrationReport, CalibrationResult, CameraIntrinsics, Distortion,
    GrayImage, PatternSpec,
};
pub use calib_mono_solver::{SolverOptions, UndistortMap};
