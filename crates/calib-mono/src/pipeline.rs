//! End-to-end calibration pipeline.
//!
//! Control flow: detect (per frame, parallel) -> accumulate correspondences
//! (ordered, invariant-checked) -> solve (batch) -> evaluate. Per-frame
//! detection failures are recoverable (the frame is excluded); everything
//! after accumulation either succeeds completely or aborts with a terminal
//! error and no partial result.

use log::{debug, info};
use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use calib_mono_chessboard::{ChessboardDetector, DetectorParams};
use calib_mono_core::{
    CalibrationError, CalibrationObserver, CalibrationResult, Correspondence, GrayImage,
    PatternSpec, PipelineStage,
};
use calib_mono_solver::{evaluate_reprojection, solve_intrinsics, SolverOptions};

/// One candidate frame from the frame sampler.
#[derive(Clone, Debug)]
pub struct FrameData {
    /// Stable identifier, e.g. the source file stem.
    pub id: String,
    pub image: GrayImage,
}

/// Detector output for one frame. `corners: None` marks pattern-not-found.
#[derive(Clone, Debug)]
pub struct DetectedFrame {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Full corner grid in canonical row-major order, or `None`.
    pub corners: Option<Vec<Point2<f64>>>,
}

/// Detector + solver knobs for one run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub detector: DetectorParams,
    pub solver: SolverOptions,
}

/// Which frames contributed to the calibration.
#[derive(Clone, Debug)]
pub struct DetectionReport {
    pub total_frames: usize,
    pub used_frames: Vec<String>,
    pub rejected_frames: Vec<String>,
}

/// Calibration result plus run diagnostics.
#[derive(Clone, Debug)]
pub struct CalibrationOutcome {
    pub result: CalibrationResult,
    pub detection: DetectionReport,
    /// RMS reprojection error per used frame, in `used_frames` order.
    pub per_frame_rms: Vec<f64>,
}

/// Append-only correspondence accumulation.
///
/// The object grid is derived once from the pattern spec; every accepted
/// frame contributes one complete, index-aligned correspondence. The first
/// accepted frame fixes the canonical image size; later mismatches are an
/// operator error, not a recoverable condition.
pub struct CorrespondenceSet {
    object_grid: Vec<Point3<f64>>,
    image_size: Option<(u32, u32)>,
    frames: Vec<Correspondence>,
    used_ids: Vec<String>,
}

impl CorrespondenceSet {
    pub fn new(spec: &PatternSpec) -> Self {
        Self {
            object_grid: spec.object_points(),
            image_size: None,
            frames: Vec::new(),
            used_ids: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    /// Append one detected frame. Returns whether the frame was used.
    pub fn push_frame(&mut self, frame: &DetectedFrame) -> Result<bool, CalibrationError> {
        let Some(corners) = &frame.corners else {
            return Ok(false);
        };
        if corners.len() != self.object_grid.len() {
            return Err(CalibrationError::Input(format!(
                "frame {}: {} corners for a {}-point pattern",
                frame.id,
                corners.len(),
                self.object_grid.len()
            )));
        }

        match self.image_size {
            None => self.image_size = Some((frame.width, frame.height)),
            Some((w, h)) if (w, h) != (frame.width, frame.height) => {
                return Err(CalibrationError::Input(format!(
                    "frame {}: resolution {}x{} differs from established {}x{}",
                    frame.id, frame.width, frame.height, w, h
                )));
            }
            Some(_) => {}
        }

        self.frames.push(Correspondence {
            object_points: self.object_grid.clone(),
            image_points: corners.clone(),
        });
        self.used_ids.push(frame.id.clone());
        Ok(true)
    }

    fn into_parts(self) -> Result<(Vec<Correspondence>, (u32, u32), Vec<String>), CalibrationError> {
        let Some(size) = self.image_size else {
            return Err(CalibrationError::InsufficientData(
                "pattern was not found in any frame".into(),
            ));
        };
        Ok((self.frames, size, self.used_ids))
    }
}

/// Run the full calibration pipeline over an ordered frame sequence.
pub fn calibrate(
    frames: &[FrameData],
    spec: &PatternSpec,
    params: &CalibrationParams,
    observer: &mut dyn CalibrationObserver,
) -> Result<CalibrationOutcome, CalibrationError> {
    if frames.is_empty() {
        return Err(CalibrationError::Input("no input frames".into()));
    }

    observer.on_stage(PipelineStage::Detection);
    let detector = ChessboardDetector::new(params.detector.clone());

    // Frames are independent; fan detection out and merge in input order so
    // accumulation (and therefore pose indexing) stays deterministic.
    let detected: Vec<DetectedFrame> = frames
        .par_iter()
        .map(|frame| DetectedFrame {
            id: frame.id.clone(),
            width: frame.image.width as u32,
            height: frame.image.height as u32,
            corners: detector.detect(&frame.image.as_view(), spec.cols, spec.rows),
        })
        .collect();

    let mut set = CorrespondenceSet::new(spec);
    let mut used_frames = Vec::new();
    let mut rejected_frames = Vec::new();
    for (index, frame) in detected.iter().enumerate() {
        let used = set.push_frame(frame)?;
        observer.on_detection(index, detected.len(), used);
        if used {
            used_frames.push(frame.id.clone());
        } else {
            rejected_frames.push(frame.id.clone());
        }
    }
    info!(
        "pattern found in {}/{} frames",
        used_frames.len(),
        frames.len()
    );

    let (correspondences, image_size, _) = set.into_parts()?;

    observer.on_stage(PipelineStage::Solving);
    let solved = solve_intrinsics(&correspondences, image_size, &params.solver, observer)?;

    observer.on_stage(PipelineStage::Evaluation);
    let stats = evaluate_reprojection(
        &solved.intrinsics,
        &solved.distortion,
        &solved.poses,
        &correspondences,
    );
    info!("rms reprojection error: {:.4} px", stats.rms);

    Ok(CalibrationOutcome {
        result: CalibrationResult {
            intrinsics: solved.intrinsics,
            distortion: solved.distortion,
            image_width: image_size.0,
            image_height: image_size.1,
            reprojection_error: stats.rms,
        },
        detection: DetectionReport {
            total_frames: frames.len(),
            used_frames,
            rejected_frames,
        },
        per_frame_rms: stats.per_frame_rms,
    })
}

/// Observer that forwards progress to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl CalibrationObserver for LogObserver {
    fn on_detection(&mut self, index: usize, total: usize, detected: bool) {
        debug!(
            "frame {}/{}: {}",
            index + 1,
            total,
            if detected { "pattern found" } else { "no pattern" }
        );
    }

    fn on_solver_iteration(&mut self, iteration: usize, cost: f64) {
        debug!("solver iteration {iteration}: cost {cost:.6e}");
    }

    fn on_stage(&mut self, stage: PipelineStage) {
        info!("stage: {stage:?}");
    }
}
