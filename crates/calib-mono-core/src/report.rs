use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distortion::Distortion;
use crate::error::ReportIoError;
use crate::intrinsics::CameraIntrinsics;

/// The durable output of a calibration run. Immutable once returned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationResult {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    pub image_width: u32,
    pub image_height: u32,
    /// Aggregate RMS reprojection error in pixels. Diagnostic only; large
    /// values mean a poor calibration, never a failed run.
    pub reprojection_error: f64,
}

/// Serialized form of [`CalibrationResult`]: row-major camera matrix and the
/// 5-vector `[k1, k2, p1, p2, k3]`, the layout downstream consumers read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub image_width: u32,
    pub image_height: u32,
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion_coefficients: [f64; 5],
    pub reprojection_error: f64,
}

impl CalibrationReport {
    /// Load a JSON report from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReportIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl From<&CalibrationResult> for CalibrationReport {
    fn from(result: &CalibrationResult) -> Self {
        let k = result.intrinsics;
        Self {
            image_width: result.image_width,
            image_height: result.image_height,
            camera_matrix: [
                [k.fx, 0.0, k.cx],
                [0.0, k.fy, k.cy],
                [0.0, 0.0, 1.0],
            ],
            distortion_coefficients: result.distortion.as_array(),
            reprojection_error: result.reprojection_error,
        }
    }
}

impl From<&CalibrationReport> for CalibrationResult {
    fn from(report: &CalibrationReport) -> Self {
        let m = &report.camera_matrix;
        Self {
            intrinsics: CameraIntrinsics {
                fx: m[0][0],
                fy: m[1][1],
                cx: m[0][2],
                cy: m[1][2],
            },
            distortion: Distortion::from_array(report.distortion_coefficients),
            image_width: report.image_width,
            image_height: report.image_height,
            reprojection_error: report.reprojection_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> CalibrationResult {
        CalibrationResult {
            intrinsics: CameraIntrinsics {
                fx: 912.345678,
                fy: 910.987654,
                cx: 639.5,
                cy: 359.25,
            },
            distortion: Distortion {
                k1: -0.281,
                k2: 0.0734,
                p1: 1.2e-4,
                p2: -5.6e-5,
                k3: -0.0091,
            },
            image_width: 1280,
            image_height: 720,
            reprojection_error: 0.2347,
        }
    }

    #[test]
    fn report_round_trips_through_json() {
        let result = sample_result();
        let report = CalibrationReport::from(&result);

        let json = serde_json::to_string(&report).expect("serialize");
        let parsed: CalibrationReport = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed, report);
        assert_eq!(CalibrationResult::from(&parsed), result);
    }

    #[test]
    fn camera_matrix_layout_matches_contract() {
        let report = CalibrationReport::from(&sample_result());
        assert_eq!(report.camera_matrix[0][0], 912.345678); // fx
        assert_eq!(report.camera_matrix[1][1], 910.987654); // fy
        assert_eq!(report.camera_matrix[0][2], 639.5); // cx
        assert_eq!(report.camera_matrix[1][2], 359.25); // cy
        assert_eq!(report.camera_matrix[1][0], 0.0); // no skew
        assert_eq!(report.camera_matrix[2][2], 1.0);
        assert_eq!(
            report.distortion_coefficients,
            [-0.281, 0.0734, 1.2e-4, -5.6e-5, -0.0091]
        );
    }
}
