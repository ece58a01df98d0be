//! Reprojection-error evaluation.

use calib_mono_core::{project_point, CameraIntrinsics, Correspondence, Distortion, Pose};

/// Per-frame and aggregate reprojection statistics.
///
/// Diagnostic only: a large error means a poor calibration, but it is the
/// caller's call what to do about it; evaluation never fails a run.
#[derive(Clone, Debug)]
pub struct ReprojectionStats {
    /// RMS pixel error per frame, in correspondence order.
    pub per_frame_rms: Vec<f64>,
    /// Aggregate RMS pixel error over every point of every frame.
    pub rms: f64,
}

/// Project every object point through the solved camera model and compare
/// with the observed image points.
pub fn evaluate_reprojection(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    poses: &[Pose],
    correspondences: &[Correspondence],
) -> ReprojectionStats {
    let mut per_frame_rms = Vec::with_capacity(correspondences.len());
    let mut total_sq = 0.0;
    let mut total_points = 0usize;

    for (corr, pose) in correspondences.iter().zip(poses) {
        let mut frame_sq = 0.0;
        for (obj, img) in corr.object_points.iter().zip(&corr.image_points) {
            let proj = project_point(intrinsics, distortion, pose, obj);
            let dx = proj.x - img.x;
            let dy = proj.y - img.y;
            frame_sq += dx * dx + dy * dy;
        }
        let n = corr.len().max(1) as f64;
        per_frame_rms.push((frame_sq / n).sqrt());
        total_sq += frame_sq;
        total_points += corr.len();
    }

    let rms = (total_sq / total_points.max(1) as f64).sqrt();
    ReprojectionStats { per_frame_rms, rms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_mono_core::{synthetic, PatternSpec};

    #[test]
    fn perfect_model_scores_zero() {
        let spec = PatternSpec::new(5, 4, 15.0).unwrap();
        let intr = CameraIntrinsics {
            fx: 600.0,
            fy: 600.0,
            cx: 320.0,
            cy: 240.0,
        };
        let dist = Distortion {
            k1: -0.2,
            ..Distortion::none()
        };
        let poses = synthetic::board_poses(&spec, &intr, 640, 3);
        let corrs = synthetic::synthetic_correspondences(&intr, &dist, &poses, &spec);

        let stats = evaluate_reprojection(&intr, &dist, &poses, &corrs);
        assert!(stats.rms < 1e-10, "rms {}", stats.rms);
        assert_eq!(stats.per_frame_rms.len(), 3);
    }

    #[test]
    fn biased_observations_show_up_in_the_error() {
        let spec = PatternSpec::new(5, 4, 15.0).unwrap();
        let intr = CameraIntrinsics {
            fx: 600.0,
            fy: 600.0,
            cx: 320.0,
            cy: 240.0,
        };
        let poses = synthetic::board_poses(&spec, &intr, 640, 2);
        let mut corrs =
            synthetic::synthetic_correspondences(&intr, &Distortion::none(), &poses, &spec);
        for p in &mut corrs[1].image_points {
            p.x += 2.0;
        }

        let stats = evaluate_reprojection(&intr, &Distortion::none(), &poses, &corrs);
        assert!(stats.per_frame_rms[0] < 1e-10);
        assert!((stats.per_frame_rms[1] - 2.0).abs() < 1e-9);
        assert!(stats.rms > 1.0 && stats.rms < 2.0);
    }
}
