//! Joint calibration problem: packing, residuals, and the solve entry point.

use nalgebra::{DVector, Point2, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use calib_mono_core::{
    estimate_homography, project_point, CalibrationError, CalibrationObserver, CameraIntrinsics,
    Correspondence, Distortion, Pose,
};

use crate::init::{intrinsics_from_homographies, pose_from_homography};
use crate::lm::{minimize, LmOptions, LmReport};

/// Options of the two-phase solve.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Minimum number of valid frames for a well-posed solve.
    pub min_frames: usize,
    /// Iteration cap of the nonlinear refinement.
    pub max_iters: usize,
    /// Step-norm convergence threshold.
    pub xtol: f64,
    /// Relative cost-decrease convergence threshold.
    pub ftol: f64,
    /// Freeze k3 at zero (helpful for narrow-FOV lenses where it is barely
    /// observable).
    pub fix_k3: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            min_frames: 3,
            max_iters: 100,
            xtol: 1e-10,
            ftol: 1e-12,
            fix_k3: false,
        }
    }
}

/// Solver output: refined camera model, per-frame poses, and the residual.
#[derive(Clone, Debug)]
pub struct SolvedCalibration {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    /// One pose per input correspondence, same order.
    pub poses: Vec<Pose>,
    /// RMS pixel residual of the refinement.
    pub residual_rms: f64,
    pub report: LmReport,
}

// Parameter layout: [fx fy cx cy k1 k2 p1 p2 (k3)] + [rvec tvec] per frame.
struct Packing {
    fix_k3: bool,
}

impl Packing {
    fn intrinsic_len(&self) -> usize {
        if self.fix_k3 {
            8
        } else {
            9
        }
    }

    fn pack(
        &self,
        intrinsics: &CameraIntrinsics,
        distortion: &Distortion,
        poses: &[Pose],
    ) -> DVector<f64> {
        let mut x = Vec::with_capacity(self.intrinsic_len() + 6 * poses.len());
        x.extend_from_slice(&[
            intrinsics.fx,
            intrinsics.fy,
            intrinsics.cx,
            intrinsics.cy,
            distortion.k1,
            distortion.k2,
            distortion.p1,
            distortion.p2,
        ]);
        if !self.fix_k3 {
            x.push(distortion.k3);
        }
        for pose in poses {
            let rvec = pose.rotation.scaled_axis();
            let t = pose.translation.vector;
            x.extend_from_slice(&[rvec.x, rvec.y, rvec.z, t.x, t.y, t.z]);
        }
        DVector::from_vec(x)
    }

    fn unpack(&self, x: &DVector<f64>, n_frames: usize) -> (CameraIntrinsics, Distortion, Vec<Pose>) {
        let intrinsics = CameraIntrinsics {
            fx: x[0],
            fy: x[1],
            cx: x[2],
            cy: x[3],
        };
        let distortion = Distortion {
            k1: x[4],
            k2: x[5],
            p1: x[6],
            p2: x[7],
            k3: if self.fix_k3 { 0.0 } else { x[8] },
        };
        let base = self.intrinsic_len();
        let poses = (0..n_frames)
            .map(|f| {
                let o = base + 6 * f;
                let rvec = Vector3::new(x[o], x[o + 1], x[o + 2]);
                let t = Vector3::new(x[o + 3], x[o + 4], x[o + 5]);
                Pose::from_parts(
                    Translation3::from(t),
                    UnitQuaternion::from_scaled_axis(rvec),
                )
            })
            .collect();
        (intrinsics, distortion, poses)
    }
}

fn residuals(
    x: &DVector<f64>,
    packing: &Packing,
    correspondences: &[Correspondence],
) -> DVector<f64> {
    let (intrinsics, distortion, poses) = packing.unpack(x, correspondences.len());
    let total: usize = correspondences.iter().map(Correspondence::len).sum();
    let mut r = DVector::<f64>::zeros(2 * total);

    let mut k = 0;
    for (corr, pose) in correspondences.iter().zip(&poses) {
        for (obj, img) in corr.object_points.iter().zip(&corr.image_points) {
            let proj = project_point(&intrinsics, &distortion, pose, obj);
            r[k] = proj.x - img.x;
            r[k + 1] = proj.y - img.y;
            k += 2;
        }
    }
    r
}

/// Estimate intrinsics, distortion, and per-frame poses from accumulated
/// correspondences by closed-form initialization followed by joint
/// Levenberg-Marquardt refinement.
///
/// Failure modes: too few frames ([`CalibrationError::InsufficientData`]),
/// degenerate pose configurations or non-converging refinement
/// ([`CalibrationError::SolverDivergence`]). No partial result is ever
/// returned.
pub fn solve_intrinsics(
    correspondences: &[Correspondence],
    image_size: (u32, u32),
    options: &SolverOptions,
    observer: &mut dyn CalibrationObserver,
) -> Result<SolvedCalibration, CalibrationError> {
    if correspondences.len() < options.min_frames {
        return Err(CalibrationError::InsufficientData(format!(
            "{} valid frames, need at least {}",
            correspondences.len(),
            options.min_frames
        )));
    }
    for (k, corr) in correspondences.iter().enumerate() {
        if corr.object_points.len() != corr.image_points.len() || corr.len() < 4 {
            return Err(CalibrationError::Input(format!(
                "frame {k}: malformed correspondence ({} object / {} image points)",
                corr.object_points.len(),
                corr.image_points.len()
            )));
        }
    }

    // Phase 1: closed-form initialization, zero distortion.
    let mut homographies = Vec::with_capacity(correspondences.len());
    for (k, corr) in correspondences.iter().enumerate() {
        let obj_xy: Vec<Point2<f64>> = corr
            .object_points
            .iter()
            .map(|p| Point2::new(p.x, p.y))
            .collect();
        let h = estimate_homography(&obj_xy, &corr.image_points).ok_or_else(|| {
            CalibrationError::SolverDivergence(format!(
                "frame {k}: degenerate correspondences, homography estimation failed"
            ))
        })?;
        homographies.push(h.h);
    }

    let init_intrinsics = intrinsics_from_homographies(&homographies)?;
    let kmtx = init_intrinsics.k_matrix();
    let init_poses = homographies
        .iter()
        .map(|h| pose_from_homography(&kmtx, h))
        .collect::<Result<Vec<_>, _>>()?;

    // Phase 2: joint refinement.
    let packing = Packing {
        fix_k3: options.fix_k3,
    };
    let x0 = packing.pack(&init_intrinsics, &Distortion::none(), &init_poses);
    let lm_opts = LmOptions {
        max_iters: options.max_iters,
        xtol: options.xtol,
        ftol: options.ftol,
        ..Default::default()
    };
    let f = |x: &DVector<f64>| residuals(x, &packing, correspondences);
    let (x, report) = minimize(f, x0, &lm_opts, observer);

    if !report.converged || !report.final_cost.is_finite() {
        return Err(CalibrationError::SolverDivergence(format!(
            "refinement did not converge within {} iterations (cost {:.3e})",
            report.iterations, report.final_cost
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(CalibrationError::SolverDivergence(
            "refinement produced non-finite parameters".into(),
        ));
    }

    let (intrinsics, distortion, poses) = packing.unpack(&x, correspondences.len());
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    if intrinsics.fx <= 0.0
        || intrinsics.fy <= 0.0
        || intrinsics.cx < -w
        || intrinsics.cx > 2.0 * w
        || intrinsics.cy < -h
        || intrinsics.cy > 2.0 * h
    {
        return Err(CalibrationError::SolverDivergence(format!(
            "implausible camera parameters (fx {:.1}, fy {:.1}, c ({:.1}, {:.1}))",
            intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy
        )));
    }

    let total: usize = correspondences.iter().map(Correspondence::len).sum();
    let residual_rms = (report.final_cost / total as f64).sqrt();

    Ok(SolvedCalibration {
        intrinsics,
        distortion,
        poses,
        residual_rms,
        report,
    })
}
