//! Closed-form initialization from plane homographies.

use nalgebra::{DMatrix, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};

use calib_mono_core::{CalibrationError, CameraIntrinsics, Pose};

/// Build the 6-vector v_ij(H) of Zhang's method for columns i, j of H.
fn v_ij(hmtx: &Matrix3<f64>, i: usize, j: usize) -> nalgebra::SVector<f64, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);

    nalgebra::SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

fn degenerate(msg: impl Into<String>) -> CalibrationError {
    CalibrationError::SolverDivergence(msg.into())
}

/// Estimate the camera matrix K from plane homographies via Zhang's linear
/// solve on the image of the absolute conic.
///
/// Needs at least 3 homographies from genuinely different poses. Frames that
/// share one pose make the constraint system rank-deficient; that and every
/// other conic degeneracy is reported as an error, never as a fabricated K.
pub(crate) fn intrinsics_from_homographies(
    hmtxs: &[Matrix3<f64>],
) -> Result<CameraIntrinsics, CalibrationError> {
    if hmtxs.len() < 3 {
        return Err(CalibrationError::InsufficientData(format!(
            "need at least 3 homographies for intrinsics initialization, got {}",
            hmtxs.len()
        )));
    }

    let m = hmtxs.len();
    let mut vmtx = DMatrix::<f64>::zeros(2 * m, 6);

    for (k, hmtx) in hmtxs.iter().enumerate() {
        let v11 = v_ij(hmtx, 0, 0);
        let v22 = v_ij(hmtx, 1, 1);
        let v12 = v_ij(hmtx, 0, 1);

        // Row 2k: v_12^T;  row 2k+1: (v_11 - v_22)^T
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    // Solve V b = 0 via SVD. b must be unique up to scale: a second
    // near-zero singular value means the poses do not constrain the conic
    // (e.g. every frame shows the same view).
    let svd = vmtx.svd(true, true);
    let sv = &svd.singular_values;
    let largest = sv[0];
    if !(largest > 0.0) {
        return Err(degenerate("all-zero homography constraint system"));
    }
    if sv[sv.len() - 2] < 1e-10 * largest {
        return Err(degenerate(
            "degenerate pose configuration: frames do not constrain the intrinsics",
        ));
    }
    let v_t = svd.v_t.ok_or_else(|| degenerate("SVD failed on the conic system"))?;
    let b = v_t.row(v_t.nrows() - 1);

    let b11 = b[0];
    let b12 = b[1];
    let b22 = b[2];
    let b13 = b[3];
    let b23 = b[4];
    let b33 = b[5];

    // From Zhang's paper:
    //
    // v0 = (B12 B13 - B11 B23) / (B11 B22 - B12^2)
    // λ = B33 - (B13^2 + v0 (B12 B13 - B11 B23)) / B11
    // α = sqrt(λ / B11)
    // β = sqrt(λ B11 / (B11 B22 - B12^2))
    // γ = -B12 α^2 β / λ
    // u0 = γ v0 / β - B13 α^2 / λ
    //
    // The camera model is zero-skew, so γ is computed only to place u0 and
    // then dropped.

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-8 {
        return Err(degenerate("degenerate conic in intrinsics estimation"));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    if lambda.signum() != b11.signum() {
        return Err(degenerate("invalid conic sign; check homographies"));
    }
    if lambda * b11 / denom <= 0.0 {
        return Err(degenerate("indefinite conic in intrinsics estimation"));
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    if !(alpha.is_finite() && beta.is_finite() && u0.is_finite() && v0.is_finite()) {
        return Err(degenerate("non-finite intrinsics from conic solve"));
    }

    Ok(CameraIntrinsics {
        fx: alpha,
        fy: beta,
        cx: u0,
        cy: v0,
    })
}

/// Estimate the board pose (Z=0 plane) from intrinsics K and homography H.
///
/// Classic decomposition `H ~ K [r1 r2 t]`: normalize the first two
/// columns, complete with the cross product, project onto SO(3) by SVD.
pub(crate) fn pose_from_homography(
    kmtx: &Matrix3<f64>,
    hmtx: &Matrix3<f64>,
) -> Result<Pose, CalibrationError> {
    let k_inv = kmtx
        .try_inverse()
        .ok_or_else(|| degenerate("singular camera matrix in pose recovery"))?;

    let k_inv_h1 = k_inv * hmtx.column(0);
    let k_inv_h2 = k_inv * hmtx.column(1);
    let k_inv_h3 = k_inv * hmtx.column(2).into_owned();

    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 < 1e-12 || norm2 < 1e-12 {
        return Err(degenerate("vanishing homography columns in pose recovery"));
    }
    // Scale factor: normalize first two columns (average for robustness).
    let mut lambda = 1.0 / ((norm1 + norm2) * 0.5);

    // H is defined up to sign; the board must be in front of the camera.
    if (lambda * k_inv_h3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = (lambda * k_inv_h1).into_owned();
    let r2 = (lambda * k_inv_h2).into_owned();
    let r3 = r1.cross(&r2);

    let mut r_mat = Matrix3::<f64>::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Project onto SO(3) (polar decomposition via SVD).
    let svd = r_mat.svd(true, true);
    let mut u = svd.u.ok_or_else(|| degenerate("SVD failed in pose recovery"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| degenerate("SVD failed in pose recovery"))?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let r_orth = u * v_t;

    let t_vec: Vector3<f64> = lambda * k_inv_h3;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));

    Ok(Pose::from_parts(Translation3::from(t_vec), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn make_kmtx() -> (CameraIntrinsics, Matrix3<f64>) {
        let intr = CameraIntrinsics {
            fx: 900.0,
            fy: 880.0,
            cx: 640.0,
            cy: 360.0,
        };
        (intr, intr.k_matrix())
    }

    fn synthetic_homography(
        kmtx: &Matrix3<f64>,
        rot: Rotation3<f64>,
        t: Vector3<f64>,
    ) -> Matrix3<f64> {
        // For the Z=0 plane, H = K [r1 r2 t]
        let r_mat = rot.matrix();
        let mut hmtx = Matrix3::zeros();
        hmtx.set_column(0, &(kmtx * r_mat.column(0)));
        hmtx.set_column(1, &(kmtx * r_mat.column(1)));
        hmtx.set_column(2, &(kmtx * t));
        hmtx
    }

    #[test]
    fn recovers_kmtx_from_three_views() {
        let (intr_gt, kmtx) = make_kmtx();
        let hmts = vec![
            synthetic_homography(
                &kmtx,
                Rotation3::from_euler_angles(0.1, 0.0, 0.05),
                Vector3::new(0.1, -0.05, 1.0),
            ),
            synthetic_homography(
                &kmtx,
                Rotation3::from_euler_angles(-0.05, 0.15, -0.1),
                Vector3::new(-0.05, 0.1, 1.2),
            ),
            synthetic_homography(
                &kmtx,
                Rotation3::from_euler_angles(0.2, -0.1, 0.0),
                Vector3::new(0.0, 0.0, 0.9),
            ),
        ];

        let intr = intrinsics_from_homographies(&hmts).expect("init");
        assert!((intr.fx - intr_gt.fx).abs() < 5.0, "fx mismatch: {}", intr.fx);
        assert!((intr.fy - intr_gt.fy).abs() < 5.0, "fy mismatch: {}", intr.fy);
        assert!((intr.cx - intr_gt.cx).abs() < 10.0, "cx mismatch: {}", intr.cx);
        assert!((intr.cy - intr_gt.cy).abs() < 10.0, "cy mismatch: {}", intr.cy);
    }

    #[test]
    fn identical_views_are_rejected() {
        let (_, kmtx) = make_kmtx();
        let h = synthetic_homography(
            &kmtx,
            Rotation3::from_euler_angles(0.1, 0.1, 0.0),
            Vector3::new(0.05, 0.0, 1.0),
        );
        let hmts = vec![h, h, h, h];
        assert!(matches!(
            intrinsics_from_homographies(&hmts),
            Err(CalibrationError::SolverDivergence(_))
        ));
    }

    #[test]
    fn pose_round_trips_through_homography() {
        let (_, kmtx) = make_kmtx();
        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let t = Vector3::new(0.1, -0.05, 1.0);
        let hmtx = synthetic_homography(&kmtx, rot, t);

        let pose = pose_from_homography(&kmtx, &hmtx).expect("pose");

        assert!((pose.translation.vector - t).norm() < 1e-9);
        let r_est_binding = pose.rotation.to_rotation_matrix();
        let r_diff = r_est_binding.matrix().transpose() * rot.matrix();
        let angle = ((r_diff.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos();
        assert!(angle < 1e-9, "rotation error too large: {angle}");
    }

    #[test]
    fn sign_flipped_homography_still_puts_board_in_front() {
        let (_, kmtx) = make_kmtx();
        let rot = Rotation3::from_euler_angles(0.05, 0.1, 0.0);
        let t = Vector3::new(0.0, 0.1, 1.5);
        let hmtx = -synthetic_homography(&kmtx, rot, t);

        let pose = pose_from_homography(&kmtx, &hmtx).expect("pose");
        assert!(pose.translation.vector.z > 0.0);
    }
}
