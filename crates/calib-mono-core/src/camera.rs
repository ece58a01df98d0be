use nalgebra::{Isometry3, Point2, Point3, Vector2};

use crate::distortion::Distortion;
use crate::intrinsics::CameraIntrinsics;

/// Pose of the pattern relative to the camera: maps board-frame points into
/// the camera frame. Transient; produced and consumed by the solver and the
/// reprojection evaluator.
pub type Pose = Isometry3<f64>;

/// Index-aligned (object point, image point) pairs from one frame.
///
/// Object points are the same canonical grid for every frame of a run;
/// image points come from one successful detection. Append-only once built.
#[derive(Clone, Debug)]
pub struct Correspondence {
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

impl Correspondence {
    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }
}

// Depth guard: points that wander behind the camera during an optimizer
// probe must still produce a finite (huge) residual so the step is rejected
// rather than poisoning the whole solve with NaNs.
const MIN_DEPTH: f64 = 1e-9;

/// Forward camera model: board point -> pose transform -> perspective
/// divide -> distortion -> pixel.
#[inline]
pub fn project_point(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    pose: &Pose,
    object_point: &Point3<f64>,
) -> Vector2<f64> {
    let pc = pose.transform_point(object_point);
    let z = pc.z.max(MIN_DEPTH);
    let n = Vector2::new(pc.x / z, pc.y / z);
    intrinsics.normalized_to_pixel(&distortion.distort(&n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    #[test]
    fn projects_board_origin_through_identity_pose() {
        let intr = CameraIntrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 320.0,
            cy: 240.0,
        };
        let pose = Pose::from_parts(
            Translation3::new(0.0, 0.0, 2.0),
            UnitQuaternion::identity(),
        );
        let uv = project_point(&intr, &Distortion::none(), &pose, &Point3::origin());
        assert_relative_eq!(uv.x, 320.0, epsilon = 1e-12);
        assert_relative_eq!(uv.y, 240.0, epsilon = 1e-12);
    }

    #[test]
    fn off_axis_point_lands_off_center() {
        let intr = CameraIntrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
        };
        let pose = Pose::from_parts(
            Translation3::new(0.0, 0.0, 4.0),
            UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.1, 0.0)),
        );
        let uv = project_point(
            &intr,
            &Distortion::none(),
            &pose,
            &Point3::new(1.0, 0.5, 0.0),
        );
        assert!(uv.x > 320.0);
        assert!(uv.y > 240.0);
    }
}
