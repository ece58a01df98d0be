//! Synthetic checkerboard scenes.
//!
//! Builds known-ground-truth fixtures for detector and solver tests: poses
//! that keep the board in view, exact projected corner locations, and
//! rendered grayscale frames produced by inverse-mapping every output pixel
//! through the camera model onto the board plane.

use nalgebra::{Matrix3, Point2, Point3, Translation3, UnitQuaternion, Vector2, Vector3};

use crate::camera::{project_point, Pose};
use crate::distortion::Distortion;
use crate::image::GrayImage;
use crate::intrinsics::CameraIntrinsics;
use crate::pattern::PatternSpec;

/// Generate `n_views` poses sweeping yaw, pitch and distance while keeping
/// the board center on the optical axis.
///
/// The base distance is chosen so the board spans roughly 60% of the image
/// width; each later view backs off by 8% and tilts further.
pub fn board_poses(
    spec: &PatternSpec,
    intrinsics: &CameraIntrinsics,
    image_width: u32,
    n_views: usize,
) -> Vec<Pose> {
    let board_width = (spec.cols + 1) as f64 * spec.square_size;
    let z_base = intrinsics.fx * board_width / (0.6 * image_width as f64);
    let center = Vector3::new(
        (spec.cols - 1) as f64 * spec.square_size * 0.5,
        (spec.rows - 1) as f64 * spec.square_size * 0.5,
        0.0,
    );

    (0..n_views)
        .map(|k| {
            let t = k as f64;
            let yaw = -0.28 + 0.14 * t;
            let pitch = 0.22 - 0.11 * t;
            let roll = 0.04 * t;
            let rotation = UnitQuaternion::from_euler_angles(pitch, yaw, roll);
            let z = z_base * (1.0 + 0.08 * t);
            let translation = Vector3::new(0.0, 0.0, z) - rotation * center;
            Pose::from_parts(Translation3::from(translation), rotation)
        })
        .collect()
}

/// Exact projections of every pattern corner, in canonical row-major order.
pub fn project_board(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    pose: &Pose,
    spec: &PatternSpec,
) -> Vec<Point2<f64>> {
    spec.object_points()
        .iter()
        .map(|p| {
            let uv = project_point(intrinsics, distortion, pose, p);
            Point2::new(uv.x, uv.y)
        })
        .collect()
}

const SHADE_DARK: f32 = 25.0;
const SHADE_LIGHT: f32 = 235.0;
const SHADE_BACKGROUND: f32 = 200.0;

// 3x3 supersampling softens square edges over roughly one pixel, enough
// texture for sub-pixel refinement to lock onto.
const SUPERSAMPLE: u32 = 3;

/// Render the board seen through the full camera model.
///
/// Every output pixel is mapped back through the (inverse) distortion and
/// the plane homography to board coordinates, then shaded by square parity.
pub fn render_board(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    pose: &Pose,
    spec: &PatternSpec,
    width: u32,
    height: u32,
) -> GrayImage {
    // For the Z=0 board plane the projection collapses to H = [r1 r2 t]
    // (normalized coordinates, distortion applied separately).
    let r = pose.rotation.to_rotation_matrix();
    let rm = r.matrix();
    let mut h_plane = Matrix3::<f64>::zeros();
    h_plane.set_column(0, &rm.column(0));
    h_plane.set_column(1, &rm.column(1));
    h_plane.set_column(2, &pose.translation.vector);
    let h_inv = h_plane
        .try_inverse()
        .unwrap_or_else(Matrix3::identity);

    let s = spec.square_size;
    let n_sub = SUPERSAMPLE * SUPERSAMPLE;
    let mut img = GrayImage::new(width as usize, height as usize);

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let u = x as f64 + (sx as f64 + 0.5) / SUPERSAMPLE as f64;
                    let v = y as f64 + (sy as f64 + 0.5) / SUPERSAMPLE as f64;
                    let nd = intrinsics.pixel_to_normalized(&Vector2::new(u, v));
                    let n = distortion.undistort(&nd);
                    let b = h_inv * Vector3::new(n.x, n.y, 1.0);
                    acc += if b[2].abs() < 1e-12 {
                        SHADE_BACKGROUND
                    } else {
                        shade_at(b[0] / b[2], b[1] / b[2], s, spec.cols, spec.rows)
                    };
                }
            }
            let value = (acc / n_sub as f32).clamp(0.0, 255.0) as u8;
            img.data[y as usize * width as usize + x as usize] = value;
        }
    }
    img
}

// Squares occupy indices [-1, cols-1] x [-1, rows-1] so interior corners
// land at (i*s, j*s) for i in [0, cols), j in [0, rows).
fn shade_at(bx: f64, by: f64, square: f64, cols: usize, rows: usize) -> f32 {
    let mx = (bx / square).floor();
    let my = (by / square).floor();
    if mx < -1.0 || my < -1.0 || mx > (cols - 1) as f64 || my > (rows - 1) as f64 {
        return SHADE_BACKGROUND;
    }
    if (mx + my).rem_euclid(2.0) == 0.0 {
        SHADE_DARK
    } else {
        SHADE_LIGHT
    }
}

/// A rendered frame together with its exact corner projections.
pub struct SyntheticFrame {
    pub image: GrayImage,
    pub corners: Vec<Point2<f64>>,
}

/// Render one frame and its ground-truth corners.
pub fn synthetic_frame(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    pose: &Pose,
    spec: &PatternSpec,
    width: u32,
    height: u32,
) -> SyntheticFrame {
    SyntheticFrame {
        image: render_board(intrinsics, distortion, pose, spec, width, height),
        corners: project_board(intrinsics, distortion, pose, spec),
    }
}

/// Exact noise-free correspondences for solver-only tests (no rendering).
pub fn synthetic_correspondences(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    poses: &[Pose],
    spec: &PatternSpec,
) -> Vec<crate::camera::Correspondence> {
    let object_points: Vec<Point3<f64>> = spec.object_points();
    poses
        .iter()
        .map(|pose| crate::camera::Correspondence {
            object_points: object_points.clone(),
            image_points: project_board(intrinsics, distortion, pose, spec),
        })
        .collect()
}
