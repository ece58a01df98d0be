use calib_mono_chessboard::ChessboardDetector;
use calib_mono_core::{synthetic, CameraIntrinsics, Distortion, GrayImage, PatternSpec};
use nalgebra::Point2;

const WIDTH: u32 = 480;
const HEIGHT: u32 = 360;

fn camera() -> CameraIntrinsics {
    CameraIntrinsics {
        fx: 500.0,
        fy: 495.0,
        cx: 240.0,
        cy: 180.0,
    }
}

// A checkerboard has a 180-degree symmetry, so the detector's canonical
// labeling may be the reverse of the render's. Compare against both.
fn worst_corner_error(detected: &[Point2<f64>], truth: &[Point2<f64>]) -> f64 {
    assert_eq!(detected.len(), truth.len());
    let n = detected.len();
    let direct = (0..n)
        .map(|k| (detected[k] - truth[k]).norm())
        .fold(0.0f64, f64::max);
    let reversed = (0..n)
        .map(|k| (detected[k] - truth[n - 1 - k]).norm())
        .fold(0.0f64, f64::max);
    direct.min(reversed)
}

#[test]
fn recovers_corners_within_a_tenth_of_a_pixel() {
    let spec = PatternSpec::new(7, 5, 20.0).unwrap();
    let intr = camera();
    let detector = ChessboardDetector::default();

    for (k, pose) in synthetic::board_poses(&spec, &intr, WIDTH, 4)
        .iter()
        .enumerate()
    {
        let frame =
            synthetic::synthetic_frame(&intr, &Distortion::none(), pose, &spec, WIDTH, HEIGHT);
        let detected = detector
            .detect(&frame.image.as_view(), spec.cols, spec.rows)
            .unwrap_or_else(|| panic!("pattern not found in synthetic view {k}"));

        let err = worst_corner_error(&detected, &frame.corners);
        assert!(err < 0.1, "view {k}: worst corner error {err:.4} px");
    }
}

#[test]
fn detects_board_under_lens_distortion() {
    let spec = PatternSpec::new(7, 5, 20.0).unwrap();
    let intr = camera();
    let dist = Distortion {
        k1: -0.12,
        k2: 0.03,
        p1: 4.0e-4,
        p2: -2.5e-4,
        k3: 0.0,
    };
    let detector = ChessboardDetector::default();

    let pose = synthetic::board_poses(&spec, &intr, WIDTH, 1).remove(0);
    let frame = synthetic::synthetic_frame(&intr, &dist, &pose, &spec, WIDTH, HEIGHT);
    let detected = detector
        .detect(&frame.image.as_view(), spec.cols, spec.rows)
        .expect("pattern not found under distortion");

    let err = worst_corner_error(&detected, &frame.corners);
    assert!(err < 0.25, "worst corner error {err:.4} px");
}

#[test]
fn gradient_image_yields_pattern_not_found() {
    let mut img = GrayImage::new(WIDTH as usize, HEIGHT as usize);
    for y in 0..HEIGHT as usize {
        for x in 0..WIDTH as usize {
            img.data[y * WIDTH as usize + x] = ((x + y) % 256) as u8;
        }
    }
    let detector = ChessboardDetector::default();
    assert!(detector.detect(&img.as_view(), 7, 5).is_none());
}

#[test]
fn noise_image_yields_pattern_not_found() {
    // Deterministic LCG noise; plenty of spurious gradients, no grid.
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut img = GrayImage::new(WIDTH as usize, HEIGHT as usize);
    for v in img.data.iter_mut() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *v = (state >> 56) as u8;
    }
    let detector = ChessboardDetector::default();
    assert!(detector.detect(&img.as_view(), 7, 5).is_none());
}
