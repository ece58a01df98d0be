//! Ring-sample corner response.
//!
//! At an interior checkerboard corner a circle around the center crosses
//! four black/white boundaries: samples a quarter turn apart differ by the
//! full local contrast while diametrically opposite samples agree. The
//! response rewards the first, penalizes the second, and penalizes centers
//! whose intensity deviates from the ring mean (edges, blobs). Flat areas
//! score ~0, straight edges score negative, X-junctions score strongly
//! positive.

use nalgebra::Point2;

use calib_mono_core::{sample_bilinear, GrayImageView};

use crate::params::DetectorParams;

const RING_SAMPLES: usize = 16;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CornerCandidate {
    pub position: Point2<f32>,
    pub strength: f32,
    /// Local grid-edge axis, defined modulo pi/2.
    pub orientation: f32,
}

fn ring_offsets(radius: f32) -> [(f32, f32); RING_SAMPLES] {
    let mut offsets = [(0.0f32, 0.0f32); RING_SAMPLES];
    for (n, o) in offsets.iter_mut().enumerate() {
        let theta = 2.0 * std::f32::consts::PI * n as f32 / RING_SAMPLES as f32;
        *o = (radius * theta.cos(), radius * theta.sin());
    }
    offsets
}

fn ring_response(img: &GrayImageView<'_>, x: f32, y: f32, offsets: &[(f32, f32)]) -> f32 {
    let mut a = [0.0f32; RING_SAMPLES];
    let mut ring_mean = 0.0f32;
    for (n, &(dx, dy)) in offsets.iter().enumerate() {
        let v = sample_bilinear(img, x + dx, y + dy);
        a[n] = v;
        ring_mean += v;
    }
    ring_mean /= RING_SAMPLES as f32;

    let mut quarter = 0.0f32;
    let mut opposite = 0.0f32;
    for n in 0..RING_SAMPLES / 2 {
        opposite += (a[n] - a[n + 8]).abs();
        quarter += (a[n] - a[(n + 4) % RING_SAMPLES]).abs()
            + (a[n + 8] - a[(n + 12) % RING_SAMPLES]).abs();
    }

    let center = sample_bilinear(img, x, y);
    0.5 * quarter - opposite - RING_SAMPLES as f32 * (center - ring_mean).abs() / 2.0
}

/// Dominant grid-edge axis near (cx, cy), modulo pi/2.
///
/// Checkerboard edges run along two orthogonal directions, which cancel in
/// double-angle space but align at 4x the gradient angle; the quadruple
/// angle mean recovers the shared axis without any trigonometry per pixel.
fn edge_axis(img: &GrayImageView<'_>, cx: i32, cy: i32, radius: i32) -> f32 {
    let mut sum_c4 = 0.0f32;
    let mut sum_s4 = 0.0f32;

    for wy in -radius..=radius {
        for wx in -radius..=radius {
            let x = (cx + wx) as f32;
            let y = (cy + wy) as f32;
            let gx = 0.5 * (sample_bilinear(img, x + 1.0, y) - sample_bilinear(img, x - 1.0, y));
            let gy = 0.5 * (sample_bilinear(img, x, y + 1.0) - sample_bilinear(img, x, y - 1.0));
            let m = gx * gx + gy * gy;
            if m < 1e-6 {
                continue;
            }
            let c2 = (gx * gx - gy * gy) / m;
            let s2 = 2.0 * gx * gy / m;
            sum_c4 += m * (c2 * c2 - s2 * s2);
            sum_s4 += m * 2.0 * c2 * s2;
        }
    }

    0.25 * sum_s4.atan2(sum_c4)
}

/// Detect corner candidates: response map, relative + absolute threshold,
/// square-window non-maximum suppression, strongest-first ordering.
pub(crate) fn find_corner_candidates(
    img: &GrayImageView<'_>,
    params: &DetectorParams,
) -> Vec<CornerCandidate> {
    let margin = params.response_radius.ceil() as usize + 1;
    if img.width <= 2 * margin || img.height <= 2 * margin {
        return Vec::new();
    }

    let offsets = ring_offsets(params.response_radius);
    let mut response = vec![0.0f32; img.width * img.height];
    let mut max_response = 0.0f32;

    for y in margin..img.height - margin {
        for x in margin..img.width - margin {
            let r = ring_response(img, x as f32, y as f32, &offsets);
            if r > 0.0 {
                response[y * img.width + x] = r;
                max_response = max_response.max(r);
            }
        }
    }

    let threshold = (params.threshold_rel * max_response).max(params.min_strength);
    let nms = params.nms_radius as i32;
    let mut candidates = Vec::new();

    for y in margin..img.height - margin {
        'pixels: for x in margin..img.width - margin {
            let r = response[y * img.width + x];
            if r < threshold {
                continue;
            }
            // Peak within the NMS window; earlier pixel wins ties.
            for wy in -nms..=nms {
                for wx in -nms..=nms {
                    if wx == 0 && wy == 0 {
                        continue;
                    }
                    let qx = x as i32 + wx;
                    let qy = y as i32 + wy;
                    if qx < 0 || qy < 0 || qx >= img.width as i32 || qy >= img.height as i32 {
                        continue;
                    }
                    let rq = response[qy as usize * img.width + qx as usize];
                    let earlier = (qy, qx) < (y as i32, x as i32);
                    if rq > r || (rq == r && earlier) {
                        continue 'pixels;
                    }
                }
            }

            let axis_radius = params.response_radius.ceil() as i32;
            candidates.push(CornerCandidate {
                position: Point2::new(x as f32, y as f32),
                strength: r,
                orientation: edge_axis(img, x as i32, y as i32, axis_radius),
            });
        }
    }

    candidates.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    candidates.truncate(params.max_candidates);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_mono_core::GrayImage;

    // 2x2 checkerboard of `half`-sized squares meeting at the image center.
    fn cross_image(size: usize) -> GrayImage {
        let half = size / 2;
        let mut img = GrayImage::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let dark = (x < half) == (y < half);
                img.data[y * size + x] = if dark { 20 } else { 230 };
            }
        }
        img
    }

    #[test]
    fn x_junction_scores_positive_flat_scores_zero() {
        let img = cross_image(32);
        let offsets = ring_offsets(5.0);
        let at_corner = ring_response(&img.as_view(), 16.0, 16.0, &offsets);
        let at_flat = ring_response(&img.as_view(), 7.0, 7.0, &offsets);
        assert!(at_corner > 100.0, "corner response too weak: {at_corner}");
        assert!(at_flat.abs() < 1.0, "flat response not ~0: {at_flat}");
    }

    #[test]
    fn straight_edge_scores_negative() {
        let size = 32;
        let mut img = GrayImage::new(size, size);
        for y in 0..size {
            for x in 0..size {
                img.data[y * size + x] = if x < size / 2 { 20 } else { 230 };
            }
        }
        let offsets = ring_offsets(5.0);
        let at_edge = ring_response(&img.as_view(), 16.0, 16.0, &offsets);
        assert!(at_edge < 0.0, "edge response not negative: {at_edge}");
    }

    #[test]
    fn finds_single_candidate_on_cross() {
        let img = cross_image(32);
        let params = DetectorParams::default();
        let candidates = find_corner_candidates(&img.as_view(), &params);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert!((c.position.x - 16.0).abs() <= 1.0);
        assert!((c.position.y - 16.0).abs() <= 1.0);
    }

    #[test]
    fn flat_image_yields_no_candidates() {
        let img = GrayImage::new(64, 64);
        let params = DetectorParams::default();
        assert!(find_corner_candidates(&img.as_view(), &params).is_empty());
    }
}
