//! Frame loading from an image directory.
//!
//! The frame sampler seam: deterministic enumeration (lexicographic file
//! order) and even-interval subsampling when more frames are available than
//! requested, the way the upstream video-extraction step thins a recording.

use std::fs;
use std::path::{Path, PathBuf};

use calib_mono_core::{CalibrationError, GrayImage};

use crate::pipeline::FrameData;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

fn subsample_indices(total: usize, max_frames: usize) -> Vec<usize> {
    if max_frames == 0 || total <= max_frames {
        return (0..total).collect();
    }
    let interval = (total / max_frames).max(1);
    (0..total).step_by(interval).take(max_frames).collect()
}

/// Load calibration frames from `dir` in lexicographic order.
///
/// `max_frames` keeps an evenly spaced subset when the directory holds more
/// images. Unreadable images are an [`CalibrationError::Input`]: a frame
/// the operator pointed at but the pipeline cannot decode is misuse, not a
/// detection failure.
pub fn load_frames_from_dir(
    dir: impl AsRef<Path>,
    max_frames: Option<usize>,
) -> Result<Vec<FrameData>, CalibrationError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        CalibrationError::Input(format!("cannot read frame directory {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CalibrationError::Input(format!(
            "no image files in {}",
            dir.display()
        )));
    }

    let indices = subsample_indices(paths.len(), max_frames.unwrap_or(0));
    let mut frames = Vec::with_capacity(indices.len());
    for idx in indices {
        let path = &paths[idx];
        let gray = image::open(path)
            .map_err(|e| {
                CalibrationError::Input(format!("cannot read image {}: {e}", path.display()))
            })?
            .to_luma8();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("frame")
            .to_string();
        frames.push(FrameData {
            id,
            image: GrayImage {
                width: gray.width() as usize,
                height: gray.height() as usize,
                data: gray.into_raw(),
            },
        });
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsampling_keeps_everything_when_under_limit() {
        assert_eq!(subsample_indices(5, 30), vec![0, 1, 2, 3, 4]);
        assert_eq!(subsample_indices(5, 0), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn subsampling_spreads_evenly() {
        let picked = subsample_indices(90, 30);
        assert_eq!(picked.len(), 30);
        assert_eq!(picked[0], 0);
        assert_eq!(picked[1], 3);
        assert_eq!(picked[29], 87);
    }

    #[test]
    fn subsampling_caps_at_max_frames() {
        // 100 / 30 rounds the interval down; the cap still holds.
        let picked = subsample_indices(100, 30);
        assert_eq!(picked.len(), 30);
        assert!(picked.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn missing_directory_is_an_input_error() {
        let err = load_frames_from_dir("/nonexistent/frames", None).unwrap_err();
        assert!(matches!(err, CalibrationError::Input(_)));
    }
}
