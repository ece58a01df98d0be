//! Command-line monocular calibration from a directory of checkerboard
//! frames.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};

use calib_mono::core::init_with_level;
use calib_mono::{
    calibrate, CalibrationParams, CalibrationReport, LogObserver, PatternSpec, UndistortMap,
};

#[derive(Parser, Debug)]
#[command(
    name = "calib-mono",
    about = "Monocular camera calibration from checkerboard frames",
    version
)]
struct Cli {
    /// Directory with calibration frames.
    frames_dir: PathBuf,

    /// Interior corner grid as WxH, e.g. 9x6.
    #[arg(short, long, default_value = "9x6")]
    board_size: String,

    /// Physical square edge length (arbitrary unit, typically millimeters).
    #[arg(short, long, default_value_t = 20.0)]
    square_size: f64,

    /// Use at most this many frames, evenly spaced (0 = all).
    #[arg(short, long, default_value_t = 30)]
    max_frames: usize,

    /// Output JSON report path.
    #[arg(short, long, default_value = "camera_calibration.json")]
    output: PathBuf,

    /// Write an undistorted preview of the first used frame here.
    #[arg(long)]
    undistorted: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_board_size(raw: &str) -> Result<(usize, usize), String> {
    let mut it = raw.split('x');
    let (Some(w), Some(h), None) = (it.next(), it.next(), it.next()) else {
        return Err(format!("board size must be WxH, e.g. 9x6, got '{raw}'"));
    };
    let cols = w.parse().map_err(|_| format!("bad board width '{w}'"))?;
    let rows = h.parse().map_err(|_| format!("bad board height '{h}'"))?;
    Ok((cols, rows))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (cols, rows) = parse_board_size(&cli.board_size)?;
    let spec = PatternSpec::new(cols, rows, cli.square_size)?;
    let max_frames = (cli.max_frames > 0).then_some(cli.max_frames);

    let frames = calib_mono::load_frames_from_dir(&cli.frames_dir, max_frames)?;
    info!(
        "loaded {} frames from {}",
        frames.len(),
        cli.frames_dir.display()
    );

    let outcome = calibrate(
        &frames,
        &spec,
        &CalibrationParams::default(),
        &mut LogObserver,
    )?;
    let result = &outcome.result;

    info!(
        "intrinsics: fx {:.3} fy {:.3} cx {:.3} cy {:.3}",
        result.intrinsics.fx, result.intrinsics.fy, result.intrinsics.cx, result.intrinsics.cy
    );
    info!(
        "distortion: k1 {:+.5} k2 {:+.5} p1 {:+.5} p2 {:+.5} k3 {:+.5}",
        result.distortion.k1,
        result.distortion.k2,
        result.distortion.p1,
        result.distortion.p2,
        result.distortion.k3
    );
    info!(
        "rms reprojection error: {:.4} px over {} frames",
        result.reprojection_error,
        outcome.detection.used_frames.len()
    );

    CalibrationReport::from(result).write_json(&cli.output)?;
    info!("calibration written to {}", cli.output.display());

    if let Some(path) = &cli.undistorted {
        write_undistorted_preview(&outcome, &frames, path)?;
    }
    Ok(())
}

fn write_undistorted_preview(
    outcome: &calib_mono::CalibrationOutcome,
    frames: &[calib_mono::FrameData],
    path: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let first_used = outcome
        .detection
        .used_frames
        .first()
        .ok_or("no used frame for the preview")?;
    let frame = frames
        .iter()
        .find(|f| &f.id == first_used)
        .ok_or("used frame id not found among inputs")?;

    let result = &outcome.result;
    let map = UndistortMap::build(
        &result.intrinsics,
        &result.distortion,
        (result.image_width, result.image_height),
    );
    if let Some(crop) = map.valid_region() {
        info!(
            "valid undistorted region: {}x{} at ({}, {})",
            crop.width, crop.height, crop.x, crop.y
        );
    }

    let corrected = map.remap_gray(&frame.image.as_view());
    let buffer = image::GrayImage::from_raw(
        corrected.width as u32,
        corrected.height as u32,
        corrected.data,
    )
    .ok_or("undistorted buffer has the wrong size")?;
    buffer.save(path)?;
    info!("undistorted preview written to {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = init_with_level(level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
