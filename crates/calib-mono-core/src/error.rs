use thiserror::Error;

/// I/O-level failures while reading or writing a calibration report.
#[derive(Debug, Error)]
pub enum ReportIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Terminal failure modes of a calibration run.
///
/// Per-frame detection failures are *not* represented here: a frame where
/// the pattern is not found is excluded and the pipeline continues. Every
/// variant below aborts the run without a partial result.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Invalid pattern specification, unreadable frames, or frames with
    /// inconsistent resolution. Operator error; surfaced immediately.
    #[error("invalid input: {0}")]
    Input(String),

    /// Too few valid detections to pose a well-determined solve. The remedy
    /// is collecting more (or better) frames.
    #[error("insufficient calibration data: {0}")]
    InsufficientData(String),

    /// The refinement failed to converge or produced numerically invalid
    /// parameters. The remedy is revisiting frame selection or coverage.
    #[error("solver diverged: {0}")]
    SolverDivergence(String),

    /// The calibration result could not be persisted.
    #[error("failed to write calibration output")]
    Output(#[from] ReportIoError),
}
