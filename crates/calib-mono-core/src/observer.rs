/// Pipeline stages, reported in order to the observer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PipelineStage {
    Detection,
    Solving,
    Evaluation,
}

/// Progress sink for a calibration run.
///
/// The detector and solver are pure computational components; anything a
/// caller wants to show (progress bars, console prints, telemetry) hangs off
/// this interface. All methods default to no-ops.
pub trait CalibrationObserver {
    /// One frame has been classified: `detected` is false when the pattern
    /// was not found and the frame is excluded.
    fn on_detection(&mut self, _index: usize, _total: usize, _detected: bool) {}

    /// One accepted Levenberg-Marquardt step; `cost` is the current sum of
    /// squared pixel residuals.
    fn on_solver_iteration(&mut self, _iteration: usize, _cost: f64) {}

    fn on_stage(&mut self, _stage: PipelineStage) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl CalibrationObserver for NullObserver {}
