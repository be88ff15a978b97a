//! Progress reporting for long-running analysis stages.

/// Receives `(percent, step description)` as a pipeline advances.
pub trait ProgressReporter {
    fn report(&mut self, percent: u8, step: &str);
}

impl<F> ProgressReporter for F
where
    F: FnMut(u8, &str),
{
    fn report(&mut self, percent: u8, step: &str) {
        self(percent, step)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _percent: u8, _step: &str) {}
}

/// Forwards updates to the `log` facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&mut self, percent: u8, step: &str) {
        log::debug!("progress: {percent:>3}% {step}");
    }
}
