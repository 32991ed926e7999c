//! For tracking optimization progress

#[cfg(feature = "pbr")]
pub use pbr::ProgressBar;

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter {
    /// A new pass begins, which will call `increase()` about `total` times.
    fn start(&mut self, _pass: &str, _total: u64) {}

    /// Called after each frame of a pass has been processed.
    fn increase(&mut self);

    /// Called once when the optimization has finished.
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) {}
}

/// Implement the progress reporter trait for a progress bar,
/// to make it usable for frame processing reporting.
#[cfg(feature = "pbr")]
impl<T> ProgressReporter for pbr::ProgressBar<T> where T: std::io::Write {
    fn start(&mut self, pass: &str, total: u64) {
        self.total = total;
        self.set(0);
        self.message(&format!("{pass} "));
    }

    fn increase(&mut self) {
        self.inc();
    }

    fn done(&mut self, msg: &str) {
        self.finish_print(msg);
    }
}
