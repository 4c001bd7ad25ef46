/// Progress boundary. The engine only depends on this interface, consumers can
/// render a terminal widget, stream updates, or stay silent
pub trait ProgressReporter {
    fn begin(&mut self, total: u64);
    fn advance(&mut self, delta: u64);
    fn end(&mut self);
}

/// Default reporter, discards all updates
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn begin(&mut self, _total: u64) {}

    fn advance(&mut self, _delta: u64) {}

    fn end(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::{ProgressReporter, SilentProgress};

    #[test]
    fn test_silent_progress() {
        let mut progress = SilentProgress;
        progress.begin(100);
        progress.advance(50);
        progress.end();
    }
}
