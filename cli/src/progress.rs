use relic::ProgressReporter;
use std::io::{stderr, Write};

/// Percentage ticker on stderr. Redraws only when the whole-percent value
/// moves so large artifacts do not flood the terminal
#[derive(Debug, Default)]
pub(crate) struct StderrProgress {
    total: u64,
    current: u64,
    last_percent: u64,
}

impl ProgressReporter for StderrProgress {
    fn begin(&mut self, total: u64) {
        self.total = total;
        self.current = 0;
        self.last_percent = 0;
    }

    fn advance(&mut self, delta: u64) {
        if self.total == 0 {
            return;
        }
        self.current = (self.current + delta).min(self.total);

        let percent = self.current * 100 / self.total;
        if percent > self.last_percent {
            self.last_percent = percent;
            eprint!("\r[relic] {percent:>3}%");
            let _ = stderr().flush();
        }
    }

    fn end(&mut self) {
        if self.total > 0 {
            eprintln!("\r[relic] 100%");
        }
    }
}
