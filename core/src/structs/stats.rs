use serde::Serialize;

/// Per-run summary of the MFT pass. Record scoped problems are recovered
/// locally and counted here, they never abort the pipeline
#[derive(Debug, Default, Clone, Serialize)]
pub struct MftStats {
    pub records: u64,
    pub corrupt: u64,
    pub fixup_mismatches: u64,
    pub path_cycles: u64,
    pub stale_parents: u64,
}

/// Per-run summary of the USN journal pass
#[derive(Debug, Default, Clone, Serialize)]
pub struct UsnStats {
    pub records: u64,
    pub rows: u64,
    pub corrupt: u64,
    pub sparse_bytes_skipped: u64,
}

/// Per-run summary of the `$LogFile` walk
#[derive(Debug, Default, Clone, Serialize)]
pub struct LogfileStats {
    pub pages: u64,
    pub records: u64,
    pub corrupt: u64,
}

/// Per-run summary of the unified timeline
#[derive(Debug, Default, Clone, Serialize)]
pub struct TimelineStats {
    pub rows: u64,
    pub mft: Option<MftStats>,
    pub usnjrnl: Option<UsnStats>,
    pub logfile: Option<LogfileStats>,
}

impl MftStats {
    /// Anything that was recovered rather than decoded cleanly
    pub fn recovered(&self) -> u64 {
        self.corrupt + self.fixup_mismatches + self.path_cycles + self.stale_parents
    }
}
