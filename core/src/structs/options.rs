/// Inputs for artifact extraction from a disk image
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Raw/DD disk image. E01 containers are detected and rejected
    pub image: String,
    pub out_dir: String,
    /// Process only the n-th NTFS partition (zero based)
    pub partition: Option<usize>,
    pub skip_mft: bool,
    pub skip_logfile: bool,
    pub skip_usnjrnl: bool,
}

/// Inputs for parsing a standalone `$MFT` file
#[derive(Debug, Clone)]
pub struct MftOptions {
    pub path: String,
    /// Reconstruct full paths (requires a second pass over the file)
    pub include_paths: bool,
    /// Drop records that are not in use, and corrupt records
    pub active_only: bool,
}

/// Inputs for parsing a standalone `$UsnJrnl:$J` file
#[derive(Debug, Clone)]
pub struct UsnJrnlOptions {
    pub path: String,
    /// Optional `$MFT` file used to resolve full paths
    pub mft_path: Option<String>,
}

/// Inputs for walking a standalone `$LogFile`
#[derive(Debug, Clone)]
pub struct LogfileOptions {
    pub path: String,
}

/// Inputs for the unified timeline. At least one artifact is required
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub mft: Option<String>,
    pub usnjrnl: Option<String>,
    pub logfile: Option<String>,
}

/// Inputs for the all-in-one extract and analyze flow
#[derive(Debug, Clone)]
pub struct ExtractAnalyzeOptions {
    pub image: String,
    pub out_dir: String,
    pub partition: Option<usize>,
    /// Keep the temporary extracted artifacts on success
    pub keep_temp: bool,
    pub skip_mft: bool,
    pub skip_logfile: bool,
    pub skip_usnjrnl: bool,
}
