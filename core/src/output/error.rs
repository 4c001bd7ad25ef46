use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum OutputError {
    CreateFile,
    Serialize,
    WriteRecord,
    Database,
    UnknownFormat,
}

impl std::error::Error for OutputError {}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::CreateFile => write!(f, "Failed to create output file"),
            OutputError::Serialize => write!(f, "Failed to serialize record"),
            OutputError::WriteRecord => write!(f, "Failed to write record"),
            OutputError::Database => write!(f, "Database operation failed"),
            OutputError::UnknownFormat => write!(f, "Unknown output format"),
        }
    }
}
