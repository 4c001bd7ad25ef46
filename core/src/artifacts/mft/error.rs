use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum MftError {
    ReadFile,
    ParseEntry,
    OutputData,
    Cancelled,
}

impl std::error::Error for MftError {}

impl fmt::Display for MftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MftError::ReadFile => write!(f, "Failed to read MFT file"),
            MftError::ParseEntry => write!(f, "Failed to parse MFT entry"),
            MftError::OutputData => write!(f, "Failed to output MFT records"),
            MftError::Cancelled => write!(f, "MFT parsing cancelled"),
        }
    }
}
