use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum UsnJrnlError {
    ReadFile,
    OutputData,
    Cancelled,
}

impl std::error::Error for UsnJrnlError {}

impl fmt::Display for UsnJrnlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsnJrnlError::ReadFile => write!(f, "Failed to read UsnJrnl file"),
            UsnJrnlError::OutputData => write!(f, "Failed to output UsnJrnl records"),
            UsnJrnlError::Cancelled => write!(f, "UsnJrnl parsing cancelled"),
        }
    }
}
