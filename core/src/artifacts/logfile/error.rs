use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum LogfileError {
    ReadFile,
    NoRestartArea,
    OutputData,
    Cancelled,
}

impl std::error::Error for LogfileError {}

impl fmt::Display for LogfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogfileError::ReadFile => write!(f, "Failed to read LogFile"),
            LogfileError::NoRestartArea => write!(f, "No valid restart page found"),
            LogfileError::OutputData => write!(f, "Failed to output LogFile records"),
            LogfileError::Cancelled => write!(f, "LogFile parsing cancelled"),
        }
    }
}
