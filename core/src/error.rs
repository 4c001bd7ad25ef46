use crate::artifacts::logfile::error::LogfileError;
use crate::artifacts::mft::error::MftError;
use crate::artifacts::usnjrnl::error::UsnJrnlError;
use crate::filesystem::error::FileSystemError;
use crate::output::error::OutputError;
use std::fmt;

/// Fatal pipeline errors. Record scoped problems never surface here, they are
/// recovered locally and reported through the stats counters
#[derive(Debug, PartialEq, Eq)]
pub enum RelicError {
    InputNotFound,
    FileSystem(FileSystemError),
    Mft(MftError),
    UsnJrnl(UsnJrnlError),
    Logfile(LogfileError),
    Output(OutputError),
    Cancelled,
}

impl std::error::Error for RelicError {}

impl fmt::Display for RelicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelicError::InputNotFound => write!(f, "Input file not found or unreadable"),
            RelicError::FileSystem(err) => write!(f, "{err}"),
            RelicError::Mft(err) => write!(f, "{err}"),
            RelicError::UsnJrnl(err) => write!(f, "{err}"),
            RelicError::Logfile(err) => write!(f, "{err}"),
            RelicError::Output(err) => write!(f, "{err}"),
            RelicError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl RelicError {
    /// Collapse the cancellation variants of the per-artifact errors
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RelicError::Cancelled
                | RelicError::Mft(MftError::Cancelled)
                | RelicError::UsnJrnl(UsnJrnlError::Cancelled)
                | RelicError::Logfile(LogfileError::Cancelled)
                | RelicError::FileSystem(FileSystemError::Cancelled)
        )
    }

    /// Errors caused by the input not being what it claims to be, rather than
    /// being unreadable
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            RelicError::FileSystem(FileSystemError::UnsupportedImageFormat)
                | RelicError::FileSystem(FileSystemError::NoNtfsPartition)
                | RelicError::FileSystem(FileSystemError::BadBootSector)
                | RelicError::FileSystem(FileSystemError::BadMftEntry)
                | RelicError::Logfile(LogfileError::NoRestartArea)
        )
    }
}

impl From<FileSystemError> for RelicError {
    fn from(err: FileSystemError) -> RelicError {
        if err == FileSystemError::Cancelled {
            return RelicError::Cancelled;
        }
        RelicError::FileSystem(err)
    }
}

impl From<OutputError> for RelicError {
    fn from(err: OutputError) -> RelicError {
        RelicError::Output(err)
    }
}
