use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum FileSystemError {
    OpenFile,
    ReadFile,
    UnsupportedImageFormat,
    NoNtfsPartition,
    BadBootSector,
    BadMftEntry,
    FixupMismatch,
    ArtifactNotFound,
    WriteArtifact,
    Cancelled,
}

impl std::error::Error for FileSystemError {}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::OpenFile => write!(f, "Failed to open image file"),
            FileSystemError::ReadFile => write!(f, "Failed to read image bytes"),
            FileSystemError::UnsupportedImageFormat => {
                write!(f, "Unsupported image container format")
            }
            FileSystemError::NoNtfsPartition => write!(f, "No NTFS partition found"),
            FileSystemError::BadBootSector => write!(f, "Invalid NTFS boot sector"),
            FileSystemError::BadMftEntry => write!(f, "Invalid MFT entry"),
            FileSystemError::FixupMismatch => write!(f, "Update sequence mismatch"),
            FileSystemError::ArtifactNotFound => write!(f, "Artifact not found on volume"),
            FileSystemError::WriteArtifact => write!(f, "Failed to write extracted artifact"),
            FileSystemError::Cancelled => write!(f, "Extraction cancelled"),
        }
    }
}
