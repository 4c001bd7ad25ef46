pub mod core;
pub mod error;
pub mod structs;

pub(crate) mod artifacts;
pub(crate) mod filesystem;
pub(crate) mod output;
pub(crate) mod utils;

pub use crate::artifacts::logfile::error::LogfileError;
pub use crate::artifacts::mft::error::MftError;
pub use crate::artifacts::usnjrnl::error::UsnJrnlError;
pub use crate::filesystem::error::FileSystemError;
pub use crate::output::error::OutputError;
pub use crate::utils::cancel::CancelToken;
pub use crate::utils::progress::{ProgressReporter, SilentProgress};
