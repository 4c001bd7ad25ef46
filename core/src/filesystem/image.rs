use crate::filesystem::error::FileSystemError;
use log::{error, warn};
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// EWF segment files start with `EVF\x09`
const EWF_SIGNATURE: [u8; 4] = [0x45, 0x56, 0x46, 0x09];

/// Random access byte source over a disk image. Raw/DD images are read
/// directly. EnCase (E01/EWF) containers are detected but require an EWF
/// decoding capability this build does not carry, they fail closed with
/// `UnsupportedImageFormat`
pub(crate) struct DiskImage<T: Read + Seek> {
    source: T,
    size: u64,
}

impl DiskImage<File> {
    /// Open a disk image file and probe its container format
    pub(crate) fn open(path: &str) -> Result<DiskImage<File>, FileSystemError> {
        if is_ewf_extension(path) {
            error!("[image] {path} is an EWF container. E01 decoding support is not available");
            return Err(FileSystemError::UnsupportedImageFormat);
        }

        let fs_result = File::open(path);
        let fs = match fs_result {
            Ok(result) => result,
            Err(err) => {
                error!("[image] Failed to open image {path}: {err:?}");
                return Err(FileSystemError::OpenFile);
            }
        };

        let mut image = DiskImage::new(fs)?;

        let probe = image.read_at(0, EWF_SIGNATURE.len() as u64)?;
        if probe == EWF_SIGNATURE {
            error!("[image] {path} begins with the EVF signature. E01 decoding support is not available");
            return Err(FileSystemError::UnsupportedImageFormat);
        }

        Ok(image)
    }
}

impl<T: Read + Seek> DiskImage<T> {
    /// Wrap an already opened seekable source
    pub(crate) fn new(mut source: T) -> Result<DiskImage<T>, FileSystemError> {
        let size_result = source.seek(SeekFrom::End(0));
        let size = match size_result {
            Ok(result) => result,
            Err(err) => {
                error!("[image] Could not determine image size: {err:?}");
                return Err(FileSystemError::OpenFile);
            }
        };

        Ok(DiskImage { source, size })
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Positioned read. Reads past the end return fewer bytes, callers treat a
    /// short read as end-of-stream
    pub(crate) fn read_at(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, FileSystemError> {
        if self.source.seek(SeekFrom::Start(offset)).is_err() {
            error!("[image] Could not seek to offset {offset}");
            return Err(FileSystemError::ReadFile);
        }

        let mut buff = vec![0u8; size as usize];
        let mut total = 0;
        while total < buff.len() {
            let read_result = self.source.read(&mut buff[total..]);
            let bytes_read = match read_result {
                Ok(result) => result,
                Err(err) => {
                    error!("[image] Could not read {size} bytes at offset {offset}: {err:?}");
                    return Err(FileSystemError::ReadFile);
                }
            };
            if bytes_read == 0 {
                break;
            }
            total += bytes_read;
        }

        if total != buff.len() {
            warn!("[image] Short read at offset {offset}. Wanted {size} got {total}");
            buff.truncate(total);
        }

        Ok(buff)
    }
}

/// EWF containers are also recognized by filename extension
fn is_ewf_extension(path: &str) -> bool {
    let extension = Path::new(path)
        .extension()
        .map(|value| value.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    matches!(extension.as_str(), "e01" | "ex01" | "s01")
}

#[cfg(test)]
mod tests {
    use super::{is_ewf_extension, DiskImage};
    use std::io::Cursor;

    #[test]
    fn test_read_at() {
        let data: Vec<u8> = (0..=255).collect();
        let mut image = DiskImage::new(Cursor::new(data)).unwrap();

        assert_eq!(image.size(), 256);
        let bytes = image.read_at(10, 4).unwrap();
        assert_eq!(bytes, vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_read_at_short() {
        let data = vec![0u8; 16];
        let mut image = DiskImage::new(Cursor::new(data)).unwrap();

        let bytes = image.read_at(8, 16).unwrap();
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn test_is_ewf_extension() {
        assert!(is_ewf_extension("evidence.E01"));
        assert!(is_ewf_extension("evidence.ex01"));
        assert!(!is_ewf_extension("evidence.dd"));
    }
}
