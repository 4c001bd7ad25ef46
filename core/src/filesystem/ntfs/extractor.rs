use crate::filesystem::error::FileSystemError;
use crate::filesystem::ntfs::{
    index::find_in_directory,
    reader::{MftReader, StreamData},
    runs::DataRun,
    volume::NtfsVolume,
};
use crate::utils::cancel::CancelToken;
use crate::utils::progress::ProgressReporter;
use log::{info, warn};
use std::io::{Read, Seek, Write};

/// Well-known system entries, used when the directory index lookup fails
const ROOT_ENTRY: u64 = 5;
const LOGFILE_ENTRY: u64 = 2;
const EXTEND_ENTRY: u64 = 11;
/// Fallback scan bound when `$UsnJrnl` is not indexed
const SCAN_LIMIT: u64 = 100_000;

/// Materializes `$MFT`, `$LogFile` and `$UsnJrnl:$J` byte streams off a volume
pub(crate) struct ArtifactExtractor<'a, T: Read + Seek> {
    pub(crate) volume: &'a mut NtfsVolume<T>,
    pub(crate) reader: &'a MftReader,
}

impl<'a, T: Read + Seek> ArtifactExtractor<'a, T> {
    /// The MFT itself, from record zero's runs
    pub(crate) fn extract_mft(
        &mut self,
        output: &mut impl Write,
        cancel: &CancelToken,
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64, FileSystemError> {
        let runs = self.reader.runs.clone();
        let real_size = self.reader.data_size;
        self.write_runs(&runs, real_size, output, cancel, progress)
    }

    /// `$LogFile`, located through the root directory index with the
    /// well-known entry number as fallback
    pub(crate) fn extract_logfile(
        &mut self,
        output: &mut impl Write,
        cancel: &CancelToken,
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64, FileSystemError> {
        let located = find_in_directory(self.reader, self.volume, ROOT_ENTRY, "$LogFile")
            .unwrap_or(None)
            .unwrap_or(LOGFILE_ENTRY);

        // A bad system entry loses the artifact, not the volume
        let stream = match self.reader.collect_stream(self.volume, located, "") {
            Ok(result) => result,
            Err(FileSystemError::BadMftEntry) => None,
            Err(err) => return Err(err),
        };
        match stream {
            Some(data) => self.write_stream(data, output, cancel, progress),
            None => {
                warn!("[extractor] Entry {located} carries no $LogFile data");
                Err(FileSystemError::ArtifactNotFound)
            }
        }
    }

    /// `$UsnJrnl:$J`. The journal lives under `\$Extend` and its `$J` stream is
    /// usually scattered over extension records, with a very large leading
    /// sparse region that is preserved as zeros
    pub(crate) fn extract_usnjrnl(
        &mut self,
        output: &mut impl Write,
        cancel: &CancelToken,
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64, FileSystemError> {
        let extend = find_in_directory(self.reader, self.volume, ROOT_ENTRY, "$Extend")
            .unwrap_or(None)
            .unwrap_or(EXTEND_ENTRY);

        let mut located = find_in_directory(self.reader, self.volume, extend, "$UsnJrnl")
            .unwrap_or(None);
        if located.is_none() {
            located = self.scan_for_usnjrnl(extend)?;
        }
        let journal = match located {
            Some(result) => result,
            None => {
                info!("[extractor] $UsnJrnl not found, the USN journal may be disabled");
                return Err(FileSystemError::ArtifactNotFound);
            }
        };

        // $Max is journal metadata, worth noting but not extracted
        if let Ok(Some(StreamData::Resident(value))) =
            self.reader.collect_stream(self.volume, journal, "$Max")
        {
            info!("[extractor] $UsnJrnl:$Max present ({} bytes)", value.len());
        }

        let stream = match self.reader.collect_stream(self.volume, journal, "$J") {
            Ok(result) => result,
            Err(FileSystemError::BadMftEntry) => None,
            Err(err) => return Err(err),
        };
        match stream {
            Some(data) => self.write_stream(data, output, cancel, progress),
            None => {
                warn!("[extractor] Entry {journal} carries no $J stream");
                Err(FileSystemError::ArtifactNotFound)
            }
        }
    }

    /// Bounded MFT scan for a `$UsnJrnl` entry parented to `$Extend`. Used when
    /// the directory index walk comes up empty
    fn scan_for_usnjrnl(&mut self, extend: u64) -> Result<Option<u64>, FileSystemError> {
        use crate::artifacts::mft::attributes::attribute::grab_attributes;

        let limit = self.reader.total_entries.min(SCAN_LIMIT);
        info!("[extractor] Falling back to a MFT scan over {limit} entries for $UsnJrnl");

        for entry_number in 0..limit {
            let read_result = self.reader.read_entry(self.volume, entry_number);
            let (header, entry) = match read_result {
                Ok(result) => result,
                Err(_err) => continue,
            };

            let attributes = grab_attributes(&entry, header.attrib_offset, header.used_size);
            for filename in &attributes.filename {
                if filename.parent_mft == extend && filename.name.eq_ignore_ascii_case("$UsnJrnl") {
                    return Ok(Some(entry_number));
                }
            }
        }

        Ok(None)
    }

    fn write_stream(
        &mut self,
        stream: StreamData,
        output: &mut impl Write,
        cancel: &CancelToken,
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64, FileSystemError> {
        match stream {
            StreamData::Resident(value) => {
                if output.write_all(&value).is_err() {
                    return Err(FileSystemError::WriteArtifact);
                }
                Ok(value.len() as u64)
            }
            StreamData::NonResident { runs, real_size } => {
                self.write_runs(&runs, real_size, output, cancel, progress)
            }
        }
    }

    /// Stream a run list to the output. Sparse runs are written as zero bytes
    /// so downstream record offsets keep their on-disk meaning. Output is
    /// truncated at the stream's real size
    fn write_runs(
        &mut self,
        runs: &[DataRun],
        real_size: u64,
        output: &mut impl Write,
        cancel: &CancelToken,
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64, FileSystemError> {
        let cluster_size = self.volume.cluster_size;
        progress.begin(real_size);

        let mut written: u64 = 0;
        let zero_cluster = vec![0u8; cluster_size as usize];
        for run in runs {
            if real_size > 0 && written >= real_size {
                break;
            }
            if cancel.is_cancelled() {
                progress.end();
                return Err(FileSystemError::Cancelled);
            }

            for cluster in 0..run.length {
                let remaining = if real_size > 0 {
                    real_size - written
                } else {
                    cluster_size
                };
                if remaining == 0 {
                    break;
                }
                let take = remaining.min(cluster_size);

                if run.sparse {
                    if output.write_all(&zero_cluster[0..take as usize]).is_err() {
                        return Err(FileSystemError::WriteArtifact);
                    }
                } else {
                    let bytes = self
                        .volume
                        .read_volume((run.lcn + cluster) * cluster_size, take)?;
                    if output.write_all(&bytes).is_err() {
                        return Err(FileSystemError::WriteArtifact);
                    }
                    if (bytes.len() as u64) < take {
                        warn!("[extractor] Short read at LCN {}, ending extraction", run.lcn);
                        written += bytes.len() as u64;
                        progress.end();
                        return Ok(written);
                    }
                }
                written += take;
            }
            progress.advance(run.length * cluster_size);
        }

        progress.end();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::ArtifactExtractor;
    use crate::filesystem::ntfs::reader::tests::build_test_volume;
    use crate::filesystem::ntfs::reader::MftReader;
    use crate::filesystem::ntfs::volume::NtfsVolume;
    use crate::filesystem::{image::DiskImage, partitions::Partition};
    use crate::utils::{cancel::CancelToken, progress::SilentProgress};
    use std::io::Cursor;

    #[test]
    fn test_extract_mft() {
        let image_data = build_test_volume();
        let expected = image_data[4096..8192].to_vec();

        let size = image_data.len() as u64;
        let disk = DiskImage::new(Cursor::new(image_data)).unwrap();
        let partition = Partition {
            index: 0,
            offset: 0,
            size,
        };
        let mut volume = NtfsVolume::open(disk, &partition).unwrap();
        let reader = MftReader::bootstrap(&mut volume).unwrap();

        let mut extractor = ArtifactExtractor {
            volume: &mut volume,
            reader: &reader,
        };
        let mut output = Vec::new();
        let written = extractor
            .extract_mft(&mut output, &CancelToken::new(), &mut SilentProgress)
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(output, expected);
    }

    #[test]
    fn test_extract_mft_cancelled() {
        let image_data = build_test_volume();
        let size = image_data.len() as u64;
        let disk = DiskImage::new(Cursor::new(image_data)).unwrap();
        let partition = Partition {
            index: 0,
            offset: 0,
            size,
        };
        let mut volume = NtfsVolume::open(disk, &partition).unwrap();
        let reader = MftReader::bootstrap(&mut volume).unwrap();

        let mut extractor = ArtifactExtractor {
            volume: &mut volume,
            reader: &reader,
        };
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut output = Vec::new();
        let result = extractor.extract_mft(&mut output, &cancel, &mut SilentProgress);
        assert!(result.is_err());
    }
}
