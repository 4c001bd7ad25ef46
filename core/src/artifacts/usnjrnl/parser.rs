use super::error::UsnJrnlError;
use super::journal::{UsnRecord, MAX_RECORD_SIZE, MIN_RECORD_SIZE};
use crate::artifacts::mft::attributes::standard::file_attribute_flags;
use crate::artifacts::mft::path::PathResolver;
use crate::structs::stats::UsnStats;
use crate::utils::cancel::CancelToken;
use crate::utils::progress::ProgressReporter;
use crate::utils::strings::file_extension;
use crate::utils::time::filetime_to_iso;
use common::ntfs::UsnJrnlEntry;
use log::{info, warn};
use std::io::{Read, Seek, SeekFrom};

/// Read granularity over the `$J` stream
const CHUNK_SIZE: usize = 1024 * 1024;
/// Records are 8-aligned
const ALIGNMENT: usize = 8;
/// Cursor jump inside a zeroed (sparse) region
const SPARSE_GRANULE: usize = 4096;

/// Stream `$J` and emit one row per set reason bit of every record. The
/// journal usually opens with a very large sparse region; a zero record
/// length marks a hole and the cursor skips forward without emitting
pub(crate) fn parse_usnjrnl<R: Read + Seek>(
    reader: &mut R,
    resolver: Option<&PathResolver>,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
    emit: &mut dyn FnMut(UsnJrnlEntry) -> Result<(), UsnJrnlError>,
) -> Result<UsnStats, UsnJrnlError> {
    let total = match reader.seek(SeekFrom::End(0)) {
        Ok(result) => result,
        Err(_err) => return Err(UsnJrnlError::ReadFile),
    };
    if reader.seek(SeekFrom::Start(0)).is_err() {
        return Err(UsnJrnlError::ReadFile);
    }
    progress.begin(total);

    let mut stats = UsnStats::default();
    let mut buffer: Vec<u8> = Vec::with_capacity(CHUNK_SIZE * 2);
    let mut pos = 0;
    let mut eof = false;

    loop {
        // Refill, dropping consumed bytes first
        if pos > 0 {
            buffer.drain(0..pos);
            pos = 0;
        }
        if !eof {
            let mut chunk = vec![0u8; CHUNK_SIZE];
            let mut filled = 0;
            while filled < chunk.len() {
                let bytes_read = match reader.read(&mut chunk[filled..]) {
                    Ok(result) => result,
                    Err(_err) => return Err(UsnJrnlError::ReadFile),
                };
                if bytes_read == 0 {
                    eof = true;
                    break;
                }
                filled += bytes_read;
            }
            buffer.extend_from_slice(&chunk[0..filled]);
        }

        if buffer.len() < MIN_RECORD_SIZE as usize {
            break;
        }

        // Walk the buffered window
        while buffer.len() - pos >= MIN_RECORD_SIZE as usize {
            if cancel.is_cancelled() {
                progress.end();
                return Err(UsnJrnlError::Cancelled);
            }

            let record_length = u32::from_le_bytes([
                buffer[pos],
                buffer[pos + 1],
                buffer[pos + 2],
                buffer[pos + 3],
            ]);

            // A zero length is a hole in the sparse stream
            if record_length == 0 {
                let granule_end = pos + SPARSE_GRANULE;
                let advance = if granule_end <= buffer.len()
                    && buffer[pos..granule_end].iter().all(|byte| *byte == 0)
                {
                    SPARSE_GRANULE
                } else {
                    ALIGNMENT
                };
                pos += advance;
                stats.sparse_bytes_skipped += advance as u64;
                progress.advance(advance as u64);
                continue;
            }

            let major_version = u16::from_le_bytes([buffer[pos + 4], buffer[pos + 5]]);
            let plausible = (MIN_RECORD_SIZE..=MAX_RECORD_SIZE).contains(&record_length)
                && (2..=4).contains(&major_version);
            if !plausible {
                // Resync one slot at a time
                stats.corrupt += 1;
                pos += ALIGNMENT;
                progress.advance(ALIGNMENT as u64);
                continue;
            }

            // The cursor advances the record length rounded up to the alignment
            let advance = (record_length as usize + ALIGNMENT - 1) & !(ALIGNMENT - 1);
            if buffer.len() - pos < advance {
                // The tail of the record (or its pad) is in the next chunk
                if !eof {
                    break;
                }
                if buffer.len() - pos < record_length as usize {
                    warn!("[usnjrnl] Truncated record at end of stream");
                    stats.corrupt += 1;
                    pos = buffer.len();
                    break;
                }
            }

            let record_result = UsnRecord::parse_record(&buffer[pos..pos + record_length as usize]);
            match record_result {
                Ok((_, record)) => {
                    stats.records += 1;
                    emit_rows(&record, resolver, &mut stats, emit)?;
                }
                Err(_err) => {
                    stats.corrupt += 1;
                    pos += ALIGNMENT;
                    progress.advance(ALIGNMENT as u64);
                    continue;
                }
            }

            pos = (pos + advance).min(buffer.len());
            progress.advance(advance as u64);
        }

        if eof && buffer.len() - pos < MIN_RECORD_SIZE as usize {
            break;
        }
    }

    progress.end();
    info!(
        "[usnjrnl] Emitted {} rows from {} records ({} corrupt, {} sparse bytes skipped)",
        stats.rows, stats.records, stats.corrupt, stats.sparse_bytes_skipped
    );
    Ok(stats)
}

/// One row per set reason bit, all other fields shared
fn emit_rows(
    record: &UsnRecord,
    resolver: Option<&PathResolver>,
    stats: &mut UsnStats,
    emit: &mut dyn FnMut(UsnJrnlEntry) -> Result<(), UsnJrnlError>,
) -> Result<(), UsnJrnlError> {
    let full_path = resolver
        .and_then(|cache| cache.resolve_reference(record.mft_entry, record.mft_sequence))
        .map(|resolved| resolved.path)
        .unwrap_or_default();

    let timestamp = filetime_to_iso(&record.timestamp);
    for reason in record.reason_list() {
        let row = UsnJrnlEntry {
            update_sequence_number: record.usn,
            update_time: timestamp.clone(),
            filename: record.name.clone(),
            extension: file_extension(&record.name),
            full_path: full_path.clone(),
            update_reason: reason,
            update_source_flags: record.source(),
            mft_entry: record.mft_entry,
            mft_sequence: record.mft_sequence,
            parent_mft_entry: record.parent_mft_entry,
            parent_mft_sequence: record.parent_mft_sequence,
            security_descriptor_id: record.security_id,
            file_attributes: file_attribute_flags(&record.file_attributes),
            major_version: record.major_version,
            minor_version: record.minor_version,
        };
        stats.rows += 1;
        emit(row)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_usnjrnl;
    use crate::utils::{cancel::CancelToken, progress::SilentProgress};
    use common::ntfs::Reason;
    use std::io::Cursor;

    fn v2_record() -> Vec<u8> {
        vec![
            144, 0, 0, 0, 2, 0, 0, 0, 51, 88, 5, 0, 0, 0, 13, 0, 211, 87, 5, 0, 0, 0, 13, 0, 0, 0,
            54, 96, 6, 0, 0, 0, 220, 174, 212, 97, 67, 52, 217, 1, 2, 0, 0, 128, 0, 0, 0, 0, 0, 0,
            0, 0, 32, 0, 0, 0, 84, 0, 60, 0, 98, 0, 57, 0, 55, 0, 102, 0, 56, 0, 54, 0, 48, 0, 50,
            0, 45, 0, 100, 0, 57, 0, 98, 0, 54, 0, 45, 0, 52, 0, 51, 0, 56, 0, 55, 0, 45, 0, 97, 0,
            53, 0, 99, 0, 56, 0, 45, 0, 98, 0, 99, 0, 53, 0, 99, 0, 50, 0, 55, 0, 51, 0, 102, 0,
            52, 0, 51, 0, 51, 0, 51, 0, 46, 0, 106, 0, 115, 0, 111, 0, 110, 0, 108, 0, 0, 0, 0, 0,
        ]
    }

    #[test]
    fn test_parse_usnjrnl() {
        let mut stream = v2_record();
        stream.append(&mut v2_record());

        let mut rows = Vec::new();
        let stats = parse_usnjrnl(
            &mut Cursor::new(stream),
            None,
            &CancelToken::new(),
            &mut SilentProgress,
            &mut |row| {
                rows.push(row);
                Ok(())
            },
        )
        .unwrap();

        // Extend + Close per record
        assert_eq!(stats.records, 2);
        assert_eq!(stats.rows, 4);
        assert_eq!(rows[0].update_reason, Reason::Extend);
        assert_eq!(rows[1].update_reason, Reason::Close);
        assert_eq!(rows[0].filename, "b97f8602-d9b6-4387-a5c8-bc5c273f4333.jsonl");
        assert_eq!(rows[0].extension, "jsonl");
        assert_eq!(rows[0].mft_entry, 350259);
    }

    #[test]
    fn test_parse_usnjrnl_sparse_region() {
        // A large hole followed by one record
        let sparse_size = 4 * 1024 * 1024;
        let mut stream = vec![0u8; sparse_size];
        stream.append(&mut v2_record());

        let mut rows = Vec::new();
        let stats = parse_usnjrnl(
            &mut Cursor::new(stream),
            None,
            &CancelToken::new(),
            &mut SilentProgress,
            &mut |row| {
                rows.push(row);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(stats.records, 1);
        assert_eq!(rows.len(), 2);
        assert!(stats.sparse_bytes_skipped >= sparse_size as u64);
        assert_eq!(stats.corrupt, 0);
    }

    #[test]
    fn test_parse_usnjrnl_corrupt_resync() {
        // Garbage in the first slot, a valid record after one alignment step
        let mut stream = vec![0xffu8; 8];
        stream.append(&mut v2_record());

        let mut rows = Vec::new();
        let stats = parse_usnjrnl(
            &mut Cursor::new(stream),
            None,
            &CancelToken::new(),
            &mut SilentProgress,
            &mut |row| {
                rows.push(row);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(stats.corrupt, 1);
        assert_eq!(stats.records, 1);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_usnjrnl_cancelled() {
        let stream = v2_record();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = parse_usnjrnl(
            &mut Cursor::new(stream),
            None,
            &cancel,
            &mut SilentProgress,
            &mut |_row| Ok(()),
        );
        assert!(result.is_err());
    }
}
