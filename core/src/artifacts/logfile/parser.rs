use super::error::LogfileError;
use super::page::{RecordPage, PAGE_HEADER_SIZE};
use super::record::{opcode_name, LogRecord, RECORD_HEADER_SIZE};
use super::restart::RestartPage;
use crate::structs::stats::LogfileStats;
use crate::utils::cancel::CancelToken;
use crate::utils::progress::ProgressReporter;
use crate::utils::strings::format_file_reference;
use common::ntfs::LogfileEntry;
use log::{info, warn};
use std::io::{Read, Seek, SeekFrom};

const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Walk `$LogFile`: restart area, then every record page past the two restart
/// pages. Only the record headers are decoded, redo/undo payloads are
/// scavenged for embedded names and otherwise left alone
pub(crate) fn parse_logfile<R: Read + Seek>(
    reader: &mut R,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
    emit: &mut dyn FnMut(LogfileEntry) -> Result<(), LogfileError>,
) -> Result<LogfileStats, LogfileError> {
    let total = match reader.seek(SeekFrom::End(0)) {
        Ok(result) => result,
        Err(_err) => return Err(LogfileError::ReadFile),
    };

    let restart = read_restart_area(reader)?;
    let page_size = if restart.log_page_size > 0 {
        restart.log_page_size
    } else {
        DEFAULT_PAGE_SIZE
    };
    info!(
        "[logfile] Restart area v{}.{}, page size {page_size}, current LSN {}",
        restart.major_version, restart.minor_version, restart.current_lsn
    );

    let mut stats = LogfileStats::default();
    progress.begin(total);

    // The first two pages are the restart area
    let mut page_offset = page_size as u64 * 2;
    while page_offset < total {
        if cancel.is_cancelled() {
            progress.end();
            return Err(LogfileError::Cancelled);
        }

        let page_data = read_at(reader, page_offset, page_size as u64)?;
        page_offset += page_size as u64;
        progress.advance(page_size as u64);
        if page_data.len() < PAGE_HEADER_SIZE {
            break;
        }

        // Unwritten pages are zero filled
        if page_data[0..4] == [0, 0, 0, 0] {
            continue;
        }

        let page = match RecordPage::parse_page(&page_data) {
            Some(result) => result,
            None => {
                stats.corrupt += 1;
                continue;
            }
        };
        stats.pages += 1;

        walk_page_records(&page, &mut stats, emit)?;
    }

    progress.end();
    info!(
        "[logfile] Walked {} pages, {} records ({} corrupt)",
        stats.pages, stats.records, stats.corrupt
    );
    Ok(stats)
}

/// Try both restart pages at the head of the file
fn read_restart_area<R: Read + Seek>(reader: &mut R) -> Result<RestartPage, LogfileError> {
    let first = read_at(reader, 0, DEFAULT_PAGE_SIZE as u64)?;
    if let Some(result) = RestartPage::parse_restart(&first) {
        return Ok(result);
    }

    warn!("[logfile] First restart page is invalid, trying the second");
    let second = read_at(reader, DEFAULT_PAGE_SIZE as u64, DEFAULT_PAGE_SIZE as u64)?;
    match RestartPage::parse_restart(&second) {
        Some(result) => Ok(result),
        None => Err(LogfileError::NoRestartArea),
    }
}

/// Walk the log records of one reconstituted page. Records are 8-aligned;
/// a record that fails to parse advances the cursor one slot
fn walk_page_records(
    page: &RecordPage,
    stats: &mut LogfileStats,
    emit: &mut dyn FnMut(LogfileEntry) -> Result<(), LogfileError>,
) -> Result<(), LogfileError> {
    let alignment = 8;
    let mut offset = PAGE_HEADER_SIZE;

    while offset + RECORD_HEADER_SIZE <= page.data.len() {
        // A zero LSN marks the free tail
        if page.data[offset..offset + 8] == [0, 0, 0, 0, 0, 0, 0, 0] {
            break;
        }

        let record = match LogRecord::parse_record(&page.data[offset..]) {
            Some(result) => result,
            None => {
                stats.corrupt += 1;
                offset += alignment;
                continue;
            }
        };

        let row = LogfileEntry {
            lsn: record.this_lsn,
            previous_lsn: record.previous_lsn,
            timestamp: record.timestamp.clone(),
            filename: record.filename.clone(),
            event: opcode_name(record.redo_op),
            redo_operation: opcode_name(record.redo_op),
            undo_operation: opcode_name(record.undo_op),
            transaction_id: record.transaction_id,
            record_type: record.record_type,
            target_attribute: record.target_attribute,
            target_vcn: record.target_vcn,
            file_reference: reference_string(record.file_reference),
            parent_reference: reference_string(record.parent_reference),
            file_attributes: record.file_attributes.clone(),
        };
        stats.records += 1;
        emit(row)?;

        let advance = RECORD_HEADER_SIZE + record.client_data_length as usize;
        offset += (advance + alignment - 1) & !(alignment - 1);
    }

    Ok(())
}

fn reference_string(reference: u64) -> String {
    if reference == 0 {
        return String::new();
    }
    format_file_reference(reference)
}

/// Positioned read helper shared by the walkers
fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, size: u64) -> Result<Vec<u8>, LogfileError> {
    if reader.seek(SeekFrom::Start(offset)).is_err() {
        return Err(LogfileError::ReadFile);
    }

    let mut buffer = vec![0u8; size as usize];
    let mut total = 0;
    while total < buffer.len() {
        let bytes_read = match reader.read(&mut buffer[total..]) {
            Ok(result) => result,
            Err(_err) => return Err(LogfileError::ReadFile),
        };
        if bytes_read == 0 {
            break;
        }
        total += bytes_read;
    }
    buffer.truncate(total);

    Ok(buffer)
}
