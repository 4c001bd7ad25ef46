use crate::artifacts::logfile::{error::LogfileError, parser::parse_logfile};
use crate::artifacts::mft::{
    error::MftError,
    master::{build_path_resolver, read_mft},
};
use crate::artifacts::usnjrnl::{error::UsnJrnlError, parser::parse_usnjrnl};
use crate::error::RelicError;
use crate::structs::options::{AnalyzeOptions, MftOptions};
use crate::structs::stats::TimelineStats;
use crate::utils::cancel::CancelToken;
use crate::utils::progress::ProgressReporter;
use common::ntfs::{ArtifactSource, TimelineEntry};
use log::info;
use std::fs::File;
use std::io::BufReader;

/// Merge the three artifact streams into one normalized event timeline. The
/// MFT pass runs first so its path cache can serve the journal rows
pub(crate) fn analyze_artifacts(
    options: &AnalyzeOptions,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
    emit: &mut dyn FnMut(TimelineEntry) -> Result<(), RelicError>,
) -> Result<TimelineStats, RelicError> {
    let mut stats = TimelineStats::default();

    let resolver = match &options.mft {
        Some(path) => {
            let mut reader = open(path)?;
            Some(build_path_resolver(&mut reader, cancel).map_err(RelicError::Mft)?)
        }
        None => None,
    };

    if let Some(path) = &options.mft {
        info!("[timeline] Folding in MFT records from {path}");
        let mut reader = open(path)?;
        let mft_options = MftOptions {
            path: path.clone(),
            include_paths: true,
            active_only: false,
        };

        let mut rows = 0;
        let mft_stats = read_mft(
            &mut reader,
            &mft_options,
            resolver.as_ref(),
            cancel,
            progress,
            &mut |record| {
                let reference = format!("{}-{}", record.entry_number, record.sequence_number);
                let parent =
                    format!("{}-{}", record.parent_entry_number, record.parent_sequence_number);

                if !record.si_created.is_empty() {
                    let row = TimelineEntry {
                        timestamp: record.si_created.clone(),
                        artifact_source: ArtifactSource::Mft,
                        event: String::from("FileCreate (SI)"),
                        filename: record.filename.clone(),
                        full_path: record.full_path.clone(),
                        file_reference: reference.clone(),
                        parent_reference: parent.clone(),
                        extra_info: String::new(),
                    };
                    rows += 1;
                    emit_mft(&mut *emit, row)?;
                }
                if !record.si_modified.is_empty() && record.si_modified != record.si_created {
                    let row = TimelineEntry {
                        timestamp: record.si_modified.clone(),
                        artifact_source: ArtifactSource::Mft,
                        event: String::from("FileModify (SI)"),
                        filename: record.filename.clone(),
                        full_path: record.full_path.clone(),
                        file_reference: reference,
                        parent_reference: parent,
                        extra_info: String::new(),
                    };
                    rows += 1;
                    emit_mft(&mut *emit, row)?;
                }
                Ok(())
            },
        )
        .map_err(RelicError::Mft)?;
        stats.rows += rows;
        stats.mft = Some(mft_stats);
    }

    if let Some(path) = &options.usnjrnl {
        info!("[timeline] Folding in UsnJrnl rows from {path}");
        let mut reader = open(path)?;

        let mut rows = 0;
        let usn_stats = parse_usnjrnl(
            &mut reader,
            resolver.as_ref(),
            cancel,
            progress,
            &mut |entry| {
                let row = TimelineEntry {
                    timestamp: entry.update_time.clone(),
                    artifact_source: ArtifactSource::UsnJrnl,
                    event: format!("{:?}", entry.update_reason),
                    filename: entry.filename.clone(),
                    full_path: entry.full_path.clone(),
                    file_reference: format!("{}-{}", entry.mft_entry, entry.mft_sequence),
                    parent_reference: format!(
                        "{}-{}",
                        entry.parent_mft_entry, entry.parent_mft_sequence
                    ),
                    extra_info: format!("USN:{}", entry.update_sequence_number),
                };
                rows += 1;
                emit_usn(&mut *emit, row)
            },
        )
        .map_err(RelicError::UsnJrnl)?;
        stats.rows += rows;
        stats.usnjrnl = Some(usn_stats);
    }

    if let Some(path) = &options.logfile {
        info!("[timeline] Folding in LogFile records from {path}");
        let mut reader = open(path)?;

        let mut rows = 0;
        let logfile_stats = parse_logfile(&mut reader, cancel, progress, &mut |entry| {
            // Header-only records with no recovered name add no timeline value
            if entry.filename.is_empty() && entry.timestamp.is_empty() {
                return Ok(());
            }
            let row = TimelineEntry {
                timestamp: entry.timestamp.clone(),
                artifact_source: ArtifactSource::Logfile,
                event: entry.event.clone(),
                filename: entry.filename.clone(),
                full_path: String::new(),
                file_reference: entry.file_reference.clone(),
                parent_reference: entry.parent_reference.clone(),
                extra_info: format!("LSN:{}", entry.lsn),
            };
            rows += 1;
            emit_logfile(&mut *emit, row)
        })
        .map_err(RelicError::Logfile)?;
        stats.rows += rows;
        stats.logfile = Some(logfile_stats);
    }

    Ok(stats)
}

fn open(path: &str) -> Result<BufReader<File>, RelicError> {
    match File::open(path) {
        Ok(result) => Ok(BufReader::new(result)),
        Err(err) => {
            log::error!("[timeline] Could not open artifact {path}: {err:?}");
            Err(RelicError::InputNotFound)
        }
    }
}

fn emit_mft(
    emit: &mut dyn FnMut(TimelineEntry) -> Result<(), RelicError>,
    row: TimelineEntry,
) -> Result<(), MftError> {
    match emit(row) {
        Ok(()) => Ok(()),
        Err(_err) => Err(MftError::OutputData),
    }
}

fn emit_usn(
    emit: &mut dyn FnMut(TimelineEntry) -> Result<(), RelicError>,
    row: TimelineEntry,
) -> Result<(), UsnJrnlError> {
    match emit(row) {
        Ok(()) => Ok(()),
        Err(_err) => Err(UsnJrnlError::OutputData),
    }
}

fn emit_logfile(
    emit: &mut dyn FnMut(TimelineEntry) -> Result<(), RelicError>,
    row: TimelineEntry,
) -> Result<(), LogfileError> {
    match emit(row) {
        Ok(()) => Ok(()),
        Err(_err) => Err(LogfileError::OutputData),
    }
}

#[cfg(test)]
mod tests {
    use super::analyze_artifacts;
    use crate::structs::options::AnalyzeOptions;
    use crate::utils::{cancel::CancelToken, progress::SilentProgress};

    #[test]
    fn test_analyze_requires_existing_input() {
        let options = AnalyzeOptions {
            mft: Some(String::from("./tmp/does_not_exist_mft")),
            usnjrnl: None,
            logfile: None,
        };

        let result = analyze_artifacts(
            &options,
            &CancelToken::new(),
            &mut SilentProgress,
            &mut |_row| Ok(()),
        );
        assert!(result.is_err());
    }
}
