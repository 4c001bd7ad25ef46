use crate::artifacts::logfile::{error::LogfileError, parser::parse_logfile as walk_logfile};
use crate::artifacts::mft::{
    error::MftError,
    master::{build_path_resolver, read_mft},
    path::PathResolver,
};
use crate::artifacts::timeline::analyze_artifacts;
use crate::artifacts::usnjrnl::{error::UsnJrnlError, parser::parse_usnjrnl as walk_usnjrnl};
use crate::error::RelicError;
use crate::filesystem::{
    image::DiskImage,
    ntfs::{extractor::ArtifactExtractor, reader::MftReader, volume::NtfsVolume},
    partitions::{find_ntfs_partitions, select_partitions, Partition},
};
use crate::output::sink::{build_sink, RecordKind, RecordSink};
use crate::structs::options::{
    AnalyzeOptions, ExtractAnalyzeOptions, ExtractOptions, LogfileOptions, MftOptions,
    UsnJrnlOptions,
};
use crate::structs::output::Output;
use crate::structs::stats::{LogfileStats, MftStats, TimelineStats, UsnStats};
use crate::utils::cancel::CancelToken;
use crate::utils::progress::ProgressReporter;
use log::{error, info, warn};
use std::fs::{create_dir_all, remove_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArtifactKind {
    Mft,
    Logfile,
    UsnJrnl,
}

/// One artifact materialized by `extract`
#[derive(Debug, Clone)]
pub struct ExtractedArtifact {
    pub partition: usize,
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Extract `$MFT`, `$LogFile` and `$UsnJrnl:$J` from every selected NTFS
/// partition of a disk image into `out_dir`
pub fn extract(
    options: &ExtractOptions,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<Vec<ExtractedArtifact>, RelicError> {
    let partitions = locate_partitions(&options.image, options.partition)?;
    if create_dir_all(&options.out_dir).is_err() {
        error!("[relic] Could not create output directory {}", options.out_dir);
        return Err(RelicError::InputNotFound);
    }

    let mut artifacts = Vec::new();
    for partition in partitions {
        info!(
            "[relic] Processing partition {} at offset {}",
            partition.index, partition.offset
        );
        extract_partition(options, &partition, cancel, progress, &mut artifacts)?;
    }

    Ok(artifacts)
}

/// Parse a standalone `$MFT` file into the configured sink
pub fn parse_mft(
    options: &MftOptions,
    output: &Output,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<MftStats, RelicError> {
    prepare_output(output)?;
    let name = format!("{}/mft", output.directory);
    let mut sink = build_sink(&output.format, &name, RecordKind::Mft)?;

    run_mft(&options.path, options, sink.as_mut(), cancel, progress)
}

/// Parse a standalone `$UsnJrnl:$J` file into the configured sink, resolving
/// paths through an optional `$MFT`
pub fn parse_usnjrnl(
    options: &UsnJrnlOptions,
    output: &Output,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<UsnStats, RelicError> {
    prepare_output(output)?;
    let name = format!("{}/usnjrnl", output.directory);
    let mut sink = build_sink(&output.format, &name, RecordKind::UsnJrnl)?;

    let resolver = match &options.mft_path {
        Some(path) => Some(load_resolver(path, cancel)?),
        None => None,
    };

    run_usnjrnl(&options.path, resolver.as_ref(), sink.as_mut(), cancel, progress)
}

/// Walk a standalone `$LogFile` into the configured sink
pub fn parse_logfile(
    options: &LogfileOptions,
    output: &Output,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<LogfileStats, RelicError> {
    prepare_output(output)?;
    let name = format!("{}/logfile", output.directory);
    // SQLite adds nothing for a walk this shallow
    let format = if output.format == "sqlite" {
        warn!("[relic] LogFile output falls back to csv");
        "csv"
    } else {
        &output.format
    };
    let mut sink = build_sink(format, &name, RecordKind::Logfile)?;

    run_logfile(&options.path, sink.as_mut(), cancel, progress)
}

/// Correlate extracted artifacts into one unified timeline
pub fn analyze(
    options: &AnalyzeOptions,
    output: &Output,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<TimelineStats, RelicError> {
    if options.mft.is_none() && options.usnjrnl.is_none() && options.logfile.is_none() {
        error!("[relic] Analyze requires at least one artifact");
        return Err(RelicError::InputNotFound);
    }

    prepare_output(output)?;
    let name = format!("{}/unified_timeline", output.directory);
    let mut sink = build_sink(&output.format, &name, RecordKind::Timeline)?;

    let result = analyze_artifacts(options, cancel, progress, &mut |row| {
        let value = match serde_json::to_value(&row) {
            Ok(result) => result,
            Err(_err) => return Err(RelicError::Output(crate::output::error::OutputError::Serialize)),
        };
        sink.write(&value).map_err(RelicError::Output)
    });

    finish_sink(sink.as_mut(), result)
}

/// Extract all artifacts and immediately analyze them, per partition. The
/// extracted copies live in a temporary directory that is removed on success
/// unless `keep_temp` is set, and always preserved on error for diagnosis
pub fn extract_analyze(
    options: &ExtractAnalyzeOptions,
    output: &Output,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<(), RelicError> {
    let temp_dir = format!("{}/temp_extracted", options.out_dir);
    let extract_options = ExtractOptions {
        image: options.image.clone(),
        out_dir: temp_dir.clone(),
        partition: options.partition,
        skip_mft: options.skip_mft,
        skip_logfile: options.skip_logfile,
        skip_usnjrnl: options.skip_usnjrnl,
    };

    let artifacts = extract(&extract_options, cancel, progress)?;
    let result = analyze_extracted(&artifacts, output, cancel, progress);

    match &result {
        Ok(()) => {
            if options.keep_temp {
                info!("[relic] Keeping temporary artifacts in {temp_dir}");
            } else if remove_dir_all(&temp_dir).is_err() {
                warn!("[relic] Could not remove temporary directory {temp_dir}");
            }
        }
        Err(err) => {
            // Extracted artifacts stay behind to aid diagnosis
            warn!("[relic] Leaving temporary artifacts in {temp_dir} after error: {err:?}");
        }
    }

    result
}

/// Parse each extracted artifact next to its partition name
fn analyze_extracted(
    artifacts: &[ExtractedArtifact],
    output: &Output,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<(), RelicError> {
    prepare_output(output)?;

    for artifact in artifacts {
        let input = artifact.path.display().to_string();
        let partition = artifact.partition;

        match artifact.kind {
            ArtifactKind::Mft => {
                let name = format!("{}/partition{partition}_MFT", output.directory);
                let mut sink = build_sink(&output.format, &name, RecordKind::Mft)?;
                let mft_options = MftOptions {
                    path: input.clone(),
                    include_paths: true,
                    active_only: false,
                };
                run_mft(&input, &mft_options, sink.as_mut(), cancel, progress)?;
            }
            ArtifactKind::UsnJrnl => {
                let name = format!("{}/partition{partition}_UsnJrnl", output.directory);
                let mut sink = build_sink(&output.format, &name, RecordKind::UsnJrnl)?;

                // Use the sibling MFT for path resolution when it was extracted
                let mft = artifacts.iter().find(|value| {
                    value.partition == partition && value.kind == ArtifactKind::Mft
                });
                let resolver = match mft {
                    Some(found) => {
                        Some(load_resolver(&found.path.display().to_string(), cancel)?)
                    }
                    None => None,
                };
                run_usnjrnl(&input, resolver.as_ref(), sink.as_mut(), cancel, progress)?;
            }
            ArtifactKind::Logfile => {
                let name = format!("{}/partition{partition}_LogFile", output.directory);
                let format = if output.format == "sqlite" {
                    warn!("[relic] LogFile output falls back to csv");
                    "csv"
                } else {
                    &output.format
                };
                let mut sink = build_sink(format, &name, RecordKind::Logfile)?;
                run_logfile(&input, sink.as_mut(), cancel, progress)?;
            }
        }
    }

    Ok(())
}

/// Open the image and enumerate the selected NTFS partitions
fn locate_partitions(
    image_path: &str,
    target: Option<usize>,
) -> Result<Vec<Partition>, RelicError> {
    let mut image = DiskImage::open(image_path)?;
    info!("[relic] Image size {} bytes", image.size());

    let partitions = find_ntfs_partitions(&mut image)?;
    Ok(select_partitions(partitions, target)?)
}

/// Extract the three artifacts of one partition
fn extract_partition(
    options: &ExtractOptions,
    partition: &Partition,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
    artifacts: &mut Vec<ExtractedArtifact>,
) -> Result<(), RelicError> {
    // The image is opened once per partition and released on completion
    let image = DiskImage::open(&options.image)?;
    let mut volume = NtfsVolume::open(image, partition)?;
    info!(
        "[relic] Volume serial {:016x}: {} sectors, {} sectors per cluster",
        volume.serial_number, volume.total_sectors, volume.sectors_per_cluster
    );
    let reader = MftReader::bootstrap(&mut volume)?;

    let jobs = [
        (ArtifactKind::Mft, options.skip_mft, "MFT"),
        (ArtifactKind::Logfile, options.skip_logfile, "LogFile"),
        (ArtifactKind::UsnJrnl, options.skip_usnjrnl, "UsnJrnl_J"),
    ];

    for (kind, skip, suffix) in jobs {
        if skip {
            continue;
        }

        let path = Path::new(&options.out_dir)
            .join(format!("partition{}_{suffix}", partition.index));
        let file = match File::create(&path) {
            Ok(result) => result,
            Err(err) => {
                error!("[relic] Could not create {}: {err:?}", path.display());
                return Err(RelicError::InputNotFound);
            }
        };
        let mut writer = BufWriter::new(file);

        let mut extractor = ArtifactExtractor {
            volume: &mut volume,
            reader: &reader,
        };
        let result = match kind {
            ArtifactKind::Mft => extractor.extract_mft(&mut writer, cancel, progress),
            ArtifactKind::Logfile => extractor.extract_logfile(&mut writer, cancel, progress),
            ArtifactKind::UsnJrnl => extractor.extract_usnjrnl(&mut writer, cancel, progress),
        };

        match result {
            Ok(written) => {
                info!("[relic] Extracted {} bytes to {}", written, path.display());
                artifacts.push(ExtractedArtifact {
                    partition: partition.index,
                    kind,
                    path,
                });
            }
            Err(crate::filesystem::error::FileSystemError::ArtifactNotFound) => {
                // Journals are frequently absent, keep going
                warn!("[relic] Artifact {suffix} not found on partition {}", partition.index);
                let _ = std::fs::remove_file(&path);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn run_mft(
    input: &str,
    options: &MftOptions,
    sink: &mut dyn RecordSink,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<MftStats, RelicError> {
    let mut reader = open_input(input)?;
    let resolver = if options.include_paths {
        Some(build_path_resolver(&mut reader, cancel).map_err(map_mft_error)?)
    } else {
        None
    };

    let result = read_mft(
        &mut reader,
        options,
        resolver.as_ref(),
        cancel,
        progress,
        &mut |record| {
            let value = match serde_json::to_value(&record) {
                Ok(result) => result,
                Err(_err) => return Err(MftError::OutputData),
            };
            match sink.write(&value) {
                Ok(()) => Ok(()),
                Err(_err) => Err(MftError::OutputData),
            }
        },
    )
    .map_err(map_mft_error);

    finish_sink(sink, result)
}

fn run_usnjrnl(
    input: &str,
    resolver: Option<&PathResolver>,
    sink: &mut dyn RecordSink,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<UsnStats, RelicError> {
    let mut reader = open_input(input)?;

    let result = walk_usnjrnl(&mut reader, resolver, cancel, progress, &mut |row| {
        let value = match serde_json::to_value(&row) {
            Ok(result) => result,
            Err(_err) => return Err(UsnJrnlError::OutputData),
        };
        match sink.write(&value) {
            Ok(()) => Ok(()),
            Err(_err) => Err(UsnJrnlError::OutputData),
        }
    })
    .map_err(map_usnjrnl_error);

    finish_sink(sink, result)
}

fn run_logfile(
    input: &str,
    sink: &mut dyn RecordSink,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
) -> Result<LogfileStats, RelicError> {
    let mut reader = open_input(input)?;

    let result = walk_logfile(&mut reader, cancel, progress, &mut |row| {
        let value = match serde_json::to_value(&row) {
            Ok(result) => result,
            Err(_err) => return Err(LogfileError::OutputData),
        };
        match sink.write(&value) {
            Ok(()) => Ok(()),
            Err(_err) => Err(LogfileError::OutputData),
        }
    })
    .map_err(map_logfile_error);

    finish_sink(sink, result)
}

/// Build a path cache off a `$MFT` file for journal resolution
fn load_resolver(path: &str, cancel: &CancelToken) -> Result<PathResolver, RelicError> {
    info!("[relic] Building path cache from {path}");
    let mut reader = open_input(path)?;
    build_path_resolver(&mut reader, cancel).map_err(map_mft_error)
}

/// Finalize or mark the sink depending on how the pass ended
fn finish_sink<S>(sink: &mut dyn RecordSink, result: Result<S, RelicError>) -> Result<S, RelicError> {
    match result {
        Ok(stats) => {
            sink.finish()?;
            Ok(stats)
        }
        Err(err) if err.is_cancelled() => {
            let _ = sink.cancelled();
            Err(RelicError::Cancelled)
        }
        Err(err) => Err(err),
    }
}

fn prepare_output(output: &Output) -> Result<(), RelicError> {
    if create_dir_all(&output.directory).is_err() {
        error!("[relic] Could not create output directory {}", output.directory);
        return Err(RelicError::InputNotFound);
    }
    Ok(())
}

fn open_input(path: &str) -> Result<BufReader<File>, RelicError> {
    match File::open(path) {
        Ok(result) => Ok(BufReader::new(result)),
        Err(err) => {
            error!("[relic] Could not open input {path}: {err:?}");
            Err(RelicError::InputNotFound)
        }
    }
}

fn map_mft_error(err: MftError) -> RelicError {
    match err {
        MftError::Cancelled => RelicError::Cancelled,
        other => RelicError::Mft(other),
    }
}

fn map_usnjrnl_error(err: UsnJrnlError) -> RelicError {
    match err {
        UsnJrnlError::Cancelled => RelicError::Cancelled,
        other => RelicError::UsnJrnl(other),
    }
}

fn map_logfile_error(err: LogfileError) -> RelicError {
    match err {
        LogfileError::Cancelled => RelicError::Cancelled,
        other => RelicError::Logfile(other),
    }
}

#[cfg(test)]
mod tests {
    use super::{analyze, extract, parse_mft};
    use crate::structs::options::{AnalyzeOptions, ExtractOptions, MftOptions};
    use crate::structs::output::Output;
    use crate::utils::{cancel::CancelToken, progress::SilentProgress};

    #[test]
    fn test_extract_missing_image() {
        let options = ExtractOptions {
            image: String::from("./tmp/does_not_exist.dd"),
            out_dir: String::from("./tmp/extract_missing"),
            partition: None,
            skip_mft: false,
            skip_logfile: false,
            skip_usnjrnl: false,
        };

        let result = extract(&options, &CancelToken::new(), &mut SilentProgress);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_mft_missing_input() {
        let options = MftOptions {
            path: String::from("./tmp/does_not_exist_mft"),
            include_paths: false,
            active_only: false,
        };
        let output = Output::new("./tmp/parse_missing", "csv");

        let result = parse_mft(&options, &output, &CancelToken::new(), &mut SilentProgress);
        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_requires_input() {
        let options = AnalyzeOptions::default();
        let output = Output::new("./tmp/analyze_empty", "csv");

        let result = analyze(&options, &output, &CancelToken::new(), &mut SilentProgress);
        assert!(result.is_err());
    }
}
