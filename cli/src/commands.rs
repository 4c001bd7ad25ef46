use crate::progress::StderrProgress;
use crate::Commands;
use relic::core::{analyze, extract, extract_analyze, parse_logfile, parse_mft, parse_usnjrnl};
use relic::error::RelicError;
use relic::structs::options::{
    AnalyzeOptions, ExtractAnalyzeOptions, ExtractOptions, LogfileOptions, MftOptions,
    UsnJrnlOptions,
};
use relic::structs::output::Output;
use relic::CancelToken;

/// Dispatch one subcommand. The boolean marks a partial result (recovered
/// records were counted)
pub(crate) fn run(command: &Commands, cancel: &CancelToken) -> Result<bool, RelicError> {
    let mut progress = StderrProgress::default();

    match command {
        Commands::Extract {
            image,
            output,
            partition,
            skip_mft,
            skip_logfile,
            skip_usnjrnl,
        } => {
            let options = ExtractOptions {
                image: image.clone(),
                out_dir: output.clone(),
                partition: *partition,
                skip_mft: *skip_mft,
                skip_logfile: *skip_logfile,
                skip_usnjrnl: *skip_usnjrnl,
            };
            let artifacts = extract(&options, cancel, &mut progress)?;
            for artifact in &artifacts {
                println!("[relic] Extracted {}", artifact.path.display());
            }
            Ok(false)
        }
        Commands::ParseMft {
            input,
            output,
            format,
            active_only,
            no_paths,
        } => {
            let options = MftOptions {
                path: input.clone(),
                include_paths: !no_paths,
                active_only: *active_only,
            };
            let stats = parse_mft(&options, &Output::new(output, format), cancel, &mut progress)?;
            println!(
                "[relic] {} records ({} corrupt, {} fixup mismatches, {} path cycles, {} stale parents)",
                stats.records,
                stats.corrupt,
                stats.fixup_mismatches,
                stats.path_cycles,
                stats.stale_parents
            );
            Ok(stats.recovered() > 0)
        }
        Commands::ParseUsnjrnl {
            input,
            output,
            format,
            mft,
        } => {
            let options = UsnJrnlOptions {
                path: input.clone(),
                mft_path: mft.clone(),
            };
            let stats =
                parse_usnjrnl(&options, &Output::new(output, format), cancel, &mut progress)?;
            println!(
                "[relic] {} rows from {} records ({} corrupt, {} sparse bytes skipped)",
                stats.rows, stats.records, stats.corrupt, stats.sparse_bytes_skipped
            );
            Ok(stats.corrupt > 0)
        }
        Commands::ParseLogfile {
            input,
            output,
            format,
        } => {
            let options = LogfileOptions {
                path: input.clone(),
            };
            let stats =
                parse_logfile(&options, &Output::new(output, format), cancel, &mut progress)?;
            println!(
                "[relic] {} records from {} pages ({} corrupt)",
                stats.records, stats.pages, stats.corrupt
            );
            Ok(stats.corrupt > 0)
        }
        Commands::Analyze {
            mft,
            usnjrnl,
            logfile,
            output,
            format,
        } => {
            let options = AnalyzeOptions {
                mft: mft.clone(),
                usnjrnl: usnjrnl.clone(),
                logfile: logfile.clone(),
            };
            let stats = analyze(&options, &Output::new(output, format), cancel, &mut progress)?;
            println!("[relic] {} timeline rows", stats.rows);

            let corrupt = stats.mft.map(|value| value.recovered()).unwrap_or(0)
                + stats.usnjrnl.map(|value| value.corrupt).unwrap_or(0)
                + stats.logfile.map(|value| value.corrupt).unwrap_or(0);
            Ok(corrupt > 0)
        }
        Commands::ExtractAnalyze {
            image,
            output,
            partition,
            format,
            keep_temp,
            skip_mft,
            skip_logfile,
            skip_usnjrnl,
        } => {
            let options = ExtractAnalyzeOptions {
                image: image.clone(),
                out_dir: output.clone(),
                partition: *partition,
                keep_temp: *keep_temp,
                skip_mft: *skip_mft,
                skip_logfile: *skip_logfile,
                skip_usnjrnl: *skip_usnjrnl,
            };
            extract_analyze(&options, &Output::new(output, format), cancel, &mut progress)?;
            Ok(false)
        }
    }
}

/// Where this command writes, used for the log file
pub(crate) fn output_directory(command: &Commands) -> &str {
    match command {
        Commands::Extract { output, .. } => output,
        Commands::ParseMft { output, .. } => output,
        Commands::ParseUsnjrnl { output, .. } => output,
        Commands::ParseLogfile { output, .. } => output,
        Commands::Analyze { output, .. } => output,
        Commands::ExtractAnalyze { output, .. } => output,
    }
}
