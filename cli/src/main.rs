use clap::{Parser, Subcommand};
use log::LevelFilter;
use relic::error::RelicError;
use relic::CancelToken;
use simplelog::{Config, WriteLogger};
use std::fs::{create_dir_all, File};
use std::process::ExitCode;

mod commands;
mod progress;

const EXIT_INPUT_ERROR: u8 = 2;
const EXIT_FORMAT_ERROR: u8 = 3;
const EXIT_PARTIAL: u8 = 4;
const EXIT_CANCELLED: u8 = 5;

#[derive(Parser)]
#[command(name = "relic")]
#[command(version)]
#[command(about = "NTFS forensic parser for MFT, LogFile and UsnJrnl:$J artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log informational messages as well as warnings
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract artifacts from a disk image
    Extract {
        /// Path to the disk image (raw/DD; E01 is detected but unsupported)
        #[arg(long)]
        image: String,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Only process the n-th NTFS partition (zero based)
        #[arg(short, long)]
        partition: Option<usize>,
        #[arg(long)]
        skip_mft: bool,
        #[arg(long)]
        skip_logfile: bool,
        #[arg(long)]
        skip_usnjrnl: bool,
    },
    /// Parse a $MFT file
    ParseMft {
        /// Path to the $MFT file
        #[arg(short, long)]
        input: String,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Output format
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Only include active (in use) entries
        #[arg(long)]
        active_only: bool,
        /// Skip full path reconstruction (saves a pass over the file)
        #[arg(long)]
        no_paths: bool,
    },
    /// Parse a $UsnJrnl:$J file
    ParseUsnjrnl {
        /// Path to the $J file
        #[arg(short, long)]
        input: String,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Output format
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Path to a $MFT file for full path resolution
        #[arg(long)]
        mft: Option<String>,
    },
    /// Walk a $LogFile
    ParseLogfile {
        /// Path to the $LogFile
        #[arg(short, long)]
        input: String,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Output format (csv or json)
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
    /// Unified analysis of extracted artifacts
    Analyze {
        /// Path to a $MFT file
        #[arg(long)]
        mft: Option<String>,
        /// Path to a $J file
        #[arg(long)]
        usnjrnl: Option<String>,
        /// Path to a $LogFile
        #[arg(long)]
        logfile: Option<String>,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Output format
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
    /// Extract from an image and analyze in one step
    ExtractAnalyze {
        /// Path to the disk image (raw/DD; E01 is detected but unsupported)
        #[arg(long)]
        image: String,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Only process the n-th NTFS partition (zero based)
        #[arg(short, long)]
        partition: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "sqlite")]
        format: String,
        /// Keep the temporary extracted artifacts
        #[arg(long)]
        keep_temp: bool,
        #[arg(long)]
        skip_mft: bool,
        #[arg(long)]
        skip_logfile: bool,
        #[arg(long)]
        skip_usnjrnl: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli);

    let cancel = CancelToken::new();
    let result = commands::run(&cli.command, &cancel);

    match result {
        Ok(partial) => {
            if partial {
                println!("[relic] Completed with recovered records, see the log for details");
                return ExitCode::from(EXIT_PARTIAL);
            }
            println!("[relic] Completed");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("[relic] Failed: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Map fatal errors onto the documented exit codes
fn exit_code(err: &RelicError) -> u8 {
    if err.is_cancelled() {
        return EXIT_CANCELLED;
    }
    if err.is_format_error() {
        return EXIT_FORMAT_ERROR;
    }

    EXIT_INPUT_ERROR
}

/// Warnings and errors go to a log file next to the output
fn setup_logging(cli: &Cli) {
    let directory = commands::output_directory(&cli.command);
    if create_dir_all(directory).is_err() {
        return;
    }

    let level = if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    if let Ok(log_file) = File::create(format!("{directory}/relic.log")) {
        let _ = WriteLogger::init(level, Config::default(), log_file);
    }
}
