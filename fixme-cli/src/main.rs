use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use fixme::{OutputFormat, Reporter, ScanConfig, ScanError, ScanOverrides, ScanRun, Styler};
use std::io::{self, IsTerminal};
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status of a run interrupted with Ctrl-C
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Glob patterns of files to scan (default: common source files and Makefile)
    file_patterns: Vec<String>,

    /// Directory or file to scan (default: current directory)
    #[arg(short = 'p', long)]
    path: Option<PathBuf>,

    /// Glob patterns of directories to skip (default: node_modules/**, .git/**, .hg/**)
    #[arg(short = 'i', long = "ignored-directories")]
    ignored_directories: Vec<String>,

    /// Encoding used to read files (utf8|latin1|ascii)
    #[arg(short = 'e', long = "file-encoding")]
    file_encoding: Option<String>,

    /// Lines longer than this many characters are reported instead of scanned
    #[arg(short = 'l', long = "line-length-limit")]
    line_length_limit: Option<usize>,

    /// Verbs to leave out, or line_length to silence long-line diagnostics
    #[arg(short = 's', long, value_delimiter = ',')]
    skip: Vec<String>,

    /// Number of files scanned at once
    #[arg(short = 'j', long)]
    jobs: Option<NonZeroUsize>,

    /// Configuration file layered over the global and local ones
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report format (text|markdown|json)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Report files as soon as they finish instead of in discovery order
    #[arg(long)]
    unordered: bool,

    /// Only match upper-case verbs
    #[arg(long)]
    case_sensitive: bool,

    /// Only accept the comment styles conventional for each file type
    #[arg(long)]
    strict_styles: bool,

    /// Log level when RUST_LOG is not set (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn overrides(&self) -> ScanOverrides {
        ScanOverrides {
            root_path: self.path.clone(),
            ignored_directories: self.ignored_directories.clone(),
            file_patterns: self.file_patterns.clone(),
            file_encoding: self.file_encoding.clone(),
            line_length_limit: self.line_length_limit,
            skip: self.skip.clone(),
            concurrency: self.jobs,
            case_sensitive: self.case_sensitive,
            strict_comment_styles: self.strict_styles,
            unordered_output: self.unordered,
            no_color: self.no_color,
            format: self.format,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<ScanError>(), Some(ScanError::Cancelled)) => {
            eprintln!("{}", "Scan cancelled".yellow());
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ScanConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(cli.overrides());

    init_tracing(&config.log_level);

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let styler = Styler::new(config.color && io::stdout().is_terminal());
    let format = config.format;
    let run = ScanRun::new(config);

    let cancel = run.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut reporter = Reporter::new(io::stdout(), format, styler);
    let summary = run.execute(&mut reporter).await?;

    debug!(
        "{} annotations in {} files ({} failed)",
        summary.total_annotations, summary.files_with_annotations, summary.files_failed
    );
    Ok(())
}
