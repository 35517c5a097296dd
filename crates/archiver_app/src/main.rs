//! archiver - keeps dated local copies of a configured list of web resources.

mod commands;
mod config;
mod publish;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use archiver_core::ValidationPolicy;
use archiver_logging::LogDestination;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "archiver")]
#[command(version)]
#[command(about = "Keeps dated local copies of configured web resources")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ARCHIVER_CONFIG", default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Site root holding the archive, metadata and report (defaults to the config file's directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture every artifact, update the metadata and write the report
    Run {
        /// Override the configured pre-validation policy
        #[arg(long, value_enum)]
        validation: Option<ValidationArg>,

        /// Skip the configured publish step
        #[arg(long)]
        no_publish: bool,
    },

    /// Probe every artifact without capturing anything
    Validate,

    /// Show the recorded captures
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ValidationArg {
    Disabled,
    FailFast,
    WarnOnly,
}

impl From<ValidationArg> for ValidationPolicy {
    fn from(value: ValidationArg) -> Self {
        match value {
            ValidationArg::Disabled => ValidationPolicy::Disabled,
            ValidationArg::FailFast => ValidationPolicy::FailFast,
            ValidationArg::WarnOnly => ValidationPolicy::WarnOnly,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let destination = match cli.log_file.clone() {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    archiver_logging::initialize(destination, cli.verbose);

    let site_root = cli.root.clone().unwrap_or_else(|| {
        cli.config
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let context = commands::Context {
        config_path: cli.config,
        site_root,
    };

    match cli.command {
        Commands::Run {
            validation,
            no_publish,
        } => commands::run(&context, validation.map(Into::into), !no_publish),
        Commands::Validate => commands::validate(&context),
        Commands::Status => commands::status(&context),
    }
}
