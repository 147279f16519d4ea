use std::fs;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use drain_extract::audit::{audit_records, read_table, render_audit};
use drain_extract::config::ExtractConfig;
use drain_extract::report::lookup_report_value;
use drain_extract::scenario::{run_batch, write_atomic};

/// Drainage record extraction for simulation scenarios
#[derive(Parser)]
#[command(name = "drain-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Per-entity drainage records from network definition and report files", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract record tables, audits and peak statistics for every scenario
    Run(RunArgs),
    /// Regenerate the audit report of an existing record table
    Audit(AuditArgs),
    /// Look up one value of a report table
    Lookup(LookupArgs),
    /// Print the effective configuration as TOML
    ShowConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Configuration file; built-in study setup when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Folder holding the scenario files (overrides the configuration)
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// Output folder (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only run these scenarios
    #[arg(short, long = "scenario")]
    scenarios: Vec<String>,

    /// Run scenarios in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Args)]
struct AuditArgs {
    /// Record table written by `run`
    table: PathBuf,

    /// Write the report here instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct LookupArgs {
    /// Report file
    report: PathBuf,

    /// Section title, matched case-insensitively
    #[arg(short, long)]
    section: String,

    /// Column index (0-based whitespace token)
    #[arg(short, long)]
    column: usize,

    /// Row key
    #[arg(short, long)]
    key: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Audit(args) => audit(args),
        Commands::Lookup(args) => lookup(args),
        Commands::ShowConfig(args) => show_config(args),
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<ExtractConfig> {
    ExtractConfig::load_or_default(args.config.as_deref()).context("loading configuration")
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(dir) = args.base_dir {
        config.base_dir = dir;
    }
    if let Some(dir) = args.output {
        config.output_dir = Some(dir);
    }
    if !args.scenarios.is_empty() {
        config.scenarios = args.scenarios;
    }

    let out_dir = config.output_dir().to_path_buf();
    info!(
        scenarios = config.scenarios.len(),
        base_dir = %config.base_dir.display(),
        output = %out_dir.display(),
        parallel = args.parallel,
        "starting batch"
    );

    let summary = run_batch(&config, &out_dir, args.parallel)?;
    for failure in &summary.failures {
        warn!("{failure}");
    }
    if summary.all_failed() {
        bail!("all {} scenarios failed", summary.failures.len());
    }
    Ok(())
}

fn audit(args: AuditArgs) -> anyhow::Result<()> {
    let file = fs::File::open(&args.table)
        .with_context(|| format!("opening {}", args.table.display()))?;
    let records = read_table(file).with_context(|| format!("reading {}", args.table.display()))?;

    let title = args
        .table
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = render_audit(&title, &audit_records(&records));

    match args.output {
        Some(path) => write_atomic(&path, &text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn lookup(args: LookupArgs) -> anyhow::Result<()> {
    match lookup_report_value(&args.report, &args.section, args.column, &args.key)? {
        Some(value) => println!("{value}"),
        None => bail!("{} not found in {}", args.key, args.section),
    }
    Ok(())
}

fn show_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
