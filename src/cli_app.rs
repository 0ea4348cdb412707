//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use inverter_tacho::analysis::Dataset;
use inverter_tacho::analysis::decode::format_timestamp;
use inverter_tacho::analysis::report::format_constant;
use inverter_tacho::analysis::series::FieldSeries;
use inverter_tacho::analysis::stats::Histogram;
use inverter_tacho::core::config::Config;
use inverter_tacho::core::errors::TachoError;
use inverter_tacho::live::fetch::LiveClient;
use inverter_tacho::live::gauge::GaugeBoard;
use inverter_tacho::live::poller::{
    CancellationToken, LiveSnapshot, PollLoop, PollSettings, PollStats,
};
use inverter_tacho::live::session::{LiveSession, SessionStats};
use inverter_tacho::live::signals::cancel_on_shutdown_signals;
use inverter_tacho::logging::{Verbosity, init_logging};
use inverter_tacho::store::SnapshotStore;

/// Plot-matrix column count.
const PLOT_COLUMNS: usize = 3;
/// Cells in a human-mode gauge bar.
const BAR_WIDTH: usize = 24;

/// Ahoy-DTU live gauges, snapshot recorder, and offline series analysis.
#[derive(Debug, Parser)]
#[command(
    name = "tacho",
    author,
    version,
    about = "Ahoy-DTU inverter tachometer and snapshot analyzer",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Poll the live endpoint, show gauges, and record snapshots.
    Poll(PollArgs),
    /// Print the static/dynamic summary report of recorded snapshots.
    Report(ReportArgs),
    /// List static and dynamic fields and the plot-matrix selection.
    Fields(DbArgs),
    /// Export one field's series or histogram.
    Series(SeriesArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct DbArgs {
    /// Snapshot database (defaults to paths.sqlite_db).
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct PollArgs {
    /// Show gauges only; do not record snapshots.
    #[arg(long)]
    no_save: bool,
    /// Poll exactly once and exit.
    #[arg(long, conflicts_with = "max_polls")]
    once: bool,
    /// Stop after this many poll attempts.
    #[arg(long, value_name = "N")]
    max_polls: Option<u64>,
    /// Delay between polls (defaults to poller.interval_ms).
    #[arg(long, value_name = "MILLISECONDS")]
    interval_ms: Option<u64>,
    /// Full live endpoint URL (defaults to poller.base_url + poller.live_path).
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Clone, Args, Default)]
struct ReportArgs {
    /// Also write the text report to this file.
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Clone, Args)]
struct SeriesArgs {
    /// Field name, e.g. P_AC.
    field: String,
    /// Emit histogram bins instead of raw points.
    #[arg(long)]
    histogram: bool,
    /// Histogram bin count (defaults to report.histogram_bins).
    #[arg(long, value_name = "N", requires = "histogram")]
    bins: Option<usize>,
    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<TachoError> for CliError {
    fn from(error: TachoError) -> Self {
        match error {
            TachoError::InvalidConfig { .. }
            | TachoError::MissingConfig { .. }
            | TachoError::ConfigParse { .. } => Self::User(error.to_string()),
            _ => Self::Runtime(error.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    if let Command::Completions(args) = &cli.command {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(args.shell, &mut command, binary_name, &mut io::stdout());
        return Ok(());
    }

    let loaded = Config::load(cli.config.as_deref());
    let level = loaded
        .as_ref()
        .map_or("info", |config| config.logging.level.as_str());
    init_logging(level, Verbosity::from_flags(cli.verbose, cli.quiet));
    let config = loaded?;
    tracing::debug!(
        path = %config.paths.config_file.display(),
        hash = %config.stable_hash().unwrap_or_default(),
        "configuration loaded"
    );

    match &cli.command {
        Command::Poll(args) => run_poll(cli, &config, args),
        Command::Report(args) => run_report(cli, &config, args),
        Command::Fields(args) => run_fields(cli, &config, args),
        Command::Series(args) => run_series(cli, &config, args),
        Command::Config(args) => run_config(cli, &config, args),
        Command::Completions(_) => Ok(()),
    }
}

// ──────────────────── poll ────────────────────

fn run_poll(cli: &Cli, config: &Config, args: &PollArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let interval_ms = args.interval_ms.unwrap_or(config.poller.interval_ms);
    if interval_ms == 0 {
        return Err(CliError::User("--interval-ms must be positive".to_string()));
    }
    if args.max_polls == Some(0) {
        return Err(CliError::User("--max-polls must be positive".to_string()));
    }

    let url = args
        .url
        .clone()
        .unwrap_or_else(|| config.poller.live_url());
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CliError::User(format!("--url must be http(s): {url}")));
    }

    let persist = config.poller.persist && !args.no_save;
    let db_path = resolve_db(config, &args.db);
    let store = if persist {
        Some(SnapshotStore::open(&db_path)?)
    } else {
        None
    };

    let settings = PollSettings {
        interval: std::time::Duration::from_millis(interval_ms),
        max_polls: if args.once { Some(1) } else { args.max_polls },
    };
    let token = CancellationToken::new();
    cancel_on_shutdown_signals(&token);

    tracing::info!(%url, interval_ms, persist, db = %db_path.display(), "polling started");
    let client = LiveClient::new(url, config.poller.timeout());
    let (rx, handle) =
        PollLoop::new(client, settings, token.clone()).spawn(config.poller.channel_capacity)?;

    let mut session = LiveSession::new(GaugeBoard::new(&config.gauges));
    if let Some(store) = &store {
        session = session.with_store(store);
    }

    let output = session.drain(&rx, &token, |snapshot, board| match mode {
        OutputMode::Human => print_board(snapshot, board).map_err(CliError::from),
        OutputMode::Json => write_json_line(&json!({
            "command": "poll",
            "captured_at": format_timestamp(&snapshot.captured_at),
            "gauges": board.readings(),
        })),
    });

    let poll_stats = handle
        .join()
        .map_err(|_| CliError::Internal("poller thread panicked".to_string()))?;
    output?;

    let session_stats = session.stats();
    tracing::info!(
        attempts = poll_stats.attempts,
        failures = poll_stats.failures,
        saved = session_stats.saved,
        "polling stopped"
    );
    match mode {
        OutputMode::Human => print_poll_summary(&poll_stats, &session_stats, store.as_ref()),
        OutputMode::Json => write_json_line(&json!({
            "command": "poll",
            "summary": {
                "poll": poll_stats,
                "session": session_stats,
                "db": store.as_ref().map(|s| s.path().to_string_lossy().into_owned()),
            },
        }))?,
    }
    Ok(())
}

fn print_board(snapshot: &LiveSnapshot, board: &GaugeBoard) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", format_timestamp(&snapshot.captured_at).bold())?;
    for reading in board.readings() {
        let label = reading.label();
        let label = if reading.seen {
            label.normal()
        } else {
            label.dimmed()
        };
        writeln!(
            out,
            "  {:<12} {:>5} {} {}",
            reading.field,
            reading.dial_position(),
            reading.bar(BAR_WIDTH),
            label
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn print_poll_summary(poll: &PollStats, session: &SessionStats, store: Option<&SnapshotStore>) {
    let failures = if poll.failures > 0 {
        poll.failures.to_string().yellow()
    } else {
        poll.failures.to_string().normal()
    };
    println!(
        "Polled {} times: {} ok, {} failed.",
        poll.attempts, poll.successes, failures
    );
    if let Some(store) = store {
        println!(
            "Saved {} snapshots to {}.",
            session.saved,
            store.path().display()
        );
        if session.save_failures > 0 {
            println!(
                "{}",
                format!("{} snapshots could not be saved.", session.save_failures).red()
            );
        }
    }
}

// ──────────────────── report / fields / series ────────────────────

fn load_dataset(config: &Config, db: &DbArgs) -> Result<Dataset, CliError> {
    let path = resolve_db(config, db);
    let store = SnapshotStore::open_existing(&path)?;
    let dataset = Dataset::load_from_store(&store);
    if let Some(error) = &dataset.diagnostics.read_error {
        eprintln!(
            "{} could not read snapshots from {}: {error}",
            "warning:".yellow().bold(),
            path.display()
        );
    }
    Ok(dataset)
}

fn run_report(cli: &Cli, config: &Config, args: &ReportArgs) -> Result<(), CliError> {
    let dataset = load_dataset(config, &args.db)?;
    let report = dataset.report();
    let text = report.render_text();

    if let Some(output) = &args.output {
        write_file(output, &text)?;
    }

    match output_mode(cli) {
        OutputMode::Human => {
            print!("{text}");
            if let Some(output) = &args.output {
                eprintln!("Report written to {}", output.display());
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "report",
                "report": report,
                "diagnostics": dataset.diagnostics,
                "output": args.output.as_ref().map(|p| p.to_string_lossy().into_owned()),
            }))?;
        }
    }
    Ok(())
}

fn run_fields(cli: &Cli, config: &Config, args: &DbArgs) -> Result<(), CliError> {
    let dataset = load_dataset(config, args)?;
    let classification = dataset.classify();
    let plotted: Vec<&str> = classification
        .plot_fields(config.report.max_plot_fields)
        .map(|s| s.name.as_str())
        .collect();
    let matrix: Vec<Vec<&str>> = plotted
        .chunks(PLOT_COLUMNS)
        .map(<[&str]>::to_vec)
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{} ({})",
                "Static fields".bold(),
                classification.static_fields.len()
            );
            for entry in &classification.static_fields {
                println!(
                    "  {:<14} {:>12}  recorded at {}",
                    entry.name,
                    format_constant(entry.value),
                    format_timestamp(&entry.first_seen)
                );
            }
            println!(
                "{} ({})",
                "Dynamic fields".bold(),
                classification.dynamic_fields.len()
            );
            for series in &classification.dynamic_fields {
                println!("  {:<14} {:>6} points", series.name, series.len());
            }
            if !matrix.is_empty() {
                println!("{}", "Plot matrix".bold());
                for row in &matrix {
                    let cells: Vec<String> = row.iter().map(|name| format!("{name:<14}")).collect();
                    println!("  {}", cells.join(" ").trim_end());
                }
            }
        }
        OutputMode::Json => {
            let static_fields: Vec<Value> = classification
                .static_fields
                .iter()
                .map(|e| {
                    json!({
                        "name": e.name,
                        "value": e.value,
                        "recorded_at": format_timestamp(&e.first_seen),
                    })
                })
                .collect();
            let dynamic_fields: Vec<Value> = classification
                .dynamic_fields
                .iter()
                .map(|s| json!({ "name": s.name, "points": s.len() }))
                .collect();
            write_json_line(&json!({
                "command": "fields",
                "static": static_fields,
                "dynamic": dynamic_fields,
                "plot_matrix": matrix,
                "diagnostics": dataset.diagnostics,
            }))?;
        }
    }
    Ok(())
}

fn run_series(cli: &Cli, config: &Config, args: &SeriesArgs) -> Result<(), CliError> {
    let dataset = load_dataset(config, &args.db)?;
    let series = dataset
        .series
        .get(&args.field)
        .ok_or_else(|| CliError::User(format!("no recorded values for field {:?}", args.field)))?;

    if args.histogram {
        let bins = args.bins.unwrap_or(config.report.histogram_bins);
        if bins == 0 {
            return Err(CliError::User("--bins must be positive".to_string()));
        }
        let histogram = Histogram::compute(&series.values(), bins).ok_or_else(|| {
            CliError::Internal(format!("series {:?} has no values", series.name))
        })?;
        emit_histogram(cli, series, &histogram)
    } else {
        emit_points(cli, series)
    }
}

fn emit_points(cli: &Cli, series: &FieldSeries) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            let mut out = io::stdout().lock();
            writeln!(out, "timestamp,value")?;
            for point in &series.points {
                writeln!(out, "{},{}", format_timestamp(&point.timestamp), point.value)?;
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "series",
            "field": series.name,
            "points": series.points,
        }))?,
    }
    Ok(())
}

fn emit_histogram(cli: &Cli, series: &FieldSeries, histogram: &Histogram) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            let mut out = io::stdout().lock();
            writeln!(out, "lower,upper,count")?;
            for bin in &histogram.bins {
                writeln!(out, "{},{},{}", bin.lower, bin.upper, bin.count)?;
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "series",
            "field": series.name,
            "histogram": histogram,
        }))?,
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, config: &Config, args: &ConfigArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    match args.command.unwrap_or(ConfigCommand::Path) {
        ConfigCommand::Path => {
            let path = &config.paths.config_file;
            let exists = path.exists();
            match mode {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": exists,
                }))?,
            }
        }
        ConfigCommand::Show => match mode {
            OutputMode::Human => {
                let toml_str = toml::to_string_pretty(config)
                    .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                println!("{toml_str}");
            }
            OutputMode::Json => write_json_line(&json!({
                "command": "config show",
                "config": serde_json::to_value(config)?,
            }))?,
        },
        ConfigCommand::Validate => {
            let hash = config.stable_hash()?;
            match mode {
                OutputMode::Human => {
                    println!("Configuration is valid.");
                    println!("  Source: {}", config.paths.config_file.display());
                    println!("  Hash: {hash}");
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config validate",
                    "valid": true,
                    "path": config.paths.config_file.to_string_lossy(),
                    "hash": hash,
                }))?,
            }
        }
    }
    Ok(())
}

// ──────────────────── helpers ────────────────────

fn resolve_db(config: &Config, db: &DbArgs) -> PathBuf {
    db.db
        .clone()
        .unwrap_or_else(|| config.paths.sqlite_db.clone())
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TachoError::io(parent, source))?;
    }
    fs::write(path, contents).map_err(|source| TachoError::io(path, source))?;
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("TACHO_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    // "human", "auto", unset and unknown values all render for people.
    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
