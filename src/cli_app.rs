//! Top-level CLI definition and dispatch.
//!
//! The binary is peripheral glue: it loads config, calls the pure library
//! entry points (scan / compare), renders their output, and persists
//! baselines through the injected store. All detection semantics live in
//! the library.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use thiserror::Error;

use entropy_sentinel::compare::{ComparisonReport, Severity, compare};
use entropy_sentinel::core::config::Config;
use entropy_sentinel::core::errors::EsnError;
use entropy_sentinel::logger::{EventType, Level, LogEntry, JsonlWriter};
use entropy_sentinel::scanner::snapshot::Snapshot;
use entropy_sentinel::scanner::{scan_with_stats, walker::WalkStats};
use entropy_sentinel::store::{BaselineStore, JsonBaselineStore};

/// Entropy Sentinel — entropy baseline scanner for bulk-encryption detection.
#[derive(Debug, Parser)]
#[command(
    name = "esn",
    author,
    version,
    about = "Entropy Sentinel - ransomware early-warning via entropy baselines",
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
    /// Quiet mode (alerts and errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan a tree and print its entropy profile.
    Scan(ScanArgs),
    /// Scan a tree and save the snapshot as the baseline for that root.
    Baseline(BaselineArgs),
    /// Re-scan a tree and compare against its saved baseline.
    Compare(CompareArgs),
    /// View and initialize configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Root directory to scan.
    path: PathBuf,
    /// Restrict the scan to these extensions (comma separated, e.g. docx,sql).
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    extensions: Option<Vec<String>>,
    /// Also save this snapshot as the baseline for the root.
    #[arg(long)]
    save_baseline: bool,
    /// Suspicious files shown in text output.
    #[arg(long, default_value_t = 10, value_name = "N")]
    top: usize,
}

#[derive(Debug, Clone, Args)]
struct BaselineArgs {
    /// Root directory to scan.
    path: PathBuf,
    /// Restrict the scan to these extensions (comma separated).
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Args)]
struct CompareArgs {
    /// Root directory to re-scan.
    path: PathBuf,
    /// Restrict the scan to these extensions (comma separated).
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    extensions: Option<Vec<String>>,
    /// Explicit baseline snapshot file instead of the stored one.
    #[arg(long, value_name = "PATH")]
    baseline_file: Option<PathBuf>,
    /// Replace the stored baseline with the current snapshot afterwards.
    #[arg(long)]
    update_baseline: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Write a default config file if none exists.
    Init,
    /// Print the config file path.
    Path,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    shell: CompletionShell,
}

/// CLI-level error wrapper.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Esn(#[from] EsnError),
    #[error("{0}")]
    Message(String),
}

/// Dispatch the parsed CLI. Returns the process exit code: compare maps its
/// report severity to 0/1/2, everything else exits 0 on success.
pub fn run(cli: &Cli) -> Result<i32, CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    if let Command::Completions(args) = &cli.command {
        generate(args.shell, &mut Cli::command(), "esn", &mut io::stdout());
        return Ok(0);
    }

    let config = Config::load(cli.config.as_deref())?;

    let result = match &cli.command {
        Command::Scan(args) => run_scan(cli, &config, args),
        Command::Baseline(args) => run_baseline(cli, &config, args),
        Command::Compare(args) => run_compare(cli, &config, args),
        Command::Config(args) => run_config(cli, &config, args),
        Command::Completions(_) => unreachable!("handled above"),
    };

    if let Err(CliError::Esn(err)) = &result {
        let mut log = JsonlWriter::open(config.paths.jsonl_log.clone());
        let mut entry = LogEntry::new(EventType::Error, Level::Critical);
        entry.error_code = Some(err.code().to_string());
        entry.details = Some(err.to_string());
        log.write_entry(&entry);
    }

    result
}

fn extension_set(extensions: Option<&Vec<String>>) -> Option<HashSet<String>> {
    extensions.map(|list| list.iter().cloned().collect())
}

fn run_scan(cli: &Cli, config: &Config, args: &ScanArgs) -> Result<i32, CliError> {
    let filter = extension_set(args.extensions.as_ref());
    let started = Instant::now();
    let (snapshot, stats) = scan_with_stats(&args.path, config, filter.as_ref(), None)?;
    let duration_ms = duration_ms(started);

    let mut log = JsonlWriter::open(config.paths.jsonl_log.clone());
    log_scan(&mut log, &snapshot, duration_ms, config);

    if cli.json {
        println!("{}", snapshot.to_json()?);
    } else if !cli.quiet {
        render_snapshot(&snapshot, args.top, config);
        if cli.verbose {
            render_stats(&stats, duration_ms);
        }
    }

    if args.save_baseline {
        let store = JsonBaselineStore::new(config.paths.baseline_dir.clone());
        let written = store.save(&snapshot)?;
        log_baseline_saved(&mut log, &snapshot);
        if !cli.quiet && !cli.json {
            println!("\nBaseline saved: {}", written.display());
        }
    }

    Ok(0)
}

fn run_baseline(cli: &Cli, config: &Config, args: &BaselineArgs) -> Result<i32, CliError> {
    let filter = extension_set(args.extensions.as_ref());
    let started = Instant::now();
    let (snapshot, _) = scan_with_stats(&args.path, config, filter.as_ref(), None)?;
    let duration_ms = duration_ms(started);

    let store = JsonBaselineStore::new(config.paths.baseline_dir.clone());
    let written = store.save(&snapshot)?;

    let mut log = JsonlWriter::open(config.paths.jsonl_log.clone());
    log_scan(&mut log, &snapshot, duration_ms, config);
    log_baseline_saved(&mut log, &snapshot);

    if cli.json {
        println!("{}", snapshot.to_json()?);
    } else if !cli.quiet {
        println!(
            "Baseline for {} ({} files, avg {:.4} bits/byte)",
            snapshot.path.display(),
            snapshot.total_files,
            snapshot.avg_entropy
        );
        println!("Saved: {}", written.display());
    }

    Ok(0)
}

fn run_compare(cli: &Cli, config: &Config, args: &CompareArgs) -> Result<i32, CliError> {
    let store = JsonBaselineStore::new(config.paths.baseline_dir.clone());
    let baseline = load_baseline(&store, &args.path, args.baseline_file.as_deref())?;

    let filter = extension_set(args.extensions.as_ref());
    let started = Instant::now();
    let (current, _) = scan_with_stats(&args.path, config, filter.as_ref(), None)?;
    let duration_ms = duration_ms(started);

    let report = compare(&baseline, &current, &config.compare);

    let mut log = JsonlWriter::open(config.paths.jsonl_log.clone());
    log_scan(&mut log, &current, duration_ms, config);
    log_compare(&mut log, &current, &report);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report).map_err(EsnError::from)?);
    } else {
        render_report(&report, &baseline, &current, cli.quiet);
    }

    if args.update_baseline {
        store.save(&current)?;
        log_baseline_saved(&mut log, &current);
        if !cli.quiet && !cli.json {
            println!("Baseline updated.");
        }
    }

    Ok(report.severity.exit_code())
}

fn run_config(cli: &Cli, config: &Config, args: &ConfigArgs) -> Result<i32, CliError> {
    match args.action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| CliError::Message(format!("config render failure: {e}")))?;
            println!("{rendered}");
        }
        ConfigAction::Init => {
            let path = Config::default_path();
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| EsnError::io(parent, source))?;
                }
                let rendered = toml::to_string_pretty(&Config::default())
                    .map_err(|e| CliError::Message(format!("config render failure: {e}")))?;
                fs::write(&path, rendered).map_err(|source| EsnError::io(&path, source))?;
                println!("Created default config at {}", path.display());
            }
        }
        ConfigAction::Path => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(0)
}

fn load_baseline(
    store: &JsonBaselineStore,
    root: &Path,
    explicit: Option<&Path>,
) -> Result<Snapshot, EsnError> {
    match explicit {
        Some(file) => {
            let raw = fs::read_to_string(file).map_err(|source| EsnError::io(file, source))?;
            Snapshot::from_json(&raw)
        }
        None => store.load(root),
    }
}

// ──────────────────────── rendering ────────────────────────

fn render_snapshot(snapshot: &Snapshot, top: usize, config: &Config) {
    println!("Scanned: {}", snapshot.path.display());
    println!("Files scanned: {}", snapshot.total_files);
    println!("Average entropy: {:.4} bits/byte", snapshot.avg_entropy);
    println!(
        "High entropy (>{:.1}): {}",
        config.sampler.high_threshold, snapshot.high_entropy_count
    );
    println!(
        "Very high (>{:.1}): {}",
        config.sampler.very_high_threshold, snapshot.very_high_count
    );

    if !snapshot.suspicious.is_empty() {
        println!(
            "\n{} ({}):",
            "Suspicious files".red().bold(),
            snapshot.suspicious.len()
        );
        for record in snapshot.suspicious.iter().take(top) {
            println!(
                "  {:.4} b/B  {:>12} bytes  {}",
                record.entropy,
                record.size,
                record.path.display()
            );
        }
    }

    if !snapshot.by_extension.is_empty() {
        println!("\nEntropy by extension:");
        let mut entries: Vec<_> = snapshot.by_extension.iter().collect();
        entries.sort_by(|a, b| {
            b.1.avg_entropy
                .partial_cmp(&a.1.avg_entropy)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (ext, stats) in entries.iter().take(15) {
            let label = if ext.is_empty() { "(none)" } else { ext };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bar = "█".repeat(stats.avg_entropy.max(0.0) as usize);
            println!(
                "  {label:>8}  {:.2} {bar}  ({} files)",
                stats.avg_entropy, stats.count
            );
        }
    }
}

fn render_stats(stats: &WalkStats, duration_ms: u64) {
    println!("\nWalk: {duration_ms} ms");
    println!(
        "  seen {} / sampled {} / below-floor {} / filtered {} / unstatable {} / unreadable {} / pruned dirs {}",
        stats.files_seen,
        stats.files_sampled,
        stats.skipped_small,
        stats.skipped_filtered,
        stats.unstatable,
        stats.unreadable,
        stats.dirs_pruned
    );
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Critical => severity.label().red().bold().to_string(),
        Severity::High => severity.label().yellow().bold().to_string(),
        Severity::Ok => severity.label().green().to_string(),
    }
}

fn render_report(report: &ComparisonReport, baseline: &Snapshot, current: &Snapshot, quiet: bool) {
    if !quiet {
        println!("Baseline: {} ({} files)", report.baseline_time, baseline.total_files);
        println!("Current:  {} ({} files)", report.timestamp, current.total_files);
        println!("Entropy delta: {:+.4} bits/byte", report.entropy_delta);
        println!();
    }

    if report.alerts.is_empty() {
        println!("{}  no anomalies detected", severity_label(report.severity));
        return;
    }

    println!(
        "{}  {} alert(s)",
        severity_label(report.severity),
        report.alerts.len()
    );
    for alert in &report.alerts {
        println!("  [{}] {}", severity_label(alert.severity), alert.message);
    }
}

// ──────────────────────── activity log ────────────────────────

fn duration_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn log_scan(log: &mut JsonlWriter, snapshot: &Snapshot, duration_ms: u64, config: &Config) {
    let mut entry = LogEntry::new(EventType::ScanComplete, Level::Info);
    entry.root = Some(snapshot.path.display().to_string());
    entry.total_files = Some(snapshot.total_files);
    entry.avg_entropy = Some(snapshot.avg_entropy);
    entry.very_high_count = Some(snapshot.very_high_count);
    entry.duration_ms = Some(duration_ms);
    entry.config_hash = config.stable_hash().ok();
    log.write_entry(&entry);
}

fn log_baseline_saved(log: &mut JsonlWriter, snapshot: &Snapshot) {
    let mut entry = LogEntry::new(EventType::BaselineSaved, Level::Info);
    entry.root = Some(snapshot.path.display().to_string());
    entry.total_files = Some(snapshot.total_files);
    log.write_entry(&entry);
}

fn log_compare(log: &mut JsonlWriter, current: &Snapshot, report: &ComparisonReport) {
    let level = match report.severity {
        Severity::Ok => Level::Info,
        Severity::High => Level::Warning,
        Severity::Critical => Level::Critical,
    };
    let mut entry = LogEntry::new(EventType::CompareComplete, level);
    entry.root = Some(current.path.display().to_string());
    entry.severity = Some(report.severity.label().to_string());
    entry.details = Some(format!("entropy_delta={:+.4}", report.entropy_delta));
    log.write_entry(&entry);

    for alert in &report.alerts {
        let mut alert_entry = LogEntry::new(EventType::Alert, level);
        alert_entry.root = Some(current.path.display().to_string());
        alert_entry.signal = Some(
            serde_json::to_value(alert.signal)
                .ok()
                .and_then(|v| v.as_str().map(ToString::to_string))
                .unwrap_or_default(),
        );
        alert_entry.severity = Some(alert.severity.label().to_string());
        alert_entry.details = Some(alert.message.clone());
        log.write_entry(&alert_entry);
    }
}
