// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sortdesk: keyword document sorter
//!
//! Runs repeated classification and placement passes over a target
//! directory and reports how stable the results are across passes.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{debug, info, warn};

use sortdesk::classify::ClassificationResult;
use sortdesk::config::AppConfig;
use sortdesk::ledger::RunLedger;
use sortdesk::pipeline::{stop_channel, BatchReport, Orchestrator, RunSummary, StopHandle};
use sortdesk::placement::LocalDestination;
use sortdesk::source::{should_process, LocalSource};
use sortdesk::{Result, SortdeskError};

/// Sortdesk CLI - keyword document sorter
#[derive(Parser, Debug)]
#[command(name = "sortdesk")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Sort documents into category folders by keyword", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Target directory (overrides config)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run full classification and placement passes over the target directory
    Run {
        /// Number of passes (overrides config)
        #[arg(short, long)]
        runs: Option<u32>,

        /// Do not record anything in the run ledger
        #[arg(long)]
        no_ledger: bool,
    },

    /// Classify a file, or the files directly in a directory, without moving anything
    Classify {
        /// File or directory to classify
        path: PathBuf,
    },

    /// Run ledger operations
    Ledger {
        #[command(subcommand)]
        action: LedgerCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Write a default configuration and create the category folders
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LedgerCommands {
    /// Show ledger statistics
    Stats,

    /// List recorded runs
    Runs,

    /// List placed files
    Files {
        /// Only show files in this category
        #[arg(short = 'k', long)]
        category: Option<String>,
    },

    /// Show per-file details of one run
    Details {
        /// Run number
        run: i64,
    },

    /// Delete every ledger record
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let target = cli.dir.clone().unwrap_or_else(|| PathBuf::from(&config.target_dir));

    match cli.command {
        Some(Commands::Run { runs, no_ledger }) => {
            let passes = runs.unwrap_or(config.runs);
            run_passes(config, target, &cli.config, passes, no_ledger, &cli.format).await
        }
        Some(Commands::Classify { path }) => run_classify(config, path, &cli.format),
        Some(Commands::Ledger { action }) => run_ledger_command(config, &target, action, &cli.format),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Init { force }) => run_init(&target, &cli.config, force),
        None => {
            let passes = config.runs;
            run_passes(config, target, &cli.config, passes, false, &cli.format).await
        }
    }
}

/// Run `passes` passes over `target` on a blocking worker
async fn run_passes(
    config: AppConfig,
    target: PathBuf,
    config_name: &Path,
    passes: u32,
    no_ledger: bool,
    format: &str,
) -> Result<()> {
    config.validate()?;
    if passes == 0 {
        return Err(SortdeskError::Config("--runs must be at least 1".to_string()));
    }

    let db_path = config.database_path(&target);
    let source = local_source(&config, &target, config_name)?;
    let mut destination = LocalDestination::new(&target);

    let ledger = if no_ledger {
        warn!("Ledger disabled, nothing will be recorded");
        None
    } else {
        let ledger = RunLedger::open(&db_path)?;
        info!("Ledger: {:?}", db_path);
        Some(ledger)
    };

    let orchestrator = Orchestrator::from_config(&config, ledger)?;
    info!("Target directory: {:?}, {} passes", target, passes);

    let (stop_handle, stop_token) = stop_channel();
    let signals = tokio::spawn(wait_for_shutdown(stop_handle));

    let worker = tokio::task::spawn_blocking(move || {
        orchestrator.run_many(passes, &source, &mut destination, &stop_token)
    });
    let joined = worker.await;
    signals.abort();

    let report = joined.map_err(|e| SortdeskError::Worker(e.to_string()))??;
    print_report(&report, format)
}

/// Source over `target` that never lists the ledger or a config file
fn local_source(config: &AppConfig, target: &Path, config_name: &Path) -> Result<LocalSource> {
    let folders: Vec<String> = config.categories.iter().map(|c| c.folder.clone()).collect();
    let mut source = LocalSource::new(target, folders)?.exclude(&config.database_path(target));

    // `--config` as given on the command line, and as `init` places it
    let given = if config_name.is_absolute() {
        config_name.to_path_buf()
    } else {
        std::env::current_dir()?.join(config_name)
    };
    source = source.exclude(&given).exclude(&init_config_path(target, config_name));
    Ok(source)
}

/// Where `init` writes the config for `target`
fn init_config_path(target: &Path, config_name: &Path) -> PathBuf {
    if config_name.is_absolute() {
        config_name.to_path_buf()
    } else {
        target.join(config_name)
    }
}

/// Request a stop on Ctrl+C or SIGTERM
async fn wait_for_shutdown(stop: StopHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current file..."),
        _ = terminate => info!("Received SIGTERM, finishing current file..."),
    }

    stop.stop();
}

fn print_report(report: &BatchReport, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        "jsonl" => {
            for run in &report.runs {
                println!("{}", serde_json::to_string(run)?);
            }
        }
        _ => {
            for (i, run) in report.runs.iter().enumerate() {
                print_run(i + 1, run);
            }
            println!();
            println!("Consistency across passes: {:.1}%", report.consistency);
            if report.runs.len() > 1 {
                let verdict = if report.steady { "steady" } else { "NOT steady" };
                println!("Passes 2..{}: {}", report.runs.len(), verdict);
            }
        }
    }
    Ok(())
}

fn print_run(pass: usize, run: &RunSummary) {
    let t = &run.totals;
    match run.run {
        Some(handle) => println!("Pass {} (ledger run #{}):", pass, handle.run_number),
        None => println!("Pass {}:", pass),
    }
    for file in &run.files {
        let marker = if file.placement.status.is_success() { "✓" } else { "✗" };
        println!(
            "  {} {} -> {} ({:.0}%) [{}] {}",
            marker,
            file.filename,
            file.classification.category.as_deref().unwrap_or("-"),
            file.classification.confidence * 100.0,
            file.placement.status.as_str(),
            file.placement.message,
        );
    }
    println!(
        "  total={} moved={} skipped={} failed={}{}",
        t.total,
        t.moved,
        t.skipped,
        t.failed,
        if run.stopped { " (stopped)" } else { "" },
    );
}

/// Classify without touching the filesystem
fn run_classify(config: AppConfig, path: PathBuf, format: &str) -> Result<()> {
    let orchestrator = Orchestrator::from_config(&config, None)?;
    let classifier = orchestrator.classifier();

    let files = if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && should_process(p))
            .collect();
        files.sort();
        files
    } else {
        vec![path]
    };

    let results: Vec<ClassificationResult> = files.iter()
        .map(|file| {
            debug!("Classifying {:?}", file);
            classifier.classify_path(file)
        })
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        "jsonl" => {
            for result in &results {
                println!("{}", serde_json::to_string(result)?);
            }
        }
        _ => {
            for result in &results {
                println!(
                    "{}: {} ({:.0}%) [{}]",
                    result.filename,
                    result.category.as_deref().unwrap_or("-"),
                    result.confidence * 100.0,
                    result.status.as_str(),
                );
                if !result.matched_keywords.is_empty() {
                    println!("  keywords: {}", result.matched_keywords.join(", "));
                }
                if result.is_error() {
                    println!("  {}", result.message);
                }
            }
        }
    }

    Ok(())
}

fn run_ledger_command(config: AppConfig, target: &Path, action: LedgerCommands, format: &str) -> Result<()> {
    let db_path = config.database_path(target);
    if !db_path.exists() {
        return Err(SortdeskError::NotFound(format!("no ledger at {}", db_path.display())));
    }
    let ledger = RunLedger::open(&db_path)?;
    let json = format != "text";

    match action {
        LedgerCommands::Stats => {
            let stats = ledger.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Ledger: {}", db_path.display());
                println!("  Files: {}", stats.file_count);
                println!("  Runs: {}", stats.run_count);
                println!("  Run details: {}", stats.detail_count);
                if !stats.by_category.is_empty() {
                    println!("\nBy category:");
                    for (category, count) in &stats.by_category {
                        println!("  {:20} {}", category, count);
                    }
                }
            }
        }
        LedgerCommands::Runs => {
            let runs = ledger.runs()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else {
                for run in &runs {
                    let totals = match run.totals {
                        Some(t) => format!(
                            "total={} moved={} skipped={} failed={}",
                            t.total, t.moved, t.skipped, t.failed
                        ),
                        None => "(open)".to_string(),
                    };
                    println!(
                        "#{:<4} {}  {}",
                        run.run_number,
                        run.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        totals
                    );
                }
            }
        }
        LedgerCommands::Files { category } => {
            let files: Vec<_> = ledger.processed_files()?
                .into_iter()
                .filter(|f| category.as_deref().map_or(true, |c| f.category == c))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!(
                        "{} [{}] {:.0}% {} -> {}",
                        file.filename,
                        file.category,
                        file.confidence * 100.0,
                        file.source_path,
                        file.destination_path
                    );
                }
            }
        }
        LedgerCommands::Details { run } => {
            let record = ledger.run(run)?
                .ok_or_else(|| SortdeskError::NotFound(format!("run #{}", run)))?;
            let details = ledger.run_details(record.id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                println!("Run #{} ({})", record.run_number, record.notes.as_deref().unwrap_or(""));
                for detail in &details {
                    println!("  {} {} [{}]", detail.filename, detail.action, detail.status);
                }
            }
        }
        LedgerCommands::Reset { force } => {
            if !force {
                eprintln!("Use --force to confirm deleting every ledger record");
                return Ok(());
            }
            ledger.reset()?;
            println!("Ledger cleared");
        }
    }

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Target directory: {}", config.target_dir);
            println!("  Passes: {}", config.runs);
            for category in &config.categories {
                println!(
                    "  {} -> {} ({} keywords)",
                    category.key,
                    category.folder,
                    category.keywords.len()
                );
            }
            println!("  Database: {}", config.database.path);
        }
    }

    Ok(())
}

fn run_init(target: &Path, config_name: &Path, force: bool) -> Result<()> {
    let config_path = init_config_path(target, config_name);

    if config_path.exists() && !force {
        return Err(SortdeskError::Config(format!(
            "{} already exists. Use --force to overwrite",
            config_path.display()
        )));
    }

    std::fs::create_dir_all(target)?;

    let mut config = AppConfig::default();
    config.target_dir = target.to_string_lossy().to_string();
    config.save(&config_path)?;

    println!("Sortdesk initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - {}", config_path.display());
    for category in &config.categories {
        std::fs::create_dir_all(target.join(&category.folder))?;
        println!("  - {}/", category.folder);
    }
    println!("\nNext step: sortdesk run --dir {}", target.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["sortdesk"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_run_command() {
        let cli = Cli::try_parse_from([
            "sortdesk", "run", "--dir", "/tmp/docs", "--runs", "3"
        ]).unwrap();

        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/docs")));
        match cli.command {
            Some(Commands::Run { runs, no_ledger }) => {
                assert_eq!(runs, Some(3));
                assert!(!no_ledger);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_ledger_details() {
        let cli = Cli::try_parse_from([
            "sortdesk", "--format", "json", "ledger", "details", "2"
        ]).unwrap();

        assert_eq!(cli.format, "json");
        match cli.command {
            Some(Commands::Ledger { action: LedgerCommands::Details { run } }) => assert_eq!(run, 2),
            _ => panic!("Expected ledger details"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["sortdesk", "--format", "xml", "run"]).is_err());
    }

    #[test]
    fn test_init_creates_config_and_folders() {
        let dir = tempfile::tempdir().unwrap();
        run_init(dir.path(), Path::new("config.json"), false).unwrap();

        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        for category in &config.categories {
            assert!(dir.path().join(&category.folder).is_dir());
        }
        assert!(run_init(dir.path(), Path::new("config.json"), false).is_err());
        assert!(run_init(dir.path(), Path::new("config.json"), true).is_ok());
    }

    #[test]
    fn test_passes_after_init_leave_config_in_place() {
        use sortdesk::pipeline::StopToken;
        use sortdesk::source::FileSource;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        run_init(root, Path::new("config.json"), false).unwrap();
        std::fs::write(root.join("Docker_Notes.md"), "kubernetes").unwrap();

        let config = AppConfig::load(&root.join("config.json")).unwrap();
        let source = local_source(&config, root, Path::new("config.json")).unwrap();
        let names: Vec<String> = source.list_candidate_files().unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Docker_Notes.md"]);

        let orchestrator = Orchestrator::from_config(&config, None).unwrap();
        let mut destination = LocalDestination::new(root);
        let report = orchestrator
            .run_many(2, &source, &mut destination, &StopToken::never())
            .unwrap();

        assert_eq!(report.runs[0].totals.moved, 1);
        assert!(root.join("config.json").exists());
        for category in &config.categories {
            assert!(!root.join(&category.folder).join("config.json").exists());
        }
    }
}
