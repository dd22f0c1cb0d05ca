// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sortdesk Restore Utility
//!
//! Moves files recorded in the run ledger back to where they were found.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use sortdesk::ledger::{ProcessedFileRecord, RunLedger};

#[derive(Parser, Debug)]
#[command(name = "sortdesk-restore")]
#[command(version = "1.0.0")]
#[command(about = "Move sorted files back to their original locations")]
struct Args {
    /// Path to the ledger database
    #[arg(long, default_value = "sortdesk.db")]
    db: PathBuf,

    /// Number of files to restore, most recently moved first (0 for all)
    #[arg(short, long, default_value = "0")]
    count: usize,

    /// Dry run - show what would be restored without doing it
    #[arg(long)]
    dry_run: bool,

    /// List restorable entries in the ledger
    #[arg(long)]
    list: bool,
}

/// Outcome of one restore attempt
#[derive(Debug, PartialEq, Eq)]
enum Restore {
    Restored,
    WouldRestore,
    PlacedFileMissing,
    SourceOccupied,
}

/// Entries whose recorded source differs from where the file now lives,
/// most recently moved first
fn restorable(mut records: Vec<ProcessedFileRecord>) -> Vec<ProcessedFileRecord> {
    records.retain(|r| r.source_path != r.destination_path);
    records.sort_by(|a, b| {
        b.moved_at.cmp(&a.moved_at).then_with(|| a.filename.cmp(&b.filename))
    });
    records
}

fn restore_one(record: &ProcessedFileRecord, dry_run: bool) -> Result<Restore> {
    let placed = Path::new(&record.destination_path);
    let source = Path::new(&record.source_path);

    if !placed.exists() {
        return Ok(Restore::PlacedFileMissing);
    }
    if source.symlink_metadata().is_ok() {
        return Ok(Restore::SourceOccupied);
    }
    if dry_run {
        return Ok(Restore::WouldRestore);
    }

    fs::rename(placed, source)
        .with_context(|| format!("moving {} back to {}", placed.display(), source.display()))?;
    Ok(Restore::Restored)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !args.db.exists() {
        bail!("Ledger not found: {}", args.db.display());
    }

    let ledger = RunLedger::open(&args.db)
        .with_context(|| format!("opening ledger {}", args.db.display()))?;
    let entries = restorable(ledger.processed_files()?);

    if entries.is_empty() {
        println!("No moved files recorded.");
        return Ok(());
    }

    if args.list {
        println!("Restorable files ({} entries):", entries.len());
        println!("{:-<80}", "");
        for (i, entry) in entries.iter().enumerate() {
            let when = entry.moved_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:3}. [{}] {} -> {}",
                i + 1,
                when,
                entry.destination_path,
                entry.source_path
            );
            println!("     category: {} ({:.0}%)", entry.category, entry.confidence * 100.0);
        }
        return Ok(());
    }

    let count = if args.count == 0 {
        entries.len()
    } else {
        args.count.min(entries.len())
    };

    println!(
        "{}Restoring {} file(s)...",
        if args.dry_run { "[DRY RUN] " } else { "" },
        count
    );

    let mut restored = 0;
    let mut skipped = 0;

    for entry in entries.iter().take(count) {
        match restore_one(entry, args.dry_run) {
            Ok(Restore::Restored) => {
                println!("  Restored: {} -> {}", entry.destination_path, entry.source_path);
                restored += 1;
            }
            Ok(Restore::WouldRestore) => {
                println!("  Would restore: {} -> {}", entry.destination_path, entry.source_path);
                restored += 1;
            }
            Ok(Restore::PlacedFileMissing) => {
                eprintln!("  Skip: {} (file not found, may have been moved/deleted)", entry.destination_path);
                skipped += 1;
            }
            Ok(Restore::SourceOccupied) => {
                eprintln!("  Skip: {} (original path already exists)", entry.source_path);
                skipped += 1;
            }
            Err(e) => {
                eprintln!("  Failed: {} ({:#})", entry.destination_path, e);
                skipped += 1;
            }
        }
    }

    println!();
    if args.dry_run {
        println!("Dry run complete. {} file(s) would be restored.", restored);
    } else {
        println!("Done. {} restored, {} failed/skipped.", restored, skipped);
        if restored > 0 {
            println!("Note: ledger not modified. Run `sortdesk ledger reset --force` to clear it.");
        }
    }

    Ok(())
}
