// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Run orchestration
//!
//! One pass lists the source, then classifies and places each candidate in
//! order, one file at a time. Per-file failures are counted, never
//! propagated. Ledger writes are best-effort: a failed write is logged and
//! the pass carries on.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::classify::{ClassificationResult, Classifier};
use crate::config::AppConfig;
use crate::ledger::{NewPlacement, RunHandle, RunLedger, RunTotals};
use crate::placement::{Destination, PlacementEngine, PlacementOutcome, PlacementStatus};
use crate::source::{CandidateFile, ContentSource, FileSource};
use crate::Result;

/// Sender half of a stop request
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Ask the running pass to stop after the current file
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Checked by the pipeline between files
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// A token that is never triggered
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Create a linked stop handle and token
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

/// Everything that happened to one file in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub filename: String,
    pub classification: ClassificationResult,
    pub placement: PlacementOutcome,
}

/// Result of one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Ledger handle when a ledger is attached and the run could be opened
    pub run: Option<RunHandle>,
    pub totals: RunTotals,
    pub files: Vec<FileReport>,
    /// True when a stop request cut the pass short
    pub stopped: bool,
}

/// Result of several passes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub runs: Vec<RunSummary>,
    /// 100 iff every pass produced identical totals
    pub consistency: f64,
    /// Passes 2..N all agree with each other
    pub steady: bool,
}

/// Share of consecutive pass pairs with identical totals, as a percentage
pub fn consistency(totals: &[RunTotals]) -> f64 {
    if totals.len() < 2 {
        return 100.0;
    }
    let pairs = totals.len() - 1;
    let matching = totals.windows(2).filter(|w| w[0] == w[1]).count();
    matching as f64 * 100.0 / pairs as f64
}

/// Whether every pass after the first produced the same totals
pub fn is_steady(totals: &[RunTotals]) -> bool {
    totals.iter().skip(1).collect::<Vec<_>>().windows(2).all(|w| w[0] == w[1])
}

/// Drives classification, placement and ledger recording
pub struct Orchestrator {
    classifier: Classifier,
    engine: PlacementEngine,
    ledger: Option<RunLedger>,
}

impl Orchestrator {
    pub fn new(classifier: Classifier, ledger: Option<RunLedger>) -> Self {
        let engine = PlacementEngine::new(classifier.categories().clone());
        Self {
            classifier,
            engine,
            ledger,
        }
    }

    /// Build from a config, validating it first
    pub fn from_config(config: &AppConfig, ledger: Option<RunLedger>) -> Result<Self> {
        Ok(Self::new(Classifier::new(config)?, ledger))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn ledger(&self) -> Option<&RunLedger> {
        self.ledger.as_ref()
    }

    /// Classify and place a single candidate
    pub fn process_file<D: Destination>(
        &self,
        destination: &mut D,
        candidate: &CandidateFile,
        run: Option<RunHandle>,
    ) -> FileReport {
        let classification = self.classifier.classify_candidate(candidate);

        let placement = if classification.is_error() {
            PlacementOutcome {
                source: candidate.path.clone(),
                destination: Default::default(),
                status: PlacementStatus::Error,
                message: classification.message.clone(),
            }
        } else {
            self.engine.place(destination, &candidate.path, &classification)
        };

        self.record(candidate, &classification, &placement, run);

        FileReport {
            filename: candidate.name.clone(),
            classification,
            placement,
        }
    }

    fn record(
        &self,
        candidate: &CandidateFile,
        classification: &ClassificationResult,
        placement: &PlacementOutcome,
        run: Option<RunHandle>,
    ) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let category = classification.category.as_deref().unwrap_or("-");

        if placement.status.is_success() {
            let file_hash = placed_hash(candidate, &placement.destination);
            let source_path = placement.source.to_string_lossy();
            let destination_path = placement.destination.to_string_lossy();
            let record = NewPlacement {
                filename: &candidate.name,
                category,
                confidence: classification.confidence,
                source_path: &source_path,
                destination_path: &destination_path,
                status: placement.status.as_str(),
                file_hash: file_hash.as_deref(),
            };
            if let Err(e) = ledger.record_placement(&record) {
                warn!("Failed to record placement of {}: {}", candidate.name, e);
            }
        }

        if let Some(run) = run {
            let action = format!("Move to {}", category);
            if let Err(e) = ledger.record_run_detail(
                run.id,
                &candidate.name,
                classification,
                &action,
                placement.status.as_str(),
            ) {
                warn!("Failed to record run detail for {}: {}", candidate.name, e);
            }
        }
    }

    /// One full pass over `source`.
    ///
    /// Only a failure to list the source is returned as an error; it happens
    /// before any file is touched.
    pub fn run_once<S, D>(&self, source: &S, destination: &mut D, stop: &StopToken) -> Result<RunSummary>
    where
        S: FileSource + ?Sized,
        D: Destination,
    {
        let candidates = source.list_candidate_files()?;

        let run = self.ledger.as_ref().and_then(|ledger| match ledger.start_run() {
            Ok(run) => Some(run),
            Err(e) => {
                warn!("Failed to start ledger run: {}", e);
                None
            }
        });
        if let Some(run) = run {
            info!("Run {} started with {} candidates", run.run_number, candidates.len());
        }

        let mut totals = RunTotals::default();
        let mut files = Vec::with_capacity(candidates.len());
        let mut stopped = false;

        for candidate in &candidates {
            if stop.is_stopped() {
                stopped = true;
                info!("Stop requested after {} of {} files", files.len(), candidates.len());
                break;
            }

            let report = self.process_file(destination, candidate, run);
            totals.total += 1;
            match report.placement.status {
                PlacementStatus::Moved => totals.moved += 1,
                PlacementStatus::AlreadyPlaced => totals.skipped += 1,
                PlacementStatus::Collision | PlacementStatus::Error => totals.failed += 1,
            }
            files.push(report);
        }

        if let (Some(ledger), Some(run)) = (&self.ledger, run) {
            let notes = if stopped {
                format!("Run {} stopped after {} of {} files", run.run_number, totals.total, candidates.len())
            } else {
                format!("Run {}", run.run_number)
            };
            if let Err(e) = ledger.end_run(run.id, &totals, &notes) {
                warn!("Failed to close ledger run {}: {}", run.run_number, e);
            }
        }

        info!(
            "Pass complete: total={} moved={} skipped={} failed={}",
            totals.total, totals.moved, totals.skipped, totals.failed
        );

        Ok(RunSummary { run, totals, files, stopped })
    }

    /// Run `passes` full passes, stopping early on request
    pub fn run_many<S, D>(&self, passes: u32, source: &S, destination: &mut D, stop: &StopToken) -> Result<BatchReport>
    where
        S: FileSource + ?Sized,
        D: Destination,
    {
        let mut runs = Vec::new();
        for pass in 1..=passes {
            if stop.is_stopped() {
                break;
            }
            info!("Pass {}/{}", pass, passes);
            let summary = self.run_once(source, destination, stop)?;
            let stopped = summary.stopped;
            runs.push(summary);
            if stopped {
                break;
            }
        }

        let totals: Vec<RunTotals> = runs.iter().map(|r| r.totals).collect();
        Ok(BatchReport {
            consistency: consistency(&totals),
            steady: is_steady(&totals),
            runs,
        })
    }
}

/// BLAKE3 of the placed file, for local files only
fn placed_hash(candidate: &CandidateFile, placed_at: &Path) -> Option<String> {
    if candidate.content != ContentSource::Disk {
        return None;
    }
    std::fs::read(placed_at)
        .ok()
        .map(|data| blake3::hash(&data).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::pdf::tests::pdf_with;
    use crate::extract::ExtractionStatus;
    use crate::placement::LocalDestination;
    use crate::source::{LocalSource, MemoryStore};
    use std::fs;

    fn default_orchestrator(ledger: Option<RunLedger>) -> Orchestrator {
        Orchestrator::from_config(&AppConfig::default(), ledger).unwrap()
    }

    fn folders() -> Vec<String> {
        AppConfig::default().categories.into_iter().map(|c| c.folder).collect()
    }

    fn seed_desk(root: &Path) {
        fs::write(root.join("Semester_Transcript_2024.txt"), "GPA 3.9 semester transcript").unwrap();
        fs::write(root.join("Docker_Configuration_Checklist.md"), "kubernetes deployment").unwrap();
        fs::write(root.join("Capstone_Project_Proposal.txt"), "research methodology").unwrap();
        fs::write(root.join("zzz.qqq"), "").unwrap();
    }

    #[test]
    fn test_transcript_moved_then_already_placed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Semester_Transcript_2024.pdf"), pdf_with("GPA semester transcript")).unwrap();

        let orchestrator = default_orchestrator(None);
        let source = LocalSource::new(root, folders()).unwrap();
        let mut dest = LocalDestination::new(root);

        let first = orchestrator.run_once(&source, &mut dest, &StopToken::never()).unwrap();
        let classification = &first.files[0].classification;
        assert_eq!(classification.category.as_deref(), Some("UNIVERSITY_DOCS"));
        assert_eq!(classification.extraction, Some(ExtractionStatus::Extracted));
        assert!(classification.matched_keywords.contains(&"gpa".to_string()));
        assert_eq!(first.files[0].placement.status, PlacementStatus::Moved);
        assert!(root.join("University Docs").join("Semester_Transcript_2024.pdf").exists());

        let second = orchestrator.run_once(&source, &mut dest, &StopToken::never()).unwrap();
        assert_eq!(second.files[0].placement.status, PlacementStatus::AlreadyPlaced);
    }

    #[test]
    fn test_cross_run_consistency() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_desk(root);
        let db_path = root.join("sortdesk.db");

        let ledger = RunLedger::open(&db_path).unwrap();
        let orchestrator = default_orchestrator(Some(ledger.clone()));
        let source = LocalSource::new(root, folders()).unwrap().exclude(&db_path);
        let mut dest = LocalDestination::new(root);

        let report = orchestrator.run_many(4, &source, &mut dest, &StopToken::never()).unwrap();
        assert_eq!(report.runs.len(), 4);

        let first = report.runs[0].totals;
        assert_eq!(first.total, 4);
        assert_eq!(first.moved, first.total - first.failed);
        assert_eq!(first.moved, 4);

        for run in &report.runs[1..] {
            assert_eq!(run.totals, RunTotals { total: 4, moved: 0, skipped: 4, failed: 0 });
        }
        assert!(report.steady);
        // run 1 differs from run 2, the remaining pairs match
        assert!((report.consistency - 200.0 / 3.0).abs() < 1e-9);

        let runs = ledger.runs().unwrap();
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[3].totals, Some(report.runs[3].totals));
        assert_eq!(ledger.run_details(runs[0].id).unwrap().len(), 4);
        assert_eq!(ledger.processed_files().unwrap().len(), 4);
    }

    #[test]
    fn test_same_name_collision() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("inbox")).unwrap();
        fs::write(root.join("report.pdf"), b"first").unwrap();
        fs::write(root.join("inbox").join("report.pdf"), b"second").unwrap();

        let orchestrator = default_orchestrator(None);
        let mut dest = LocalDestination::new(root);

        let first = CandidateFile::on_disk(root.join("report.pdf")).unwrap();
        let second = CandidateFile::on_disk(root.join("inbox").join("report.pdf")).unwrap();

        let a = orchestrator.process_file(&mut dest, &first, None);
        let b = orchestrator.process_file(&mut dest, &second, None);

        assert_eq!(a.placement.status, PlacementStatus::Moved);
        assert_eq!(b.placement.status, PlacementStatus::Collision);
        assert_eq!(fs::read(root.join("Capstone Work").join("report.pdf")).unwrap(), b"first");
        assert_eq!(fs::read(root.join("inbox").join("report.pdf")).unwrap(), b"second");
    }

    #[test]
    fn test_vanished_file_is_counted_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("api_notes.txt"), "docker").unwrap();

        struct Listing(Vec<CandidateFile>);
        impl FileSource for Listing {
            fn list_candidate_files(&self) -> Result<Vec<CandidateFile>> {
                Ok(self.0.clone())
            }
        }

        let listing = Listing(vec![
            CandidateFile::on_disk(root.join("already_gone.txt")).unwrap(),
            CandidateFile::on_disk(root.join("api_notes.txt")).unwrap(),
        ]);

        let orchestrator = default_orchestrator(None);
        let mut dest = LocalDestination::new(root);
        let summary = orchestrator.run_once(&listing, &mut dest, &StopToken::never()).unwrap();

        assert_eq!(summary.totals, RunTotals { total: 2, moved: 1, skipped: 0, failed: 1 });
        assert!(summary.files[0].classification.is_error());
        assert!(summary.files[0].classification.category.is_none());
    }

    #[test]
    fn test_stop_between_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_desk(root);

        let (handle, token) = stop_channel();
        handle.stop();

        let ledger = RunLedger::in_memory().unwrap();
        let orchestrator = default_orchestrator(Some(ledger.clone()));
        let source = LocalSource::new(root, folders()).unwrap();
        let mut dest = LocalDestination::new(root);

        let summary = orchestrator.run_once(&source, &mut dest, &token).unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.totals.total, 0);
        assert!(root.join("zzz.qqq").exists());
        assert!(ledger.runs().unwrap()[0].closed_at.is_some());
    }

    #[test]
    fn test_pdf_content_decides_category() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("scan_0042.pdf"), pdf_with("Semester transcript GPA")).unwrap();

        let orchestrator = default_orchestrator(None);
        let source = LocalSource::new(root, folders()).unwrap();
        let mut dest = LocalDestination::new(root);

        let summary = orchestrator.run_once(&source, &mut dest, &StopToken::never()).unwrap();
        let classification = &summary.files[0].classification;
        assert_eq!(classification.category.as_deref(), Some("UNIVERSITY_DOCS"));
        assert_eq!(classification.status, crate::classify::ClassificationStatus::Success);
        assert!((classification.confidence - 0.75).abs() < 1e-9);
        assert!(root.join("University Docs").join("scan_0042.pdf").exists());
    }

    /// Local destination that requests a stop once its first move lands
    struct StopAfterFirstMove {
        inner: LocalDestination,
        handle: StopHandle,
    }

    impl Destination for StopAfterFirstMove {
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn get_or_create_folder(&mut self, name: &str) -> Result<std::path::PathBuf> {
            self.inner.get_or_create_folder(name)
        }

        fn is_in_folder(&self, file: &Path, folder: &Path) -> bool {
            self.inner.is_in_folder(file, folder)
        }

        fn move_file(&mut self, file: &Path, folder: &Path) -> Result<std::path::PathBuf> {
            let moved = self.inner.move_file(file, folder)?;
            self.handle.stop();
            Ok(moved)
        }
    }

    #[test]
    fn test_stop_mid_pass_takes_effect_between_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_desk(root);

        let (handle, token) = stop_channel();
        let ledger = RunLedger::in_memory().unwrap();
        let orchestrator = default_orchestrator(Some(ledger.clone()));
        let source = LocalSource::new(root, folders()).unwrap();
        let mut dest = StopAfterFirstMove {
            inner: LocalDestination::new(root),
            handle,
        };

        let report = orchestrator.run_many(3, &source, &mut dest, &token).unwrap();
        assert_eq!(report.runs.len(), 1);

        let summary = &report.runs[0];
        assert!(summary.stopped);
        assert_eq!(summary.totals, RunTotals { total: 1, moved: 1, skipped: 0, failed: 0 });
        assert!(root.join("Capstone Work").join("Capstone_Project_Proposal.txt").exists());
        assert!(root.join("Docker_Configuration_Checklist.md").exists());

        let runs = ledger.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].closed_at.is_some());
        assert_eq!(runs[0].totals, Some(summary.totals));
        assert_eq!(runs[0].notes.as_deref(), Some("Run 1 stopped after 1 of 4 files"));
    }

    #[test]
    fn test_remote_store_scores_names_only() {
        let mut store = MemoryStore::new();
        store.insert("Kubernetes_Runbook.docx", b"semester transcript gpa");
        store.insert("Thesis_Findings.pdf", b"");

        let orchestrator = default_orchestrator(None);
        let first = orchestrator.run_once(&store.clone(), &mut store, &StopToken::never()).unwrap();
        assert_eq!(first.totals.moved, 2);
        let runbook = first.files.iter().find(|f| f.filename == "Kubernetes_Runbook.docx").unwrap();
        assert_eq!(runbook.classification.category.as_deref(), Some("TECHNICAL_WORK"));
        assert_eq!(
            runbook.classification.extraction,
            Some(ExtractionStatus::NameOnly)
        );
        assert!(store.get(Path::new("/Technical Work/Kubernetes_Runbook.docx")).is_some());
    }

    #[test]
    fn test_remote_rerun_is_idempotent() {
        let mut store = MemoryStore::new();
        store.insert("Docker_Guide.md", b"");
        store.insert("Capstone_Slides.pptx", b"");

        let orchestrator = default_orchestrator(None);
        let first = orchestrator.run_once(&store.clone(), &mut store, &StopToken::never()).unwrap();
        assert_eq!(first.totals.moved, 2);

        let second = orchestrator.run_once(&store.clone(), &mut store, &StopToken::never()).unwrap();
        assert_eq!(second.totals, RunTotals { total: 2, moved: 0, skipped: 2, failed: 0 });
    }

    #[test]
    fn test_failed_move_leaves_source() {
        let mut store = MemoryStore::new();
        let path = store.insert("Docker_Guide.md", b"body");
        store.fail_moves_for("Docker_Guide.md");

        let orchestrator = default_orchestrator(None);
        let summary = orchestrator.run_once(&store.clone(), &mut store, &StopToken::never()).unwrap();

        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.files[0].placement.status, PlacementStatus::Error);
        assert_eq!(store.get(&path), Some(&b"body"[..]));
    }

    #[test]
    fn test_consistency_helpers() {
        let a = RunTotals { total: 3, moved: 3, skipped: 0, failed: 0 };
        let b = RunTotals { total: 3, moved: 0, skipped: 3, failed: 0 };
        assert_eq!(consistency(&[a]), 100.0);
        assert_eq!(consistency(&[b, b, b]), 100.0);
        assert_eq!(consistency(&[a, b]), 0.0);
        assert!(is_steady(&[a, b, b]));
        assert!(!is_steady(&[a, b, a]));
    }
}
