// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Keyword classifier
//!
//! Wraps the [`Scorer`], turns raw scores into a confidence value and picks
//! the winning category. Ties go to the category declared first.

pub mod scorer;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub use scorer::{Category, CategoryScore, CategorySet, Scorer};

use crate::config::AppConfig;
use crate::extract::{Extraction, ExtractionStatus, Extractor};
use crate::source::{CandidateFile, ContentSource};
use crate::Result;

/// Outcome class of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Success,
    /// A best guess is still reported; callers decide whether to act on it
    LowConfidence,
    Error,
}

impl ClassificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::LowConfidence => "low_confidence",
            Self::Error => "error",
        }
    }
}

/// Structured result for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub filename: String,
    /// Winning category key; always `None` when `status` is `Error`
    pub category: Option<String>,
    /// In `[0, 1]`
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    /// Raw score per category, in declaration order
    pub scores: Vec<CategoryScore>,
    pub status: ClassificationStatus,
    pub message: String,
    /// How the content was obtained, when extraction ran at all
    pub extraction: Option<ExtractionStatus>,
}

impl ClassificationResult {
    pub fn error(filename: &str, message: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            category: None,
            confidence: 0.0,
            matched_keywords: Vec::new(),
            scores: Vec::new(),
            status: ClassificationStatus::Error,
            message: message.into(),
            extraction: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ClassificationStatus::Error
    }
}

/// `best / (sum + 1)`, zero when nothing matched, clamped to `[0, 1]`
pub fn confidence(best: f64, scores: &[CategoryScore]) -> f64 {
    let total: f64 = scores.iter().map(|s| s.score).sum();
    if !total.is_finite() || !best.is_finite() || total <= 0.0 {
        return 0.0;
    }
    (best / (total + 1.0)).clamp(0.0, 1.0)
}

/// Keyword classifier built from an explicit category table
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: CategorySet,
    scorer: Scorer,
    min_confidence: f64,
    extractor: Extractor,
}

impl Classifier {
    /// Build a classifier from a validated application config
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            categories: CategorySet::from_config(&config.categories),
            scorer: Scorer::new(&config.scoring),
            min_confidence: config.scoring.min_confidence,
            extractor: Extractor::new(&config.extraction),
        })
    }

    pub fn from_parts(categories: CategorySet, scorer: Scorer, min_confidence: f64, extractor: Extractor) -> Self {
        Self {
            categories,
            scorer,
            min_confidence,
            extractor,
        }
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Classify a `(filename, content)` pair
    pub fn classify_text(&self, filename: &str, content: &str) -> ClassificationResult {
        let name_text = scorer::filename_text(filename);
        let scores = self.scorer.score(&self.categories, &name_text, content);

        let Some((winner, best)) = pick_winner(&scores) else {
            return ClassificationResult::error(filename, "No categories configured");
        };

        let confidence = confidence(best, &scores);

        let combined = format!("{} {}", name_text, content).to_lowercase();
        let matched_keywords: Vec<String> = self.categories.get(&winner)
            .map(|c| c.keywords.iter().filter(|k| combined.contains(k.as_str())).cloned().collect())
            .unwrap_or_default();

        let (status, message) = if confidence < self.min_confidence {
            (
                ClassificationStatus::LowConfidence,
                format!("Low confidence score ({:.2}). Top category: {}", confidence, winner),
            )
        } else {
            (
                ClassificationStatus::Success,
                format!("Strong match on {} with {} keywords", winner, matched_keywords.len()),
            )
        };

        debug!("Scores for {}: {:?}", filename, scores);

        ClassificationResult {
            filename: filename.to_string(),
            category: Some(winner),
            confidence,
            matched_keywords,
            scores,
            status,
            message,
            extraction: None,
        }
    }

    /// Classify already-extracted content
    pub fn classify_extraction(&self, extraction: &Extraction) -> ClassificationResult {
        let mut result = self.classify_text(&extraction.filename, &extraction.content);
        result.extraction = Some(extraction.status);
        result
    }

    /// Read, extract and classify a file on disk
    pub fn classify_path(&self, path: &Path) -> ClassificationResult {
        let filename = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !path.exists() {
            return ClassificationResult::error(&filename, format!("File not found: {}", path.display()));
        }

        match self.extractor.extract_path(path) {
            Ok(extraction) => {
                let result = self.classify_extraction(&extraction);
                info!(
                    "Classified {} as {} ({:.0}%)",
                    filename,
                    result.category.as_deref().unwrap_or("-"),
                    result.confidence * 100.0
                );
                result
            }
            Err(e) => ClassificationResult::error(&filename, format!("Could not read file: {}", e)),
        }
    }

    /// Classify a listed candidate according to what its source exposes
    pub fn classify_candidate(&self, candidate: &CandidateFile) -> ClassificationResult {
        match &candidate.content {
            ContentSource::Disk => self.classify_path(&candidate.path),
            ContentSource::Bytes(bytes) => {
                let extraction = self.extractor.extract_bytes(&candidate.name, candidate.kind, bytes);
                self.classify_extraction(&extraction)
            }
            ContentSource::NameOnly => {
                let extraction = self.extractor.name_only(&candidate.name, candidate.kind);
                self.classify_extraction(&extraction)
            }
        }
    }
}

/// Strictly highest score wins; on ties the earlier category is kept
fn pick_winner(scores: &[CategoryScore]) -> Option<(String, f64)> {
    let mut best: Option<&CategoryScore> = None;
    for score in scores {
        match best {
            Some(current) if score.score <= current.score => {}
            _ => best = Some(score),
        }
    }
    best.map(|s| (s.category.clone(), s.score))
}
