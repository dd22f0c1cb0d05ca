// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Sortdesk

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{Result, SortdeskError};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directory whose loose files get sorted
    #[serde(default = "default_target_dir")]
    pub target_dir: String,

    /// Number of passes `sortdesk run` performs by default
    #[serde(default = "default_runs")]
    pub runs: u32,

    /// Categories in declaration order (first wins ties)
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,

    /// Scoring weights and thresholds
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CategoryConfig {
    /// Stable identifier stored in the ledger, e.g. `UNIVERSITY_DOCS`
    pub key: String,
    /// Folder name created under the target directory
    pub folder: String,
    #[serde(default)]
    pub description: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScoringConfig {
    #[serde(default = "default_filename_weight")]
    pub filename_weight: f64,
    #[serde(default = "default_content_weight")]
    pub content_weight: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExtractionConfig {
    /// Truncate extracted text to this many characters (0 = unlimited)
    #[serde(default)]
    pub max_content_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

// Default value functions
fn default_target_dir() -> String { ".".to_string() }
fn default_runs() -> u32 { 5 }
fn default_filename_weight() -> f64 { 1.5 }
fn default_content_weight() -> f64 { 1.0 }
fn default_min_confidence() -> f64 { 0.3 }
fn default_db_path() -> String { "sortdesk.db".to_string() }

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            key: "UNIVERSITY_DOCS".to_string(),
            folder: "University Docs".to_string(),
            description: "Academic and educational documents".to_string(),
            keywords: words(&[
                "transcript", "semester", "enrollment", "registration",
                "student", "course", "internship", "academic", "approval",
                "application", "degree", "certification", "gpa", "university",
                "campus", "registered", "courses", "standing",
            ]),
        },
        CategoryConfig {
            key: "TECHNICAL_WORK".to_string(),
            folder: "Technical Work".to_string(),
            description: "Technical documentation and development work".to_string(),
            keywords: words(&[
                "api", "docker", "devops", "configuration", "automation",
                "infrastructure", "deployment", "code", "technical",
                "development", "integration", "testing", "kubernetes",
                "container", "microservices", "cicd", "github", "jenkins", "game",
            ]),
        },
        CategoryConfig {
            key: "CAPSTONE_WORK".to_string(),
            folder: "Capstone Work".to_string(),
            description: "Capstone projects and research work".to_string(),
            keywords: words(&[
                "capstone", "project", "proposal", "presentation", "research",
                "data collection", "analysis", "methodology", "thesis",
                "findings", "conclusion", "hypothesis", "experiment",
                "report", "paper", "study", "slides", "results",
            ]),
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_dir: default_target_dir(),
            runs: default_runs(),
            categories: default_categories(),
            scoring: ScoringConfig::default(),
            extraction: ExtractionConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            filename_weight: default_filename_weight(),
            content_weight: default_content_weight(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| SortdeskError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    ///
    /// Catching these once at startup keeps per-file configuration errors
    /// out of the processing loop.
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(SortdeskError::Config("At least one category is required".to_string()));
        }

        let mut keys = HashSet::new();
        let mut folders = HashSet::new();
        for category in &self.categories {
            if category.key.trim().is_empty() {
                return Err(SortdeskError::Config("Category key must not be empty".to_string()));
            }
            if !keys.insert(category.key.as_str()) {
                return Err(SortdeskError::Config(format!("Duplicate category key: {}", category.key)));
            }

            let folder = category.folder.trim();
            if folder.is_empty() || folder == "." || folder == ".." {
                return Err(SortdeskError::Config(format!(
                    "Category {} has no usable folder name", category.key
                )));
            }
            if folder.contains(['/', '\\']) {
                return Err(SortdeskError::Config(format!(
                    "Folder for {} must be a single path component: {}", category.key, folder
                )));
            }
            if !folders.insert(folder.to_lowercase()) {
                return Err(SortdeskError::Config(format!("Duplicate folder name: {}", folder)));
            }

            if category.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(SortdeskError::Config(format!(
                    "Category {} has no keywords", category.key
                )));
            }
        }

        for (name, weight) in [
            ("filename_weight", self.scoring.filename_weight),
            ("content_weight", self.scoring.content_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SortdeskError::Config(format!("{} must be a non-negative number", name)));
            }
        }

        let min = self.scoring.min_confidence;
        if !(0.0..=1.0).contains(&min) {
            return Err(SortdeskError::Config(format!(
                "min_confidence must lie in [0, 1], got {}", min
            )));
        }

        Ok(())
    }

    /// Ledger location; relative paths resolve against the target directory
    pub fn database_path(&self, target_dir: &Path) -> PathBuf {
        let path = PathBuf::from(&self.database.path);
        if path.is_absolute() {
            path
        } else {
            target_dir.join(path)
        }
    }
}
