// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Idempotent placement of classified files into their category folders
//!
//! The order of checks in [`PlacementEngine::place`] is what makes a second
//! pass over the same tree a no-op: a file already inside its folder is
//! reported as `already_placed` before any collision or move is considered.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::classify::{CategorySet, ClassificationResult};
use crate::Result;

/// Storage the engine moves files within
pub trait Destination {
    /// Whether anything exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Folder for a category, created if absent; must succeed when it exists
    fn get_or_create_folder(&mut self, name: &str) -> Result<PathBuf>;

    /// Whether `file` sits directly inside `folder`
    fn is_in_folder(&self, file: &Path, folder: &Path) -> bool;

    /// Move `file` into `folder`, keeping its name; returns the new location.
    /// On failure the file must be left where it was.
    fn move_file(&mut self, file: &Path, folder: &Path) -> Result<PathBuf>;
}

/// Local filesystem destination rooted at the target directory
#[derive(Debug, Clone)]
pub struct LocalDestination {
    root: PathBuf,
}

impl LocalDestination {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl Destination for LocalDestination {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn get_or_create_folder(&mut self, name: &str) -> Result<PathBuf> {
        let folder = self.root.join(name);
        if !folder.is_dir() {
            std::fs::create_dir_all(&folder)?;
            debug!("Created folder: {:?}", folder);
        }
        Ok(folder)
    }

    fn is_in_folder(&self, file: &Path, folder: &Path) -> bool {
        let Some(parent) = file.parent() else {
            return false;
        };
        match (parent.canonicalize(), folder.canonicalize()) {
            (Ok(parent), Ok(folder)) => parent == folder,
            _ => parent == folder,
        }
    }

    fn move_file(&mut self, file: &Path, folder: &Path) -> Result<PathBuf> {
        let name = file.file_name()
            .ok_or_else(|| crate::SortdeskError::NotFound(file.display().to_string()))?;
        let target = folder.join(name);
        std::fs::rename(file, &target)?;
        Ok(target)
    }
}

/// Result class of one placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Moved,
    AlreadyPlaced,
    Collision,
    Error,
}

impl PlacementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moved => "moved",
            Self::AlreadyPlaced => "already_placed",
            Self::Collision => "collision",
            Self::Error => "error",
        }
    }

    /// Moved or already in place
    pub fn is_success(self) -> bool {
        matches!(self, Self::Moved | Self::AlreadyPlaced)
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: PlacementStatus,
    pub message: String,
}

impl PlacementOutcome {
    fn new(source: &Path, destination: &Path, status: PlacementStatus, message: String) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            status,
            message,
        }
    }
}

/// Maps categories to folders and applies the placement rules
#[derive(Debug, Clone)]
pub struct PlacementEngine {
    categories: CategorySet,
}

impl PlacementEngine {
    pub fn new(categories: CategorySet) -> Self {
        Self { categories }
    }

    /// Folder name for a category key
    pub fn target_folder(&self, category: &str) -> Option<&str> {
        self.categories.folder_for(category)
    }

    /// Place `source` according to `classification`
    pub fn place<D: Destination>(
        &self,
        destination: &mut D,
        source: &Path,
        classification: &ClassificationResult,
    ) -> PlacementOutcome {
        let Some(category) = classification.category.as_deref() else {
            return PlacementOutcome::new(
                source,
                Path::new(""),
                PlacementStatus::Error,
                format!("Not classified: {}", classification.message),
            );
        };

        let Some(folder_name) = self.target_folder(category) else {
            warn!("No destination folder mapped for category {}", category);
            return PlacementOutcome::new(
                source,
                Path::new(""),
                PlacementStatus::Error,
                format!("No destination folder for category {}", category),
            );
        };

        let filename = source.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // 1. source must still exist
        if !destination.exists(source) {
            return PlacementOutcome::new(
                source,
                Path::new(folder_name),
                PlacementStatus::Error,
                format!("File not found: {}", filename),
            );
        }

        // 2. folder creation is idempotent
        let folder = match destination.get_or_create_folder(folder_name) {
            Ok(folder) => folder,
            Err(e) => {
                return PlacementOutcome::new(
                    source,
                    Path::new(folder_name),
                    PlacementStatus::Error,
                    format!("Could not create folder {}: {}", folder_name, e),
                );
            }
        };

        // 3. already where it belongs
        if destination.is_in_folder(source, &folder) {
            return PlacementOutcome::new(
                source,
                source,
                PlacementStatus::AlreadyPlaced,
                format!("File already in target folder: {}", folder_name),
            );
        }

        // 4. never overwrite
        let target = folder.join(&filename);
        if destination.exists(&target) {
            info!("Collision: {} already exists in {}", filename, folder_name);
            return PlacementOutcome::new(
                source,
                &target,
                PlacementStatus::Collision,
                format!("File already exists in target: {}", filename),
            );
        }

        // 5. move
        match destination.move_file(source, &folder) {
            Ok(moved_to) => {
                info!("Moved {} to {}", filename, folder_name);
                PlacementOutcome::new(
                    source,
                    &moved_to,
                    PlacementStatus::Moved,
                    format!("Successfully moved to {}", folder_name),
                )
            }
            Err(e) => {
                warn!("Failed to move {}: {}", filename, e);
                PlacementOutcome::new(
                    source,
                    &target,
                    PlacementStatus::Error,
                    format!("Error moving file: {}", e),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Category, ClassificationStatus};
    use std::fs;

    fn engine() -> PlacementEngine {
        PlacementEngine::new(CategorySet::new(vec![
            Category::new("ACADEMIC", "Academic", &["transcript"]),
            Category::new("TECH", "Tech", &["docker"]),
        ]))
    }

    fn classified(filename: &str, category: &str) -> ClassificationResult {
        ClassificationResult {
            filename: filename.to_string(),
            category: Some(category.to_string()),
            confidence: 0.9,
            matched_keywords: Vec::new(),
            scores: Vec::new(),
            status: ClassificationStatus::Success,
            message: String::new(),
            extraction: None,
        }
    }

    #[test]
    fn test_move_then_already_placed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("transcript.txt");
        fs::write(&source, "GPA").unwrap();
        let mut dest = LocalDestination::new(dir.path());

        let outcome = engine().place(&mut dest, &source, &classified("transcript.txt", "ACADEMIC"));
        assert_eq!(outcome.status, PlacementStatus::Moved);
        assert!(!source.exists());
        let placed = dir.path().join("Academic").join("transcript.txt");
        assert_eq!(outcome.destination, placed);
        assert!(placed.exists());

        let again = engine().place(&mut dest, &placed, &classified("transcript.txt", "ACADEMIC"));
        assert_eq!(again.status, PlacementStatus::AlreadyPlaced);
        assert_eq!(fs::read(&placed).unwrap(), b"GPA");
    }

    #[test]
    fn test_collision_leaves_both_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Tech")).unwrap();
        let existing = dir.path().join("Tech").join("report.pdf");
        fs::write(&existing, "first").unwrap();
        let source = dir.path().join("report.pdf");
        fs::write(&source, "second").unwrap();
        let mut dest = LocalDestination::new(dir.path());

        let outcome = engine().place(&mut dest, &source, &classified("report.pdf", "TECH"));
        assert_eq!(outcome.status, PlacementStatus::Collision);
        assert_eq!(fs::read(&existing).unwrap(), b"first");
        assert_eq!(fs::read(&source).unwrap(), b"second");
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = LocalDestination::new(dir.path());
        let outcome = engine().place(&mut dest, &dir.path().join("gone.txt"), &classified("gone.txt", "TECH"));
        assert_eq!(outcome.status, PlacementStatus::Error);
        assert!(outcome.message.contains("not found"));
    }

    #[test]
    fn test_unmapped_category_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x.txt");
        fs::write(&source, "").unwrap();
        let mut dest = LocalDestination::new(dir.path());

        let outcome = engine().place(&mut dest, &source, &classified("x.txt", "UNKNOWN"));
        assert_eq!(outcome.status, PlacementStatus::Error);
        assert!(source.exists());
    }

    #[test]
    fn test_unclassified_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x.txt");
        fs::write(&source, "").unwrap();
        let mut dest = LocalDestination::new(dir.path());

        let outcome = engine().place(&mut dest, &source, &ClassificationResult::error("x.txt", "boom"));
        assert_eq!(outcome.status, PlacementStatus::Error);
        assert!(source.exists());
    }

    #[test]
    fn test_folder_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = LocalDestination::new(dir.path());
        let a = dest.get_or_create_folder("Tech").unwrap();
        let b = dest.get_or_create_folder("Tech").unwrap();
        assert_eq!(a, b);
        assert!(a.is_dir());
    }

    #[test]
    fn test_is_in_folder_uses_canonical_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Tech")).unwrap();
        let file = dir.path().join("Tech").join("a.txt");
        fs::write(&file, "").unwrap();
        let dest = LocalDestination::new(dir.path());

        let dotted = dir.path().join(".").join("Tech");
        assert!(dest.is_in_folder(&file, &dotted));
        assert!(!dest.is_in_folder(&file, dir.path()));
    }
}
