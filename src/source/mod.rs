// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File sources feeding the pipeline

pub mod memory;

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::extract::FileKind;
use crate::{Result, SortdeskError};

pub use memory::MemoryStore;

/// Where the classifier gets a candidate's content from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Read from `path` on the local filesystem
    Disk,
    /// Body already fetched into memory
    Bytes(Vec<u8>),
    /// Only the name is known; score the filename alone
    NameOnly,
}

/// A file offered for classification and placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub kind: FileKind,
    /// Location handle understood by the matching destination
    pub path: PathBuf,
    pub content: ContentSource,
}

impl CandidateFile {
    pub fn on_disk(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        Some(Self {
            kind: FileKind::from_path(&path),
            name,
            path,
            content: ContentSource::Disk,
        })
    }
}

/// Enumerates the files a pass should consider
pub trait FileSource {
    /// Candidates in a stable order, so repeated passes see the same sequence
    fn list_candidate_files(&self) -> Result<Vec<CandidateFile>>;
}

/// Lists loose files in a directory plus files already in its category folders
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    managed_folders: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl LocalSource {
    /// Fails when `root` is not an existing directory
    pub fn new(root: &Path, managed_folders: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        if !root.is_dir() {
            return Err(SortdeskError::Precondition(format!(
                "{} does not exist or is not a directory", root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            managed_folders: managed_folders.into_iter().map(Into::into).collect(),
            excluded: Vec::new(),
        })
    }

    /// Never list this file (nor its `-journal`/`-wal` companions)
    pub fn exclude(mut self, path: &Path) -> Self {
        self.excluded.push(path.to_path_buf());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        self.excluded.iter().any(|excluded| {
            let same_dir = match (excluded.parent(), path.parent()) {
                (Some(a), Some(b)) => same_location(a, b),
                _ => false,
            };
            let Some(excluded_name) = excluded.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            same_dir && (name == excluded_name || name.starts_with(&format!("{}-", excluded_name)))
        })
    }

    fn list_dir(&self, dir: &Path, out: &mut Vec<CandidateFile>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !should_process(&path) || self.is_excluded(&path) {
                continue;
            }
            match CandidateFile::on_disk(path) {
                Some(candidate) => out.push(candidate),
                None => debug!("Skipping file with non UTF-8 name in {:?}", dir),
            }
        }
        Ok(())
    }
}

impl FileSource for LocalSource {
    fn list_candidate_files(&self) -> Result<Vec<CandidateFile>> {
        let mut files = Vec::new();
        self.list_dir(&self.root, &mut files)?;

        for folder in &self.managed_folders {
            let dir = self.root.join(folder);
            if dir.is_dir() {
                self.list_dir(&dir, &mut files)?;
            }
        }

        sort_candidates(&mut files);
        Ok(files)
    }
}

/// Lexicographic by name, then by location
pub fn sort_candidates(files: &mut [CandidateFile]) {
    files.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Check if a file should be processed
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Skip hidden files
    if filename.starts_with('.') {
        return false;
    }

    // Skip temporary files
    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    // Skip system files
    let skip_names = ["desktop.ini", "thumbs.db", ".ds_store"];
    if skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n)) {
        return false;
    }

    // Office lock files
    !filename.starts_with("~$")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_should_process() {
        assert!(should_process(Path::new("/d/Report.pdf")));
        assert!(!should_process(Path::new("/d/.hidden.txt")));
        assert!(!should_process(Path::new("/d/movie.mp4.part")));
        assert!(!should_process(Path::new("/d/Thumbs.db")));
        assert!(!should_process(Path::new("/d/~$draft.docx")));
    }

    #[test]
    fn test_missing_root_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalSource::new(&dir.path().join("nope"), ["A"]);
        assert!(matches!(result, Err(SortdeskError::Precondition(_))));
    }

    #[test]
    fn test_lists_loose_and_managed_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join(".secret"), "x").unwrap();
        fs::write(root.join("sortdesk.db"), "").unwrap();
        fs::write(root.join("sortdesk.db-journal"), "").unwrap();
        fs::create_dir(root.join("Placed")).unwrap();
        fs::write(root.join("Placed").join("c.pdf"), "c").unwrap();
        fs::create_dir(root.join("Other")).unwrap();
        fs::write(root.join("Other").join("ignored.txt"), "x").unwrap();
        fs::create_dir_all(root.join("Placed").join("deeper")).unwrap();

        let source = LocalSource::new(root, ["Placed"]).unwrap().exclude(&root.join("sortdesk.db"));
        let names: Vec<String> = source.list_candidate_files().unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();

        assert_eq!(names, vec!["a.md", "b.txt", "c.pdf"]);
    }

    #[test]
    fn test_candidate_kind() {
        let candidate = CandidateFile::on_disk(PathBuf::from("/d/Deck.PPTX")).unwrap();
        assert_eq!(candidate.kind, FileKind::Pptx);
        assert_eq!(candidate.content, ContentSource::Disk);
    }
}
