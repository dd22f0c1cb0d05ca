// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! In-memory remote-style storage
//!
//! Models a cloud drive root: folders are container entries that never show
//! up in listings, and items are offered by name only unless content
//! fetching is switched on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{sort_candidates, CandidateFile, ContentSource, FileSource};
use crate::extract::FileKind;
use crate::placement::Destination;
use crate::{Result, SortdeskError};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    root: PathBuf,
    folders: BTreeSet<PathBuf>,
    items: BTreeMap<PathBuf, Vec<u8>>,
    fetch_content: bool,
    failing_moves: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/"),
            ..Self::default()
        }
    }

    /// Offer item bodies to the classifier instead of names only
    pub fn with_content(mut self) -> Self {
        self.fetch_content = true;
        self
    }

    /// Add an item at the root; returns its location handle
    pub fn insert(&mut self, name: &str, body: &[u8]) -> PathBuf {
        let path = self.root.join(name);
        self.items.insert(path.clone(), body.to_vec());
        path
    }

    /// Add an item inside a folder, creating the folder
    pub fn insert_in(&mut self, folder: &str, name: &str, body: &[u8]) -> PathBuf {
        let folder = self.root.join(folder);
        self.folders.insert(folder.clone());
        let path = folder.join(name);
        self.items.insert(path.clone(), body.to_vec());
        path
    }

    /// Make every later move of `name` fail with an I/O error
    pub fn fail_moves_for(&mut self, name: &str) {
        self.failing_moves.insert(name.to_string());
    }

    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.items.get(path).map(Vec::as_slice)
    }

    pub fn remove(&mut self, path: &Path) -> Option<Vec<u8>> {
        self.items.remove(path)
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.folders.iter()
            .filter_map(|f| f.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect()
    }
}

impl FileSource for MemoryStore {
    fn list_candidate_files(&self) -> Result<Vec<CandidateFile>> {
        let mut files: Vec<CandidateFile> = self.items.iter()
            .filter_map(|(path, body)| {
                let name = path.file_name()?.to_str()?.to_string();
                let content = if self.fetch_content {
                    ContentSource::Bytes(body.clone())
                } else {
                    ContentSource::NameOnly
                };
                Some(CandidateFile {
                    kind: FileKind::from_path(path),
                    name,
                    path: path.clone(),
                    content,
                })
            })
            .collect();
        sort_candidates(&mut files);
        Ok(files)
    }
}

impl Destination for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.items.contains_key(path) || self.folders.contains(path)
    }

    fn get_or_create_folder(&mut self, name: &str) -> Result<PathBuf> {
        let folder = self.root.join(name);
        if self.items.contains_key(&folder) {
            return Err(SortdeskError::Collision(format!("an item named {}", name)));
        }
        self.folders.insert(folder.clone());
        Ok(folder)
    }

    fn is_in_folder(&self, file: &Path, folder: &Path) -> bool {
        file.parent() == Some(folder)
    }

    fn move_file(&mut self, file: &Path, folder: &Path) -> Result<PathBuf> {
        let name = file.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SortdeskError::NotFound(file.display().to_string()))?;

        if self.failing_moves.contains(name) {
            return Err(SortdeskError::FileSystem(std::io::Error::new(
                std::io::ErrorKind::Other,
                "remote move rejected",
            )));
        }

        let body = self.items.remove(file)
            .ok_or_else(|| SortdeskError::NotFound(file.display().to_string()))?;
        let target = folder.join(name);
        self.items.insert(target.clone(), body);
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_excludes_folders_and_is_sorted() {
        let mut store = MemoryStore::new();
        store.insert("b.pdf", b"");
        store.insert_in("Capstone Work", "a.pptx", b"");
        store.get_or_create_folder("Empty").unwrap();

        let listed = store.list_candidate_files().unwrap();
        let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.pptx", "b.pdf"]);
        assert!(listed.iter().all(|c| c.content == ContentSource::NameOnly));
    }

    #[test]
    fn test_move_and_failure() {
        let mut store = MemoryStore::new();
        let item = store.insert("notes.md", b"hello");
        let folder = store.get_or_create_folder("Tech").unwrap();

        let moved = store.move_file(&item, &folder).unwrap();
        assert!(store.is_in_folder(&moved, &folder));
        assert!(!store.exists(&item));
        assert_eq!(store.get(&moved), Some(&b"hello"[..]));

        let other = store.insert("stuck.md", b"x");
        store.fail_moves_for("stuck.md");
        assert!(store.move_file(&other, &folder).is_err());
        assert!(store.exists(&other));
    }
}
