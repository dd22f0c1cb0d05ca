// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Plain-text extraction for the supported document formats
//!
//! Every format is a variant of [`FileKind`]; anything unrecognised maps to
//! [`FileKind::Unsupported`]. Extraction is best-effort: a corrupt or
//! undecodable file yields empty content and a logged diagnostic, never an
//! error.

pub mod office;
pub mod pdf;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::{Result, SortdeskError};

/// Signature shared by the per-format extraction functions
pub type ExtractFn = fn(&[u8]) -> Result<String>;

/// Closed set of formats the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
    Markdown,
    Text,
    Unsupported,
}

impl FileKind {
    /// Map a bare extension (without the dot), case-insensitively
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" => Self::Xlsx,
            "pptx" => Self::Pptx,
            "md" => Self::Markdown,
            "txt" => Self::Text,
            _ => Self::Unsupported,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }

    /// Extraction routine for this kind, `None` for unsupported files
    pub fn extractor(self) -> Option<ExtractFn> {
        match self {
            Self::Pdf => Some(pdf::extract_text),
            Self::Docx => Some(office::extract_docx),
            Self::Xlsx => Some(office::extract_xlsx),
            Self::Pptx => Some(office::extract_pptx),
            Self::Markdown | Self::Text => Some(extract_utf8),
            Self::Unsupported => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pptx => "pptx",
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// How the content of an [`Extraction`] came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Text was recovered from the file
    Extracted,
    /// The file parsed but holds no text
    Empty,
    /// No extractor for this file type
    Unsupported,
    /// The extractor failed; content is empty
    Failed,
    /// Only the name was available (remote listings)
    NameOnly,
}

/// A `(filename, content)` pair plus how it was obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub filename: String,
    pub kind: FileKind,
    pub content: String,
    pub status: ExtractionStatus,
    pub diagnostic: Option<String>,
}

/// Runs the per-format extractors with the configured limits
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    max_content_chars: usize,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            max_content_chars: config.max_content_chars,
        }
    }

    /// Extract text from an in-memory file body.
    ///
    /// Never fails: unsupported kinds and extractor errors both come back as
    /// empty content with the matching status.
    pub fn extract_bytes(&self, filename: &str, kind: FileKind, bytes: &[u8]) -> Extraction {
        let Some(extract) = kind.extractor() else {
            debug!("Unsupported file format: {}", filename);
            return Extraction {
                filename: filename.to_string(),
                kind,
                content: String::new(),
                status: ExtractionStatus::Unsupported,
                diagnostic: Some(format!("No extractor for {}", filename)),
            };
        };

        match extract(bytes) {
            Ok(text) => {
                let content = self.truncate(text);
                let status = if content.trim().is_empty() {
                    ExtractionStatus::Empty
                } else {
                    ExtractionStatus::Extracted
                };
                debug!("Extracted {} chars from {} ({})", content.len(), filename, kind.name());
                Extraction {
                    filename: filename.to_string(),
                    kind,
                    content,
                    status,
                    diagnostic: None,
                }
            }
            Err(e) => {
                warn!("Failed to extract content from {}: {}", filename, e);
                Extraction {
                    filename: filename.to_string(),
                    kind,
                    content: String::new(),
                    status: ExtractionStatus::Failed,
                    diagnostic: Some(e.to_string()),
                }
            }
        }
    }

    /// Read a file from disk and extract it.
    ///
    /// Only the read itself can fail; a missing or unreadable file is the
    /// caller's problem, everything after that is absorbed.
    pub fn extract_path(&self, path: &Path) -> Result<Extraction> {
        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SortdeskError::NotFound(path.display().to_string()))?;
        let kind = FileKind::from_path(path);

        if kind == FileKind::Unsupported {
            if !path.is_file() {
                return Err(SortdeskError::NotFound(path.display().to_string()));
            }
            return Ok(self.extract_bytes(filename, kind, &[]));
        }

        let bytes = std::fs::read(path)?;
        Ok(self.extract_bytes(filename, kind, &bytes))
    }

    /// Stand-in extraction for sources that only expose a name
    pub fn name_only(&self, filename: &str, kind: FileKind) -> Extraction {
        Extraction {
            filename: filename.to_string(),
            kind,
            content: String::new(),
            status: ExtractionStatus::NameOnly,
            diagnostic: None,
        }
    }

    fn truncate(&self, text: String) -> String {
        if self.max_content_chars == 0 {
            return text;
        }
        match text.char_indices().nth(self.max_content_chars) {
            Some((idx, _)) => text[..idx].to_string(),
            None => text,
        }
    }
}

/// Markdown and plain text are read verbatim and must be valid UTF-8
fn extract_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| SortdeskError::Extraction(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(FileKind::from_path(Path::new("a/Report.PDF")), FileKind::Pdf);
        assert_eq!(FileKind::from_path(Path::new("notes.md")), FileKind::Markdown);
        assert_eq!(FileKind::from_path(Path::new("deck.pptx")), FileKind::Pptx);
        assert_eq!(FileKind::from_path(Path::new("archive.zip")), FileKind::Unsupported);
        assert_eq!(FileKind::from_path(Path::new("Makefile")), FileKind::Unsupported);
        assert!(FileKind::Unsupported.extractor().is_none());
    }

    #[test]
    fn test_plain_text() {
        let extractor = Extractor::default();
        let out = extractor.extract_bytes("notes.txt", FileKind::Text, b"Semester GPA");
        assert_eq!(out.status, ExtractionStatus::Extracted);
        assert_eq!(out.content, "Semester GPA");
    }

    #[test]
    fn test_invalid_utf8_downgrades_to_empty() {
        let extractor = Extractor::default();
        let out = extractor.extract_bytes("bad.txt", FileKind::Text, &[0xff, 0xfe, 0x00]);
        assert_eq!(out.status, ExtractionStatus::Failed);
        assert!(out.content.is_empty());
        assert!(out.diagnostic.is_some());
    }

    #[test]
    fn test_corrupt_containers_downgrade_to_empty() {
        let extractor = Extractor::default();
        for kind in [FileKind::Pdf, FileKind::Docx, FileKind::Xlsx, FileKind::Pptx] {
            let out = extractor.extract_bytes("broken", kind, b"definitely not a document");
            assert_eq!(out.status, ExtractionStatus::Failed, "{:?}", kind);
            assert!(out.content.is_empty());
        }
    }

    #[test]
    fn test_unsupported_zero_byte_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.xyz");
        std::fs::write(&path, b"").unwrap();

        let out = Extractor::default().extract_path(&path).unwrap();
        assert_eq!(out.status, ExtractionStatus::Unsupported);
        assert_eq!(out.filename, "blob.xyz");
        assert!(out.content.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Extractor::default();
        assert!(extractor.extract_path(&dir.path().join("gone.txt")).is_err());
        assert!(extractor.extract_path(&dir.path().join("gone.bin")).is_err());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let extractor = Extractor::new(&ExtractionConfig { max_content_chars: 3 });
        let out = extractor.extract_bytes("u.txt", FileKind::Text, "héllo".as_bytes());
        assert_eq!(out.content, "hél");
    }
}
