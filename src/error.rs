// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Sortdesk

use thiserror::Error;

/// Result type alias for Sortdesk operations
pub type Result<T> = std::result::Result<T, SortdeskError>;

/// Sortdesk error types
#[derive(Error, Debug)]
pub enum SortdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Ledger error: {0}")]
    Persistence(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Destination already holds {0}")]
    Collision(String),

    #[error("Target directory unavailable: {0}")]
    Precondition(String),

    #[error("Pipeline worker failed: {0}")]
    Worker(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<zip::result::ZipError> for SortdeskError {
    fn from(e: zip::result::ZipError) -> Self {
        SortdeskError::Extraction(format!("Invalid office container: {}", e))
    }
}

impl From<quick_xml::Error> for SortdeskError {
    fn from(e: quick_xml::Error) -> Self {
        SortdeskError::Extraction(format!("Malformed XML: {}", e))
    }
}
