// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! PDF text extraction

use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

use crate::{Result, SortdeskError};

/// Extract the text of every page.
///
/// `pdf-extract` is tried first; when it errors or panics on a malformed
/// document the pages are walked one by one with `lopdf`.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let primary = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));

    match primary {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            debug!("pdf-extract failed ({}), falling back to lopdf", e);
            extract_pages(bytes)
        }
        Err(_) => {
            debug!("pdf-extract panicked, falling back to lopdf");
            extract_pages(bytes)
        }
    }
}

/// Page-by-page extraction, pages joined by a space
fn extract_pages(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| SortdeskError::Extraction(format!("Failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => debug!("Skipping unreadable PDF page {}: {}", page_number, e),
        }
    }

    Ok(pages.join(" "))
}
