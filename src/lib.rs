// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sortdesk: keyword document sorter
//!
//! Extracts text from office documents, scores it against per-category
//! keyword sets and moves each file into its category folder. Placement is
//! idempotent, and every pass is recorded in a SQLite run ledger.

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod pipeline;
pub mod placement;
pub mod source;

pub use config::AppConfig;
pub use error::{Result, SortdeskError};
