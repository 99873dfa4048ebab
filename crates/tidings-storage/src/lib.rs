// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Tidings decision engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed query
//! modules for match records, push decisions, budget counters, and the run
//! audit trail, plus read-only adapters over the collaborator-owned goal,
//! item, and feedback tables.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod stores;

pub use database::Database;
pub use stores::{SqliteFeedbackStore, SqliteGoalStore, SqliteItemStore};
