// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relevance scoring for the Tidings decision engine.
//!
//! Computes a weighted match score and a structured explanation for a
//! (content item, interest goal) pair from four signals: semantic
//! similarity, keyword hits, recency, and feedback history. Blocking rules
//! (blocked source, negative term, STRICT must-term miss) short-circuit to
//! score 0 before any signal is computed.

pub mod cache;
pub mod engine;
pub mod feedback;
pub mod keywords;
pub mod recency;
pub mod types;

pub use cache::GoalEmbeddingCache;
pub use engine::{RelevanceEngine, check_blocked, searchable_text};
pub use types::{BlockReason, MatchResult, cosine_similarity};
