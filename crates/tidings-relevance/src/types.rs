// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result types and vector math for the relevance engine.

use std::collections::BTreeMap;

use tidings_core::types::MatchReasons;

/// Why an item was blocked before scoring. Precedence is fixed:
/// blocked source, then negative term, then STRICT must-term miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    BlockedSource { source_id: String },
    NegativeTerm { term: String },
    StrictMustTermMiss,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::BlockedSource { source_id } => {
                write!(f, "source {source_id} is blocked for this goal")
            }
            BlockReason::NegativeTerm { term } => {
                write!(f, "negative term \"{term}\" matched")
            }
            BlockReason::StrictMustTermMiss => {
                write!(f, "strict goal with no must-term hit")
            }
        }
    }
}

/// The full output of one scoring pass.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Always in [0, 1]; exactly 0 when blocked.
    pub score: f64,
    /// Per-signal normalized feature values.
    pub features: BTreeMap<String, f64>,
    pub reasons: MatchReasons,
    pub blocked: bool,
    pub block_reason: Option<String>,
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
