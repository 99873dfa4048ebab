// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Price table and call-size estimates for the two governed operations.
//!
//! Embedding pricing follows the small-embedding-model tier ($0.10/MTok);
//! judge pricing is a blended input+output rate for a Haiku-class model at
//! the verdict sizes this system produces. Verified against provider
//! pricing pages on 2026-06-15.

use tidings_core::types::QuotaKind;

/// USD per 1000 tokens, by operation.
pub fn price_per_1k(kind: QuotaKind) -> f64 {
    match kind {
        QuotaKind::Embedding => 0.0001,
        QuotaKind::Judge => 0.0016,
    }
}

/// Typical tokens consumed by one call, used to estimate call counts from
/// cumulative token counters.
pub fn typical_tokens_per_call(kind: QuotaKind) -> i64 {
    match kind {
        QuotaKind::Embedding => 256,
        QuotaKind::Judge => 700,
    }
}

/// Estimated cost of `tokens` tokens for one operation.
pub fn estimate_cost(kind: QuotaKind, tokens: u32) -> f64 {
    (tokens as f64 / 1000.0) * price_per_1k(kind)
}
