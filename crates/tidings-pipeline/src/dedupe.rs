// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic dedupe key for push decisions.
//!
//! The key fingerprints (goal, item, final bucket) so concurrent emissions
//! of the same decision collapse onto one `push_decisions` row via its
//! unique constraint.

use sha2::{Digest, Sha256};
use tidings_core::types::DecisionKind;

/// Truncated hex length of the dedupe key.
const DEDUPE_KEY_LEN: usize = 16;

/// Stable hash of (goal_id, item_id, decision kind), hex-truncated.
pub fn dedupe_key(goal_id: &str, item_id: &str, kind: DecisionKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(goal_id.as_bytes());
    hasher.update(b"|");
    hasher.update(item_id.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..DEDUPE_KEY_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let a = dedupe_key("g1", "i1", DecisionKind::Immediate);
        let b = dedupe_key("g1", "i1", DecisionKind::Immediate);
        assert_eq!(a, b);
        assert_eq!(a.len(), DEDUPE_KEY_LEN);
    }

    #[test]
    fn key_varies_with_each_component() {
        let base = dedupe_key("g1", "i1", DecisionKind::Immediate);
        assert_ne!(base, dedupe_key("g2", "i1", DecisionKind::Immediate));
        assert_ne!(base, dedupe_key("g1", "i2", DecisionKind::Immediate));
        assert_ne!(base, dedupe_key("g1", "i1", DecisionKind::Batch));
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        assert_ne!(
            dedupe_key("g1x", "i1", DecisionKind::Batch),
            dedupe_key("g1", "xi1", DecisionKind::Batch)
        );
    }
}
