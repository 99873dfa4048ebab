// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feedback boost: the goal-scoped like/dislike history of the item's
//! source, mapped linearly to a bounded additive term.

use tidings_core::types::{FeedbackEntry, FeedbackKind};

/// Boost derived from the source's like ratio within this goal.
///
/// A 0.5 ratio (or no history at all) contributes nothing; all-likes
/// contributes `+boost_max`, all-dislikes `-boost_max`.
pub fn feedback_boost(history: &[FeedbackEntry], source_id: &str, boost_max: f64) -> f64 {
    let mut likes = 0u32;
    let mut dislikes = 0u32;
    for entry in history.iter().filter(|e| e.source_id == source_id) {
        match entry.kind {
            FeedbackKind::Like => likes += 1,
            FeedbackKind::Dislike => dislikes += 1,
        }
    }
    let total = likes + dislikes;
    if total == 0 {
        return 0.0;
    }
    let ratio = likes as f64 / total as f64;
    (ratio - 0.5) * 2.0 * boost_max
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source_id: &str, kind: FeedbackKind) -> FeedbackEntry {
        FeedbackEntry {
            id: format!("f-{source_id}-{kind}"),
            goal_id: "g1".to_string(),
            item_id: "i1".to_string(),
            source_id: source_id.to_string(),
            kind,
            created_at: "2026-08-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn no_history_is_neutral() {
        assert_eq!(feedback_boost(&[], "src", 0.2), 0.0);
    }

    #[test]
    fn all_likes_reach_positive_bound() {
        let history = vec![
            entry("src", FeedbackKind::Like),
            entry("src", FeedbackKind::Like),
        ];
        assert!((feedback_boost(&history, "src", 0.2) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn all_dislikes_reach_negative_bound() {
        let history = vec![entry("src", FeedbackKind::Dislike)];
        assert!((feedback_boost(&history, "src", 0.2) + 0.2).abs() < 1e-9);
    }

    #[test]
    fn even_split_is_neutral() {
        let history = vec![
            entry("src", FeedbackKind::Like),
            entry("src", FeedbackKind::Dislike),
        ];
        assert!(feedback_boost(&history, "src", 0.2).abs() < 1e-9);
    }

    #[test]
    fn other_sources_are_ignored() {
        let history = vec![
            entry("other", FeedbackKind::Dislike),
            entry("other", FeedbackKind::Dislike),
        ];
        assert_eq!(feedback_boost(&history, "src", 0.2), 0.0);
    }

    #[test]
    fn three_to_one_ratio_maps_linearly() {
        let history = vec![
            entry("src", FeedbackKind::Like),
            entry("src", FeedbackKind::Like),
            entry("src", FeedbackKind::Like),
            entry("src", FeedbackKind::Dislike),
        ];
        // ratio 0.75 -> (0.25) * 2 * 0.2 = 0.1
        assert!((feedback_boost(&history, "src", 0.2) - 0.1).abs() < 1e-9);
    }
}
