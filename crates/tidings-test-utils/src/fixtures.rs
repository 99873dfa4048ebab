// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Goal and item builders shared across test suites.

use chrono::Utc;
use tidings_core::types::{ContentItem, Goal, GoalStatus, PriorityMode};

/// A SOFT-mode active goal with the given must-terms.
pub fn goal(id: &str, must_terms: &[&str]) -> Goal {
    Goal {
        id: id.to_string(),
        user_id: "u1".to_string(),
        name: "AI releases".to_string(),
        description: "major model launches and agent frameworks".to_string(),
        priority_mode: PriorityMode::Soft,
        must_terms: must_terms.iter().map(|s| s.to_string()).collect(),
        negative_terms: vec![],
        blocked_sources: vec![],
        status: GoalStatus::Active,
        created_at: "2026-08-01T00:00:00Z".to_string(),
    }
}

/// A freshly published item from `source_id` with the given title.
pub fn item(id: &str, source_id: &str, title: &str) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        source_id: source_id.to_string(),
        title: title.to_string(),
        snippet: "snippet text".to_string(),
        summary: "summary text".to_string(),
        url: Some(format!("https://example.com/{id}")),
        embedding: None,
        published_at: Utc::now().to_rfc3339(),
        ingested_at: Utc::now().to_rfc3339(),
    }
}
