// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recency signal: full score while fresh, linear decay to half-score by a
//! medium window, then decay to zero by a long window.

use chrono::{DateTime, Utc};
use tidings_config::model::ScoringConfig;
use tracing::debug;

/// Recency score for an item published at `published_at`, evaluated at `now`.
///
/// Unparseable timestamps score 0.0: content with no usable publish time
/// carries no freshness signal.
pub fn recency_score(published_at: &str, now: DateTime<Utc>, config: &ScoringConfig) -> f64 {
    let published = match DateTime::parse_from_rfc3339(published_at) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => {
            debug!(published_at, "unparseable publish timestamp, recency 0");
            return 0.0;
        }
    };

    let age_hours = (now - published).num_seconds() as f64 / 3600.0;
    let fresh = config.fresh_hours as f64;
    let half = config.half_hours as f64;
    let zero = config.zero_hours as f64;

    if age_hours <= fresh {
        1.0
    } else if age_hours <= half {
        // 1.0 at fresh, 0.5 at half.
        1.0 - 0.5 * (age_hours - fresh) / (half - fresh)
    } else if age_hours <= zero {
        // 0.5 at half, 0.0 at zero.
        0.5 * (zero - age_hours) / (zero - half)
    } else {
        0.0
    }
}
