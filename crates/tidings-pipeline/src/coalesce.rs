// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalesce buffer: a short-lived, size- and time-bounded staging area that
//! merges near-simultaneous high-priority signals for the same goal into a
//! single outbound notification.
//!
//! Backed by the KV store's atomic bounded list append plus a TTL, so the
//! bound holds under concurrent pipeline runs. Flush is destructive
//! read-and-clear; exactly one flusher observes a bucket's contents.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tidings_config::model::CoalesceConfig;
use tidings_core::{KeyValueStore, TidingsError};

/// Bounded, time-windowed buffer of immediate-delivery candidates.
pub struct CoalesceBuffer {
    kv: Arc<dyn KeyValueStore>,
    config: CoalesceConfig,
}

impl CoalesceBuffer {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: CoalesceConfig) -> Self {
        Self { kv, config }
    }

    /// Fixed-width time bucket: epoch seconds floored to the window.
    pub fn bucket_ts(&self, now: DateTime<Utc>) -> i64 {
        let window = self.config.window_secs as i64;
        let ts = now.timestamp();
        ts - ts.rem_euclid(window)
    }

    /// Maximum candidates per bucket.
    pub fn max_items(&self) -> usize {
        self.config.max_items
    }

    fn key(goal_id: &str, bucket_ts: i64) -> String {
        format!("coalesce:{goal_id}:{bucket_ts}")
    }

    /// Append a candidate to the (goal, bucket) list iff it has room.
    ///
    /// Returns `false` when the bucket already holds the maximum: the
    /// candidate is "coalesce-skipped", not rejected -- delivery folds it
    /// into the already-buffered batch.
    pub async fn try_add(
        &self,
        goal_id: &str,
        bucket_ts: i64,
        candidate_id: &str,
    ) -> Result<bool, TidingsError> {
        self.kv
            .rpush_bounded(
                &Self::key(goal_id, bucket_ts),
                candidate_id,
                self.config.max_items,
                Duration::from_secs(self.config.ttl_secs),
            )
            .await
    }

    /// Candidates currently buffered for (goal, bucket), non-destructively.
    pub async fn peek(&self, goal_id: &str, bucket_ts: i64) -> Result<Vec<String>, TidingsError> {
        self.kv.lrange(&Self::key(goal_id, bucket_ts)).await
    }

    /// Destructively drain the (goal, bucket) list. Exactly one concurrent
    /// flusher gets the contents; the rest see an empty vec.
    pub async fn flush(&self, goal_id: &str, bucket_ts: i64) -> Result<Vec<String>, TidingsError> {
        self.kv.take_list(&Self::key(goal_id, bucket_ts)).await
    }

    /// True when the bucket may be flushed: the wall clock has rolled into a
    /// later bucket, or the bucket is full.
    pub async fn is_flush_due(
        &self,
        goal_id: &str,
        bucket_ts: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, TidingsError> {
        if self.bucket_ts(now) > bucket_ts {
            return Ok(true);
        }
        let len = self.kv.llen(&Self::key(goal_id, bucket_ts)).await?;
        Ok(len >= self.config.max_items)
    }

    /// Bucket timestamps with live entries for a goal.
    pub async fn pending_buckets(&self, goal_id: &str) -> Result<Vec<i64>, TidingsError> {
        let prefix = format!("coalesce:{goal_id}:");
        let keys = self.kv.scan_by_pattern(&prefix).await?;
        let mut buckets: Vec<i64> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix)?.parse().ok())
            .collect();
        buckets.sort_unstable();
        Ok(buckets)
    }
}
