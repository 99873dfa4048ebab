// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value primitive trait for budget counters and the coalesce buffer.
//!
//! The contract requires only atomic increment, expire, and bounded list
//! append; any store with these primitives (Redis, or the in-process
//! `tidings-kv` implementation for single-node deployments) satisfies it.
//! Each method must be atomic at entry granularity: concurrent pipeline runs
//! for different items of the same goal routinely race on the same keys.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TidingsError;

/// Atomic key-value operations with per-key TTL.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a string value. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, TidingsError>;

    /// Set a string value, optionally with a TTL.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), TidingsError>;

    /// Atomically increment a counter key by `by`, creating it at zero first
    /// if absent. Returns the post-increment value.
    async fn incr(&self, key: &str, by: i64) -> Result<i64, TidingsError>;

    /// Set or refresh a key's TTL. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, TidingsError>;

    /// Atomically append to a list iff its length is below `max_len`,
    /// setting `ttl` when the list is created. Returns whether the value
    /// was stored. The length check and the append are a single atomic step.
    async fn rpush_bounded(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Duration,
    ) -> Result<bool, TidingsError>;

    /// Full contents of a list (empty if absent or expired).
    async fn lrange(&self, key: &str) -> Result<Vec<String>, TidingsError>;

    /// Length of a list (zero if absent or expired).
    async fn llen(&self, key: &str) -> Result<usize, TidingsError>;

    /// Atomically read and delete a list. Exactly one caller observes the
    /// contents; concurrent callers get an empty vec.
    async fn take_list(&self, key: &str) -> Result<Vec<String>, TidingsError>;

    /// All live keys starting with `prefix`.
    async fn scan_by_pattern(&self, prefix: &str) -> Result<Vec<String>, TidingsError>;
}
