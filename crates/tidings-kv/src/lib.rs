// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`KeyValueStore`] implementation for single-node deployments.
//!
//! Backed by a `DashMap`; every operation holds the entry's shard lock for
//! its full read-modify-write, which gives the per-key atomicity the
//! coalesce buffer and budget counters require. Expiry is lazy: expired
//! entries read as absent and are dropped on the next touch.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tidings_core::{KeyValueStore, TidingsError};

/// A stored value: plain string, counter, or list.
#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Counter(i64),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory key-value store with per-key TTL.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, Slot>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, TidingsError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired() {
                    occupied.remove();
                    return Ok(None);
                }
                match &occupied.get().value {
                    Value::Text(s) => Ok(Some(s.clone())),
                    Value::Counter(n) => Ok(Some(n.to_string())),
                    Value::List(_) => Err(TidingsError::Internal(format!(
                        "key {key} holds a list, not a value"
                    ))),
                }
            }
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), TidingsError> {
        self.entries.insert(
            key.to_string(),
            Slot {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64, TidingsError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(Slot {
                        value: Value::Counter(by),
                        expires_at: None,
                    });
                    return Ok(by);
                }
                let current = match &occupied.get().value {
                    Value::Counter(n) => *n,
                    Value::Text(s) => s.parse::<i64>().map_err(|_| {
                        TidingsError::Internal(format!("key {key} is not an integer"))
                    })?,
                    Value::List(_) => {
                        return Err(TidingsError::Internal(format!(
                            "key {key} holds a list, not a counter"
                        )));
                    }
                };
                let next = current + by;
                occupied.get_mut().value = Value::Counter(next);
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::Counter(by),
                    expires_at: None,
                });
                Ok(by)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, TidingsError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.remove();
                    return Ok(false);
                }
                occupied.get_mut().expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn rpush_bounded(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Duration,
    ) -> Result<bool, TidingsError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(Slot {
                        value: Value::List(vec![value.to_string()]),
                        expires_at: Some(Instant::now() + ttl),
                    });
                    return Ok(true);
                }
                match &mut occupied.get_mut().value {
                    Value::List(items) => {
                        if items.len() >= max_len {
                            Ok(false)
                        } else {
                            items.push(value.to_string());
                            Ok(true)
                        }
                    }
                    _ => Err(TidingsError::Internal(format!(
                        "key {key} holds a value, not a list"
                    ))),
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::List(vec![value.to_string()]),
                    expires_at: Some(Instant::now() + ttl),
                });
                Ok(true)
            }
        }
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, TidingsError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired() {
                    occupied.remove();
                    return Ok(vec![]);
                }
                match &occupied.get().value {
                    Value::List(items) => Ok(items.clone()),
                    _ => Err(TidingsError::Internal(format!(
                        "key {key} holds a value, not a list"
                    ))),
                }
            }
            Entry::Vacant(_) => Ok(vec![]),
        }
    }

    async fn llen(&self, key: &str) -> Result<usize, TidingsError> {
        Ok(self.lrange(key).await?.len())
    }

    async fn take_list(&self, key: &str) -> Result<Vec<String>, TidingsError> {
        match self.entries.remove(key) {
            Some((_, slot)) => {
                if slot.is_expired() {
                    return Ok(vec![]);
                }
                match slot.value {
                    Value::List(items) => Ok(items),
                    _ => Err(TidingsError::Internal(format!(
                        "key {key} holds a value, not a list"
                    ))),
                }
            }
            None => Ok(vec![]),
        }
    }

    async fn scan_by_pattern(&self, prefix: &str) -> Result<Vec<String>, TidingsError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired() && entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_get_round_trip() {
        let kv = MemoryKv::new();
        kv.set("k", "v", None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(kv.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() {
        let kv = MemoryKv::new();
        kv.set("k", "v", Some(Duration::from_millis(10))).await.unwrap();
        assert!(kv.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(kv.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incr_creates_and_accumulates() {
        let kv = MemoryKv::new();
        assert_eq!(kv.incr("n", 3).await.unwrap(), 3);
        assert_eq!(kv.incr("n", 2).await.unwrap(), 5);
        assert_eq!(kv.get("n").await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn concurrent_incr_is_lossless() {
        let kv = Arc::new(MemoryKv::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let kv = kv.clone();
            handles.push(tokio::spawn(async move { kv.incr("n", 1).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(kv.incr("n", 0).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn rpush_bounded_enforces_cap() {
        let kv = MemoryKv::new();
        let ttl = Duration::from_secs(60);
        assert!(kv.rpush_bounded("l", "a", 3, ttl).await.unwrap());
        assert!(kv.rpush_bounded("l", "b", 3, ttl).await.unwrap());
        assert!(kv.rpush_bounded("l", "c", 3, ttl).await.unwrap());
        // Fourth append is rejected; the list never grows past the bound.
        assert!(!kv.rpush_bounded("l", "d", 3, ttl).await.unwrap());
        assert_eq!(kv.llen("l").await.unwrap(), 3);
        assert_eq!(kv.lrange("l").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn concurrent_rpush_never_exceeds_bound() {
        let kv = Arc::new(MemoryKv::new());
        let ttl = Duration::from_secs(60);
        let mut handles = Vec::new();
        for n in 0..20 {
            let kv = kv.clone();
            handles.push(tokio::spawn(async move {
                kv.rpush_bounded("l", &format!("c{n}"), 3, ttl).await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(kv.llen("l").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn take_list_is_destructive_and_exclusive() {
        let kv = Arc::new(MemoryKv::new());
        let ttl = Duration::from_secs(60);
        kv.rpush_bounded("l", "a", 3, ttl).await.unwrap();
        kv.rpush_bounded("l", "b", 3, ttl).await.unwrap();

        // Exactly one of two concurrent flushers observes the contents.
        let (r1, r2) = tokio::join!(kv.take_list("l"), kv.take_list("l"));
        let (r1, r2) = (r1.unwrap(), r2.unwrap());
        let non_empty = [&r1, &r2].iter().filter(|l| !l.is_empty()).count();
        assert_eq!(non_empty, 1);
        assert_eq!(r1.len() + r2.len(), 2);
        assert!(kv.lrange("l").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expire_refreshes_ttl() {
        let kv = MemoryKv::new();
        kv.set("k", "v", Some(Duration::from_millis(20))).await.unwrap();
        assert!(kv.expire("k", Duration::from_secs(60)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(kv.get("k").await.unwrap().is_some(), "refreshed TTL outlives original");
        assert!(!kv.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn scan_by_pattern_matches_prefix() {
        let kv = MemoryKv::new();
        kv.set("coalesce:g1:100", "x", None).await.unwrap();
        kv.set("coalesce:g1:200", "x", None).await.unwrap();
        kv.set("coalesce:g2:100", "x", None).await.unwrap();
        kv.set("other", "x", None).await.unwrap();

        let keys = kv.scan_by_pattern("coalesce:g1:").await.unwrap();
        assert_eq!(keys, vec!["coalesce:g1:100", "coalesce:g1:200"]);
    }

    #[tokio::test]
    async fn type_mismatch_is_an_error() {
        let kv = MemoryKv::new();
        kv.set("k", "v", None).await.unwrap();
        assert!(
            kv.rpush_bounded("k", "a", 3, Duration::from_secs(60))
                .await
                .is_err()
        );
        kv.rpush_bounded("l", "a", 3, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(kv.get("l").await.is_err());
    }
}
