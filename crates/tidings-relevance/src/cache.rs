// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Goal-embedding cache keyed by goal id plus a content hash of the goal's
//! name and description.
//!
//! Editing a goal changes the hash and naturally misses the stale entry;
//! the TTL bounds how long an unused generation survives.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tidings_core::{KeyValueStore, TidingsError};
use tidings_core::types::Goal;
use tracing::debug;

/// KV-backed cache of generated goal embeddings.
pub struct GoalEmbeddingCache {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl GoalEmbeddingCache {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl_hours: u64) -> Self {
        Self {
            kv,
            ttl: Duration::from_secs(ttl_hours * 3600),
        }
    }

    /// Cache key: `goal-emb:{goal_id}:{sha256(name+description)[..16]}`.
    fn key(goal: &Goal) -> String {
        let mut hasher = Sha256::new();
        hasher.update(goal.name.as_bytes());
        hasher.update(b"\n");
        hasher.update(goal.description.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("goal-emb:{}:{}", goal.id, &digest[..16])
    }

    /// Cached embedding for the goal's current name+description, if any.
    pub async fn get(&self, goal: &Goal) -> Result<Option<Vec<f32>>, TidingsError> {
        let key = Self::key(goal);
        match self.kv.get(&key).await? {
            Some(json) => match serde_json::from_str::<Vec<f32>>(&json) {
                Ok(vector) => Ok(Some(vector)),
                Err(e) => {
                    debug!(key, error = %e, "corrupt cached embedding, treating as miss");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Store a freshly generated embedding under the goal's current hash.
    pub async fn put(&self, goal: &Goal, vector: &[f32]) -> Result<(), TidingsError> {
        let key = Self::key(goal);
        let json = serde_json::to_string(vector)
            .map_err(|e| TidingsError::Internal(format!("serialize embedding: {e}")))?;
        self.kv.set(&key, &json, Some(self.ttl)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::types::{GoalStatus, PriorityMode};
    use tidings_kv::MemoryKv;

    fn make_goal(id: &str, name: &str, description: &str) -> Goal {
        Goal {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            description: description.to_string(),
            priority_mode: PriorityMode::Soft,
            must_terms: vec![],
            negative_terms: vec![],
            blocked_sources: vec![],
            status: GoalStatus::Active,
            created_at: "2026-08-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = GoalEmbeddingCache::new(Arc::new(MemoryKv::new()), 24);
        let goal = make_goal("g1", "AI news", "large model releases");
        let vector = vec![0.1f32, 0.2, 0.3];

        assert!(cache.get(&goal).await.unwrap().is_none());
        cache.put(&goal, &vector).await.unwrap();
        assert_eq!(cache.get(&goal).await.unwrap().unwrap(), vector);
    }

    #[tokio::test]
    async fn editing_the_goal_misses_the_old_entry() {
        let cache = GoalEmbeddingCache::new(Arc::new(MemoryKv::new()), 24);
        let goal = make_goal("g1", "AI news", "large model releases");
        cache.put(&goal, &[1.0]).await.unwrap();

        let edited = make_goal("g1", "AI news", "agent frameworks");
        assert!(cache.get(&edited).await.unwrap().is_none());
        // The original description still hits.
        assert!(cache.get(&goal).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_miss() {
        let kv = Arc::new(MemoryKv::new());
        let cache = GoalEmbeddingCache::new(kv.clone(), 24);
        let goal = make_goal("g1", "AI news", "large model releases");
        cache.put(&goal, &[1.0]).await.unwrap();

        // Overwrite with garbage through the raw store.
        let keys = kv.scan_by_pattern("goal-emb:g1:").await.unwrap();
        kv.set(&keys[0], "not-json", None).await.unwrap();
        assert!(cache.get(&goal).await.unwrap().is_none());
    }
}
