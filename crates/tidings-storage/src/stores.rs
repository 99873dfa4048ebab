// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed implementations of the read-only collaborator store traits.
//!
//! The goal-management and ingestion collaborators own these tables; the
//! decision core reads them through [`tidings_core::GoalStore`],
//! [`tidings_core::ItemStore`], and [`tidings_core::FeedbackStore`].
//! Embedding vectors are stored as little-endian f32 BLOBs.

use std::str::FromStr;

use async_trait::async_trait;
use rusqlite::params;
use tidings_core::types::{
    ContentItem, FeedbackEntry, FeedbackKind, Goal, GoalStatus, PriorityMode,
};
use tidings_core::{FeedbackStore, GoalStore, ItemStore, TidingsError};

use crate::database::{Database, map_tr_err};

/// Serialize an embedding to little-endian f32 bytes.
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Deserialize an embedding from little-endian f32 bytes.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Read-only goal store over the `goals` table.
#[derive(Clone)]
pub struct SqliteGoalStore {
    db: Database,
}

impl SqliteGoalStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

const GOAL_COLUMNS: &str = "id, user_id, name, description, priority_mode, must_terms_json, \
                            negative_terms_json, blocked_sources_json, status, created_at";

fn row_to_goal(row: &rusqlite::Row) -> Goal {
    let priority_str: String = row.get(4).unwrap_or_default();
    let must_json: String = row.get(5).unwrap_or_default();
    let negative_json: String = row.get(6).unwrap_or_default();
    let blocked_json: String = row.get(7).unwrap_or_default();
    let status_str: String = row.get(8).unwrap_or_default();
    Goal {
        id: row.get(0).unwrap_or_default(),
        user_id: row.get(1).unwrap_or_default(),
        name: row.get(2).unwrap_or_default(),
        description: row.get(3).unwrap_or_default(),
        priority_mode: PriorityMode::from_str(&priority_str).unwrap_or_default(),
        must_terms: serde_json::from_str(&must_json).unwrap_or_default(),
        negative_terms: serde_json::from_str(&negative_json).unwrap_or_default(),
        blocked_sources: serde_json::from_str(&blocked_json).unwrap_or_default(),
        status: GoalStatus::from_str(&status_str).unwrap_or_default(),
        created_at: row.get(9).unwrap_or_default(),
    }
}

#[async_trait]
impl GoalStore for SqliteGoalStore {
    async fn get_active(&self) -> Result<Vec<Goal>, TidingsError> {
        self.db
            .connection()
            .call(move |conn| {
                let sql =
                    format!("SELECT {GOAL_COLUMNS} FROM goals WHERE status = 'active' ORDER BY id");
                let mut stmt = conn.prepare(&sql)?;
                let goals = stmt
                    .query_map([], |row| Ok(row_to_goal(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(goals)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Goal>, TidingsError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                let goal = stmt
                    .query_row(params![id], |row| Ok(row_to_goal(row)))
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                Ok(goal)
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Read-only item store over the `content_items` table.
#[derive(Clone)]
pub struct SqliteItemStore {
    db: Database,
}

impl SqliteItemStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_item(row: &rusqlite::Row) -> ContentItem {
    let embedding_blob: Option<Vec<u8>> = row.get(6).unwrap_or(None);
    ContentItem {
        id: row.get(0).unwrap_or_default(),
        source_id: row.get(1).unwrap_or_default(),
        title: row.get(2).unwrap_or_default(),
        snippet: row.get(3).unwrap_or_default(),
        summary: row.get(4).unwrap_or_default(),
        url: row.get(5).unwrap_or(None),
        embedding: embedding_blob.map(|blob| blob_to_vec(&blob)),
        published_at: row.get(7).unwrap_or_default(),
        ingested_at: row.get(8).unwrap_or_default(),
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>, TidingsError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source_id, title, snippet, summary, url, embedding, published_at, ingested_at
                     FROM content_items WHERE id = ?1",
                )?;
                let item = stmt
                    .query_row(params![id], |row| Ok(row_to_item(row)))
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                Ok(item)
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Read-only feedback store over the `feedback` table.
#[derive(Clone)]
pub struct SqliteFeedbackStore {
    db: Database,
}

impl SqliteFeedbackStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn list_by_goal(&self, goal_id: &str) -> Result<Vec<FeedbackEntry>, TidingsError> {
        let goal_id = goal_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, goal_id, item_id, source_id, kind, created_at
                     FROM feedback WHERE goal_id = ?1 ORDER BY created_at ASC",
                )?;
                let entries = stmt
                    .query_map(params![goal_id], |row| {
                        let kind_str: String = row.get(4)?;
                        Ok(FeedbackEntry {
                            id: row.get(0)?,
                            goal_id: row.get(1)?,
                            item_id: row.get(2)?,
                            source_id: row.get(3)?,
                            kind: FeedbackKind::from_str(&kind_str)
                                .unwrap_or(FeedbackKind::Like),
                            created_at: row.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(map_tr_err)
    }
}
