// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Match record operations. One row per (goal, item); recomputes upsert.

use rusqlite::params;
use tidings_core::types::MatchRecord;
use tidings_core::TidingsError;

use crate::database::{map_tr_err, Database};

/// Insert or update the match record for (goal_id, item_id).
pub async fn upsert_match(db: &Database, record: &MatchRecord) -> Result<(), TidingsError> {
    let goal_id = record.goal_id.clone();
    let item_id = record.item_id.clone();
    let score = record.score;
    let features_json = serde_json::to_string(&record.features)
        .map_err(|e| TidingsError::Internal(format!("serialize features: {e}")))?;
    let reasons_json = serde_json::to_string(&record.reasons)
        .map_err(|e| TidingsError::Internal(format!("serialize reasons: {e}")))?;
    let computed_at = record.computed_at.clone();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO match_records (goal_id, item_id, score, features_json, reasons_json, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (goal_id, item_id) DO UPDATE SET
                     score = excluded.score,
                     features_json = excluded.features_json,
                     reasons_json = excluded.reasons_json,
                     computed_at = excluded.computed_at",
                params![goal_id, item_id, score, features_json, reasons_json, computed_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one match record.
pub async fn get_match(
    db: &Database,
    goal_id: &str,
    item_id: &str,
) -> Result<Option<MatchRecord>, TidingsError> {
    let goal_id = goal_id.to_string();
    let item_id = item_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT goal_id, item_id, score, features_json, reasons_json, computed_at
                 FROM match_records WHERE goal_id = ?1 AND item_id = ?2",
            )?;
            let record = stmt
                .query_row(params![goal_id, item_id], |row| Ok(row_to_match(row)))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

/// Match records for a goal computed at or after `since` with score at or
/// above `min_score`, best first. Feeds the batch-window and digest triggers.
pub async fn list_above_score(
    db: &Database,
    goal_id: &str,
    since: &str,
    min_score: f64,
) -> Result<Vec<MatchRecord>, TidingsError> {
    let goal_id = goal_id.to_string();
    let since = since.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT goal_id, item_id, score, features_json, reasons_json, computed_at
                 FROM match_records
                 WHERE goal_id = ?1 AND computed_at >= ?2 AND score >= ?3
                 ORDER BY score DESC, computed_at DESC",
            )?;
            let records = stmt
                .query_map(params![goal_id, since, min_score], |row| {
                    Ok(row_to_match(row))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Convert a rusqlite Row to a MatchRecord.
fn row_to_match(row: &rusqlite::Row) -> MatchRecord {
    let features_json: String = row.get(3).unwrap_or_default();
    let reasons_json: String = row.get(4).unwrap_or_default();
    MatchRecord {
        goal_id: row.get(0).unwrap_or_default(),
        item_id: row.get(1).unwrap_or_default(),
        score: row.get(2).unwrap_or(0.0),
        features: serde_json::from_str(&features_json).unwrap_or_default(),
        reasons: serde_json::from_str(&reasons_json).unwrap_or_default(),
        computed_at: row.get(5).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tidings_core::types::MatchReasons;

    fn make_record(goal_id: &str, item_id: &str, score: f64, computed_at: &str) -> MatchRecord {
        let mut features = BTreeMap::new();
        features.insert("semantic".to_string(), 0.7);
        features.insert("keyword".to_string(), 0.65);
        MatchRecord {
            goal_id: goal_id.to_string(),
            item_id: item_id.to_string(),
            score,
            features,
            reasons: MatchReasons {
                summary: "matched".to_string(),
                evidence: vec![],
            },
            computed_at: computed_at.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let db = Database::open_in_memory().await.unwrap();
        let record = make_record("g1", "i1", 0.8, "2026-08-01T10:00:00.000Z");
        upsert_match(&db, &record).await.unwrap();

        let fetched = get_match(&db, "g1", "i1").await.unwrap().unwrap();
        assert!((fetched.score - 0.8).abs() < f64::EPSILON);
        assert_eq!(fetched.features.get("semantic"), Some(&0.7));
        assert_eq!(fetched.reasons.summary, "matched");
    }

    #[tokio::test]
    async fn recompute_replaces_not_duplicates() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_match(&db, &make_record("g1", "i1", 0.5, "2026-08-01T10:00:00.000Z"))
            .await
            .unwrap();
        upsert_match(&db, &make_record("g1", "i1", 0.9, "2026-08-01T11:00:00.000Z"))
            .await
            .unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| {
                conn.query_row("SELECT count(*) FROM match_records", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let fetched = get_match(&db, "g1", "i1").await.unwrap().unwrap();
        assert!((fetched.score - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn list_above_score_filters_and_orders() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_match(&db, &make_record("g1", "i1", 0.95, "2026-08-01T10:00:00.000Z"))
            .await
            .unwrap();
        upsert_match(&db, &make_record("g1", "i2", 0.80, "2026-08-01T11:00:00.000Z"))
            .await
            .unwrap();
        upsert_match(&db, &make_record("g1", "i3", 0.40, "2026-08-01T11:30:00.000Z"))
            .await
            .unwrap();
        // Old record outside the window.
        upsert_match(&db, &make_record("g1", "i4", 0.99, "2026-07-01T00:00:00.000Z"))
            .await
            .unwrap();
        // Other goal.
        upsert_match(&db, &make_record("g2", "i1", 0.99, "2026-08-01T10:00:00.000Z"))
            .await
            .unwrap();

        let records = list_above_score(&db, "g1", "2026-08-01T00:00:00.000Z", 0.75)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].item_id, "i1");
        assert_eq!(records[1].item_id, "i2");
    }

    #[tokio::test]
    async fn get_match_missing_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_match(&db, "g1", "nope").await.unwrap().is_none());
    }
}
