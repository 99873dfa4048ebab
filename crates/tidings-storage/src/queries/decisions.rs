// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push decision operations.
//!
//! Creation is idempotent by construction: `INSERT OR IGNORE` on the unique
//! dedupe key. Concurrent emissions for the same (goal, item, bucket)
//! converge to exactly one stored row, and callers treat "already exists"
//! as success. Status updates are monotone and enforced in SQL.

use rusqlite::params;
use std::str::FromStr;
use tidings_core::types::{DecisionKind, DeliveryStatus, PushDecision};
use tidings_core::TidingsError;

use crate::database::{map_tr_err, Database};

/// Insert a decision if no row with its dedupe key exists.
///
/// Returns `true` when a new row was created, `false` for the duplicate
/// no-op. Both are success.
pub async fn insert_if_absent(
    db: &Database,
    decision: &PushDecision,
) -> Result<bool, TidingsError> {
    let id = decision.id.clone();
    let goal_id = decision.goal_id.clone();
    let item_id = decision.item_id.clone();
    let kind = decision.decision.to_string();
    let status = decision.status.to_string();
    let channel = decision.channel.clone();
    let reason_json = serde_json::to_string(&decision.reason)
        .map_err(|e| TidingsError::Internal(format!("serialize reason: {e}")))?;
    let dedupe_key = decision.dedupe_key.clone();
    let decided_at = decision.decided_at.clone();
    let sent_at = decision.sent_at.clone();

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO push_decisions
                 (id, goal_id, item_id, decision, status, channel, reason_json, dedupe_key, decided_at, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id, goal_id, item_id, kind, status, channel, reason_json, dedupe_key,
                    decided_at, sent_at
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a decision by its dedupe key.
pub async fn get_by_dedupe_key(
    db: &Database,
    dedupe_key: &str,
) -> Result<Option<PushDecision>, TidingsError> {
    let dedupe_key = dedupe_key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, goal_id, item_id, decision, status, channel, reason_json, dedupe_key, decided_at, sent_at
                 FROM push_decisions WHERE dedupe_key = ?1",
            )?;
            let decision = stmt
                .query_row(params![dedupe_key], |row| Ok(row_to_decision(row)))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(decision)
        })
        .await
        .map_err(map_tr_err)
}

/// Decisions for a goal in a given status, oldest first.
pub async fn list_by_status(
    db: &Database,
    goal_id: &str,
    status: DeliveryStatus,
) -> Result<Vec<PushDecision>, TidingsError> {
    let goal_id = goal_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, goal_id, item_id, decision, status, channel, reason_json, dedupe_key, decided_at, sent_at
                 FROM push_decisions WHERE goal_id = ?1 AND status = ?2
                 ORDER BY decided_at ASC",
            )?;
            let decisions = stmt
                .query_map(params![goal_id, status], |row| Ok(row_to_decision(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(decisions)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a monotone status transition to the decision with `dedupe_key`.
///
/// The rank guard is evaluated inside SQL so racing updaters cannot move a
/// decision backward (e.g. Read -> Sent). Returns `true` when the
/// transition was applied, `false` when it was rejected or the key is
/// unknown.
pub async fn update_status(
    db: &Database,
    dedupe_key: &str,
    status: DeliveryStatus,
    sent_at: Option<String>,
) -> Result<bool, TidingsError> {
    let dedupe_key = dedupe_key.to_string();
    let new_status = status.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE push_decisions
                 SET status = ?2, sent_at = COALESCE(?3, sent_at)
                 WHERE dedupe_key = ?1
                   AND (CASE status
                            WHEN 'pending' THEN 0
                            WHEN 'read' THEN 2
                            ELSE 1
                        END)
                     < (CASE ?2
                            WHEN 'pending' THEN 0
                            WHEN 'read' THEN 2
                            ELSE 1
                        END)",
                params![dedupe_key, new_status, sent_at],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Convert a rusqlite Row to a PushDecision.
fn row_to_decision(row: &rusqlite::Row) -> PushDecision {
    let kind_str: String = row.get(3).unwrap_or_default();
    let status_str: String = row.get(4).unwrap_or_default();
    let reason_json: String = row.get(6).unwrap_or_default();
    PushDecision {
        id: row.get(0).unwrap_or_default(),
        goal_id: row.get(1).unwrap_or_default(),
        item_id: row.get(2).unwrap_or_default(),
        decision: DecisionKind::from_str(&kind_str).unwrap_or(DecisionKind::Ignore),
        status: DeliveryStatus::from_str(&status_str).unwrap_or(DeliveryStatus::Pending),
        channel: row.get(5).unwrap_or_default(),
        reason: serde_json::from_str(&reason_json).unwrap_or_default(),
        dedupe_key: row.get(7).unwrap_or_default(),
        decided_at: row.get(8).unwrap_or_default(),
        sent_at: row.get(9).unwrap_or(None),
    }
}
