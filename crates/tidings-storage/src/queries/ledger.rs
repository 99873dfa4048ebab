// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit rows linked to a run: tool calls and the action ledger.
//!
//! Rows here are never updated or deleted.

use rusqlite::params;
use tidings_core::types::{ActionProposal, ToolCallRecord};
use tidings_core::TidingsError;

use crate::database::{map_tr_err, Database};

/// Append one tool call record.
pub async fn insert_tool_call(db: &Database, record: &ToolCallRecord) -> Result<(), TidingsError> {
    let id = record.id.clone();
    let run_id = record.run_id.clone();
    let tool = record.tool.clone();
    let request_json = record.request.to_string();
    let response_json = record.response.to_string();
    let created_at = record.created_at.clone();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tool_calls (id, run_id, tool, request_json, response_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, run_id, tool, request_json, response_json, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All tool calls for a run, oldest first.
pub async fn list_tool_calls(
    db: &Database,
    run_id: &str,
) -> Result<Vec<ToolCallRecord>, TidingsError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, run_id, tool, request_json, response_json, created_at
                 FROM tool_calls WHERE run_id = ?1 ORDER BY created_at ASC, id ASC",
            )?;
            let records = stmt
                .query_map(params![run_id], |row| {
                    let request_json: String = row.get(3)?;
                    let response_json: String = row.get(4)?;
                    Ok(ToolCallRecord {
                        id: row.get(0)?,
                        run_id: row.get(1)?,
                        tool: row.get(2)?,
                        request: serde_json::from_str(&request_json)
                            .unwrap_or(serde_json::Value::Null),
                        response: serde_json::from_str(&response_json)
                            .unwrap_or(serde_json::Value::Null),
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Append the run's action proposals to the ledger, one row each.
pub async fn insert_actions(
    db: &Database,
    run_id: &str,
    actions: &[ActionProposal],
) -> Result<(), TidingsError> {
    if actions.is_empty() {
        return Ok(());
    }
    let run_id = run_id.to_string();
    let rows: Vec<(String, String, String)> = actions
        .iter()
        .map(|action| {
            let action_json = serde_json::to_string(action)
                .map_err(|e| TidingsError::Internal(format!("serialize action: {e}")))?;
            Ok((
                uuid::Uuid::new_v4().to_string(),
                action_json,
                chrono::Utc::now()
                    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                    .to_string(),
            ))
        })
        .collect::<Result<Vec<_>, TidingsError>>()?;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for (id, action_json, created_at) in &rows {
                tx.execute(
                    "INSERT INTO action_ledger (id, run_id, action_json, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, run_id, action_json, created_at],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All ledger actions for a run, oldest first.
pub async fn list_actions(
    db: &Database,
    run_id: &str,
) -> Result<Vec<ActionProposal>, TidingsError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT action_json FROM action_ledger WHERE run_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let actions = stmt
                .query_map(params![run_id], |row| {
                    let action_json: String = row.get(0)?;
                    Ok(serde_json::from_str::<ActionProposal>(&action_json))
                })?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect();
            Ok(actions)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tidings_core::types::DecisionKind;

    #[tokio::test]
    async fn tool_calls_round_trip_in_order() {
        let db = Database::open_in_memory().await.unwrap();
        for (n, ts) in [("first", "2026-08-01T10:00:00.000Z"), ("second", "2026-08-01T10:00:01.000Z")] {
            insert_tool_call(
                &db,
                &ToolCallRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    run_id: "r1".to_string(),
                    tool: "boundary_judge".to_string(),
                    request: json!({"call": n}),
                    response: json!({"label": "later"}),
                    created_at: ts.to_string(),
                },
            )
            .await
            .unwrap();
        }

        let calls = list_tool_calls(&db, "r1").await.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].request["call"], "first");
        assert_eq!(calls[1].request["call"], "second");
    }

    #[tokio::test]
    async fn actions_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let actions = vec![
            ActionProposal {
                kind: DecisionKind::Immediate,
                goal_id: "g1".to_string(),
                item_id: "i1".to_string(),
                dedupe_key: "k1".to_string(),
                channel: "email".to_string(),
                summary: "push now".to_string(),
            },
            ActionProposal {
                kind: DecisionKind::Batch,
                goal_id: "g1".to_string(),
                item_id: "i2".to_string(),
                dedupe_key: "k2".to_string(),
                channel: "email".to_string(),
                summary: "batch".to_string(),
            },
        ];
        insert_actions(&db, "r1", &actions).await.unwrap();

        let stored = list_actions(&db, "r1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].dedupe_key, "k1");
        assert_eq!(stored[1].kind, DecisionKind::Batch);
    }

    #[tokio::test]
    async fn empty_action_list_is_noop() {
        let db = Database::open_in_memory().await.unwrap();
        insert_actions(&db, "r1", &[]).await.unwrap();
        assert!(list_actions(&db, "r1").await.unwrap().is_empty());
    }
}
