// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run record operations.
//!
//! A run is inserted in the Running state before the pipeline executes and
//! receives exactly one terminal update. The terminal update's WHERE clause
//! only matches Running rows, so a finished run can never be rewritten.

use rusqlite::params;
use std::str::FromStr;
use tidings_core::types::{RunRecord, RunStatus, TriggerKind};
use tidings_core::TidingsError;

use crate::database::{map_tr_err, Database};

/// Insert a new run record in the Running state.
pub async fn insert_running(db: &Database, run: &RunRecord) -> Result<(), TidingsError> {
    let id = run.id.clone();
    let trigger_kind = run.trigger.to_string();
    let goal_id = run.goal_id.clone();
    let input_snapshot_json = run.input_snapshot.to_string();
    let created_at = run.created_at.clone();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO agent_runs (id, trigger_kind, goal_id, status, input_snapshot_json, created_at)
                 VALUES (?1, ?2, ?3, 'running', ?4, ?5)",
                params![id, trigger_kind, goal_id, input_snapshot_json, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Terminal fields written by [`finish_run`].
#[derive(Debug, Clone, Default)]
pub struct RunCompletion {
    pub output_snapshot: Option<serde_json::Value>,
    pub final_actions: serde_json::Value,
    pub budget_snapshot: Option<serde_json::Value>,
    pub llm_used: bool,
    pub latency_ms: i64,
    pub error_message: Option<String>,
}

/// Apply the single terminal status update to a Running run.
///
/// Returns `false` when the run was not in the Running state (already
/// finished, or unknown id).
pub async fn finish_run(
    db: &Database,
    run_id: &str,
    status: RunStatus,
    completion: RunCompletion,
) -> Result<bool, TidingsError> {
    let run_id = run_id.to_string();
    let status = status.to_string();
    let output_snapshot_json = completion.output_snapshot.map(|v| v.to_string());
    let final_actions_json = completion.final_actions.to_string();
    let budget_snapshot_json = completion.budget_snapshot.map(|v| v.to_string());
    let llm_used = completion.llm_used as i64;
    let latency_ms = completion.latency_ms;
    let error_message = completion.error_message;

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE agent_runs
                 SET status = ?2,
                     output_snapshot_json = ?3,
                     final_actions_json = ?4,
                     budget_snapshot_json = ?5,
                     llm_used = ?6,
                     latency_ms = ?7,
                     error_message = ?8
                 WHERE id = ?1 AND status = 'running'",
                params![
                    run_id,
                    status,
                    output_snapshot_json,
                    final_actions_json,
                    budget_snapshot_json,
                    llm_used,
                    latency_ms,
                    error_message
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one run record by id.
pub async fn get_run(db: &Database, run_id: &str) -> Result<Option<RunRecord>, TidingsError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, trigger_kind, goal_id, status, input_snapshot_json, output_snapshot_json,
                        final_actions_json, budget_snapshot_json, llm_used, latency_ms, error_message, created_at
                 FROM agent_runs WHERE id = ?1",
            )?;
            let run = stmt
                .query_row(params![run_id], |row| Ok(row_to_run(row)))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(run)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent runs, newest first.
pub async fn list_recent(db: &Database, limit: i64) -> Result<Vec<RunRecord>, TidingsError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, trigger_kind, goal_id, status, input_snapshot_json, output_snapshot_json,
                        final_actions_json, budget_snapshot_json, llm_used, latency_ms, error_message, created_at
                 FROM agent_runs ORDER BY created_at DESC LIMIT ?1",
            )?;
            let runs = stmt
                .query_map(params![limit], |row| Ok(row_to_run(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(runs)
        })
        .await
        .map_err(map_tr_err)
}

/// Convert a rusqlite Row to a RunRecord.
fn row_to_run(row: &rusqlite::Row) -> RunRecord {
    let trigger_str: String = row.get(1).unwrap_or_default();
    let status_str: String = row.get(3).unwrap_or_default();
    let input_json: String = row.get(4).unwrap_or_default();
    let output_json: Option<String> = row.get(5).unwrap_or(None);
    let actions_json: String = row.get(6).unwrap_or_default();
    let budget_json: Option<String> = row.get(7).unwrap_or(None);

    RunRecord {
        id: row.get(0).unwrap_or_default(),
        trigger: TriggerKind::from_str(&trigger_str).unwrap_or(TriggerKind::NewMatch),
        goal_id: row.get(2).unwrap_or_default(),
        status: RunStatus::from_str(&status_str).unwrap_or(RunStatus::Error),
        input_snapshot: serde_json::from_str(&input_json).unwrap_or(serde_json::Value::Null),
        output_snapshot: output_json.and_then(|s| serde_json::from_str(&s).ok()),
        final_actions: serde_json::from_str(&actions_json).unwrap_or_default(),
        budget_snapshot: budget_json.and_then(|s| serde_json::from_str(&s).ok()),
        llm_used: row.get::<_, i64>(8).unwrap_or(0) != 0,
        latency_ms: row.get(9).unwrap_or(0),
        error_message: row.get(10).unwrap_or(None),
        created_at: row.get(11).unwrap_or_default(),
    }
}
