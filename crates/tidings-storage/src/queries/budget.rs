// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget counter operations.
//!
//! One row per UTC date, created lazily with `INSERT OR IGNORE`. Counter
//! updates are atomic SQL increments (`SET x = x + ?`) rather than
//! read-modify-write, because concurrent pipeline runs race on the same
//! date key. Disable flags only ever move from 0 to 1 within a day;
//! clearing them requires the explicit reset operation.

use rusqlite::params;
use tidings_core::types::{BudgetDay, QuotaKind};
use tidings_core::TidingsError;

use crate::database::{map_tr_err, Database};

/// Create the budget row for `date` if it does not exist yet.
pub async fn ensure_day(db: &Database, date: &str) -> Result<(), TidingsError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO budget_daily (date) VALUES (?1)",
                params![date],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the budget row for `date`, if present.
pub async fn get_day(db: &Database, date: &str) -> Result<Option<BudgetDay>, TidingsError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date, embedding_tokens, judge_tokens, usd_est, embedding_disabled, judge_disabled
                 FROM budget_daily WHERE date = ?1",
            )?;
            let day = stmt
                .query_row(params![date], |row| {
                    Ok(BudgetDay {
                        date: row.get(0)?,
                        embedding_tokens: row.get(1)?,
                        judge_tokens: row.get(2)?,
                        usd_est: row.get(3)?,
                        embedding_disabled: row.get::<_, i64>(4)? != 0,
                        judge_disabled: row.get::<_, i64>(5)? != 0,
                    })
                })
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(day)
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically add token usage and estimated cost for one quota kind.
pub async fn add_usage(
    db: &Database,
    date: &str,
    kind: QuotaKind,
    tokens: i64,
    usd: f64,
) -> Result<(), TidingsError> {
    ensure_day(db, date).await?;
    let date = date.to_string();
    let column = match kind {
        QuotaKind::Embedding => "embedding_tokens",
        QuotaKind::Judge => "judge_tokens",
    };
    let sql = format!(
        "UPDATE budget_daily SET {column} = {column} + ?2, usd_est = usd_est + ?3 WHERE date = ?1"
    );
    db.connection()
        .call(move |conn| {
            conn.execute(&sql, params![date, tokens, usd])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set the sticky disable flag for one quota kind. Never clears it.
pub async fn set_disabled(db: &Database, date: &str, kind: QuotaKind) -> Result<(), TidingsError> {
    ensure_day(db, date).await?;
    let date = date.to_string();
    let column = match kind {
        QuotaKind::Embedding => "embedding_disabled",
        QuotaKind::Judge => "judge_disabled",
    };
    let sql = format!("UPDATE budget_daily SET {column} = 1 WHERE date = ?1");
    db.connection()
        .call(move |conn| {
            conn.execute(&sql, params![date])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Operator reset: clear both disable flags for `date`.
///
/// The only way flags are cleared within a day; usage recording never does.
pub async fn reset_flags(db: &Database, date: &str) -> Result<(), TidingsError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE budget_daily SET embedding_disabled = 0, judge_disabled = 0 WHERE date = ?1",
                params![date],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
