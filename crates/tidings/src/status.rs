// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status reporting: today's budget row and recent runs.

use chrono::Utc;
use colored::Colorize;
use tidings_config::model::TidingsConfig;
use tidings_core::TidingsError;
use tidings_core::types::RunStatus;
use tidings_storage::Database;
use tidings_storage::queries::{budget, runs};

/// Print today's budget state and the most recent runs.
pub async fn run(config: TidingsConfig) -> Result<(), TidingsError> {
    let db = Database::open(&config.storage.database_path).await?;
    let today = Utc::now().format("%Y-%m-%d").to_string();

    println!("{}", format!("budget for {today}").bold());
    match budget::get_day(&db, &today).await? {
        Some(day) => {
            println!(
                "  embedding: {} tokens{}",
                day.embedding_tokens,
                if day.embedding_disabled {
                    "  [disabled]".red().to_string()
                } else {
                    String::new()
                }
            );
            println!(
                "  judge:     {} tokens{}",
                day.judge_tokens,
                if day.judge_disabled {
                    "  [disabled]".red().to_string()
                } else {
                    String::new()
                }
            );
            println!(
                "  est. cost: ${:.4} of ${:.2} cap",
                day.usd_est, config.budget.daily_cap_usd
            );
        }
        None => println!("  no usage recorded yet"),
    }

    println!();
    println!("{}", "recent runs".bold());
    let recent = runs::list_recent(&db, 15).await?;
    if recent.is_empty() {
        println!("  none");
    }
    for run in recent {
        let status = match run.status {
            RunStatus::Success => run.status.to_string().green(),
            RunStatus::Running => run.status.to_string().cyan(),
            RunStatus::Fallback => run.status.to_string().yellow(),
            RunStatus::Timeout | RunStatus::Error => run.status.to_string().red(),
        };
        println!(
            "  {}  {:<12} {:<10} goal={} actions={} {}ms{}",
            run.created_at,
            run.trigger.to_string(),
            status,
            run.goal_id,
            run.final_actions.len(),
            run.latency_ms,
            run.error_message
                .map(|m| format!("  error: {m}"))
                .unwrap_or_default()
        );
    }

    db.close().await?;
    Ok(())
}

/// Operator reset of today's sticky budget flags.
pub async fn reset_budget(config: TidingsConfig) -> Result<(), TidingsError> {
    let db = Database::open(&config.storage.database_path).await?;
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let governor = tidings_budget::BudgetGovernor::new(db.clone(), config.budget.clone());
    governor.reset_flags(&today).await?;
    println!("budget disable flags cleared for {today}");
    db.close().await?;
    Ok(())
}
