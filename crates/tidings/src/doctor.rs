// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health checks for configuration and storage.

use colored::Colorize;
use tidings_config::model::TidingsConfig;
use tidings_core::TidingsError;
use tidings_storage::Database;

fn report(name: &str, ok: bool, detail: &str) {
    let mark = if ok { "ok".green() } else { "FAIL".red() };
    println!("  [{mark}] {name}: {detail}");
}

/// Run all health checks. Exits non-zero via the caller when storage is
/// unreachable.
pub async fn run(config: TidingsConfig) -> Result<(), TidingsError> {
    println!("{}", "tidings doctor".bold());

    // Config already validated by main before we got here.
    report("config", true, "loaded and validated");

    let weights = config.scoring.semantic_weight
        + config.scoring.keyword_weight
        + config.scoring.recency_weight
        + config.scoring.trust_weight;
    report(
        "scoring",
        (weights - 1.0).abs() < 1e-6,
        &format!("signal weights sum to {weights:.2}"),
    );

    let has_key =
        config.anthropic.api_key.is_some() || std::env::var("ANTHROPIC_API_KEY").is_ok();
    report(
        "judge",
        true,
        if has_key {
            "API key configured"
        } else {
            "no API key; boundary verdicts will fail closed to batch"
        },
    );

    match Database::open(&config.storage.database_path).await {
        Ok(db) => {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("SELECT 1;")?;
                    Ok(())
                })
                .await
                .map_err(tidings_storage::database::map_tr_err)?;
            report(
                "storage",
                true,
                &format!("{} (migrations applied)", config.storage.database_path),
            );
            db.close().await?;
        }
        Err(e) => {
            report("storage", false, &e.to_string());
            return Err(e);
        }
    }

    Ok(())
}
