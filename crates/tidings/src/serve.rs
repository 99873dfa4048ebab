// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serve loop: periodic batch-window and digest triggers over all
//! active goals, plus coalesce bucket flushing.
//!
//! Relevance scoring for new matches is driven by the ingestion
//! collaborator calling into the orchestrator; this loop only owns the
//! time-based triggers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use croner::Cron;
use std::str::FromStr;
use tidings_config::model::TidingsConfig;
use tidings_core::types::JudgeRequest;
use tidings_core::{
    EmbeddingOutput, EmbeddingSource, JudgeEndpoint, JudgeOutcome, TidingsError,
};
use tidings_judge::AnthropicJudge;
use tidings_kv::MemoryKv;
use tidings_pipeline::CoalesceBuffer;
use tidings_runner::{Collaborators, Orchestrator};
use tidings_storage::{Database, SqliteFeedbackStore, SqliteGoalStore, SqliteItemStore};
use tracing::{error, info, warn};

/// Embedding source used when no embedding provider is configured. Every
/// call fails, which the relevance engine resolves to the neutral semantic
/// signal.
struct UnconfiguredEmbedder;

#[async_trait]
impl EmbeddingSource for UnconfiguredEmbedder {
    async fn embed(&self, _text: &str) -> Result<EmbeddingOutput, TidingsError> {
        Err(TidingsError::Provider {
            message: "no embedding provider configured".to_string(),
            source: None,
        })
    }
}

/// Judge used when no API key is configured. Every call fails, which the
/// pipeline resolves to the Batch fallback.
struct UnconfiguredJudge;

#[async_trait]
impl JudgeEndpoint for UnconfiguredJudge {
    async fn classify(&self, _request: &JudgeRequest) -> Result<JudgeOutcome, TidingsError> {
        Err(TidingsError::Provider {
            message: "no Anthropic API key configured".to_string(),
            source: None,
        })
    }
}

fn build_judge(config: &TidingsConfig) -> Result<Arc<dyn JudgeEndpoint>, TidingsError> {
    let api_key = config
        .anthropic
        .api_key
        .clone()
        .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
    match api_key {
        Some(key) => Ok(Arc::new(AnthropicJudge::new(
            &key,
            &config.anthropic.api_version,
            config.anthropic.judge_model.clone(),
            config.anthropic.max_tokens,
        )?)),
        None => {
            warn!("no Anthropic API key; boundary verdicts will fail closed to batch");
            Ok(Arc::new(UnconfiguredJudge))
        }
    }
}

/// Wire the orchestrator from configuration. Shared by serve and replay.
pub async fn build_orchestrator(
    config: TidingsConfig,
) -> Result<(Orchestrator, Arc<MemoryKv>, Database), TidingsError> {
    let db = Database::open(&config.storage.database_path).await?;
    let kv = Arc::new(MemoryKv::new());
    let budget = Arc::new(tidings_budget::BudgetGovernor::new(
        db.clone(),
        config.budget.clone(),
    ));
    let judge = build_judge(&config)?;

    let orchestrator = Orchestrator::new(
        Collaborators {
            goals: Arc::new(SqliteGoalStore::new(db.clone())),
            items: Arc::new(SqliteItemStore::new(db.clone())),
            feedback: Arc::new(SqliteFeedbackStore::new(db.clone())),
            embedder: Arc::new(UnconfiguredEmbedder),
            judge,
            budget,
            kv: kv.clone(),
            db: db.clone(),
        },
        config,
    );
    Ok((orchestrator, kv, db))
}

/// Run the scheduler loop until ctrl-c.
pub async fn run(config: TidingsConfig) -> Result<(), TidingsError> {
    let batch_pattern = format!("*/{} * * * *", config.runner.batch_window_minutes);
    let digest_pattern = format!("0 {} * * *", config.runner.digest_hour_utc);
    let batch_cron = Cron::from_str(&batch_pattern)
        .map_err(|e| TidingsError::Config(format!("batch cron: {e}")))?;
    let digest_cron = Cron::from_str(&digest_pattern)
        .map_err(|e| TidingsError::Config(format!("digest cron: {e}")))?;

    let coalesce_config = config.coalesce.clone();
    let (orchestrator, kv, db) = build_orchestrator(config).await?;
    let coalesce = CoalesceBuffer::new(kv, coalesce_config);
    info!("tidings serve started");

    loop {
        let now = Utc::now();
        let next_batch = batch_cron
            .find_next_occurrence(&now, false)
            .map_err(|e| TidingsError::Internal(format!("batch schedule: {e}")))?;
        let next_digest = digest_cron
            .find_next_occurrence(&now, false)
            .map_err(|e| TidingsError::Internal(format!("digest schedule: {e}")))?;
        let next = next_batch.min(next_digest);
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if next == next_batch {
            batch_tick(&orchestrator, &coalesce).await;
        }
        if next == next_digest {
            digest_tick(&orchestrator).await;
        }
    }

    db.close().await?;
    Ok(())
}

/// One batch-window pass over all active goals, plus coalesce flushing.
async fn batch_tick(orchestrator: &Orchestrator, coalesce: &CoalesceBuffer) {
    let goals = match orchestrator.active_goals().await {
        Ok(goals) => goals,
        Err(e) => {
            error!(error = %e, "could not list active goals");
            return;
        }
    };
    let now = Utc::now();
    for goal in goals {
        match orchestrator.run_batch_window(&goal.id, now).await {
            Ok(run) => info!(
                goal_id = %goal.id,
                run_id = %run.id,
                status = %run.status,
                actions = run.final_actions.len(),
                "batch window complete"
            ),
            Err(e) => error!(goal_id = %goal.id, error = %e, "batch window failed"),
        }

        // Hand rolled-over coalesce buckets to the delivery collaborator.
        match coalesce.pending_buckets(&goal.id).await {
            Ok(buckets) => {
                for bucket_ts in buckets {
                    match coalesce.is_flush_due(&goal.id, bucket_ts, now).await {
                        Ok(true) => match coalesce.flush(&goal.id, bucket_ts).await {
                            Ok(candidates) if !candidates.is_empty() => info!(
                                goal_id = %goal.id,
                                bucket_ts,
                                count = candidates.len(),
                                "coalesce bucket flushed for delivery"
                            ),
                            Ok(_) => {}
                            Err(e) => warn!(goal_id = %goal.id, error = %e, "flush failed"),
                        },
                        Ok(false) => {}
                        Err(e) => warn!(goal_id = %goal.id, error = %e, "flush check failed"),
                    }
                }
            }
            Err(e) => warn!(goal_id = %goal.id, error = %e, "bucket scan failed"),
        }
    }
}

/// One digest pass over all active goals.
async fn digest_tick(orchestrator: &Orchestrator) {
    let goals = match orchestrator.active_goals().await {
        Ok(goals) => goals,
        Err(e) => {
            error!(error = %e, "could not list active goals");
            return;
        }
    };
    for goal in goals {
        match orchestrator.run_digest(&goal.id).await {
            Ok(run) => info!(
                goal_id = %goal.id,
                run_id = %run.id,
                status = %run.status,
                actions = run.final_actions.len(),
                "digest complete"
            ),
            Err(e) => error!(goal_id = %goal.id, error = %e, "digest failed"),
        }
    }
}

/// Replay a persisted run and print the diff.
pub async fn replay(config: TidingsConfig, run_id: &str) -> Result<(), TidingsError> {
    let (orchestrator, _kv, db) = build_orchestrator(config).await?;
    let result = orchestrator.replay(run_id).await?;

    if result.is_clean() {
        println!(
            "replay of {run_id} is clean ({} actions)",
            result.original_actions.len()
        );
    } else {
        println!(
            "replay of {run_id} DIVERGED: {} original vs {} replayed actions",
            result.original_actions.len(),
            result.replayed_actions.len()
        );
        for mismatch in &result.mismatches {
            println!(
                "  index {}: {:?} -> {:?}",
                mismatch.index, mismatch.original, mismatch.replayed
            );
        }
    }
    db.close().await?;
    Ok(())
}
