// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run orchestration: one auditable run record per pipeline invocation.
//!
//! A run record is created in the Running state before the pipeline
//! executes. Pipeline completion applies the single terminal update
//! (Success, or Fallback when a fail-closed path was taken). An escaped
//! pipeline error becomes exactly one Error-status record with the message
//! and latency -- the only place an unhandled failure surfaces, never
//! retried here.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tidings_budget::QuotaGate;
use tidings_config::model::TidingsConfig;
use tidings_core::types::{
    ActionProposal, DecisionKind, DecisionReason, MatchRecord, RunRecord, RunStatus,
    ToolCallRecord, TriggerKind,
};
use tidings_core::{
    FeedbackStore, GoalStore, ItemStore, JudgeEndpoint, KeyValueStore, TidingsError,
};
use tidings_pipeline::{CoalesceBuffer, Pipeline, PipelineInput, PipelineState, emit_push_decision};
use tidings_relevance::{GoalEmbeddingCache, RelevanceEngine};
use tidings_storage::Database;
use tidings_storage::queries::{ledger, matches, runs};
use tracing::{error, info};

/// Timestamp format shared by all persisted records.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Collaborators the orchestrator is constructed from, once per process.
pub struct Collaborators {
    pub goals: Arc<dyn GoalStore>,
    pub items: Arc<dyn ItemStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub embedder: Arc<dyn tidings_core::EmbeddingSource>,
    pub judge: Arc<dyn JudgeEndpoint>,
    pub budget: Arc<dyn QuotaGate>,
    pub kv: Arc<dyn KeyValueStore>,
    pub db: Database,
}

/// The run orchestrator: exposed entry points for all trigger kinds.
pub struct Orchestrator {
    goals: Arc<dyn GoalStore>,
    items: Arc<dyn ItemStore>,
    feedback: Arc<dyn FeedbackStore>,
    budget: Arc<dyn QuotaGate>,
    pub(crate) kv: Arc<dyn KeyValueStore>,
    pub(crate) db: Database,
    engine: RelevanceEngine,
    pipeline: Pipeline,
    pub(crate) config: TidingsConfig,
}

impl Orchestrator {
    pub fn new(deps: Collaborators, config: TidingsConfig) -> Self {
        let engine = RelevanceEngine::new(
            deps.embedder.clone(),
            deps.budget.clone(),
            GoalEmbeddingCache::new(deps.kv.clone(), config.scoring.goal_embedding_ttl_hours),
            config.scoring.clone(),
        );
        let pipeline = Pipeline::new(
            deps.goals.clone(),
            deps.items.clone(),
            deps.budget.clone(),
            deps.judge.clone(),
            CoalesceBuffer::new(deps.kv.clone(), config.coalesce.clone()),
            deps.db.clone(),
            config.pipeline.clone(),
        );
        Self {
            goals: deps.goals,
            items: deps.items,
            feedback: deps.feedback,
            budget: deps.budget,
            kv: deps.kv,
            db: deps.db,
            engine,
            pipeline,
            config,
        }
    }

    pub(crate) fn goals(&self) -> &Arc<dyn GoalStore> {
        &self.goals
    }

    pub(crate) fn items(&self) -> &Arc<dyn ItemStore> {
        &self.items
    }

    /// All goals currently active, for the periodic trigger loop.
    pub async fn active_goals(&self) -> Result<Vec<tidings_core::types::Goal>, TidingsError> {
        self.goals.get_active().await
    }

    /// Score an item against a goal and upsert the match record.
    pub async fn compute_match(
        &self,
        goal_id: &str,
        item_id: &str,
    ) -> Result<MatchRecord, TidingsError> {
        let goal = self
            .goals
            .get_by_id(goal_id)
            .await?
            .ok_or_else(|| TidingsError::NotFound {
                kind: "goal".to_string(),
                id: goal_id.to_string(),
            })?;
        let item = self
            .items
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| TidingsError::NotFound {
                kind: "item".to_string(),
                id: item_id.to_string(),
            })?;
        let history = self.feedback.list_by_goal(goal_id).await?;
        let result = self.engine.score(&item, &goal, &history).await?;

        let record = MatchRecord {
            goal_id: goal_id.to_string(),
            item_id: item_id.to_string(),
            score: result.score,
            features: result.features,
            reasons: result.reasons,
            computed_at: format_ts(Utc::now()),
        };
        matches::upsert_match(&self.db, &record).await?;
        Ok(record)
    }

    /// New-match trigger: run the full pipeline for a freshly computed score.
    pub async fn run_immediate(
        &self,
        goal_id: &str,
        item_id: &str,
        score: f64,
        features: std::collections::BTreeMap<String, f64>,
        reasons: tidings_core::types::MatchReasons,
    ) -> Result<RunRecord, TidingsError> {
        let input = PipelineInput {
            goal_id: goal_id.to_string(),
            item_id: item_id.to_string(),
            score,
            features,
            reasons,
            now: Utc::now(),
        };
        let run_id = uuid::Uuid::new_v4().to_string();
        let input_snapshot =
            serde_json::to_value(&input).map_err(|e| TidingsError::Internal(e.to_string()))?;
        self.start_run(&run_id, TriggerKind::NewMatch, goal_id, input_snapshot)
            .await?;

        let started = Instant::now();
        let timeout = std::time::Duration::from_secs(self.config.runner.run_timeout_secs);
        match tokio::time::timeout(timeout, self.pipeline.run(input)).await {
            Ok(Ok(state)) => self.finish_pipeline_run(&run_id, state, started).await,
            Ok(Err(e)) => self.fail_run(&run_id, e, started).await,
            Err(_) => self.timeout_run(&run_id, timeout, started).await,
        }
    }

    /// Batch-window trigger: reduced pipeline over stored match scores.
    pub async fn run_batch_window(
        &self,
        goal_id: &str,
        window_time: DateTime<Utc>,
    ) -> Result<RunRecord, TidingsError> {
        let since = window_time
            - ChronoDuration::minutes(self.config.runner.batch_window_minutes as i64);
        let min_score = self.config.runner.batch_min_score;
        self.run_reduced(
            goal_id,
            TriggerKind::BatchWindow,
            DecisionKind::Batch,
            since,
            min_score,
        )
        .await
    }

    /// Daily digest trigger: reduced pipeline over the last day of matches.
    pub async fn run_digest(&self, goal_id: &str) -> Result<RunRecord, TidingsError> {
        let since = Utc::now() - ChronoDuration::hours(24);
        let min_score = self.config.runner.digest_min_score;
        self.run_reduced(
            goal_id,
            TriggerKind::Digest,
            DecisionKind::Digest,
            since,
            min_score,
        )
        .await
    }

    /// The reduced pipeline shared by batch and digest: query stored match
    /// scores above a threshold, then dedupe + emit per match. Relevance is
    /// never recomputed here.
    async fn run_reduced(
        &self,
        goal_id: &str,
        trigger: TriggerKind,
        kind: DecisionKind,
        since: DateTime<Utc>,
        min_score: f64,
    ) -> Result<RunRecord, TidingsError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let input_snapshot = serde_json::json!({
            "goal_id": goal_id,
            "since": format_ts(since),
            "min_score": min_score,
            "kind": kind,
        });
        self.start_run(&run_id, trigger, goal_id, input_snapshot)
            .await?;

        let started = Instant::now();
        match self
            .reduced_proposals(goal_id, kind, &format_ts(since), min_score)
            .await
        {
            Ok(actions) => {
                ledger::insert_actions(&self.db, &run_id, &actions).await?;
                let completion = runs::RunCompletion {
                    output_snapshot: Some(serde_json::json!({ "action_count": actions.len() })),
                    final_actions: serde_json::to_value(&actions)
                        .map_err(|e| TidingsError::Internal(e.to_string()))?,
                    budget_snapshot: serde_json::to_value(self.budget.snapshot().await?).ok(),
                    llm_used: false,
                    latency_ms: started.elapsed().as_millis() as i64,
                    error_message: None,
                };
                runs::finish_run(&self.db, &run_id, RunStatus::Success, completion).await?;
                info!(run_id, goal_id, %trigger, count = actions.len(), "reduced run complete");
                self.fetch_run(&run_id).await
            }
            Err(e) => self.fail_run(&run_id, e, started).await,
        }
    }

    /// Emit one idempotent decision per qualifying stored match. Exposed to
    /// the replay module so a replayed reduced run takes the same path.
    pub(crate) async fn reduced_proposals(
        &self,
        goal_id: &str,
        kind: DecisionKind,
        since: &str,
        min_score: f64,
    ) -> Result<Vec<ActionProposal>, TidingsError> {
        // The goal must still exist; a vanished goal is fatal to this run.
        self.goals
            .get_by_id(goal_id)
            .await?
            .ok_or_else(|| TidingsError::NotFound {
                kind: "goal".to_string(),
                id: goal_id.to_string(),
            })?;

        let records = matches::list_above_score(&self.db, goal_id, since, min_score).await?;
        let decided_at = format_ts(Utc::now());
        let mut actions = Vec::with_capacity(records.len());
        for record in records {
            let reason = DecisionReason {
                summary: record.reasons.summary.clone(),
                evidence: record.reasons.evidence.clone(),
                ..Default::default()
            };
            let (proposal, _created) = emit_push_decision(
                &self.db,
                goal_id,
                &record.item_id,
                kind,
                &self.config.pipeline.channel,
                reason,
                &decided_at,
            )
            .await?;
            actions.push(proposal);
        }
        Ok(actions)
    }

    async fn start_run(
        &self,
        run_id: &str,
        trigger: TriggerKind,
        goal_id: &str,
        input_snapshot: serde_json::Value,
    ) -> Result<(), TidingsError> {
        let run = RunRecord {
            id: run_id.to_string(),
            trigger,
            goal_id: goal_id.to_string(),
            status: RunStatus::Running,
            input_snapshot,
            output_snapshot: None,
            final_actions: vec![],
            budget_snapshot: None,
            llm_used: false,
            latency_ms: 0,
            error_message: None,
            created_at: format_ts(Utc::now()),
        };
        runs::insert_running(&self.db, &run).await
    }

    /// Persist the pipeline's audit rows and apply the terminal update.
    async fn finish_pipeline_run(
        &self,
        run_id: &str,
        state: PipelineState,
        started: Instant,
    ) -> Result<RunRecord, TidingsError> {
        for draft in &state.tool_calls {
            let record = ToolCallRecord {
                id: uuid::Uuid::new_v4().to_string(),
                run_id: run_id.to_string(),
                tool: draft.tool.clone(),
                request: draft.request.clone(),
                response: draft.response.clone(),
                created_at: format_ts(Utc::now()),
            };
            ledger::insert_tool_call(&self.db, &record).await?;
        }
        ledger::insert_actions(&self.db, run_id, &state.actions).await?;

        // A fail-closed path inside the pipeline is a Fallback run, not an
        // error: the decision is still valid, the degradation is recorded.
        let status = if state.draft.fallback.is_some() {
            RunStatus::Fallback
        } else {
            RunStatus::Success
        };
        let completion = runs::RunCompletion {
            output_snapshot: Some(state.output_snapshot()),
            final_actions: serde_json::to_value(&state.actions)
                .map_err(|e| TidingsError::Internal(e.to_string()))?,
            budget_snapshot: state
                .budget_snapshot
                .as_ref()
                .and_then(|day| serde_json::to_value(day).ok()),
            llm_used: state.llm_used,
            latency_ms: started.elapsed().as_millis() as i64,
            error_message: None,
        };
        runs::finish_run(&self.db, run_id, status, completion).await?;
        info!(run_id, %status, actions = state.actions.len(), "run complete");
        self.fetch_run(run_id).await
    }

    /// The only path that surfaces an unhandled pipeline failure: one
    /// Error-status record, never retried automatically.
    async fn fail_run(
        &self,
        run_id: &str,
        err: TidingsError,
        started: Instant,
    ) -> Result<RunRecord, TidingsError> {
        error!(run_id, error = %err, "pipeline run failed");
        let completion = runs::RunCompletion {
            output_snapshot: None,
            final_actions: serde_json::json!([]),
            budget_snapshot: None,
            llm_used: false,
            latency_ms: started.elapsed().as_millis() as i64,
            error_message: Some(err.to_string()),
        };
        runs::finish_run(&self.db, run_id, RunStatus::Error, completion).await?;
        self.fetch_run(run_id).await
    }

    /// A run that exceeded its wall-clock bound: the pipeline future is
    /// dropped at its next stage boundary and the record is closed as
    /// Timeout.
    async fn timeout_run(
        &self,
        run_id: &str,
        timeout: std::time::Duration,
        started: Instant,
    ) -> Result<RunRecord, TidingsError> {
        error!(run_id, ?timeout, "pipeline run timed out");
        let completion = runs::RunCompletion {
            output_snapshot: None,
            final_actions: serde_json::json!([]),
            budget_snapshot: None,
            llm_used: false,
            latency_ms: started.elapsed().as_millis() as i64,
            error_message: Some(format!("pipeline run exceeded {timeout:?}")),
        };
        runs::finish_run(&self.db, run_id, RunStatus::Timeout, completion).await?;
        self.fetch_run(run_id).await
    }

    pub(crate) async fn fetch_run(&self, run_id: &str) -> Result<RunRecord, TidingsError> {
        runs::get_run(&self.db, run_id)
            .await?
            .ok_or_else(|| TidingsError::NotFound {
                kind: "run".to_string(),
                id: run_id.to_string(),
            })
    }
}
