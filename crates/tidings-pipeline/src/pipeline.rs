// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The decision pipeline: an ordered sequence of state transitions from a
//! relevance result to zero or one push decision.
//!
//! Stages run strictly in order over one shared [`PipelineState`]. A stage
//! that blocks or resolves the draft leaves it in a terminal state that
//! later stages check as a guard; nothing here uses errors for flow
//! control. The only errors that escape `run` are fatal-to-this-run
//! conditions (missing goal/item, storage failure) which the orchestrator
//! converts into a single Error-status run record.

use std::sync::Arc;

use tidings_budget::QuotaGate;
use tidings_config::model::PipelineConfig;
use tidings_core::types::{
    DecisionKind, DecisionReason, DeliveryStatus, JudgeLabel, JudgeRequest, PushDecision,
    QuotaKind,
};
use tidings_core::{GoalStore, ItemStore, JudgeEndpoint, TidingsError};
use tidings_relevance::check_blocked;
use tidings_storage::Database;
use tidings_storage::queries::decisions;
use tracing::{debug, info, warn};

use crate::coalesce::CoalesceBuffer;
use crate::dedupe::dedupe_key;
use crate::state::{Bucket, PipelineInput, PipelineState, ToolCallDraft};

/// The pipeline stages, applied in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    LoadContext,
    RuleGate,
    Bucket,
    BoundaryJudge,
    Coalesce,
    EmitActions,
}

const STAGES: [Stage; 6] = [
    Stage::LoadContext,
    Stage::RuleGate,
    Stage::Bucket,
    Stage::BoundaryJudge,
    Stage::Coalesce,
    Stage::EmitActions,
];

/// Map a score to its preliminary bucket via the fixed thresholds.
pub fn bucket_for_score(score: f64, config: &PipelineConfig) -> Bucket {
    if score >= config.immediate_threshold {
        Bucket::Immediate
    } else if score >= config.boundary_threshold {
        Bucket::Boundary
    } else if score >= config.batch_threshold {
        Bucket::Batch
    } else {
        Bucket::Ignore
    }
}

/// Idempotently create a push decision and build its action proposal.
///
/// Shared by the full pipeline's EmitActions stage and the reduced
/// batch/digest path. Returns the proposal plus whether a new row was
/// created (`false` means the dedupe key already existed -- a no-op
/// success, not an error).
pub async fn emit_push_decision(
    db: &Database,
    goal_id: &str,
    item_id: &str,
    kind: DecisionKind,
    channel: &str,
    reason: DecisionReason,
    decided_at: &str,
) -> Result<(tidings_core::types::ActionProposal, bool), TidingsError> {
    let key = dedupe_key(goal_id, item_id, kind);
    let summary = reason.summary.clone();
    let decision = PushDecision {
        id: uuid::Uuid::new_v4().to_string(),
        goal_id: goal_id.to_string(),
        item_id: item_id.to_string(),
        decision: kind,
        status: DeliveryStatus::Pending,
        channel: channel.to_string(),
        reason,
        dedupe_key: key.clone(),
        decided_at: decided_at.to_string(),
        sent_at: None,
    };
    let created = decisions::insert_if_absent(db, &decision).await?;
    if created {
        info!(goal_id, item_id, %kind, dedupe_key = %key, "push decision created");
    } else {
        debug!(goal_id, item_id, dedupe_key = %key, "push decision already exists");
    }
    let proposal = tidings_core::types::ActionProposal {
        kind,
        goal_id: goal_id.to_string(),
        item_id: item_id.to_string(),
        dedupe_key: key,
        channel: channel.to_string(),
        summary,
    };
    Ok((proposal, created))
}

/// The decision pipeline with its collaborators.
pub struct Pipeline {
    goals: Arc<dyn GoalStore>,
    items: Arc<dyn ItemStore>,
    budget: Arc<dyn QuotaGate>,
    judge: Arc<dyn JudgeEndpoint>,
    coalesce: CoalesceBuffer,
    db: Database,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        goals: Arc<dyn GoalStore>,
        items: Arc<dyn ItemStore>,
        budget: Arc<dyn QuotaGate>,
        judge: Arc<dyn JudgeEndpoint>,
        coalesce: CoalesceBuffer,
        db: Database,
        config: PipelineConfig,
    ) -> Self {
        Self {
            goals,
            items,
            budget,
            judge,
            coalesce,
            db,
            config,
        }
    }

    /// Run all stages over a fresh state for `input`.
    pub async fn run(&self, input: PipelineInput) -> Result<PipelineState, TidingsError> {
        let mut state = PipelineState::new(input);
        for stage in STAGES {
            self.apply(stage, &mut state).await?;
        }
        Ok(state)
    }

    async fn apply(&self, stage: Stage, state: &mut PipelineState) -> Result<(), TidingsError> {
        match stage {
            Stage::LoadContext => self.load_context(state).await,
            Stage::RuleGate => self.rule_gate(state),
            Stage::Bucket => self.bucket(state),
            Stage::BoundaryJudge => self.boundary_judge(state).await,
            Stage::Coalesce => self.coalesce(state).await,
            Stage::EmitActions => self.emit_actions(state).await,
        }
    }

    /// Read-only hydration of goal, item, and the budget snapshot.
    async fn load_context(&self, state: &mut PipelineState) -> Result<(), TidingsError> {
        let goal = self
            .goals
            .get_by_id(&state.input.goal_id)
            .await?
            .ok_or_else(|| TidingsError::NotFound {
                kind: "goal".to_string(),
                id: state.input.goal_id.clone(),
            })?;
        let item = self
            .items
            .get_by_id(&state.input.item_id)
            .await?
            .ok_or_else(|| TidingsError::NotFound {
                kind: "item".to_string(),
                id: state.input.item_id.clone(),
            })?;
        state.budget_snapshot = Some(self.budget.snapshot().await?);
        state.goal = Some(goal);
        state.item = Some(item);
        Ok(())
    }

    /// Re-validate the blocking rules against the loaded context. Precedence
    /// (blocked source, negative term, STRICT miss) lives in
    /// [`check_blocked`], shared with the relevance engine.
    fn rule_gate(&self, state: &mut PipelineState) -> Result<(), TidingsError> {
        let (Some(goal), Some(item)) = (&state.goal, &state.item) else {
            return Ok(());
        };
        if let Some(reason) = check_blocked(goal, item) {
            debug!(goal_id = %goal.id, item_id = %item.id, %reason, "rule gate blocked");
            state.draft.blocked = true;
            state.draft.block_reason = Some(reason.to_string());
        }
        Ok(())
    }

    /// Pure threshold mapping. Skipped when already blocked.
    fn bucket(&self, state: &mut PipelineState) -> Result<(), TidingsError> {
        if state.draft.blocked {
            return Ok(());
        }
        state.draft.bucket = Some(bucket_for_score(state.input.score, &self.config));
        Ok(())
    }

    /// AI tie-break for the ambiguous band. Always resolves to a bucket;
    /// never lets a failure propagate.
    async fn boundary_judge(&self, state: &mut PipelineState) -> Result<(), TidingsError> {
        if state.draft.blocked || state.draft.bucket != Some(Bucket::Boundary) {
            return Ok(());
        }

        // Quota first: when denied, the AI endpoint is never called.
        match self.budget.check_quota(QuotaKind::Judge).await {
            Ok(decision) if decision.allowed => {}
            Ok(decision) => {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| "judge quota denied".to_string());
                info!(goal_id = %state.input.goal_id, %reason, "boundary fails closed to batch");
                state.draft.bucket = Some(Bucket::Batch);
                state.draft.fallback = Some(reason);
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "judge quota check failed, failing closed to batch");
                state.draft.bucket = Some(Bucket::Batch);
                state.draft.fallback = Some(format!("quota check failed: {e}"));
                return Ok(());
            }
        }

        let (Some(goal), Some(item)) = (&state.goal, &state.item) else {
            return Ok(());
        };
        let request = JudgeRequest {
            goal_description: format!("{}: {}", goal.name, goal.description),
            item_title: item.title.clone(),
            item_snippet: item.snippet.clone(),
            score: state.input.score,
            reasons: state.input.reasons.summary.clone(),
        };
        let request_json = serde_json::to_value(&request).unwrap_or(serde_json::Value::Null);
        state.llm_used = true;

        match self.judge.classify(&request).await {
            Ok(outcome) => {
                if let Err(e) = self
                    .budget
                    .record_usage(QuotaKind::Judge, outcome.usage.total())
                    .await
                {
                    warn!(error = %e, "judge usage recording failed");
                }
                let resolved = match outcome.verdict.label {
                    JudgeLabel::PushNow => Bucket::Immediate,
                    JudgeLabel::Later => Bucket::Batch,
                };
                debug!(
                    label = ?outcome.verdict.label,
                    confidence = outcome.verdict.confidence,
                    "boundary resolved by judge"
                );
                state.tool_calls.push(ToolCallDraft {
                    tool: "boundary_judge".to_string(),
                    request: request_json,
                    response: serde_json::to_value(&outcome.verdict)
                        .unwrap_or(serde_json::Value::Null),
                });
                state.draft.verdict_confidence = Some(outcome.verdict.confidence);
                state.draft.verdict = Some(outcome.verdict);
                state.draft.bucket = Some(resolved);
            }
            Err(e) => {
                warn!(error = %e, "boundary judge failed, failing closed to batch");
                state.tool_calls.push(ToolCallDraft {
                    tool: "boundary_judge".to_string(),
                    request: request_json,
                    response: serde_json::json!({ "error": e.to_string() }),
                });
                state.draft.bucket = Some(Bucket::Batch);
                state.draft.fallback = Some(format!("judge failed: {e}"));
            }
        }
        Ok(())
    }

    /// Bounded coalescing of immediate deliveries into a time bucket.
    async fn coalesce(&self, state: &mut PipelineState) -> Result<(), TidingsError> {
        if state.draft.blocked || state.draft.bucket != Some(Bucket::Immediate) {
            return Ok(());
        }
        let bucket_ts = self.coalesce.bucket_ts(state.input.now);
        match self
            .coalesce
            .try_add(&state.input.goal_id, bucket_ts, &state.input.item_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                // Full bucket: still emitted, but delivery folds it into the
                // buffered batch.
                info!(
                    goal_id = %state.input.goal_id,
                    item_id = %state.input.item_id,
                    bucket_ts,
                    "coalesce bucket full, marking candidate as coalesce-skipped"
                );
                state.draft.coalesce_skipped = true;
            }
            Err(e) => {
                warn!(error = %e, "coalesce buffer unavailable, delivering uncoalesced");
            }
        }
        Ok(())
    }

    /// Build the reason payload and idempotently create the push decision.
    async fn emit_actions(&self, state: &mut PipelineState) -> Result<(), TidingsError> {
        if state.draft.blocked {
            return Ok(());
        }
        let Some(kind) = state.draft.bucket.and_then(Bucket::decision_kind) else {
            return Ok(());
        };
        if kind == DecisionKind::Ignore {
            return Ok(());
        }

        let reason = DecisionReason {
            summary: state.input.reasons.summary.clone(),
            evidence: state.input.reasons.evidence.clone(),
            verdict: state.draft.verdict.clone(),
            fallback: state.draft.fallback.clone(),
            coalesce_skipped: state.draft.coalesce_skipped,
        };
        let decided_at = state
            .input
            .now
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        let (proposal, _created) = emit_push_decision(
            &self.db,
            &state.input.goal_id,
            &state.input.item_id,
            kind,
            &self.config.channel,
            reason,
            &decided_at,
        )
        .await?;
        // The proposal is appended whether or not the insert was new.
        state.actions.push(proposal);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tidings_budget::PinnedBudget;
    use tidings_config::model::{BudgetConfig, CoalesceConfig};
    use tidings_core::types::{BudgetDay, MatchReasons};
    use tidings_kv::MemoryKv;
    use tidings_test_utils::{MockGoalStore, MockItemStore, MockJudge, fixtures};

    struct Harness {
        pipeline: Pipeline,
        judge: Arc<MockJudge>,
        db: Database,
    }

    async fn harness_with_budget(day: BudgetDay) -> Harness {
        let goals = Arc::new(MockGoalStore::new());
        goals.insert(fixtures::goal("g1", &["GPT"]));
        let items = Arc::new(MockItemStore::new());
        items.insert(fixtures::item("i1", "src-1", "GPT-5 launch announced"));
        items.insert(fixtures::item("i2", "src-1", "GPT-5 benchmarks"));
        items.insert(fixtures::item("i3", "src-1", "GPT-5 pricing"));
        items.insert(fixtures::item("i4", "src-1", "GPT-5 rollout"));

        let judge = Arc::new(MockJudge::new());
        let db = Database::open_in_memory().await.unwrap();
        let budget = Arc::new(PinnedBudget::new(day, BudgetConfig::default()));
        let coalesce = CoalesceBuffer::new(Arc::new(MemoryKv::new()), CoalesceConfig::default());

        let pipeline = Pipeline::new(
            goals,
            items,
            budget,
            judge.clone(),
            coalesce,
            db.clone(),
            PipelineConfig::default(),
        );
        Harness {
            pipeline,
            judge,
            db,
        }
    }

    async fn harness() -> Harness {
        harness_with_budget(BudgetDay::default()).await
    }

    fn input(item_id: &str, score: f64) -> PipelineInput {
        PipelineInput {
            goal_id: "g1".to_string(),
            item_id: item_id.to_string(),
            score,
            features: BTreeMap::new(),
            reasons: MatchReasons {
                summary: "test match".to_string(),
                evidence: vec![],
            },
            now: Utc::now(),
        }
    }

    async fn decision_count(db: &Database) -> i64 {
        db.connection()
            .call(|conn| {
                conn.query_row("SELECT count(*) FROM push_decisions", [], |row| row.get(0))
            })
            .await
            .unwrap()
    }

    #[test]
    fn bucketing_is_a_pure_step_function() {
        let config = PipelineConfig::default();
        let cases = [
            (0.95, Bucket::Immediate),
            (0.93, Bucket::Immediate),
            (0.9299, Bucket::Boundary),
            (0.90, Bucket::Boundary),
            (0.88, Bucket::Boundary),
            (0.8799, Bucket::Batch),
            (0.80, Bucket::Batch),
            (0.75, Bucket::Batch),
            (0.7499, Bucket::Ignore),
            (0.50, Bucket::Ignore),
            (0.0, Bucket::Ignore),
        ];
        for (score, expected) in cases {
            assert_eq!(
                bucket_for_score(score, &config),
                expected,
                "score {score} should map to {expected:?}"
            );
        }
    }

    #[tokio::test]
    async fn high_score_emits_immediate_without_judge() {
        let h = harness().await;
        let state = h.pipeline.run(input("i1", 0.96)).await.unwrap();

        assert_eq!(state.draft.bucket, Some(Bucket::Immediate));
        assert_eq!(h.judge.invocations(), 0);
        assert!(!state.llm_used);
        assert_eq!(state.actions.len(), 1);
        assert_eq!(state.actions[0].kind, DecisionKind::Immediate);
        assert_eq!(decision_count(&h.db).await, 1);
    }

    #[tokio::test]
    async fn ignore_score_emits_nothing() {
        let h = harness().await;
        let state = h.pipeline.run(input("i1", 0.50)).await.unwrap();

        assert_eq!(state.draft.bucket, Some(Bucket::Ignore));
        assert!(state.actions.is_empty());
        assert_eq!(decision_count(&h.db).await, 0);
    }

    #[tokio::test]
    async fn batch_score_emits_batch_decision() {
        let h = harness().await;
        let state = h.pipeline.run(input("i1", 0.80)).await.unwrap();

        assert_eq!(state.draft.bucket, Some(Bucket::Batch));
        assert_eq!(state.actions.len(), 1);
        assert_eq!(state.actions[0].kind, DecisionKind::Batch);
        assert_eq!(h.judge.invocations(), 0);
    }

    #[tokio::test]
    async fn boundary_push_now_resolves_to_immediate() {
        let h = harness().await;
        h.judge.push_verdict(MockJudge::push_now());
        let state = h.pipeline.run(input("i1", 0.90)).await.unwrap();

        assert_eq!(h.judge.invocations(), 1);
        assert!(state.llm_used);
        assert_eq!(state.draft.bucket, Some(Bucket::Immediate));
        assert!(state.draft.verdict.is_some());
        assert_eq!(state.tool_calls.len(), 1);
        assert_eq!(state.tool_calls[0].tool, "boundary_judge");
        assert_eq!(state.actions[0].kind, DecisionKind::Immediate);
    }

    #[tokio::test]
    async fn boundary_later_resolves_to_batch() {
        let h = harness().await;
        h.judge.push_verdict(MockJudge::later());
        let state = h.pipeline.run(input("i1", 0.90)).await.unwrap();

        assert_eq!(state.draft.bucket, Some(Bucket::Batch));
        assert_eq!(state.actions[0].kind, DecisionKind::Batch);
    }

    #[tokio::test]
    async fn disabled_judge_quota_fails_closed_without_calling_ai() {
        let h = harness_with_budget(BudgetDay {
            judge_disabled: true,
            ..Default::default()
        })
        .await;
        let state = h.pipeline.run(input("i1", 0.90)).await.unwrap();

        assert_eq!(
            h.judge.invocations(),
            0,
            "the AI endpoint must never be called when quota is denied"
        );
        assert!(!state.llm_used);
        assert_eq!(state.draft.bucket, Some(Bucket::Batch));
        assert!(state.draft.fallback.is_some());
        assert_eq!(state.actions[0].kind, DecisionKind::Batch);
    }

    #[tokio::test]
    async fn judge_failure_fails_closed_to_batch() {
        let h = harness().await;
        h.judge.fail_next("endpoint unreachable");
        let state = h.pipeline.run(input("i1", 0.90)).await.unwrap();

        assert_eq!(state.draft.bucket, Some(Bucket::Batch));
        assert!(
            state
                .draft
                .fallback
                .as_deref()
                .unwrap()
                .contains("endpoint unreachable")
        );
        // The failed call is still audited.
        assert_eq!(state.tool_calls.len(), 1);
        assert!(state.tool_calls[0].response["error"].is_string());
    }

    #[tokio::test]
    async fn blocked_source_short_circuits_everything() {
        let h = harness().await;
        let mut goal = fixtures::goal("g1", &["GPT"]);
        goal.blocked_sources = vec!["src-1".to_string()];
        // Overwrite the goal in the store.
        let goals = Arc::new(MockGoalStore::new());
        goals.insert(goal);
        let items = Arc::new(MockItemStore::new());
        items.insert(fixtures::item("i1", "src-1", "GPT-5 launch announced"));
        let pipeline = Pipeline::new(
            goals,
            items,
            Arc::new(PinnedBudget::new(BudgetDay::default(), BudgetConfig::default())),
            h.judge.clone(),
            CoalesceBuffer::new(Arc::new(MemoryKv::new()), CoalesceConfig::default()),
            h.db.clone(),
            PipelineConfig::default(),
        );

        let state = pipeline.run(input("i1", 0.99)).await.unwrap();
        assert!(state.draft.blocked);
        assert!(state.draft.bucket.is_none());
        assert!(state.actions.is_empty());
        assert_eq!(decision_count(&h.db).await, 0);
    }

    #[tokio::test]
    async fn duplicate_emissions_converge_to_one_row() {
        let h = harness().await;
        let a = h.pipeline.run(input("i1", 0.96)).await.unwrap();
        let b = h.pipeline.run(input("i1", 0.96)).await.unwrap();

        // Both runs propose the action; only one row exists.
        assert_eq!(a.actions.len(), 1);
        assert_eq!(b.actions.len(), 1);
        assert_eq!(a.actions[0].dedupe_key, b.actions[0].dedupe_key);
        assert_eq!(decision_count(&h.db).await, 1);
    }

    #[tokio::test]
    async fn fourth_immediate_in_a_window_is_coalesce_skipped() {
        let h = harness().await;
        let now = Utc::now();
        let mut skipped = Vec::new();
        for item_id in ["i1", "i2", "i3", "i4"] {
            let mut inp = input(item_id, 0.96);
            inp.now = now;
            let state = h.pipeline.run(inp).await.unwrap();
            skipped.push(state.draft.coalesce_skipped);
            // Every candidate still emits a decision.
            assert_eq!(state.actions.len(), 1);
        }
        assert_eq!(skipped, vec![false, false, false, true]);
        assert_eq!(decision_count(&h.db).await, 4);
    }

    #[tokio::test]
    async fn missing_goal_is_fatal_to_the_run() {
        let h = harness().await;
        let mut inp = input("i1", 0.9);
        inp.goal_id = "missing".to_string();
        let err = h.pipeline.run(inp).await.unwrap_err();
        assert!(matches!(err, TidingsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_item_is_fatal_to_the_run() {
        let h = harness().await;
        let err = h.pipeline.run(input("missing", 0.9)).await.unwrap_err();
        assert!(matches!(err, TidingsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn load_context_captures_budget_snapshot() {
        let h = harness_with_budget(BudgetDay {
            date: "2026-08-07".to_string(),
            judge_tokens: 1400,
            ..Default::default()
        })
        .await;
        let state = h.pipeline.run(input("i1", 0.50)).await.unwrap();
        let snapshot = state.budget_snapshot.unwrap();
        assert_eq!(snapshot.date, "2026-08-07");
        assert_eq!(snapshot.judge_tokens, 1400);
    }
}
