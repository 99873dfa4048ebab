// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic replay of a persisted run.
//!
//! Replay reconstructs the original input snapshot, re-executes the
//! pipeline with a pinned budget snapshot and pinned classifier responses
//! (taken from the run's tool call records), and diffs the newly produced
//! actions against the originally persisted ones. A non-empty diff means
//! something nondeterministic changed underneath the run -- a model update,
//! different budget state, or recomputed match scores.
//!
//! Replay creates no new run records; decision emission is idempotent, so
//! re-executing the emit stage cannot duplicate rows.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tidings_budget::PinnedBudget;
use tidings_core::types::{
    ActionProposal, DecisionKind, JudgeRequest, JudgeVerdict, TokenUsage, TriggerKind,
};
use tidings_core::{JudgeEndpoint, JudgeOutcome, TidingsError};
use tidings_pipeline::{CoalesceBuffer, Pipeline, PipelineInput};
use tidings_storage::queries::ledger;
use tracing::info;

use crate::orchestrator::Orchestrator;

/// One per-index disagreement between original and replayed actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayMismatch {
    pub index: usize,
    pub original: Option<DecisionKind>,
    pub replayed: Option<DecisionKind>,
}

/// The outcome of a replay: both action lists and their diff.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayResult {
    pub run_id: String,
    pub original_actions: Vec<ActionProposal>,
    pub replayed_actions: Vec<ActionProposal>,
    pub count_mismatch: bool,
    pub mismatches: Vec<ReplayMismatch>,
}

impl ReplayResult {
    /// True when the replay reproduced the original actions exactly.
    pub fn is_clean(&self) -> bool {
        !self.count_mismatch && self.mismatches.is_empty()
    }
}

/// Compare action lists by position and decision kind.
pub fn diff_actions(
    original: &[ActionProposal],
    replayed: &[ActionProposal],
) -> (bool, Vec<ReplayMismatch>) {
    let count_mismatch = original.len() != replayed.len();
    let longest = original.len().max(replayed.len());
    let mut mismatches = Vec::new();
    for index in 0..longest {
        let original_kind = original.get(index).map(|a| a.kind);
        let replayed_kind = replayed.get(index).map(|a| a.kind);
        if original_kind != replayed_kind {
            mismatches.push(ReplayMismatch {
                index,
                original: original_kind,
                replayed: replayed_kind,
            });
        }
    }
    (count_mismatch, mismatches)
}

/// A judge that replays the recorded responses of a previous run, in order.
///
/// Recorded failures are replayed as failures so the original fail-closed
/// path is reproduced. Running out of recorded responses is itself a
/// provider error (the replayed pipeline asked more questions than the
/// original did), which the judge stage converts into a Batch fallback.
pub struct PinnedJudge {
    responses: Mutex<VecDeque<serde_json::Value>>,
}

impl PinnedJudge {
    pub fn new(responses: Vec<serde_json::Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl JudgeEndpoint for PinnedJudge {
    async fn classify(&self, _request: &JudgeRequest) -> Result<JudgeOutcome, TidingsError> {
        let next = self
            .responses
            .lock()
            .map_err(|_| TidingsError::Internal("pinned judge lock poisoned".to_string()))?
            .pop_front();
        let Some(response) = next else {
            return Err(TidingsError::Provider {
                message: "no recorded judge response left to replay".to_string(),
                source: None,
            });
        };
        if let Some(error) = response.get("error").and_then(|e| e.as_str()) {
            return Err(TidingsError::Provider {
                message: format!("replayed failure: {error}"),
                source: None,
            });
        }
        let verdict: JudgeVerdict = serde_json::from_value(response).map_err(|e| {
            TidingsError::Validation(format!("recorded verdict does not parse: {e}"))
        })?;
        Ok(JudgeOutcome {
            verdict,
            usage: TokenUsage::default(),
        })
    }
}

/// Input snapshot shape of a reduced (batch/digest) run.
#[derive(Debug, Deserialize)]
struct ReducedSnapshot {
    goal_id: String,
    since: String,
    min_score: f64,
    kind: DecisionKind,
}

impl Orchestrator {
    /// Re-execute a persisted run against pinned budget and classifier
    /// state, and report the action diff.
    pub async fn replay(&self, run_id: &str) -> Result<ReplayResult, TidingsError> {
        let run = self.fetch_run(run_id).await?;

        let replayed_actions = match run.trigger {
            TriggerKind::NewMatch => {
                let input: PipelineInput = serde_json::from_value(run.input_snapshot.clone())
                    .map_err(|e| {
                        TidingsError::Validation(format!("input snapshot does not parse: {e}"))
                    })?;

                let pinned_budget = Arc::new(PinnedBudget::new(
                    run.budget_snapshot.clone().unwrap_or_default(),
                    self.config.budget.clone(),
                ));
                let recorded = ledger::list_tool_calls(&self.db, run_id)
                    .await?
                    .into_iter()
                    .filter(|call| call.tool == "boundary_judge")
                    .map(|call| call.response)
                    .collect();
                let pinned_judge = Arc::new(PinnedJudge::new(recorded));

                let pipeline = Pipeline::new(
                    self.goals().clone(),
                    self.items().clone(),
                    pinned_budget,
                    pinned_judge,
                    CoalesceBuffer::new(self.kv.clone(), self.config.coalesce.clone()),
                    self.db.clone(),
                    self.config.pipeline.clone(),
                );
                pipeline.run(input).await?.actions
            }
            TriggerKind::BatchWindow | TriggerKind::Digest => {
                let snapshot: ReducedSnapshot =
                    serde_json::from_value(run.input_snapshot.clone()).map_err(|e| {
                        TidingsError::Validation(format!("input snapshot does not parse: {e}"))
                    })?;
                self.reduced_proposals(
                    &snapshot.goal_id,
                    snapshot.kind,
                    &snapshot.since,
                    snapshot.min_score,
                )
                .await?
            }
        };

        let (count_mismatch, mismatches) = diff_actions(&run.final_actions, &replayed_actions);
        info!(
            run_id,
            clean = !count_mismatch && mismatches.is_empty(),
            "replay complete"
        );
        Ok(ReplayResult {
            run_id: run_id.to_string(),
            original_actions: run.final_actions,
            replayed_actions,
            count_mismatch,
            mismatches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: DecisionKind, dedupe_key: &str) -> ActionProposal {
        ActionProposal {
            kind,
            goal_id: "g1".to_string(),
            item_id: "i1".to_string(),
            dedupe_key: dedupe_key.to_string(),
            channel: "email".to_string(),
            summary: "s".to_string(),
        }
    }

    #[test]
    fn identical_lists_diff_clean() {
        let original = vec![action(DecisionKind::Immediate, "k1")];
        let replayed = vec![action(DecisionKind::Immediate, "k1")];
        let (count_mismatch, mismatches) = diff_actions(&original, &replayed);
        assert!(!count_mismatch);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn kind_change_is_reported_per_index() {
        let original = vec![
            action(DecisionKind::Immediate, "k1"),
            action(DecisionKind::Batch, "k2"),
        ];
        let replayed = vec![
            action(DecisionKind::Batch, "k1"),
            action(DecisionKind::Batch, "k2"),
        ];
        let (count_mismatch, mismatches) = diff_actions(&original, &replayed);
        assert!(!count_mismatch);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].index, 0);
        assert_eq!(mismatches[0].original, Some(DecisionKind::Immediate));
        assert_eq!(mismatches[0].replayed, Some(DecisionKind::Batch));
    }

    #[test]
    fn count_mismatch_includes_missing_indices() {
        let original = vec![action(DecisionKind::Batch, "k1")];
        let replayed: Vec<ActionProposal> = vec![];
        let (count_mismatch, mismatches) = diff_actions(&original, &replayed);
        assert!(count_mismatch);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].replayed, None);
    }

    #[tokio::test]
    async fn pinned_judge_replays_in_order_then_errors() {
        let judge = PinnedJudge::new(vec![
            serde_json::json!({
                "label": "push-now", "confidence": 0.9, "uncertain": false,
                "reason": "r", "evidence": []
            }),
            serde_json::json!({"error": "endpoint unreachable"}),
        ]);
        let request = JudgeRequest {
            goal_description: "g".to_string(),
            item_title: "t".to_string(),
            item_snippet: "s".to_string(),
            score: 0.9,
            reasons: "r".to_string(),
        };

        let first = judge.classify(&request).await.unwrap();
        assert_eq!(
            first.verdict.label,
            tidings_core::types::JudgeLabel::PushNow
        );

        // The recorded failure replays as a failure.
        let second = judge.classify(&request).await.unwrap_err();
        assert!(matches!(second, TidingsError::Provider { .. }));

        // Exhausted script is a provider error too.
        let third = judge.classify(&request).await.unwrap_err();
        assert!(matches!(third, TidingsError::Provider { .. }));
    }
}
