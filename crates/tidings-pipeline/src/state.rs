// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared mutable state threaded through the pipeline stages.
//!
//! Short-circuiting is explicit: a stage that blocks or resolves the draft
//! sets fields that every later stage checks as a guard condition. No
//! exceptions are used for flow control.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidings_core::types::{
    ActionProposal, BudgetDay, ContentItem, DecisionKind, Goal, JudgeVerdict, MatchReasons,
};

/// Preliminary bucket assignment. `Boundary` is ambiguous and must be
/// resolved by the judge stage before emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Immediate,
    Boundary,
    Batch,
    Ignore,
}

impl Bucket {
    /// The decision kind a resolved bucket emits as. `Boundary` has no
    /// decision kind; the judge stage always resolves it first.
    pub fn decision_kind(self) -> Option<DecisionKind> {
        match self {
            Bucket::Immediate => Some(DecisionKind::Immediate),
            Bucket::Batch => Some(DecisionKind::Batch),
            Bucket::Ignore => Some(DecisionKind::Ignore),
            Bucket::Boundary => None,
        }
    }
}

/// Everything the pipeline needs to run once, serialized verbatim into the
/// run record's input snapshot so replay can reconstruct it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInput {
    pub goal_id: String,
    pub item_id: String,
    pub score: f64,
    pub features: BTreeMap<String, f64>,
    pub reasons: MatchReasons,
    /// Evaluation time; pinned on replay.
    pub now: DateTime<Utc>,
}

/// The mutable draft decision built up by the stages.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub bucket: Option<Bucket>,
    pub verdict: Option<JudgeVerdict>,
    pub verdict_confidence: Option<f64>,
    /// Why a fail-closed fallback was taken, if one was.
    pub fallback: Option<String>,
    pub coalesce_skipped: bool,
}

/// One pending audit row for an external call made during the run.
#[derive(Debug, Clone)]
pub struct ToolCallDraft {
    pub tool: String,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
}

/// Pipeline state: input, hydrated context, draft, and accumulated outputs.
#[derive(Debug)]
pub struct PipelineState {
    pub input: PipelineInput,
    /// Hydrated by LoadContext.
    pub goal: Option<Goal>,
    /// Hydrated by LoadContext.
    pub item: Option<ContentItem>,
    /// Budget snapshot taken at LoadContext time.
    pub budget_snapshot: Option<BudgetDay>,
    pub draft: Draft,
    pub actions: Vec<ActionProposal>,
    pub tool_calls: Vec<ToolCallDraft>,
    pub llm_used: bool,
}

impl PipelineState {
    pub fn new(input: PipelineInput) -> Self {
        Self {
            input,
            goal: None,
            item: None,
            budget_snapshot: None,
            draft: Draft::default(),
            actions: Vec::new(),
            tool_calls: Vec::new(),
            llm_used: false,
        }
    }

    /// Serializable output snapshot persisted on the run record.
    pub fn output_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "blocked": self.draft.blocked,
            "block_reason": self.draft.block_reason,
            "bucket": self.draft.bucket,
            "fallback": self.draft.fallback,
            "coalesce_skipped": self.draft.coalesce_skipped,
            "verdict": self.draft.verdict,
            "action_count": self.actions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_has_no_decision_kind() {
        assert_eq!(Bucket::Boundary.decision_kind(), None);
        assert_eq!(
            Bucket::Immediate.decision_kind(),
            Some(DecisionKind::Immediate)
        );
        assert_eq!(Bucket::Batch.decision_kind(), Some(DecisionKind::Batch));
        assert_eq!(Bucket::Ignore.decision_kind(), Some(DecisionKind::Ignore));
    }

    #[test]
    fn input_round_trips_through_json() {
        let input = PipelineInput {
            goal_id: "g1".to_string(),
            item_id: "i1".to_string(),
            score: 0.9,
            features: BTreeMap::from([("semantic".to_string(), 0.95)]),
            reasons: MatchReasons::default(),
            now: Utc::now(),
        };
        let json = serde_json::to_value(&input).unwrap();
        let back: PipelineInput = serde_json::from_value(json).unwrap();
        assert_eq!(back.goal_id, "g1");
        assert_eq!(back.now, input.now);
        assert_eq!(back.features["semantic"], 0.95);
    }
}
