// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Tidings workspace.
//!
//! Goals and content items are owned by external collaborators and are
//! read-only here. Match records, push decisions, budget rows, and run
//! records are owned by this core and persisted by `tidings-storage`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// --- Goals ---

/// How a goal treats its must-terms during matching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PriorityMode {
    /// At least one must-term hit is required; zero hits blocks the item.
    Strict,
    /// Must-terms boost the score but their absence does not block.
    #[default]
    Soft,
}

/// Lifecycle state of a goal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Paused,
    Archived,
}

/// A user's tracked topic of interest. Mutated by the goal-management
/// collaborator; read-only to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub priority_mode: PriorityMode,
    pub must_terms: Vec<String>,
    pub negative_terms: Vec<String>,
    pub blocked_sources: Vec<String>,
    pub status: GoalStatus,
    /// ISO 8601 UTC timestamp.
    pub created_at: String,
}

// --- Content items ---

/// One ingested piece of content eligible for matching. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub snippet: String,
    pub summary: String,
    pub url: Option<String>,
    /// Embedding vector computed by the ingestion collaborator, if any.
    pub embedding: Option<Vec<f32>>,
    /// ISO 8601 UTC timestamp.
    pub published_at: String,
    /// ISO 8601 UTC timestamp.
    pub ingested_at: String,
}

// --- Feedback ---

/// User reaction to a delivered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Like,
    Dislike,
}

/// One like/dislike event, scoped to a goal. Consumed read-only for the
/// feedback boost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: String,
    pub goal_id: String,
    pub item_id: String,
    pub source_id: String,
    pub kind: FeedbackKind,
    pub created_at: String,
}

// --- Match results ---

/// Typed evidence category attached to a match explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    TermHit,
    SemanticMatch,
    FreshContent,
    FeedbackSignal,
}

/// A single piece of evidence supporting a match or verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub value: String,
}

/// Human-readable explanation of a match, with typed evidence for
/// downstream rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchReasons {
    pub summary: String,
    pub evidence: Vec<Evidence>,
}

/// The persisted output of the Relevance Engine for one (goal, item) pair.
/// Unique per (goal_id, item_id); recomputes upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub goal_id: String,
    pub item_id: String,
    /// Always in [0, 1].
    pub score: f64,
    /// Per-signal normalized feature values (semantic, keyword, recency, ...).
    pub features: BTreeMap<String, f64>,
    pub reasons: MatchReasons,
    pub computed_at: String,
}

// --- Push decisions ---

/// The push disposition for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Immediate,
    Batch,
    Digest,
    Ignore,
}

/// Delivery lifecycle of a push decision. Transitions are monotone:
/// Pending -> {Sent, Failed, Skipped} -> Read, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
    Read,
}

impl DeliveryStatus {
    /// Monotone ordering rank. A transition is legal only when the rank
    /// strictly increases.
    pub fn rank(&self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent | DeliveryStatus::Failed | DeliveryStatus::Skipped => 1,
            DeliveryStatus::Read => 2,
        }
    }
}

/// Delivery reason payload stored alongside a push decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionReason {
    pub summary: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// AI tie-break verdict, when the boundary judge ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<JudgeVerdict>,
    /// Why a fail-closed fallback was taken, if one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Set when the coalesce bucket was already full and delivery will fold
    /// this candidate into the buffered batch.
    #[serde(default)]
    pub coalesce_skipped: bool,
}

/// The persisted outcome of the decision pipeline. Created exactly once per
/// dedupe key; updated only by delivery collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushDecision {
    pub id: String,
    pub goal_id: String,
    pub item_id: String,
    pub decision: DecisionKind,
    pub status: DeliveryStatus,
    pub channel: String,
    pub reason: DecisionReason,
    /// Deterministic fingerprint of (goal, item, decision kind). Globally unique.
    pub dedupe_key: String,
    pub decided_at: String,
    pub sent_at: Option<String>,
}

// --- Budget ---

/// The two AI-assisted operations governed by the daily budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotaKind {
    Embedding,
    Judge,
}

/// One budget row per UTC calendar date. Created lazily on first access;
/// never deleted within its day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetDay {
    /// UTC date, `YYYY-MM-DD`.
    pub date: String,
    pub embedding_tokens: i64,
    pub judge_tokens: i64,
    pub usd_est: f64,
    /// Sticky for the remainder of the day once set.
    pub embedding_disabled: bool,
    /// Sticky for the remainder of the day once set.
    pub judge_disabled: bool,
}

// --- Runs ---

/// What caused a pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    NewMatch,
    BatchWindow,
    Digest,
}

/// Terminal and in-flight states of a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Timeout,
    Error,
    Fallback,
}

/// An action the pipeline proposes for delivery. Serialized into the run's
/// final action list and mirrored into the append-only action ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub kind: DecisionKind,
    pub goal_id: String,
    pub item_id: String,
    pub dedupe_key: String,
    pub channel: String,
    pub summary: String,
}

/// One auditable record per pipeline invocation. Append-only after creation
/// except for the single terminal status update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub trigger: TriggerKind,
    pub goal_id: String,
    pub status: RunStatus,
    pub input_snapshot: serde_json::Value,
    pub output_snapshot: Option<serde_json::Value>,
    pub final_actions: Vec<ActionProposal>,
    pub budget_snapshot: Option<BudgetDay>,
    pub llm_used: bool,
    pub latency_ms: i64,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Immutable audit row for one external tool/AI invocation within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub run_id: String,
    pub tool: String,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    pub created_at: String,
}

// --- Boundary classifier contract ---

/// Binary verdict label from the boundary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JudgeLabel {
    #[serde(rename = "push-now")]
    PushNow,
    #[serde(rename = "later")]
    Later,
}

/// Structured verdict returned by the boundary classifier.
///
/// The system prompt instructs the model to set `uncertain=true` and default
/// to "later" whenever it lacks confidence; callers must not assume
/// optimistic labeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub label: JudgeLabel,
    /// Always in [0, 1]; enforced by schema validation at the call site.
    pub confidence: f64,
    pub uncertain: bool,
    pub reason: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// Input handed to the boundary classifier for an ambiguous score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub goal_description: String,
    pub item_title: String,
    pub item_snippet: String,
    pub score: f64,
    pub reasons: String,
}

/// Token usage reported by an AI endpoint response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens charged against the quota for this call.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}
