// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tidings decision engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Tidings configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TidingsConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Relevance scoring weights and windows.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Decision pipeline thresholds and delivery channel.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Coalesce buffer bounds.
    #[serde(default)]
    pub coalesce: CoalesceConfig,

    /// Daily AI budget caps and feature flags.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Anthropic API settings for the boundary judge.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Periodic trigger scheduling.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent process.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "tidings".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Relevance Engine weights and decay windows.
///
/// The four signal weights sum to 1.0; the feedback boost is an additive
/// term on top, bounded by `feedback_boost_max` in either direction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Weight of the semantic similarity signal.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,

    /// Weight of the keyword hit signal.
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// Weight of the recency signal.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Weight of the source trust signal.
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,

    /// Maximum magnitude of the feedback boost.
    #[serde(default = "default_feedback_boost_max")]
    pub feedback_boost_max: f64,

    /// Items younger than this score full recency.
    #[serde(default = "default_fresh_hours")]
    pub fresh_hours: i64,

    /// Recency decays linearly to half-score at this age.
    #[serde(default = "default_half_hours")]
    pub half_hours: i64,

    /// Recency reaches zero at this age.
    #[serde(default = "default_zero_hours")]
    pub zero_hours: i64,

    /// TTL of cached goal embeddings, in hours.
    #[serde(default = "default_goal_embedding_ttl_hours")]
    pub goal_embedding_ttl_hours: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            recency_weight: default_recency_weight(),
            trust_weight: default_trust_weight(),
            feedback_boost_max: default_feedback_boost_max(),
            fresh_hours: default_fresh_hours(),
            half_hours: default_half_hours(),
            zero_hours: default_zero_hours(),
            goal_embedding_ttl_hours: default_goal_embedding_ttl_hours(),
        }
    }
}

fn default_semantic_weight() -> f64 {
    0.40
}

fn default_keyword_weight() -> f64 {
    0.30
}

fn default_recency_weight() -> f64 {
    0.20
}

fn default_trust_weight() -> f64 {
    0.10
}

fn default_feedback_boost_max() -> f64 {
    0.2
}

fn default_fresh_hours() -> i64 {
    6
}

fn default_half_hours() -> i64 {
    48
}

fn default_zero_hours() -> i64 {
    168
}

fn default_goal_embedding_ttl_hours() -> u64 {
    24
}

/// Decision pipeline bucket thresholds and delivery channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Scores at or above this go straight to immediate delivery.
    #[serde(default = "default_immediate_threshold")]
    pub immediate_threshold: f64,

    /// Scores in [boundary_threshold, immediate_threshold) are ambiguous
    /// and get an AI tie-break.
    #[serde(default = "default_boundary_threshold")]
    pub boundary_threshold: f64,

    /// Scores in [batch_threshold, boundary_threshold) batch.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: f64,

    /// Delivery channel recorded on push decisions.
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            immediate_threshold: default_immediate_threshold(),
            boundary_threshold: default_boundary_threshold(),
            batch_threshold: default_batch_threshold(),
            channel: default_channel(),
        }
    }
}

fn default_immediate_threshold() -> f64 {
    0.93
}

fn default_boundary_threshold() -> f64 {
    0.88
}

fn default_batch_threshold() -> f64 {
    0.75
}

fn default_channel() -> String {
    "email".to_string()
}

/// Coalesce buffer window and bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoalesceConfig {
    /// Width of the time bucket, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Maximum candidates held per (goal, time bucket).
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// TTL on the underlying KV key, in seconds. Must outlive the window.
    #[serde(default = "default_coalesce_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_items: default_max_items(),
            ttl_secs: default_coalesce_ttl_secs(),
        }
    }
}

fn default_window_secs() -> u64 {
    300
}

fn default_max_items() -> usize {
    3
}

fn default_coalesce_ttl_secs() -> u64 {
    900
}

/// Daily AI budget caps and feature flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Global flag for embedding generation. Off means every embedding
    /// quota check fails.
    #[serde(default = "default_true")]
    pub embedding_enabled: bool,

    /// Global flag for boundary classification.
    #[serde(default = "default_true")]
    pub judge_enabled: bool,

    /// Hard daily cap on estimated AI spend, USD.
    #[serde(default = "default_daily_cap_usd")]
    pub daily_cap_usd: f64,

    /// Daily cap on estimated embedding calls.
    #[serde(default = "default_embedding_call_cap")]
    pub embedding_call_cap: i64,

    /// Daily cap on estimated judge calls.
    #[serde(default = "default_judge_call_cap")]
    pub judge_call_cap: i64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            embedding_enabled: default_true(),
            judge_enabled: default_true(),
            daily_cap_usd: default_daily_cap_usd(),
            embedding_call_cap: default_embedding_call_cap(),
            judge_call_cap: default_judge_call_cap(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_daily_cap_usd() -> f64 {
    1.0
}

fn default_embedding_call_cap() -> i64 {
    2000
}

fn default_judge_call_cap() -> i64 {
    500
}

/// Anthropic API configuration for the boundary judge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for boundary classification.
    #[serde(default = "default_judge_model")]
    pub judge_model: String,

    /// Maximum tokens to generate per verdict.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            judge_model: default_judge_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_judge_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "tidings.db".to_string()
}

/// Periodic trigger scheduling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Minutes between batch-window ticks.
    #[serde(default = "default_batch_window_minutes")]
    pub batch_window_minutes: u64,

    /// UTC hour of the daily digest tick.
    #[serde(default = "default_digest_hour_utc")]
    pub digest_hour_utc: u32,

    /// Minimum stored match score picked up by a batch window.
    #[serde(default = "default_batch_min_score")]
    pub batch_min_score: f64,

    /// Minimum stored match score picked up by the daily digest.
    #[serde(default = "default_digest_min_score")]
    pub digest_min_score: f64,

    /// Hard wall-clock bound on a single pipeline run, in seconds.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_window_minutes: default_batch_window_minutes(),
            digest_hour_utc: default_digest_hour_utc(),
            batch_min_score: default_batch_min_score(),
            digest_min_score: default_digest_min_score(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

fn default_batch_window_minutes() -> u64 {
    30
}

fn default_digest_hour_utc() -> u32 {
    8
}

fn default_batch_min_score() -> f64 {
    0.75
}

fn default_digest_min_score() -> f64 {
    0.60
}

fn default_run_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = TidingsConfig::default();
        assert!((config.pipeline.immediate_threshold - 0.93).abs() < f64::EPSILON);
        assert!((config.pipeline.boundary_threshold - 0.88).abs() < f64::EPSILON);
        assert!((config.pipeline.batch_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.coalesce.max_items, 3);
        assert_eq!(config.coalesce.window_secs, 300);
    }

    #[test]
    fn scoring_weights_sum_to_one() {
        let s = ScoringConfig::default();
        let sum = s.semantic_weight + s.keyword_weight + s.recency_weight + s.trust_weight;
        assert!((sum - 1.0).abs() < 1e-9, "weights should sum to 1.0, got {sum}");
    }
}
