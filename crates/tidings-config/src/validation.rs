// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as threshold ordering and non-negative budgets.

use crate::diagnostic::ConfigError;
use crate::model::TidingsConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TidingsConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Thresholds must be strictly ordered and inside (0, 1].
    let p = &config.pipeline;
    if !(p.batch_threshold < p.boundary_threshold
        && p.boundary_threshold < p.immediate_threshold)
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "pipeline thresholds must satisfy batch < boundary < immediate, got {} / {} / {}",
                p.batch_threshold, p.boundary_threshold, p.immediate_threshold
            ),
        });
    }
    for (name, value) in [
        ("pipeline.batch_threshold", p.batch_threshold),
        ("pipeline.boundary_threshold", p.boundary_threshold),
        ("pipeline.immediate_threshold", p.immediate_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be within [0, 1], got {value}"),
            });
        }
    }

    // Scoring weights must sum to 1.0.
    let s = &config.scoring;
    let weight_sum = s.semantic_weight + s.keyword_weight + s.recency_weight + s.trust_weight;
    if (weight_sum - 1.0).abs() > 1e-6 {
        errors.push(ConfigError::Validation {
            message: format!("scoring weights must sum to 1.0, got {weight_sum}"),
        });
    }
    if s.feedback_boost_max < 0.0 || s.feedback_boost_max > 0.5 {
        errors.push(ConfigError::Validation {
            message: format!(
                "scoring.feedback_boost_max must be within [0, 0.5], got {}",
                s.feedback_boost_max
            ),
        });
    }

    // Recency windows must be ordered.
    if !(s.fresh_hours < s.half_hours && s.half_hours < s.zero_hours) {
        errors.push(ConfigError::Validation {
            message: format!(
                "recency windows must satisfy fresh < half < zero, got {} / {} / {}",
                s.fresh_hours, s.half_hours, s.zero_hours
            ),
        });
    }

    // Budget values must be non-negative.
    if config.budget.daily_cap_usd < 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "budget.daily_cap_usd must be non-negative, got {}",
                config.budget.daily_cap_usd
            ),
        });
    }
    for (name, value) in [
        ("budget.embedding_call_cap", config.budget.embedding_call_cap),
        ("budget.judge_call_cap", config.budget.judge_call_cap),
    ] {
        if value < 0 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be non-negative, got {value}"),
            });
        }
    }

    // The coalesce buffer needs at least one slot and a TTL covering its window.
    if config.coalesce.max_items == 0 {
        errors.push(ConfigError::Validation {
            message: "coalesce.max_items must be at least 1".to_string(),
        });
    }
    if config.coalesce.ttl_secs < config.coalesce.window_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "coalesce.ttl_secs ({}) must be at least window_secs ({})",
                config.coalesce.ttl_secs, config.coalesce.window_secs
            ),
        });
    }

    // Storage path and digest hour.
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }
    if config.runner.digest_hour_utc > 23 {
        errors.push(ConfigError::Validation {
            message: format!(
                "runner.digest_hour_utc must be within [0, 23], got {}",
                config.runner.digest_hour_utc
            ),
        });
    }
    if config.runner.run_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "runner.run_timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
