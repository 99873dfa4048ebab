// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget governor: daily admission checks and usage recording for the two
//! AI-assisted operations.
//!
//! State is keyed by UTC date in the `budget_daily` table and created lazily
//! on first access. A failed check is a soft condition (`tracing::warn`, not
//! an error): callers degrade to their fail-closed path. Crossing a cap sets
//! the kind's sticky disable flag as a side effect, making the degradation
//! permanent for the remainder of the day. Flags are cleared only by the
//! new-day rollover (a fresh row) or an explicit operator reset.

use async_trait::async_trait;
use chrono::Utc;
use tidings_config::model::BudgetConfig;
use tidings_core::TidingsError;
use tidings_core::types::{BudgetDay, QuotaKind};
use tidings_storage::Database;
use tidings_storage::queries::budget;
use tracing::{debug, warn};

use crate::pricing;

/// Outcome of a quota admission check.
#[derive(Debug, Clone)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Denial reason, recorded into fallback payloads downstream.
    pub reason: Option<String>,
}

impl QuotaDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Admission-check and usage-recording seam consumed by the pipeline.
///
/// The live implementation is [`BudgetGovernor`]; replay substitutes a
/// pinned snapshot so re-execution has no budget side effects.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    async fn check_quota(&self, kind: QuotaKind) -> Result<QuotaDecision, TidingsError>;
    async fn record_usage(&self, kind: QuotaKind, tokens: u32) -> Result<(), TidingsError>;
    async fn snapshot(&self) -> Result<BudgetDay, TidingsError>;
}

/// Live budget governor backed by the `budget_daily` table.
pub struct BudgetGovernor {
    db: Database,
    config: BudgetConfig,
}

impl BudgetGovernor {
    pub fn new(db: Database, config: BudgetConfig) -> Self {
        Self { db, config }
    }

    /// Today's UTC date key.
    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Operator reset: clear both sticky flags for `date`.
    pub async fn reset_flags(&self, date: &str) -> Result<(), TidingsError> {
        budget::reset_flags(&self.db, date).await
    }

    fn kind_enabled(&self, kind: QuotaKind) -> bool {
        match kind {
            QuotaKind::Embedding => self.config.embedding_enabled,
            QuotaKind::Judge => self.config.judge_enabled,
        }
    }

    fn kind_disabled(day: &BudgetDay, kind: QuotaKind) -> bool {
        match kind {
            QuotaKind::Embedding => day.embedding_disabled,
            QuotaKind::Judge => day.judge_disabled,
        }
    }

    fn kind_tokens(day: &BudgetDay, kind: QuotaKind) -> i64 {
        match kind {
            QuotaKind::Embedding => day.embedding_tokens,
            QuotaKind::Judge => day.judge_tokens,
        }
    }

    fn call_cap(&self, kind: QuotaKind) -> i64 {
        match kind {
            QuotaKind::Embedding => self.config.embedding_call_cap,
            QuotaKind::Judge => self.config.judge_call_cap,
        }
    }
}

#[async_trait]
impl QuotaGate for BudgetGovernor {
    /// Check whether `kind` may make another AI call today.
    ///
    /// Order of checks: global feature flag, sticky disable flag, daily cost
    /// cap, estimated daily call cap. Cap crossings set the sticky flag
    /// before denying.
    async fn check_quota(&self, kind: QuotaKind) -> Result<QuotaDecision, TidingsError> {
        if !self.kind_enabled(kind) {
            return Ok(QuotaDecision::denied(format!("{kind} globally disabled")));
        }

        let date = Self::today();
        budget::ensure_day(&self.db, &date).await?;
        let day = budget::get_day(&self.db, &date)
            .await?
            .unwrap_or_default();

        if Self::kind_disabled(&day, kind) {
            return Ok(QuotaDecision::denied(format!(
                "{kind} disabled for {date} (sticky)"
            )));
        }

        if day.usd_est >= self.config.daily_cap_usd {
            warn!(
                date = %date,
                usd_est = day.usd_est,
                cap = self.config.daily_cap_usd,
                %kind,
                "daily cost cap reached, disabling for the rest of the day"
            );
            budget::set_disabled(&self.db, &date, kind).await?;
            return Ok(QuotaDecision::denied(format!(
                "daily cost cap ${:.2} reached",
                self.config.daily_cap_usd
            )));
        }
        if day.usd_est >= self.config.daily_cap_usd * 0.8 {
            warn!(
                date = %date,
                usd_est = day.usd_est,
                cap = self.config.daily_cap_usd,
                "approaching daily cost cap (80%+)"
            );
        }

        let estimated_calls =
            Self::kind_tokens(&day, kind) / pricing::typical_tokens_per_call(kind);
        let call_cap = self.call_cap(kind);
        if estimated_calls >= call_cap {
            warn!(
                date = %date,
                estimated_calls,
                call_cap,
                %kind,
                "daily call cap reached, disabling for the rest of the day"
            );
            budget::set_disabled(&self.db, &date, kind).await?;
            return Ok(QuotaDecision::denied(format!(
                "daily call cap {call_cap} reached"
            )));
        }

        Ok(QuotaDecision::allowed())
    }

    /// Record token usage for one call. Never clears disable flags.
    async fn record_usage(&self, kind: QuotaKind, tokens: u32) -> Result<(), TidingsError> {
        let date = Self::today();
        let usd = pricing::estimate_cost(kind, tokens);
        budget::add_usage(&self.db, &date, kind, tokens as i64, usd).await?;
        debug!(date = %date, %kind, tokens, usd, "usage recorded");
        Ok(())
    }

    /// Today's budget row, created lazily if absent.
    async fn snapshot(&self) -> Result<BudgetDay, TidingsError> {
        let date = Self::today();
        budget::ensure_day(&self.db, &date).await?;
        budget::get_day(&self.db, &date)
            .await?
            .ok_or_else(|| TidingsError::Internal(format!("budget row missing for {date}")))
    }
}

/// A frozen budget view used for deterministic replay.
///
/// Admission checks answer from the pinned row; usage recording is a no-op
/// so replays never mutate live counters.
pub struct PinnedBudget {
    day: BudgetDay,
    config: BudgetConfig,
}

impl PinnedBudget {
    pub fn new(day: BudgetDay, config: BudgetConfig) -> Self {
        Self { day, config }
    }
}

#[async_trait]
impl QuotaGate for PinnedBudget {
    async fn check_quota(&self, kind: QuotaKind) -> Result<QuotaDecision, TidingsError> {
        let enabled = match kind {
            QuotaKind::Embedding => self.config.embedding_enabled,
            QuotaKind::Judge => self.config.judge_enabled,
        };
        if !enabled {
            return Ok(QuotaDecision::denied(format!("{kind} globally disabled")));
        }
        let disabled = match kind {
            QuotaKind::Embedding => self.day.embedding_disabled,
            QuotaKind::Judge => self.day.judge_disabled,
        };
        if disabled {
            return Ok(QuotaDecision::denied(format!(
                "{kind} disabled in pinned snapshot"
            )));
        }
        if self.day.usd_est >= self.config.daily_cap_usd {
            return Ok(QuotaDecision::denied(format!(
                "daily cost cap ${:.2} reached in pinned snapshot",
                self.config.daily_cap_usd
            )));
        }
        Ok(QuotaDecision::allowed())
    }

    async fn record_usage(&self, _kind: QuotaKind, _tokens: u32) -> Result<(), TidingsError> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<BudgetDay, TidingsError> {
        Ok(self.day.clone())
    }
}
