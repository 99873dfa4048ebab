// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relevance engine: weighted scoring of a (content item, goal) pair.
//!
//! Blocking rules are evaluated first and short-circuit to score 0. The
//! score is a fixed weighted sum of four normalized signals (semantic,
//! keyword, recency, source trust) plus a bounded feedback boost, clamped
//! to [0, 1]. Every scoring pass also produces a human-readable summary and
//! typed evidence for downstream explanation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tidings_budget::QuotaGate;
use tidings_config::model::ScoringConfig;
use tidings_core::types::{
    ContentItem, Evidence, EvidenceKind, FeedbackEntry, Goal, MatchReasons, PriorityMode,
    QuotaKind,
};
use tidings_core::{EmbeddingSource, TidingsError};
use tracing::{debug, warn};

use crate::cache::GoalEmbeddingCache;
use crate::feedback::feedback_boost;
use crate::keywords::{keyword_score, matching_terms};
use crate::recency::recency_score;
use crate::types::{BlockReason, MatchResult, cosine_similarity};

/// Trust signal baseline for sources with no curated trust data.
const SOURCE_TRUST_BASELINE: f64 = 0.8;

/// Semantic signal substituted when the goal embedding cannot be obtained
/// (budget denied or provider failure).
const SEMANTIC_NEUTRAL: f64 = 0.5;

/// The item text scanned for term hits.
pub fn searchable_text(item: &ContentItem) -> String {
    format!("{}\n{}\n{}", item.title, item.snippet, item.summary)
}

/// Blocking policy, evaluated before scoring. Precedence is fixed:
/// blocked source, then negative term, then STRICT must-term miss.
///
/// This is the single implementation shared by the engine and the
/// pipeline's rule gate, so the two call paths cannot disagree on order.
pub fn check_blocked(goal: &Goal, item: &ContentItem) -> Option<BlockReason> {
    if goal.blocked_sources.iter().any(|s| s == &item.source_id) {
        return Some(BlockReason::BlockedSource {
            source_id: item.source_id.clone(),
        });
    }
    let text = searchable_text(item);
    if let Some(term) = matching_terms(&text, &goal.negative_terms).first() {
        return Some(BlockReason::NegativeTerm {
            term: (*term).to_string(),
        });
    }
    if goal.priority_mode == PriorityMode::Strict
        && !goal.must_terms.is_empty()
        && matching_terms(&text, &goal.must_terms).is_empty()
    {
        return Some(BlockReason::StrictMustTermMiss);
    }
    None
}

/// Weighted relevance scorer with a KV-cached goal embedding.
pub struct RelevanceEngine {
    embedder: Arc<dyn EmbeddingSource>,
    budget: Arc<dyn QuotaGate>,
    cache: GoalEmbeddingCache,
    config: ScoringConfig,
}

impl RelevanceEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingSource>,
        budget: Arc<dyn QuotaGate>,
        cache: GoalEmbeddingCache,
        config: ScoringConfig,
    ) -> Self {
        Self {
            embedder,
            budget,
            cache,
            config,
        }
    }

    /// Score `item` against `goal` using the goal-scoped feedback history.
    pub async fn score(
        &self,
        item: &ContentItem,
        goal: &Goal,
        history: &[FeedbackEntry],
    ) -> Result<MatchResult, TidingsError> {
        self.score_at(item, goal, history, Utc::now()).await
    }

    /// Score with an explicit evaluation time. Exposed for deterministic tests.
    pub async fn score_at(
        &self,
        item: &ContentItem,
        goal: &Goal,
        history: &[FeedbackEntry],
        now: DateTime<Utc>,
    ) -> Result<MatchResult, TidingsError> {
        if let Some(reason) = check_blocked(goal, item) {
            debug!(goal_id = %goal.id, item_id = %item.id, %reason, "item blocked");
            return Ok(MatchResult {
                score: 0.0,
                features: BTreeMap::new(),
                reasons: MatchReasons {
                    summary: reason.to_string(),
                    evidence: vec![],
                },
                blocked: true,
                block_reason: Some(reason.to_string()),
            });
        }

        let text = searchable_text(item);
        let hits = matching_terms(&text, &goal.must_terms);
        let keyword = keyword_score(hits.len());

        let semantic = match &item.embedding {
            None => 0.0,
            Some(item_vec) => match self.goal_embedding(goal).await {
                Some(goal_vec) => {
                    // Remap cosine from [-1, 1] to [0, 1].
                    (cosine_similarity(item_vec, &goal_vec) + 1.0) / 2.0
                }
                None => SEMANTIC_NEUTRAL,
            },
        };

        let recency = recency_score(&item.published_at, now, &self.config);
        let trust = SOURCE_TRUST_BASELINE;
        let boost = feedback_boost(history, &item.source_id, self.config.feedback_boost_max);

        let weighted = self.config.semantic_weight * semantic
            + self.config.keyword_weight * keyword
            + self.config.recency_weight * recency
            + self.config.trust_weight * trust;
        let score = (weighted + boost).clamp(0.0, 1.0);

        let mut features = BTreeMap::new();
        features.insert("semantic".to_string(), semantic);
        features.insert("keyword".to_string(), keyword);
        features.insert("recency".to_string(), recency);
        features.insert("trust".to_string(), trust);
        features.insert("feedback_boost".to_string(), boost);

        let reasons = build_reasons(&hits, semantic, recency, boost, item.embedding.is_some());

        Ok(MatchResult {
            score,
            features,
            reasons,
            blocked: false,
            block_reason: None,
        })
    }

    /// The goal's embedding: cache hit, or generate under the embedding
    /// quota. Any failure resolves to `None` and the caller substitutes the
    /// neutral semantic signal.
    async fn goal_embedding(&self, goal: &Goal) -> Option<Vec<f32>> {
        match self.cache.get(goal).await {
            Ok(Some(vector)) => return Some(vector),
            Ok(None) => {}
            Err(e) => {
                warn!(goal_id = %goal.id, error = %e, "embedding cache read failed");
            }
        }

        match self.budget.check_quota(QuotaKind::Embedding).await {
            Ok(decision) if decision.allowed => {}
            Ok(decision) => {
                warn!(
                    goal_id = %goal.id,
                    reason = decision.reason.as_deref().unwrap_or("unknown"),
                    "embedding quota denied, using neutral semantic signal"
                );
                return None;
            }
            Err(e) => {
                warn!(goal_id = %goal.id, error = %e, "embedding quota check failed");
                return None;
            }
        }

        let input = format!("{}\n{}", goal.name, goal.description);
        match self.embedder.embed(&input).await {
            Ok(output) => {
                if let Err(e) = self
                    .budget
                    .record_usage(QuotaKind::Embedding, output.tokens)
                    .await
                {
                    warn!(goal_id = %goal.id, error = %e, "embedding usage recording failed");
                }
                if let Err(e) = self.cache.put(goal, &output.vector).await {
                    warn!(goal_id = %goal.id, error = %e, "embedding cache write failed");
                }
                Some(output.vector)
            }
            Err(e) => {
                warn!(goal_id = %goal.id, error = %e, "embedding generation failed");
                None
            }
        }
    }
}

/// Assemble the human-readable summary and typed evidence list.
fn build_reasons(
    hits: &[&str],
    semantic: f64,
    recency: f64,
    boost: f64,
    has_embedding: bool,
) -> MatchReasons {
    let mut evidence = Vec::new();
    let mut parts = Vec::new();

    if !hits.is_empty() {
        parts.push(format!(
            "{} must-term hit{} ({})",
            hits.len(),
            if hits.len() == 1 { "" } else { "s" },
            hits.join(", ")
        ));
        for term in hits {
            evidence.push(Evidence {
                kind: EvidenceKind::TermHit,
                value: (*term).to_string(),
            });
        }
    }

    if has_embedding && semantic >= 0.7 {
        parts.push(format!("strong semantic match ({semantic:.2})"));
        evidence.push(Evidence {
            kind: EvidenceKind::SemanticMatch,
            value: format!("{semantic:.2}"),
        });
    }

    if recency >= 0.9 {
        parts.push("fresh content".to_string());
        evidence.push(Evidence {
            kind: EvidenceKind::FreshContent,
            value: format!("{recency:.2}"),
        });
    }

    if boost.abs() > 1e-9 {
        parts.push(format!("source feedback {boost:+.2}"));
        evidence.push(Evidence {
            kind: EvidenceKind::FeedbackSignal,
            value: format!("{boost:+.2}"),
        });
    }

    let summary = if parts.is_empty() {
        "weak match across all signals".to_string()
    } else {
        parts.join("; ")
    };

    MatchReasons { summary, evidence }
}
