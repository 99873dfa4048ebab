// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end decision flow: score computation, full pipeline runs for each
//! trigger, idempotent emission, and replay determinism.

use std::sync::Arc;

use chrono::Utc;
use tidings_budget::BudgetGovernor;
use tidings_config::model::TidingsConfig;
use tidings_core::types::{DecisionKind, DeliveryStatus, RunStatus, TriggerKind};
use tidings_kv::MemoryKv;
use tidings_runner::{Collaborators, Orchestrator};
use tidings_storage::Database;
use tidings_storage::queries::decisions;
use tidings_test_utils::{MockEmbedder, MockFeedbackStore, MockGoalStore, MockItemStore, MockJudge, fixtures};

struct World {
    orchestrator: Orchestrator,
    goals: Arc<MockGoalStore>,
    items: Arc<MockItemStore>,
    judge: Arc<MockJudge>,
    db: Database,
}

async fn world_with_config(config: TidingsConfig) -> World {
    let goals = Arc::new(MockGoalStore::new());
    let items = Arc::new(MockItemStore::new());
    let feedback = Arc::new(MockFeedbackStore::new());
    let judge = Arc::new(MockJudge::new());
    // Goal embedding along the x axis; item embeddings pick their cosine.
    let embedder = Arc::new(MockEmbedder::new(vec![1.0, 0.0]));
    let db = Database::open_in_memory().await.unwrap();
    let budget = Arc::new(BudgetGovernor::new(db.clone(), config.budget.clone()));
    let kv = Arc::new(MemoryKv::new());

    let orchestrator = Orchestrator::new(
        Collaborators {
            goals: goals.clone(),
            items: items.clone(),
            feedback,
            embedder,
            judge: judge.clone(),
            budget,
            kv,
            db: db.clone(),
        },
        config,
    );
    World {
        orchestrator,
        goals,
        items,
        judge,
        db,
    }
}

async fn world() -> World {
    world_with_config(TidingsConfig::default()).await
}

/// Item embedding at a chosen cosine against the unit-x goal embedding.
fn embedding_with_cosine(cos: f64) -> Vec<f32> {
    let sin = (1.0 - cos * cos).sqrt();
    vec![cos as f32, sin as f32]
}

async fn decision_count(db: &Database) -> i64 {
    db.connection()
        .call(|conn| conn.query_row("SELECT count(*) FROM push_decisions", [], |row| row.get(0)))
        .await
        .unwrap()
}

#[tokio::test]
async fn scenario_a_single_hit_lands_in_batch() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    let mut item = fixtures::item("i1", "src-1", "GPT-5 launch announced");
    item.embedding = Some(embedding_with_cosine(0.40)); // normalized 0.70
    w.items.insert(item);

    let record = w.orchestrator.compute_match("g1", "i1").await.unwrap();
    assert!(
        (record.score - 0.755).abs() < 1e-6,
        "expected 0.755, got {}",
        record.score
    );

    let run = w
        .orchestrator
        .run_immediate("g1", "i1", record.score, record.features, record.reasons)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.final_actions.len(), 1);
    assert_eq!(run.final_actions[0].kind, DecisionKind::Batch);
    assert_eq!(w.judge.invocations(), 0);
}

#[tokio::test]
async fn scenario_b_strong_match_pushes_immediately() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT", "launch"]));
    let mut item = fixtures::item("i1", "src-1", "GPT-5 launch announced");
    item.embedding = Some(embedding_with_cosine(0.90)); // normalized 0.95
    w.items.insert(item);

    let record = w.orchestrator.compute_match("g1", "i1").await.unwrap();
    assert!(
        (record.score - 0.96).abs() < 1e-6,
        "expected 0.96, got {}",
        record.score
    );

    let run = w
        .orchestrator
        .run_immediate("g1", "i1", record.score, record.features, record.reasons)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.final_actions[0].kind, DecisionKind::Immediate);

    // Exactly one decision row exists, addressable by its dedupe key.
    let key = &run.final_actions[0].dedupe_key;
    let stored = decisions::get_by_dedupe_key(&w.db, key).await.unwrap().unwrap();
    assert_eq!(stored.decision, DecisionKind::Immediate);
    assert_eq!(stored.status, DeliveryStatus::Pending);
    assert_eq!(decision_count(&w.db).await, 1);
}

#[tokio::test]
async fn scenario_c_blocked_source_creates_nothing() {
    let w = world().await;
    let mut goal = fixtures::goal("g1", &["GPT"]);
    goal.blocked_sources = vec!["src-1".to_string()];
    w.goals.insert(goal);
    let mut item = fixtures::item("i1", "src-1", "GPT-5 launch announced");
    item.embedding = Some(embedding_with_cosine(0.90));
    w.items.insert(item);

    let record = w.orchestrator.compute_match("g1", "i1").await.unwrap();
    assert_eq!(record.score, 0.0);

    // Arbitrary score inputs: the rule gate re-validates regardless.
    let run = w
        .orchestrator
        .run_immediate("g1", "i1", 0.99, record.features, record.reasons)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.final_actions.is_empty());
    assert_eq!(decision_count(&w.db).await, 0);
}

#[tokio::test]
async fn boundary_run_records_verdict_and_replays_clean() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    w.items
        .insert(fixtures::item("i1", "src-1", "GPT-5 launch announced"));
    w.judge.push_verdict(MockJudge::push_now());

    let run = w
        .orchestrator
        .run_immediate("g1", "i1", 0.90, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.llm_used);
    assert_eq!(run.final_actions[0].kind, DecisionKind::Immediate);
    assert!(run.budget_snapshot.is_some());

    // Replay with the pinned verdict reproduces the actions exactly.
    let result = w.orchestrator.replay(&run.id).await.unwrap();
    assert!(result.is_clean(), "diff: {:?}", result.mismatches);
    assert_eq!(result.replayed_actions.len(), 1);

    // The live judge was only invoked by the original run.
    assert_eq!(w.judge.invocations(), 1);

    // Replay re-emitted idempotently: still one row.
    assert_eq!(decision_count(&w.db).await, 1);
}

#[tokio::test]
async fn replay_of_fallback_run_reproduces_the_fallback() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    w.items
        .insert(fixtures::item("i1", "src-1", "GPT-5 launch announced"));
    w.judge.fail_next("endpoint unreachable");

    let run = w
        .orchestrator
        .run_immediate("g1", "i1", 0.90, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Fallback);
    assert_eq!(run.final_actions[0].kind, DecisionKind::Batch);

    let result = w.orchestrator.replay(&run.id).await.unwrap();
    assert!(result.is_clean(), "diff: {:?}", result.mismatches);
    assert_eq!(result.replayed_actions[0].kind, DecisionKind::Batch);
}

#[tokio::test]
async fn judge_globally_disabled_never_touches_the_endpoint() {
    let mut config = TidingsConfig::default();
    config.budget.judge_enabled = false;
    let w = world_with_config(config).await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    w.items
        .insert(fixtures::item("i1", "src-1", "GPT-5 launch announced"));

    let run = w
        .orchestrator
        .run_immediate("g1", "i1", 0.90, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(w.judge.invocations(), 0);
    assert_eq!(run.status, RunStatus::Fallback);
    assert_eq!(run.final_actions[0].kind, DecisionKind::Batch);
    assert!(!run.llm_used);
}

#[tokio::test]
async fn concurrent_identical_runs_store_one_decision() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    w.items
        .insert(fixtures::item("i1", "src-1", "GPT-5 launch announced"));

    let (a, b) = tokio::join!(
        w.orchestrator
            .run_immediate("g1", "i1", 0.96, Default::default(), Default::default()),
        w.orchestrator
            .run_immediate("g1", "i1", 0.96, Default::default(), Default::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.final_actions[0].dedupe_key, b.final_actions[0].dedupe_key);
    assert_eq!(decision_count(&w.db).await, 1);
}

#[tokio::test]
async fn missing_item_yields_a_single_error_run() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));

    let run = w
        .orchestrator
        .run_immediate("g1", "missing", 0.9, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Error);
    assert!(run.error_message.unwrap().contains("missing"));
    assert!(run.final_actions.is_empty());
    assert_eq!(decision_count(&w.db).await, 0);
}

#[tokio::test]
async fn batch_window_emits_for_stored_matches_above_threshold() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    for (id, cos) in [("i1", 0.90), ("i2", 0.40), ("i3", -0.80)] {
        let mut item = fixtures::item(id, "src-1", "GPT-5 launch announced");
        item.embedding = Some(embedding_with_cosine(cos));
        w.items.insert(item);
    }
    // Scores: i1 ~0.855, i2 ~0.755, i3 ~0.515 (below the 0.75 batch floor).
    for id in ["i1", "i2", "i3"] {
        w.orchestrator.compute_match("g1", id).await.unwrap();
    }

    let run = w
        .orchestrator
        .run_batch_window("g1", Utc::now())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.trigger, TriggerKind::BatchWindow);
    assert_eq!(run.final_actions.len(), 2);
    assert!(run.final_actions.iter().all(|a| a.kind == DecisionKind::Batch));
    assert_eq!(decision_count(&w.db).await, 2);

    // A second window proposes the same actions but creates no new rows.
    let rerun = w
        .orchestrator
        .run_batch_window("g1", Utc::now())
        .await
        .unwrap();
    assert_eq!(rerun.final_actions.len(), 2);
    assert_eq!(decision_count(&w.db).await, 2);

    // Reduced runs replay cleanly against the same stored matches.
    let result = w.orchestrator.replay(&run.id).await.unwrap();
    assert!(result.is_clean());
}

#[tokio::test]
async fn digest_uses_its_own_threshold_and_kind() {
    let w = world().await;
    w.goals.insert(fixtures::goal("g1", &["GPT"]));
    let mut item = fixtures::item("i1", "src-1", "GPT-5 launch announced");
    item.embedding = Some(embedding_with_cosine(-0.40)); // semantic 0.30, score ~0.595
    w.items.insert(item);
    w.orchestrator.compute_match("g1", "i1").await.unwrap();

    // 0.595 sits below both the batch floor (0.75) and the digest floor (0.60).
    let batch_run = w
        .orchestrator
        .run_batch_window("g1", Utc::now())
        .await
        .unwrap();
    assert!(batch_run.final_actions.is_empty());

    let digest_run = w.orchestrator.run_digest("g1").await.unwrap();
    assert_eq!(digest_run.trigger, TriggerKind::Digest);
    assert!(digest_run.final_actions.is_empty());

    // A stronger item clears the digest floor without reaching batch.
    let mut better = fixtures::item("i2", "src-1", "GPT roadmap discussion");
    better.embedding = Some(embedding_with_cosine(0.10)); // semantic 0.55, score ~0.695
    w.items.insert(better);
    w.orchestrator.compute_match("g1", "i2").await.unwrap();

    let second = w.orchestrator.run_digest("g1").await.unwrap();
    assert_eq!(second.final_actions.len(), 1);
    assert_eq!(second.final_actions[0].kind, DecisionKind::Digest);
    assert_eq!(second.final_actions[0].item_id, "i2");
}

#[tokio::test]
async fn batch_window_for_missing_goal_is_an_error_run() {
    let w = world().await;
    let run = w
        .orchestrator
        .run_batch_window("ghost", Utc::now())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Error);
    assert!(run.error_message.unwrap().contains("ghost"));
}
