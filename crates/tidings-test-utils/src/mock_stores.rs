// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory goal/item/feedback stores for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tidings_core::types::{ContentItem, FeedbackEntry, Goal, GoalStatus};
use tidings_core::{FeedbackStore, GoalStore, ItemStore, TidingsError};

/// In-memory [`GoalStore`].
#[derive(Default)]
pub struct MockGoalStore {
    goals: Mutex<HashMap<String, Goal>>,
}

impl MockGoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, goal: Goal) {
        self.goals.lock().unwrap().insert(goal.id.clone(), goal);
    }
}

#[async_trait]
impl GoalStore for MockGoalStore {
    async fn get_active(&self) -> Result<Vec<Goal>, TidingsError> {
        let mut goals: Vec<Goal> = self
            .goals
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.status == GoalStatus::Active)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(goals)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Goal>, TidingsError> {
        Ok(self.goals.lock().unwrap().get(id).cloned())
    }
}

/// In-memory [`ItemStore`].
#[derive(Default)]
pub struct MockItemStore {
    items: Mutex<HashMap<String, ContentItem>>,
}

impl MockItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: ContentItem) {
        self.items.lock().unwrap().insert(item.id.clone(), item);
    }
}

#[async_trait]
impl ItemStore for MockItemStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>, TidingsError> {
        Ok(self.items.lock().unwrap().get(id).cloned())
    }
}

/// In-memory [`FeedbackStore`].
#[derive(Default)]
pub struct MockFeedbackStore {
    entries: Mutex<Vec<FeedbackEntry>>,
}

impl MockFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: FeedbackEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl FeedbackStore for MockFeedbackStore {
    async fn list_by_goal(&self, goal_id: &str) -> Result<Vec<FeedbackEntry>, TidingsError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.goal_id == goal_id)
            .cloned()
            .collect())
    }
}
