// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only store traits for goals, content items, and feedback history.

use async_trait::async_trait;

use crate::error::TidingsError;
use crate::types::{ContentItem, FeedbackEntry, Goal};

/// Read access to interest goals. Goal mutation belongs to the
/// goal-management collaborator.
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// All goals currently in the active lifecycle state.
    async fn get_active(&self) -> Result<Vec<Goal>, TidingsError>;

    /// Fetch one goal by id, regardless of lifecycle state.
    async fn get_by_id(&self, id: &str) -> Result<Option<Goal>, TidingsError>;
}

/// Read access to ingested content items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>, TidingsError>;
}

/// Read access to like/dislike history, scoped per goal.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn list_by_goal(&self, goal_id: &str) -> Result<Vec<FeedbackEntry>, TidingsError>;
}
