// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tidings integration tests.
//!
//! Provides mock collaborators and fixture builders for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockGoalStore`] / [`MockItemStore`] / [`MockFeedbackStore`] - in-memory stores
//! - [`MockJudge`] - scripted boundary classifier with an invocation counter
//! - [`MockEmbedder`] - fixed-vector embedding source
//! - [`fixtures`] - goal/item builders shared across test suites

pub mod fixtures;
pub mod mock_judge;
pub mod mock_stores;

pub use mock_judge::{MockEmbedder, MockJudge};
pub use mock_stores::{MockFeedbackStore, MockGoalStore, MockItemStore};
