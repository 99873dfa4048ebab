// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Tidings decision core.
//!
//! Goal/item/feedback stores, the embedding source, the AI judge endpoint,
//! and the key-value primitive are all external collaborators. The core
//! consumes them through these traits; concrete implementations live in
//! sibling crates (`tidings-storage`, `tidings-kv`, `tidings-judge`) or in
//! test mocks.

pub mod embedding;
pub mod judge;
pub mod kv;
pub mod stores;

pub use embedding::{EmbeddingOutput, EmbeddingSource};
pub use judge::{JudgeEndpoint, JudgeOutcome};
pub use kv::KeyValueStore;
pub use stores::{FeedbackStore, GoalStore, ItemStore};
