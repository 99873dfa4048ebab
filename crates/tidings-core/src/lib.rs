// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tidings decision engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Tidings workspace. Concrete collaborator
//! implementations (SQLite storage, in-process KV, the Anthropic judge
//! client) live in sibling crates and implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TidingsError;
pub use traits::{
    EmbeddingOutput, EmbeddingSource, FeedbackStore, GoalStore, ItemStore, JudgeEndpoint,
    JudgeOutcome, KeyValueStore,
};
