// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Tidings decision pipeline.
//!
//! Consumes a relevance result and produces zero or one push decision via
//! an ordered sequence of pure state transitions: load context, rule gate,
//! bucket, AI tie-break, coalesce, emit. Every stage resolves to a valid
//! draft state; fail-closed fallbacks replace error propagation inside the
//! pipeline.

pub mod coalesce;
pub mod dedupe;
pub mod pipeline;
pub mod state;

pub use coalesce::CoalesceBuffer;
pub use dedupe::dedupe_key;
pub use pipeline::{Pipeline, bucket_for_score, emit_push_decision};
pub use state::{Bucket, Draft, PipelineInput, PipelineState, ToolCallDraft};
