// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run orchestration for the Tidings decision engine.
//!
//! The [`Orchestrator`] is the process-level entry point: it owns the
//! relevance engine and the decision pipeline, exposes one operation per
//! trigger kind (new match, batch window, daily digest), persists an
//! auditable run record per invocation, and supports deterministic replay
//! of any persisted run.

pub mod orchestrator;
pub mod replay;

pub use orchestrator::{Collaborators, Orchestrator};
pub use replay::{PinnedJudge, ReplayMismatch, ReplayResult, diff_actions};
