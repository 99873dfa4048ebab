// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary classifier client for the Tidings decision engine.
//!
//! Implements the [`tidings_core::JudgeEndpoint`] trait against the
//! Anthropic Messages API: a single non-streaming request per verdict, a
//! JSON-only system prompt, schema validation of the structured verdict,
//! and one bounded retry for transient transport failures.

pub mod client;
pub mod types;

pub use client::AnthropicJudge;
