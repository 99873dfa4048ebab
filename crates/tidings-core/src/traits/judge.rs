// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary classifier endpoint trait.

use async_trait::async_trait;

use crate::error::TidingsError;
use crate::types::{JudgeRequest, JudgeVerdict, TokenUsage};

/// A structured verdict plus the token usage billed for producing it.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub verdict: JudgeVerdict,
    pub usage: TokenUsage,
}

/// AI-assisted binary classifier for scores in the ambiguous band.
///
/// Implementations must return a schema-valid verdict or an error; the
/// pipeline's BoundaryJudge stage converts every error into a fail-closed
/// Batch bucket and never lets one propagate.
#[async_trait]
pub trait JudgeEndpoint: Send + Sync {
    async fn classify(&self, request: &JudgeRequest) -> Result<JudgeOutcome, TidingsError>;
}
