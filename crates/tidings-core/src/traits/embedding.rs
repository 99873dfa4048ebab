// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding source trait for goal-embedding generation.

use async_trait::async_trait;

use crate::error::TidingsError;

/// An embedding vector plus the token count billed for generating it.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub vector: Vec<f32>,
    pub tokens: u32,
}

/// Generates embedding vectors for text. Every call consumes embedding
/// quota, so callers must pass a Budget Governor admission check before
/// invoking this.
#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, TidingsError>;
}
