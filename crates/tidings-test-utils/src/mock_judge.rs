// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted judge endpoint and embedding source for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tidings_core::types::{JudgeLabel, JudgeRequest, JudgeVerdict, TokenUsage};
use tidings_core::{
    EmbeddingOutput, EmbeddingSource, JudgeEndpoint, JudgeOutcome, TidingsError,
};

/// A scripted [`JudgeEndpoint`] with an invocation counter.
///
/// Responses are consumed FIFO; with an empty script every call returns a
/// confident "later". Use [`MockJudge::fail_next`] to script an error.
#[derive(Default)]
pub struct MockJudge {
    script: Mutex<VecDeque<Result<JudgeVerdict, String>>>,
    invocations: AtomicUsize,
}

impl MockJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a verdict for the next call.
    pub fn push_verdict(&self, verdict: JudgeVerdict) {
        self.script.lock().unwrap().push_back(Ok(verdict));
    }

    /// Queue a provider failure for the next call.
    pub fn fail_next(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// How many times `classify` was called.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// A confident push-now verdict.
    pub fn push_now() -> JudgeVerdict {
        JudgeVerdict {
            label: JudgeLabel::PushNow,
            confidence: 0.9,
            uncertain: false,
            reason: "clearly time-sensitive".to_string(),
            evidence: vec![],
        }
    }

    /// A confident later verdict.
    pub fn later() -> JudgeVerdict {
        JudgeVerdict {
            label: JudgeLabel::Later,
            confidence: 0.8,
            uncertain: false,
            reason: "can wait for the batch".to_string(),
            evidence: vec![],
        }
    }
}

#[async_trait]
impl JudgeEndpoint for MockJudge {
    async fn classify(&self, _request: &JudgeRequest) -> Result<JudgeOutcome, TidingsError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(verdict)) => Ok(JudgeOutcome {
                verdict,
                usage: TokenUsage {
                    input_tokens: 250,
                    output_tokens: 60,
                },
            }),
            Some(Err(message)) => Err(TidingsError::Provider {
                message,
                source: None,
            }),
            None => Ok(JudgeOutcome {
                verdict: Self::later(),
                usage: TokenUsage {
                    input_tokens: 250,
                    output_tokens: 60,
                },
            }),
        }
    }
}

/// An [`EmbeddingSource`] returning a fixed vector.
pub struct MockEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingSource for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<EmbeddingOutput, TidingsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingOutput {
            vector: self.vector.clone(),
            tokens: 128,
        })
    }
}
