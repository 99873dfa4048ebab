// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API, specialized to boundary
//! classification.
//!
//! The model is asked for a single JSON object conforming to the verdict
//! schema. Transient HTTP failures (429, 5xx) retry once with exponential
//! backoff; parse or schema-validation failures surface as
//! [`TidingsError::Validation`] and are never retried -- the pipeline's
//! fail-closed fallback handles them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tidings_core::types::{JudgeRequest, JudgeVerdict, TokenUsage};
use tidings_core::{JudgeEndpoint, JudgeOutcome, TidingsError};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ApiMessage, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Backoff before the single transient-error retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// System prompt for the verdict schema. The model must default to "later"
/// with `uncertain=true` when it lacks confidence.
const JUDGE_SYSTEM_PROMPT: &str = r#"You decide whether a content item that scored in the ambiguous relevance band should be pushed to the user immediately or held for the next batch.

Respond with a single JSON object and nothing else:
{"label": "push-now" | "later", "confidence": <number 0..1>, "uncertain": <bool>, "reason": "<one sentence>", "evidence": [{"type": "term_hit" | "semantic_match" | "fresh_content" | "feedback_signal", "value": "<string>"}]}

Choose "push-now" only for clearly time-sensitive, high-value items. If you are not confident, set "uncertain": true and choose "later"."#;

/// Anthropic-backed implementation of [`JudgeEndpoint`].
///
/// Manages authentication headers, connection pooling, and retry logic for
/// transient errors.
#[derive(Debug, Clone)]
pub struct AnthropicJudge {
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
    max_retries: u32,
    base_url: String,
}

impl AnthropicJudge {
    /// Creates a new judge client.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key for authentication
    /// * `api_version` - API version string (e.g., "2023-06-01")
    /// * `model` - Model identifier for classification
    /// * `max_tokens` - Generation cap per verdict
    pub fn new(
        api_key: &str,
        api_version: &str,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, TidingsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                TidingsError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version).map_err(|e| {
                TidingsError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TidingsError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model,
            max_tokens,
            max_retries: 1,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request(&self, request: &JudgeRequest) -> MessageRequest {
        let user_content = format!(
            "Goal: {}\n\nItem title: {}\nItem snippet: {}\n\nRelevance score: {:.3}\nScoring rationale: {}",
            request.goal_description,
            request.item_title,
            request.item_snippet,
            request.score,
            request.reasons
        );
        MessageRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: user_content,
            }],
            system: Some(JUDGE_SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: 0.0,
        }
    }

    async fn send_once(&self, body: &MessageRequest) -> Result<MessageResponse, SendError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let transient = e.is_timeout() || e.is_connect();
                SendError {
                    error: TidingsError::Provider {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    },
                    transient,
                }
            })?;

        let status = response.status();
        debug!(status = %status, "judge response received");

        if status.is_success() {
            return response.json::<MessageResponse>().await.map_err(|e| SendError {
                error: TidingsError::Provider {
                    message: format!("malformed response envelope: {e}"),
                    source: Some(Box::new(e)),
                },
                transient: false,
            });
        }

        let transient = is_transient_status(status);
        let body_text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body_text) {
            Ok(api_err) => format!(
                "Anthropic API error ({}): {}",
                api_err.error.type_, api_err.error.message
            ),
            Err(_) => format!("API returned {status}: {body_text}"),
        };
        Err(SendError {
            error: TidingsError::Provider {
                message,
                source: None,
            },
            transient,
        })
    }
}

struct SendError {
    error: TidingsError,
    transient: bool,
}

/// 429 and 5xx responses are worth one retry.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Extract the verdict JSON from the response's first text block and
/// validate it against the schema.
fn parse_verdict(response: &MessageResponse) -> Result<JudgeVerdict, TidingsError> {
    let text = response
        .content
        .iter()
        .find(|block| block.block_type == "text")
        .map(|block| block.text.trim())
        .ok_or_else(|| TidingsError::Validation("response has no text block".to_string()))?;

    // Tolerate a fenced code block around the JSON object.
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(text);

    let verdict: JudgeVerdict = serde_json::from_str(text)
        .map_err(|e| TidingsError::Validation(format!("verdict does not match schema: {e}")))?;

    if !(0.0..=1.0).contains(&verdict.confidence) {
        return Err(TidingsError::Validation(format!(
            "confidence {} outside [0, 1]",
            verdict.confidence
        )));
    }

    Ok(verdict)
}

#[async_trait]
impl JudgeEndpoint for AnthropicJudge {
    async fn classify(&self, request: &JudgeRequest) -> Result<JudgeOutcome, TidingsError> {
        let body = self.build_request(request);

        let mut last_error: Option<TidingsError> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(attempt, ?delay, "retrying judge request after transient error");
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&body).await {
                Ok(response) => {
                    let verdict = parse_verdict(&response)?;
                    debug!(
                        label = ?verdict.label,
                        confidence = verdict.confidence,
                        uncertain = verdict.uncertain,
                        "verdict parsed"
                    );
                    return Ok(JudgeOutcome {
                        verdict,
                        usage: TokenUsage {
                            input_tokens: response.usage.input_tokens,
                            output_tokens: response.usage.output_tokens,
                        },
                    });
                }
                Err(send_error) => {
                    if send_error.transient && attempt < self.max_retries {
                        last_error = Some(send_error.error);
                        continue;
                    }
                    return Err(send_error.error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TidingsError::Internal("judge retry loop exited without result".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tidings_core::types::JudgeLabel;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn judge_for(server: &MockServer) -> AnthropicJudge {
        AnthropicJudge::new(
            "test-key",
            "2023-06-01",
            "claude-haiku-4-5-20250901".to_string(),
            512,
        )
        .unwrap()
        .with_base_url(format!("{}/v1/messages", server.uri()))
    }

    fn sample_request() -> JudgeRequest {
        JudgeRequest {
            goal_description: "major AI model launches".to_string(),
            item_title: "GPT-5 launch announced".to_string(),
            item_snippet: "OpenAI announced...".to_string(),
            score: 0.90,
            reasons: "1 must-term hit (GPT); fresh content".to_string(),
        }
    }

    fn api_response(verdict_json: serde_json::Value) -> serde_json::Value {
        json!({
            "content": [{"type": "text", "text": verdict_json.to_string()}],
            "usage": {"input_tokens": 250, "output_tokens": 60},
            "stop_reason": "end_turn"
        })
    }

    fn push_now_verdict() -> serde_json::Value {
        json!({
            "label": "push-now",
            "confidence": 0.85,
            "uncertain": false,
            "reason": "major product launch, time sensitive",
            "evidence": [{"type": "term_hit", "value": "GPT"}]
        })
    }

    #[tokio::test]
    async fn classify_parses_structured_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_response(push_now_verdict())))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = judge_for(&server).classify(&sample_request()).await.unwrap();
        assert_eq!(outcome.verdict.label, JudgeLabel::PushNow);
        assert!((outcome.verdict.confidence - 0.85).abs() < f64::EPSILON);
        assert!(!outcome.verdict.uncertain);
        assert_eq!(outcome.usage.input_tokens, 250);
        assert_eq!(outcome.usage.output_tokens, 60);
    }

    #[tokio::test]
    async fn request_carries_score_and_reasons() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(move |req: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let content = body["messages"][0]["content"].as_str().unwrap();
                assert!(content.contains("0.900"));
                assert!(content.contains("GPT-5 launch announced"));
                assert_eq!(body["temperature"], 0.0);
                assert!(
                    body["system"]
                        .as_str()
                        .unwrap()
                        .contains("\"uncertain\": true")
                );
                ResponseTemplate::new(200).set_body_json(api_response(push_now_verdict()))
            })
            .mount(&server)
            .await;

        judge_for(&server).classify(&sample_request()).await.unwrap();
    }

    #[tokio::test]
    async fn fenced_json_is_tolerated() {
        let server = MockServer::start().await;
        let fenced = format!("```json\n{}\n```", push_now_verdict());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": fenced}],
                "usage": {"input_tokens": 10, "output_tokens": 10}
            })))
            .mount(&server)
            .await;

        let outcome = judge_for(&server).classify(&sample_request()).await.unwrap();
        assert_eq!(outcome.verdict.label, JudgeLabel::PushNow);
    }

    #[tokio::test]
    async fn malformed_verdict_is_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "I think you should push it."}],
                "usage": {"input_tokens": 10, "output_tokens": 10}
            })))
            .expect(1) // no retry for validation failures
            .mount(&server)
            .await;

        let err = judge_for(&server).classify(&sample_request()).await.unwrap_err();
        assert!(matches!(err, TidingsError::Validation(_)));
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_validation_error() {
        let server = MockServer::start().await;
        let verdict = json!({
            "label": "later",
            "confidence": 1.7,
            "uncertain": false,
            "reason": "x",
            "evidence": []
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_response(verdict)))
            .mount(&server)
            .await;

        let err = judge_for(&server).classify(&sample_request()).await.unwrap_err();
        assert!(matches!(err, TidingsError::Validation(_)));
    }

    #[tokio::test]
    async fn transient_error_retries_once_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_response(push_now_verdict())))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = judge_for(&server).classify(&sample_request()).await.unwrap();
        assert_eq!(outcome.verdict.label, JudgeLabel::PushNow);
    }

    #[tokio::test]
    async fn non_transient_error_does_not_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "invalid_request_error", "message": "bad request"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = judge_for(&server).classify(&sample_request()).await.unwrap_err();
        match err {
            TidingsError::Provider { message, .. } => {
                assert!(message.contains("invalid_request_error"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2) // initial attempt + one retry
            .mount(&server)
            .await;

        let err = judge_for(&server).classify(&sample_request()).await.unwrap_err();
        assert!(matches!(err, TidingsError::Provider { .. }));
    }
}
