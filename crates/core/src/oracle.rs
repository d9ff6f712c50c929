//! Client for the remote multimodal model.
//!
//! The model is reached through an OpenAI-compatible chat-completions endpoint. Every call is
//! independent and at-most-once: no retries, no caching, transport-default timeouts.

use crate::body_part::BodyPart;
use crate::config::{AnalysisScope, OracleConfig};
use crate::constants::GATEWAY_API_KEY_VAR;
use crate::prompts;
use crate::verdict::parse_verdict;
use crate::{AnalysisError, AnalysisOutcome};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use vdd_types::NonEmptyText;

/// Capability interface over the remote model.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Ask whether `image` shows `part`.
    async fn validate(&self, image: &NonEmptyText, part: BodyPart) -> AnalysisOutcome<bool>;

    /// Ask for a deficiency analysis; returns the raw textual payload.
    async fn classify(&self, image: &NonEmptyText, part: BodyPart) -> AnalysisOutcome<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(String),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

/// [`Oracle`] backed by the AI gateway over HTTP.
#[derive(Clone)]
pub struct GatewayOracle {
    client: Client,
    config: OracleConfig,
    scope: AnalysisScope,
}

impl GatewayOracle {
    pub fn new(config: OracleConfig, scope: AnalysisScope) -> Self {
        Self {
            client: Client::new(),
            config,
            scope,
        }
    }

    fn bearer(&self) -> AnalysisOutcome<&str> {
        self.config
            .api_key()
            .ok_or(AnalysisError::MissingCredential(GATEWAY_API_KEY_VAR))
    }

    fn user_turn<'a>(text: String, image: &'a NonEmptyText) -> ChatMessage<'a> {
        ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text { text },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.as_str(),
                    },
                },
            ]),
        }
    }

    async fn post(&self, request: &ChatRequest<'_>) -> AnalysisOutcome<reqwest::Response> {
        let key = self.bearer()?;
        let resp = self
            .client
            .post(self.config.endpoint().clone())
            .bearer_auth(key)
            .json(request)
            .send()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl Oracle for GatewayOracle {
    async fn validate(&self, image: &NonEmptyText, part: BodyPart) -> AnalysisOutcome<bool> {
        debug!(body_part = %part, "validating image");
        let request = ChatRequest {
            model: self.config.model(),
            messages: vec![Self::user_turn(prompts::validation_prompt(part), image)],
            response_format: None,
        };

        let resp = self.post(&request).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, %body, "validation call failed");
            return Err(AnalysisError::Validation {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let answer = match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) => parsed.first_content().unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "validation response was not a chat completion");
                String::new()
            }
        };
        let verdict = parse_verdict(&answer);
        debug!(body_part = %part, answer = %answer.trim(), verdict, "validation answered");
        Ok(verdict)
    }

    async fn classify(&self, image: &NonEmptyText, part: BodyPart) -> AnalysisOutcome<String> {
        debug!(body_part = %part, "requesting deficiency analysis");
        let request = ChatRequest {
            model: self.config.model(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(prompts::system_prompt(&self.scope)),
                },
                Self::user_turn(prompts::analysis_instruction(part, &self.scope), image),
            ],
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let resp = self.post(&request).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, %body, "AI gateway error");
            return Err(classify_failure(status));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .first_content()
            .ok_or_else(|| AnalysisError::MalformedResponse("no message content".into()))?;
        debug!(raw = %content, "raw analysis response");
        Ok(content)
    }
}

/// Map a non-success gateway status onto the fault taxonomy.
pub fn classify_failure(status: StatusCode) -> AnalysisError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => AnalysisError::PaymentRequired,
        other => AnalysisError::Gateway {
            status: other.as_u16(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn oracle_for(server: &MockServer, key: Option<&str>) -> GatewayOracle {
        let cfg = OracleConfig::new(
            &server.url("/v1/chat/completions"),
            "test-model",
            key.map(str::to_string),
        )
        .unwrap();
        GatewayOracle::new(cfg, AnalysisScope::default())
    }

    fn image() -> NonEmptyText {
        NonEmptyText::new(IMAGE).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[tokio::test]
    async fn validate_sends_question_and_image_with_bearer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer k1")
                    .body_contains("Is this image showing human nails?")
                    .body_contains("Answer with only 'yes' or 'no'.")
                    .body_contains(IMAGE)
                    .body_contains("\"image_url\"");
                then.status(200)
                    .json_body(completion("Yes, this shows fingernails."));
            })
            .await;

        let verdict = oracle_for(&server, Some("k1"))
            .validate(&image(), BodyPart::Nails)
            .await
            .unwrap();

        assert!(verdict);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn validate_negative_and_malformed_answers_are_false() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("human tongue");
                then.status(200).json_body(completion("No."));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("human eye");
                then.status(200).body("not json at all");
            })
            .await;

        let oracle = oracle_for(&server, Some("k"));
        assert!(!oracle.validate(&image(), BodyPart::Tongue).await.unwrap());
        assert!(!oracle.validate(&image(), BodyPart::Eyes).await.unwrap());
    }

    #[tokio::test]
    async fn validate_non_success_is_a_validation_fault() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503);
            })
            .await;

        let err = oracle_for(&server, Some("k"))
            .validate(&image(), BodyPart::Skin)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { status: 503 }));
    }

    #[tokio::test]
    async fn missing_credential_makes_no_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(completion("yes"));
            })
            .await;

        let oracle = oracle_for(&server, None);
        let err = oracle.validate(&image(), BodyPart::Nails).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCredential(_)));
        let err = oracle.classify(&image(), BodyPart::Nails).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCredential(_)));
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn classify_requests_json_and_returns_raw_content() {
        let server = MockServer::start_async().await;
        let payload = r#"{"deficiencies":[],"overall_health":"fine"}"#;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .json_body_partial(r#"{"response_format":{"type":"json_object"}}"#)
                    .body_contains("\"role\":\"system\"")
                    .body_contains("Analyze this nail image ONLY");
                then.status(200).json_body(completion(payload));
            })
            .await;

        let raw = oracle_for(&server, Some("k"))
            .classify(&image(), BodyPart::Nails)
            .await
            .unwrap();

        assert_eq!(raw, payload);
        mock.assert_async().await;
    }

    async fn classify_against_status(status: u16) -> AnalysisError {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(status).body("upstream says no");
            })
            .await;

        oracle_for(&server, Some("k"))
            .classify(&image(), BodyPart::Eyes)
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn classify_maps_gateway_statuses() {
        assert!(matches!(
            classify_against_status(429).await,
            AnalysisError::RateLimited
        ));
        assert!(matches!(
            classify_against_status(402).await,
            AnalysisError::PaymentRequired
        ));
        assert!(matches!(
            classify_against_status(500).await,
            AnalysisError::Gateway { status: 500 }
        ));
        assert!(matches!(
            classify_against_status(401).await,
            AnalysisError::Gateway { status: 401 }
        ));
    }

    #[tokio::test]
    async fn classify_without_choices_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let err = oracle_for(&server, Some("k"))
            .classify(&image(), BodyPart::Skin)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }
}
