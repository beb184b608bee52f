//! Submission endpoint discovery and answer dispatch.
//!
//! The submission endpoint is not part of the inbound request; it is
//! discovered per cycle by asking the LLM to extract a POST URL from the
//! rendered page text. An unusable extraction falls back to the configured
//! URL, or terminates the chain when no fallback is configured — the
//! dispatcher never posts to a made-up placeholder.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::llm::{ChatMessage, LlmClient};
use crate::render::RenderedPage;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no submission endpoint could be discovered and no fallback is configured")]
    NoEndpoint,

    #[error("submission request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("submission response was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// JSON body POSTed to the discovered endpoint. `answer` serializes as
/// `null` when no answer was computed; the payload is always sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub email: String,
    pub secret: String,
    pub url: String,
    pub answer: Option<Value>,
}

/// JSON response from the submission endpoint. All fields are optional;
/// anything missing counts against continuation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionResult {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub correct: Option<bool>,

    /// URL of the next quiz in the chain, if one is offered
    #[serde(default, rename = "url")]
    pub next_url: Option<String>,
}

impl SubmissionResult {
    /// The next URL to render, iff the answer was confirmed correct and a
    /// non-empty continuation URL was offered.
    pub fn continuation(&self) -> Option<&str> {
        match (self.correct, self.next_url.as_deref()) {
            (Some(true), Some(url)) if !url.is_empty() => Some(url),
            _ => None,
        }
    }
}

/// Discovers the submission endpoint and POSTs the computed answer.
pub struct SubmissionDispatcher {
    llm: Arc<dyn LlmClient>,
    model: String,
    http: reqwest::Client,
    timeout: Duration,
    fallback_url: Option<String>,
}

impl SubmissionDispatcher {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: String,
        timeout: Duration,
        fallback_url: Option<String>,
    ) -> Self {
        Self {
            llm,
            model,
            http: reqwest::Client::new(),
            timeout,
            fallback_url,
        }
    }

    /// Ask the LLM where the answer should be POSTed.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::NoEndpoint` when the extraction yields nothing
    /// that parses as an http(s) URL and no fallback is configured.
    pub async fn discover_endpoint(&self, page: &RenderedPage) -> Result<String, SubmitError> {
        let prompt = build_extraction_prompt(&page.body_text);

        let extracted = match self
            .llm
            .chat_completion(&self.model, &[ChatMessage::user(prompt)])
            .await
        {
            Ok(response) => response.text().to_string(),
            Err(e) => {
                tracing::warn!(transient = e.is_transient(), "Endpoint extraction failed: {}", e);
                String::new()
            }
        };

        if is_http_url(&extracted) {
            return Ok(extracted);
        }

        match &self.fallback_url {
            Some(fallback) => {
                tracing::warn!(
                    "No submission URL found on page, using configured fallback {}",
                    fallback
                );
                Ok(fallback.clone())
            }
            None => Err(SubmitError::NoEndpoint),
        }
    }

    /// POST the payload and parse the endpoint's JSON response.
    pub async fn submit(
        &self,
        endpoint: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionResult, SubmitError> {
        tracing::info!(endpoint = %endpoint, "Submitting answer");

        let response = self
            .http
            .post(endpoint)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;

        let body = response.text().await?;
        let result: SubmissionResult = serde_json::from_str(&body)?;

        tracing::info!(
            correct = ?result.correct,
            next_url = ?result.next_url,
            "Submission response received"
        );
        Ok(result)
    }
}

fn build_extraction_prompt(page_text: &str) -> String {
    format!(
        r#"Analyze this text and extract the URL where the quiz answer must be POSTed.
Return ONLY the URL as a plain string, nothing else.

TEXT:
{page_text}"#
    )
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, LlmError};
    use async_trait::async_trait;

    struct CannedLlm(String);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
        ) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                content: Some(self.0.clone()),
                usage: None,
            })
        }
    }

    fn page() -> RenderedPage {
        RenderedPage {
            source_url: "https://quiz.example/task1".to_string(),
            body_text: "POST your answer to https://quiz.example/submit".to_string(),
        }
    }

    fn dispatcher(llm_reply: &str, fallback: Option<&str>) -> SubmissionDispatcher {
        SubmissionDispatcher::new(
            Arc::new(CannedLlm(llm_reply.to_string())),
            "test-model".to_string(),
            Duration::from_secs(10),
            fallback.map(str::to_string),
        )
    }

    #[test]
    fn url_validation() {
        assert!(is_http_url("https://quiz.example/submit"));
        assert!(is_http_url("http://127.0.0.1:8080/answers"));
        assert!(!is_http_url("ftp://quiz.example/submit"));
        assert!(!is_http_url("submit the answer here"));
        assert!(!is_http_url(""));
    }

    #[test]
    fn continuation_requires_correct_and_url() {
        let both = SubmissionResult {
            success: Some(true),
            correct: Some(true),
            next_url: Some("https://next.example/task2".to_string()),
        };
        assert_eq!(both.continuation(), Some("https://next.example/task2"));

        let incorrect = SubmissionResult {
            correct: Some(false),
            next_url: Some("https://next.example/task2".to_string()),
            ..Default::default()
        };
        assert_eq!(incorrect.continuation(), None);

        let no_url = SubmissionResult {
            correct: Some(true),
            ..Default::default()
        };
        assert_eq!(no_url.continuation(), None);

        let empty_url = SubmissionResult {
            correct: Some(true),
            next_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(empty_url.continuation(), None);

        assert_eq!(SubmissionResult::default().continuation(), None);
    }

    #[test]
    fn result_parses_lenient_json() {
        let full: SubmissionResult =
            serde_json::from_str(r#"{"correct": true, "url": "https://next.example/task2"}"#)
                .expect("parse");
        assert_eq!(full.continuation(), Some("https://next.example/task2"));

        let sparse: SubmissionResult = serde_json::from_str(r#"{"correct": false}"#).expect("parse");
        assert_eq!(sparse.continuation(), None);

        let empty: SubmissionResult = serde_json::from_str("{}").expect("parse");
        assert_eq!(empty.continuation(), None);
    }

    #[test]
    fn payload_round_trips_including_null_answer() {
        let payload = SubmissionPayload {
            email: "student@example.com".to_string(),
            secret: "s3cret".to_string(),
            url: "https://quiz.example/task1".to_string(),
            answer: None,
        };
        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(json.contains(r#""answer":null"#));
        let back: SubmissionPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, payload);

        let with_answer = SubmissionPayload {
            answer: Some(Value::from(42)),
            ..payload
        };
        let json = serde_json::to_string(&with_answer).expect("serialize");
        let back: SubmissionPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, with_answer);
    }

    #[tokio::test]
    async fn extracted_url_is_used() {
        let d = dispatcher("https://quiz.example/submit", None);
        let endpoint = d.discover_endpoint(&page()).await.expect("endpoint");
        assert_eq!(endpoint, "https://quiz.example/submit");
    }

    #[tokio::test]
    async fn garbage_extraction_uses_fallback() {
        let d = dispatcher(
            "I could not find a URL in the text.",
            Some("https://fallback.example/submit"),
        );
        let endpoint = d.discover_endpoint(&page()).await.expect("endpoint");
        assert_eq!(endpoint, "https://fallback.example/submit");
    }

    #[tokio::test]
    async fn garbage_extraction_without_fallback_is_an_error() {
        let d = dispatcher("no url here", None);
        let err = d.discover_endpoint(&page()).await.expect_err("no endpoint");
        assert!(matches!(err, SubmitError::NoEndpoint));
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            email: "student@example.com".to_string(),
            secret: "s3cret".to_string(),
            url: "https://quiz.example/task1".to_string(),
            answer: Some(Value::from(42)),
        }
    }

    #[tokio::test]
    async fn non_json_response_is_a_parse_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            "/submit",
            axum::routing::post(|| async { "<html>502 Bad Gateway</html>" }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let d = dispatcher("unused", None);
        let err = d
            .submit(&format!("http://{}/submit", addr), &payload())
            .await
            .expect_err("parse error");
        assert!(matches!(err, SubmitError::Parse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_http_error() {
        // Bind then drop, so the port is known-dead.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let d = dispatcher("unused", None);
        let err = d
            .submit(&format!("http://{}/submit", addr), &payload())
            .await
            .expect_err("connect error");
        assert!(matches!(err, SubmitError::Http(_)));
    }
}
