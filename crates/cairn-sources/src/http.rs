//! Shared HTTP plumbing for provider adapters.

use std::time::Duration;

use cairn_core::SourcesConfig;
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{SourceError, SourceResult};
use crate::retry::{with_retry, RetryConfig};

/// Client, retry policy and day-bucketing timezone shared by adapters.
#[derive(Debug, Clone)]
pub struct HttpContext {
    pub client: Client,
    pub retry: RetryConfig,
    pub tz: Tz,
}

impl HttpContext {
    pub fn new(config: &SourcesConfig, tz: Tz) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry: RetryConfig::from(&config.retry),
            tz,
        })
    }

    /// Send a request built by `build` (rebuilt for every retry) and decode JSON.
    pub async fn get_json<T, F>(&self, build: F) -> SourceResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = with_retry(&self.retry, || build(&self.client).send()).await?;
        handle_response(response).await
    }

    /// Like [`get_json`](Self::get_json) but returns the raw body text.
    pub async fn get_text<F>(&self, build: F) -> SourceResult<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = with_retry(&self.retry, || build(&self.client).send()).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::http(status.as_u16(), provider_message(&body, status.as_str())));
        }
        Ok(response.text().await?)
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> SourceResult<T> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| SourceError::data_invalid(format!("JSON parse error: {}", e)))
    } else {
        let body = response.text().await.unwrap_or_default();
        let fallback = status.canonical_reason().unwrap_or("request failed");
        Err(SourceError::http(status.as_u16(), provider_message(&body, fallback)))
    }
}

/// Pull a human-readable message out of a provider error body.
///
/// Understands `{"message": ..}`, `{"error": {"message": ..}}` and
/// `{"error": ".."}`; anything else yields `fallback`.
pub fn provider_message(body: &str, fallback: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .or_else(|| v.pointer("/error/message").and_then(|m| m.as_str()))
                .or_else(|| v.get("error").and_then(|m| m.as_str()))
                .or_else(|| v.get("description").and_then(|m| m.as_str()))
        })
        .filter(|m| !m.trim().is_empty())
        .map(|m| m.trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Payload {
        value: f64,
    }

    fn test_context() -> HttpContext {
        let mut config = SourcesConfig::default();
        config.retry.max_retries = 0;
        HttpContext::new(&config, chrono_tz::Europe::London).unwrap()
    }

    #[test]
    fn test_provider_message_shapes() {
        assert_eq!(provider_message(r#"{"message":"bad key"}"#, "x"), "bad key");
        assert_eq!(
            provider_message(r#"{"error":{"code":403,"message":"denied"}}"#, "x"),
            "denied"
        );
        assert_eq!(provider_message("<html>", "Forbidden"), "Forbidden");
        assert_eq!(provider_message(r#"{"message":"  "}"#, "fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 4.5})))
            .mount(&server)
            .await;

        let ctx = test_context();
        let url = format!("{}/ok", server.uri());
        let payload: Payload = ctx.get_json(|c| c.get(&url)).await.unwrap();
        assert_eq!(payload.value, 4.5);
    }

    #[tokio::test]
    async fn test_get_json_schema_mismatch_is_data_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"other": 1})))
            .mount(&server)
            .await;

        let ctx = test_context();
        let result: SourceResult<Payload> = ctx.get_json(|c| c.get(server.uri())).await;
        assert!(matches!(result, Err(SourceError::DataInvalid(_))));
    }

    #[tokio::test]
    async fn test_get_json_forbidden_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"error": {"message": "quota project required"}})),
            )
            .mount(&server)
            .await;

        let ctx = test_context();
        let result: SourceResult<Payload> = ctx.get_json(|c| c.get(server.uri())).await;
        match result {
            Err(SourceError::Http { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "quota project required");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
