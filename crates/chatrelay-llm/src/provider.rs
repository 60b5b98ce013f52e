use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use chatrelay_core::errors::GatewayError;
use chatrelay_core::provider::ChatModel;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f64 = 0.7;

/// Chat completion backend for the NVIDIA inference API.
///
/// The endpoint is OpenAI-compatible: `POST {base_url}/chat/completions`
/// with bearer auth and a non-streaming single-turn request body.
pub struct NvidiaProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl NvidiaProvider {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn build_request_body<'a>(prompt: &'a str, model: &'a str, max_tokens: u32) -> CompletionRequest<'a> {
    CompletionRequest {
        model,
        messages: vec![RequestMessage {
            role: "user",
            content: prompt,
        }],
        max_tokens,
        temperature: TEMPERATURE,
        stream: false,
    }
}

/// Pull `choices[0].message.content` out of a completion response body.
fn extract_content(body: &str) -> Result<String, GatewayError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

    value
        .pointer("/choices/0/message/content")
        .and_then(|content| content.as_str())
        .map(|content| content.trim().to_string())
        .ok_or_else(|| GatewayError::MalformedResponse("no choices in response".into()))
}

fn classify_send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(REQUEST_TIMEOUT)
    } else {
        GatewayError::Network(err.to_string())
    }
}

#[async_trait]
impl ChatModel for NvidiaProvider {
    fn name(&self) -> &str {
        "nvidia"
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, GatewayError> {
        let body = build_request_body(prompt, model, max_tokens);

        tracing::debug!(model = model, max_tokens = max_tokens, "sending completion request");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "completion request failed");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_content(&text)
    }
}
