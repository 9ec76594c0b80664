//! Generation client for an Ollama-compatible `/api/generate` endpoint.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::GenerationClient;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Some server builds answer with `response`, others with
/// `message.content`; both are accepted.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    message: Option<GenerateMessage>,
}

#[derive(Debug, Deserialize)]
struct GenerateMessage {
    content: Option<String>,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// One request per summary; `timeout` bounds the whole call.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build generation HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!("Initialized generation client for {}", base_url);

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("Requesting protocol generation from {} (model {})", url, model);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .context("Failed to reach generation service")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read generation response body")?;

        if !status.is_success() {
            error!(
                "Generation request failed with status {}: {}",
                status,
                body.trim()
            );
            bail!("Generation service returned status {status}");
        }

        let content = parse_reply_body(&body)?;
        info!("Generation reply received: {} chars", content.len());
        Ok(content)
    }
}

fn parse_reply_body(body: &str) -> Result<String> {
    let envelope: GenerateResponse =
        serde_json::from_str(body).context("Failed to parse generation response envelope")?;

    Ok(envelope
        .response
        .filter(|text| !text.is_empty())
        .or_else(|| envelope.message.and_then(|m| m.content))
        .unwrap_or_default())
}
