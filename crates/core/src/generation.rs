use crate::error::{QaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Contract for the external generation model: a prompt goes in, free
/// text comes out. The answer composer post-processes the output.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaGenerateResponse {
    response: Option<String>,
}

/// Generation client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaGenerator {
    endpoint: Url,
    model: String,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(endpoint: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            model: model.into(),
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl GenerationModel for OllamaGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.join("/api/generate")?)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": { "temperature": temperature },
            }))
            .send()
            .await
            .map_err(|error| QaError::GenerationService(error.to_string()))?;

        if !response.status().is_success() {
            return Err(QaError::GenerationService(format!(
                "generation endpoint returned {}",
                response.status()
            )));
        }

        let payload: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|error| QaError::GenerationService(error.to_string()))?;

        Ok(payload.response.unwrap_or_default().trim().to_string())
    }
}
