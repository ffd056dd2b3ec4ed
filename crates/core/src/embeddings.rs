use crate::error::{QaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// A response vector shorter than this is treated as a corrupted reply
/// from the model server, not as a usable embedding.
pub const MIN_EMBEDDING_DIMENSIONS: usize = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Converts text into fixed-length vectors. Chunk vectors and query
/// vectors must come from the same model to be comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

/// Embedding client for an Ollama-compatible `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    endpoint: Url,
    model: String,
    min_dimensions: usize,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(endpoint: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            model: model.into(),
            min_dimensions: MIN_EMBEDDING_DIMENSIONS,
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        if input.is_empty() {
            return Err(QaError::EmptyInput);
        }

        let response = self
            .client
            .post(self.endpoint.join("/api/embeddings")?)
            .json(&json!({
                "model": self.model,
                "prompt": input,
            }))
            .send()
            .await
            .map_err(|error| QaError::EmbeddingService(error.to_string()))?;

        if !response.status().is_success() {
            return Err(QaError::EmbeddingService(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let payload: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|error| QaError::EmbeddingService(error.to_string()))?;

        validate_vector(payload.embedding, self.min_dimensions)
    }
}

fn validate_vector(vector: Option<Vec<f32>>, min_dimensions: usize) -> Result<Vec<f32>> {
    match vector {
        Some(vector) if vector.len() >= min_dimensions => Ok(vector),
        Some(vector) => Err(QaError::EmbeddingService(format!(
            "embedding has {} dimensions, expected at least {}",
            vector.len(),
            min_dimensions
        ))),
        None => Err(QaError::EmbeddingService(
            "embedding response has no vector".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_input_fails_before_any_network_call() {
        // The endpoint is unroutable; reaching it would surface as an
        // EmbeddingService error rather than EmptyInput.
        let embedder = OllamaEmbedder::new("http://127.0.0.1:1", "nomic-embed-text").unwrap();
        let error = embedder.embed("   \n ").await.unwrap_err();
        assert!(matches!(error, QaError::EmptyInput));
    }

    #[test]
    fn short_vectors_are_rejected_as_corrupted() {
        let error = validate_vector(Some(vec![0.1, 0.2]), MIN_EMBEDDING_DIMENSIONS).unwrap_err();
        assert!(matches!(error, QaError::EmbeddingService(_)));
    }

    #[test]
    fn missing_vector_is_rejected() {
        assert!(validate_vector(None, MIN_EMBEDDING_DIMENSIONS).is_err());
    }

    #[test]
    fn valid_vector_passes_through() {
        let vector = vec![0.0f32; 16];
        assert_eq!(
            validate_vector(Some(vector.clone()), MIN_EMBEDDING_DIMENSIONS).unwrap(),
            vector
        );
    }
}
