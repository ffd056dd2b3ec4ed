use crate::error::{QaError, Result};
use crate::models::{Chunk, ScoredChunk};
use crate::traits::{DocumentSelector, VectorIndex};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

/// How many candidates beyond `k` are requested from the index before the
/// final truncation, so filtering never starves the result set.
const OVERFETCH_FACTOR: usize = 4;

/// Vector index backed by a qdrant server over its HTTP API. Points are
/// keyed by chunk id with the owning document id as a filterable payload
/// attribute.
pub struct QdrantVectorIndex {
    endpoint: Url,
    collection: String,
    vector_size: usize,
    client: Client,
}

impl QdrantVectorIndex {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            collection: collection.into(),
            vector_size,
            client: Client::new(),
        })
    }

    /// Create the collection if it does not exist yet. An already
    /// existing collection is not an error.
    pub async fn ensure_collection(&self) -> Result<()> {
        let response = self
            .client
            .put(self.collection_url("")?)
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" },
            }))
            .send()
            .await?;

        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(QaError::Store(format!(
                "qdrant collection setup returned {}",
                response.status()
            )))
        }
    }

    fn collection_url(&self, suffix: &str) -> Result<Url> {
        Ok(self
            .endpoint
            .join(&format!("/collections/{}{}", self.collection, suffix))?)
    }

    fn point_id(chunk: &Chunk) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk.chunk_id.as_bytes()).to_string()
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert_chunks(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<()> {
        self.delete_chunks(document_id).await?;

        let points = chunks
            .iter()
            .map(|chunk| {
                if chunk.embedding.len() != self.vector_size {
                    return Err(QaError::Store(format!(
                        "embedding dimension {} != {}",
                        chunk.embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": Self::point_id(chunk),
                    "vector": chunk.embedding,
                    "payload": {
                        "chunk_id": chunk.chunk_id,
                        "document_id": chunk.document_id.to_string(),
                        "chunk_index": chunk.chunk_index,
                        "chunk_text": chunk.chunk_text,
                        "page_start": chunk.page_start,
                        "page_end": chunk.page_end,
                    },
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url("/points?wait=true")?)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QaError::Store(format!(
                "qdrant upsert returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<()> {
        let response = self
            .client
            .post(self.collection_url("/points/delete?wait=true")?)
            .json(&json!({
                "filter": {
                    "must": [
                        { "key": "document_id", "match": { "value": document_id.to_string() } },
                    ],
                },
            }))
            .send()
            .await?;

        if !delete_status_ok(response.status()) {
            return Err(QaError::Store(format!(
                "qdrant delete returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        selector: &DocumentSelector,
    ) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() != self.vector_size {
            return Err(QaError::Store(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": query_vector,
            "limit": k.saturating_mul(OVERFETCH_FACTOR),
            "with_payload": true,
        });

        if let DocumentSelector::Ids(ids) = selector {
            let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            body["filter"] = json!({
                "must": [
                    { "key": "document_id", "match": { "any": ids } },
                ],
            });
        }

        let response = self
            .client
            .post(self.collection_url("/points/search")?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QaError::Store(format!(
                "qdrant search returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        let mut hits = parse_search_hits(&parsed);

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
                .then(left.chunk.document_id.cmp(&right.chunk.document_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// A 404 from the points-delete endpoint means the collection was never
/// created, so there is nothing to delete and the operation succeeded.
fn delete_status_ok(status: reqwest::StatusCode) -> bool {
    status.is_success() || status == reqwest::StatusCode::NOT_FOUND
}

fn parse_search_hits(parsed: &Value) -> Vec<ScoredChunk> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .filter_map(|hit| {
            let document_id = hit
                .pointer("/payload/document_id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())?;
            let chunk_text = hit
                .pointer("/payload/chunk_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            Some(ScoredChunk {
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                chunk: Chunk {
                    chunk_id: hit
                        .pointer("/payload/chunk_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    document_id,
                    chunk_index: hit
                        .pointer("/payload/chunk_index")
                        .and_then(Value::as_u64)
                        .unwrap_or_default(),
                    chunk_text,
                    page_start: hit
                        .pointer("/payload/page_start")
                        .and_then(Value::as_u64)
                        .map(|page| page as u32),
                    page_end: hit
                        .pointer("/payload/page_end")
                        .and_then(Value::as_u64)
                        .map(|page| page as u32),
                    embedding: Vec::new(),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{delete_status_ok, parse_search_hits};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn deleting_from_a_missing_collection_is_a_noop() {
        assert!(delete_status_ok(reqwest::StatusCode::OK));
        assert!(delete_status_ok(reqwest::StatusCode::NOT_FOUND));
        assert!(!delete_status_ok(reqwest::StatusCode::BAD_REQUEST));
        assert!(!delete_status_ok(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn search_hits_are_parsed_from_payload() {
        let document_id = Uuid::new_v4();
        let parsed = json!({
            "result": [
                {
                    "id": "point-1",
                    "score": 0.87,
                    "payload": {
                        "chunk_id": "abc123",
                        "document_id": document_id.to_string(),
                        "chunk_index": 2,
                        "chunk_text": "Article 12. Employment contracts.",
                        "page_start": 3,
                        "page_end": 4,
                    },
                },
            ],
        });

        let hits = parse_search_hits(&parsed);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, document_id);
        assert_eq!(hits[0].chunk.chunk_index, 2);
        assert_eq!(hits[0].chunk.page_start, Some(3));
        assert!((hits[0].score - 0.87).abs() < 1e-9);
    }

    #[test]
    fn hits_without_a_document_id_are_dropped() {
        let parsed = json!({
            "result": [
                { "id": "point-1", "score": 0.5, "payload": { "chunk_text": "orphan" } },
            ],
        });
        assert!(parse_search_hits(&parsed).is_empty());
    }
}
