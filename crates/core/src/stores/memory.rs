use crate::error::{QaError, Result};
use crate::models::{AnswerRecord, Chunk, Document, DocumentQuery, ScoredChunk};
use crate::traits::{AnswerStore, DocumentSelector, DocumentStore, VectorIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process document store, the reference implementation for tests and
/// library consumers that bring their own persistence.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, document: Document) -> Result<()> {
        self.documents.write().await.push(document);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .find(|document| document.id == id)
            .cloned())
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let mut matching: Vec<Document> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|document| query.matches(document))
            .cloned()
            .collect();
        matching.sort_by_key(|document| document.created_at);
        Ok(matching)
    }

    async fn update(&self, document: &Document) -> Result<()> {
        let mut documents = self.documents.write().await;
        let slot = documents
            .iter_mut()
            .find(|existing| existing.id == document.id)
            .ok_or_else(|| QaError::NotFound(format!("document not found: {}", document.id)))?;
        *slot = document.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Document>> {
        let mut documents = self.documents.write().await;
        let position = documents.iter().position(|document| document.id == id);
        Ok(position.map(|index| documents.remove(index)))
    }
}

/// In-process cosine-similarity index keyed by document id.
#[derive(Default)]
pub struct MemoryVectorIndex {
    chunks: RwLock<HashMap<Uuid, Vec<Chunk>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn chunk_count(&self, document_id: Uuid) -> usize {
        self.chunks
            .read()
            .await
            .get(&document_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert_chunks(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<()> {
        let mut index = self.chunks.write().await;
        index.remove(&document_id);
        index.insert(document_id, chunks.to_vec());
        Ok(())
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<()> {
        self.chunks.write().await.remove(&document_id);
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        selector: &DocumentSelector,
    ) -> Result<Vec<ScoredChunk>> {
        let index = self.chunks.read().await;

        let mut scored = Vec::new();
        for (document_id, chunks) in index.iter() {
            if !selector.contains(*document_id) {
                continue;
            }
            for chunk in chunks {
                if chunk.embedding.is_empty() {
                    continue;
                }
                if chunk.embedding.len() != query_vector.len() {
                    return Err(QaError::Store(format!(
                        "indexed vector has {} dimensions, query has {}",
                        chunk.embedding.len(),
                        query_vector.len()
                    )));
                }
                scored.push(ScoredChunk {
                    score: cosine_similarity(query_vector, &chunk.embedding),
                    chunk: chunk.clone(),
                });
            }
        }

        scored.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
                .then(left.chunk.document_id.cmp(&right.chunk.document_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut left_norm = 0f64;
    let mut right_norm = 0f64;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += f64::from(*a) * f64::from(*b);
        left_norm += f64::from(*a) * f64::from(*a);
        right_norm += f64::from(*b) * f64::from(*b);
    }

    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

#[derive(Default)]
pub struct MemoryAnswerStore {
    records: RwLock<Vec<AnswerRecord>>,
}

impl MemoryAnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AnswerRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AnswerStore for MemoryAnswerStore {
    async fn append(&self, record: AnswerRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}
