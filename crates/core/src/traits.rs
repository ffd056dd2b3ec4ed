use crate::models::{AnswerRecord, Chunk, Document, DocumentQuery, ScoredChunk};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Restriction on which documents a similarity search may return chunks
/// from. Eligibility is resolved by the retriever; the index applies it
/// as a pre-filter, not by discarding results after the fact.
#[derive(Debug, Clone, Default)]
pub enum DocumentSelector {
    #[default]
    All,
    Ids(Vec<Uuid>),
}

impl DocumentSelector {
    pub fn contains(&self, document_id: Uuid) -> bool {
        match self {
            DocumentSelector::All => true,
            DocumentSelector::Ids(ids) => ids.contains(&document_id),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: Document) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Document>>;

    /// Documents matching the filter, oldest first.
    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>>;

    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, document: &Document) -> Result<()>;

    /// Returns the removed document, or `None` when nothing matched.
    /// Chunk cascade is the pipeline's job, not the store's.
    async fn delete(&self, id: Uuid) -> Result<Option<Document>>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Full replacement: every chunk previously indexed for the document
    /// is deleted before the new set is inserted. Chunks are never
    /// patched in place.
    async fn upsert_chunks(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<()>;

    async fn delete_chunks(&self, document_id: Uuid) -> Result<()>;

    /// Top-`k` chunks by similarity (higher score is more similar),
    /// restricted to the selector. Ties break by chunk_index ascending,
    /// then document id, so equal scores order the same on every run.
    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        selector: &DocumentSelector,
    ) -> Result<Vec<ScoredChunk>>;
}

/// Append-only log of answered questions.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn append(&self, record: AnswerRecord) -> Result<()>;
}

// Shared handles work wherever an owned store does, so the pipeline and
// the retriever can point at the same backing store.

#[async_trait]
impl<T: DocumentStore> DocumentStore for std::sync::Arc<T> {
    async fn insert(&self, document: Document) -> Result<()> {
        (**self).insert(document).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        (**self).get(id).await
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        (**self).list(query).await
    }

    async fn update(&self, document: &Document) -> Result<()> {
        (**self).update(document).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Document>> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<T: VectorIndex> VectorIndex for std::sync::Arc<T> {
    async fn upsert_chunks(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<()> {
        (**self).upsert_chunks(document_id, chunks).await
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<()> {
        (**self).delete_chunks(document_id).await
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        selector: &DocumentSelector,
    ) -> Result<Vec<ScoredChunk>> {
        (**self).similarity_search(query_vector, k, selector).await
    }
}

#[async_trait]
impl<T: AnswerStore> AnswerStore for std::sync::Arc<T> {
    async fn append(&self, record: AnswerRecord) -> Result<()> {
        (**self).append(record).await
    }
}
