use crate::embeddings::Embedder;
use crate::error::Result;
use crate::models::{AccessScope, AskFilters, Document, DocumentQuery, ScoredChunk};
use crate::status::DocumentStatus;
use crate::traits::{DocumentSelector, DocumentStore, VectorIndex};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_TOP_K: usize = 6;
pub const MIN_TOP_K: usize = 3;
pub const MAX_TOP_K: usize = 12;

/// Bound latency and generation cost no matter what the caller asks for.
pub fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(MIN_TOP_K, MAX_TOP_K)
}

#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// READY documents the caller may retrieve from, keyed by id, for
    /// building citations.
    pub documents: HashMap<Uuid, Document>,
    pub chunks: Vec<ScoredChunk>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Embeds the question and searches the vector index, restricted to
/// documents the caller is allowed to see.
pub struct Retriever<D, V, E> {
    documents: D,
    index: V,
    embedder: E,
}

impl<D, V, E> Retriever<D, V, E>
where
    D: DocumentStore,
    V: VectorIndex,
    E: Embedder,
{
    pub fn new(documents: D, index: V, embedder: E) -> Self {
        Self {
            documents,
            index,
            embedder,
        }
    }

    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
        scope: &AccessScope,
        filters: &AskFilters,
    ) -> Result<Retrieval> {
        let query = DocumentQuery {
            status: Some(DocumentStatus::Ready),
            category: filters.category,
            title_contains: None,
        };

        let mut eligible = self.documents.list(&query).await?;
        eligible.retain(|document| scope.allows(document));
        if let Some(document_id) = filters.document_id {
            eligible.retain(|document| document.id == document_id);
        }

        // Nothing to search: skip the embedding call entirely.
        if eligible.is_empty() {
            return Ok(Retrieval::default());
        }

        let query_vector = self.embedder.embed(question).await?;
        let ids: Vec<Uuid> = eligible.iter().map(|document| document.id).collect();
        let chunks = self
            .index
            .similarity_search(&query_vector, clamp_top_k(top_k), &DocumentSelector::Ids(ids))
            .await?;

        Ok(Retrieval {
            documents: eligible
                .into_iter()
                .map(|document| (document.id, document))
                .collect(),
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QaError;
    use crate::models::{Category, Chunk, Document, FileRef};
    use crate::stores::{MemoryDocumentStore, MemoryVectorIndex};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEmbedder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }
    }

    fn ready_document(owner: &str, category: Category) -> Document {
        let mut document = Document::new(owner, format!("{category} doc"), category);
        document.attach_file(FileRef {
            file_key: "data/laws/doc.pdf".to_string(),
            file_name: "doc.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 1,
        });
        document.begin_processing().expect("file attached");
        document.mark_ready().expect("processing succeeds");
        document
    }

    fn chunk_for(document: &Document, index: u64, embedding: Vec<f32>) -> Chunk {
        Chunk {
            chunk_id: format!("{}-{index}", document.id),
            document_id: document.id,
            chunk_index: index,
            chunk_text: format!("Article {index}."),
            page_start: None,
            page_end: None,
            embedding,
        }
    }

    #[tokio::test]
    async fn no_eligible_documents_short_circuits_before_embedding() {
        let documents = MemoryDocumentStore::new();
        let index = MemoryVectorIndex::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // Only an UPLOADED document exists, so the READY filter matches
        // nothing.
        documents
            .insert(Document::new("alice", "Unprocessed", Category::Land))
            .await
            .unwrap();

        let retriever = Retriever::new(
            documents,
            index,
            CountingEmbedder {
                calls: calls.clone(),
            },
        );
        let retrieval = retriever
            .retrieve(
                "What does the land law say?",
                DEFAULT_TOP_K,
                &AccessScope::admin("root"),
                &AskFilters::default(),
            )
            .await
            .unwrap();

        assert!(retrieval.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chunks_of_non_ready_documents_are_never_returned() {
        let documents = MemoryDocumentStore::new();
        let index = MemoryVectorIndex::new();

        let ready = ready_document("alice", Category::Land);
        let mut failed = ready_document("alice", Category::Land);
        failed.begin_processing().unwrap();
        failed.mark_failed("corrupt pdf").unwrap();

        index
            .upsert_chunks(ready.id, &[chunk_for(&ready, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        // Stale chunks from a document that later failed reprocessing.
        index
            .upsert_chunks(failed.id, &[chunk_for(&failed, 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        documents.insert(ready.clone()).await.unwrap();
        documents.insert(failed).await.unwrap();

        let retriever = Retriever::new(
            documents,
            index,
            CountingEmbedder {
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );
        let retrieval = retriever
            .retrieve(
                "land rights",
                DEFAULT_TOP_K,
                &AccessScope::admin("root"),
                &AskFilters::default(),
            )
            .await
            .unwrap();

        assert_eq!(retrieval.chunks.len(), 1);
        assert_eq!(retrieval.chunks[0].chunk.document_id, ready.id);
    }

    #[tokio::test]
    async fn ordinary_users_only_reach_their_own_documents() {
        let documents = MemoryDocumentStore::new();
        let index = MemoryVectorIndex::new();

        let alices = ready_document("alice", Category::Family);
        let bobs = ready_document("bob", Category::Family);
        index
            .upsert_chunks(alices.id, &[chunk_for(&alices, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert_chunks(bobs.id, &[chunk_for(&bobs, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        documents.insert(alices.clone()).await.unwrap();
        documents.insert(bobs).await.unwrap();

        let retriever = Retriever::new(
            documents,
            index,
            CountingEmbedder {
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );
        let retrieval = retriever
            .retrieve(
                "divorce procedure",
                DEFAULT_TOP_K,
                &AccessScope::user("alice"),
                &AskFilters::default(),
            )
            .await
            .unwrap();

        assert_eq!(retrieval.chunks.len(), 1);
        assert_eq!(retrieval.chunks[0].chunk.document_id, alices.id);
    }

    #[tokio::test]
    async fn category_and_document_filters_narrow_the_eligible_set() {
        let documents = MemoryDocumentStore::new();
        let index = MemoryVectorIndex::new();

        let land = ready_document("alice", Category::Land);
        let labor = ready_document("alice", Category::Labor);
        index
            .upsert_chunks(land.id, &[chunk_for(&land, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert_chunks(labor.id, &[chunk_for(&labor, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        documents.insert(land.clone()).await.unwrap();
        documents.insert(labor).await.unwrap();

        let retriever = Retriever::new(
            documents,
            index,
            CountingEmbedder {
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );
        let retrieval = retriever
            .retrieve(
                "ownership transfer",
                DEFAULT_TOP_K,
                &AccessScope::user("alice"),
                &AskFilters {
                    category: Some(Category::Land),
                    document_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(retrieval.chunks.len(), 1);
        assert_eq!(retrieval.chunks[0].chunk.document_id, land.id);
        assert!(retrieval.documents.contains_key(&land.id));
    }

    #[tokio::test]
    async fn embedding_failures_propagate() {
        struct FailingEmbedder;

        #[async_trait]
        impl Embedder for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(QaError::EmbeddingService("model offline".to_string()))
            }
        }

        let documents = MemoryDocumentStore::new();
        documents
            .insert(ready_document("alice", Category::Business))
            .await
            .unwrap();

        let retriever = Retriever::new(documents, MemoryVectorIndex::new(), FailingEmbedder);
        let error = retriever
            .retrieve(
                "company registration",
                DEFAULT_TOP_K,
                &AccessScope::admin("root"),
                &AskFilters::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, QaError::EmbeddingService(_)));
    }

    #[test]
    fn top_k_is_clamped_to_a_sane_range() {
        assert_eq!(clamp_top_k(0), MIN_TOP_K);
        assert_eq!(clamp_top_k(6), 6);
        assert_eq!(clamp_top_k(100), MAX_TOP_K);
    }
}
