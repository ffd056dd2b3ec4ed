use crate::chunking::{build_document_chunks, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{QaError, Result};
use crate::extractor::PdfExtractor;
use crate::models::{
    BatchItem, BatchReport, Document, DocumentQuery, FileRef, ProcessOutcome,
};
use crate::status::DocumentStatus;
use crate::traits::{DocumentStore, VectorIndex};
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

/// Drives a document through extract -> chunk -> embed -> index. The
/// document status is the source of truth for whether its index is
/// trustworthy; chunks are only written after every step has succeeded.
pub struct IngestionPipeline<D, V, E, X> {
    documents: D,
    index: V,
    embedder: E,
    extractor: X,
    chunking: ChunkingConfig,
}

impl<D, V, E, X> IngestionPipeline<D, V, E, X>
where
    D: DocumentStore,
    V: VectorIndex,
    E: Embedder,
    X: PdfExtractor,
{
    pub fn new(documents: D, index: V, embedder: E, extractor: X) -> Self {
        Self {
            documents,
            index,
            embedder,
            extractor,
            chunking: ChunkingConfig::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Process one document. On failure the document lands in FAILED with
    /// the error recorded, and the error is re-raised to the caller.
    pub async fn process_document(&self, id: Uuid) -> Result<ProcessOutcome> {
        let mut document = self
            .documents
            .get(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("document not found: {id}")))?;

        // The guarded transition doubles as the concurrency check: a
        // document already PROCESSING cannot be entered again.
        document.begin_processing()?;
        self.documents.update(&document).await?;

        match self.run_steps(&mut document).await {
            Ok(outcome) => {
                document.mark_ready()?;
                self.documents.update(&document).await?;
                Ok(outcome)
            }
            Err(error) => {
                document.mark_failed(error.to_string())?;
                self.documents.update(&document).await?;
                Err(error)
            }
        }
    }

    async fn run_steps(&self, document: &mut Document) -> Result<ProcessOutcome> {
        let file = document.file.clone().ok_or_else(|| {
            QaError::InvalidState(format!("document {} has no attached file", document.id))
        })?;

        let extracted = self.extractor.extract(Path::new(&file.file_key))?;

        let mut chunks = build_document_chunks(document.id, &extracted.text, &self.chunking)?;

        // Sequential on purpose: the embedding server is rate limited.
        // Nothing touches the index until every chunk has its vector, so
        // a mid-run failure cannot leave a half-embedded document behind.
        for chunk in &mut chunks {
            chunk.embedding = self.embedder.embed(&chunk.chunk_text).await?;
        }

        self.index.upsert_chunks(document.id, &chunks).await?;

        document.extracted_text = Some(extracted.text.clone());
        document.text_length = extracted.text.chars().count();
        document.page_count = extracted.page_count;
        document.processed_at = Some(Utc::now());

        Ok(ProcessOutcome {
            document_id: document.id,
            status: DocumentStatus::Ready,
            page_count: document.page_count,
            text_length: document.text_length,
            chunks_created: chunks.len(),
            embeddings_saved: chunks.len(),
            processed_at: document.processed_at.unwrap_or_else(Utc::now),
        })
    }

    /// Process every document matching the status filter, oldest first,
    /// up to `limit`. Strictly sequential, and one document's failure
    /// never aborts the rest.
    pub async fn process_batch(
        &self,
        status: DocumentStatus,
        limit: usize,
    ) -> Result<BatchReport> {
        let query = DocumentQuery {
            status: Some(status),
            ..Default::default()
        };
        let candidates: Vec<Document> = self
            .documents
            .list(&query)
            .await?
            .into_iter()
            .take(limit)
            .collect();

        let mut items = Vec::with_capacity(candidates.len());
        for document in candidates {
            let item = match self.process_document(document.id).await {
                Ok(report) => BatchItem::Processed {
                    document_id: document.id,
                    title: document.title.clone(),
                    report,
                },
                Err(error) => BatchItem::Failed {
                    document_id: document.id,
                    title: document.title.clone(),
                    error: error.to_string(),
                },
            };
            items.push(item);
        }

        Ok(BatchReport::from_items(items))
    }

    /// Attach a stored file to an existing document and reset its
    /// pipeline state. Chunks from any previous processing are dropped.
    pub async fn attach_file(&self, id: Uuid, file: FileRef) -> Result<Document> {
        let mut document = self
            .documents
            .get(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("document not found: {id}")))?;

        document.attach_file(file);
        self.documents.update(&document).await?;
        self.index.delete_chunks(document.id).await?;
        Ok(document)
    }

    /// Delete a document and cascade deletion of its chunks.
    pub async fn delete_document(&self, id: Uuid) -> Result<Document> {
        let removed = self
            .documents
            .delete(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("document not found: {id}")))?;
        self.index.delete_chunks(id).await?;
        Ok(removed)
    }
}
