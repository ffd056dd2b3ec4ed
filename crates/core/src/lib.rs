pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod retriever;
pub mod status;
pub mod stores;
pub mod traits;

pub use answer::{
    AnswerComposer, ANSWER_TEMPERATURE, EMPTY_GENERATION_ANSWER, NO_CONTEXT_ANSWER,
    SNIPPET_MAX_CHARS,
};
pub use chunking::{build_document_chunks, split_into_chunks, ChunkPiece, ChunkingConfig};
pub use embeddings::{Embedder, OllamaEmbedder, MIN_EMBEDDING_DIMENSIONS};
pub use error::{QaError, Result};
pub use extractor::{normalize_extracted, ExtractedText, LopdfExtractor, PdfExtractor};
pub use generation::{GenerationModel, OllamaGenerator};
pub use ingest::{discover_pdf_files, file_ref_for};
pub use models::{
    AccessScope, Answer, AnswerRecord, AskFilters, BatchItem, BatchReport, Category, Chunk,
    DocType, Document, DocumentQuery, FileRef, ProcessOutcome, Role, ScoredChunk, SourceRef,
};
pub use pipeline::IngestionPipeline;
pub use retriever::{clamp_top_k, Retrieval, Retriever, DEFAULT_TOP_K, MAX_TOP_K, MIN_TOP_K};
pub use status::DocumentStatus;
pub use stores::{
    JsonAnswerStore, JsonDocumentStore, MemoryAnswerStore, MemoryDocumentStore, MemoryVectorIndex,
    QdrantVectorIndex,
};
pub use traits::{AnswerStore, DocumentSelector, DocumentStore, VectorIndex};
pub use uuid::Uuid;
