use crate::error::{QaError, Result};
use crate::models::Chunk;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_200,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(QaError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(QaError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPiece {
    pub chunk_index: u64,
    pub chunk_text: String,
}

/// Walk a fixed-width character window over the text, keeping `overlap`
/// characters of shared context between consecutive windows. Boundaries
/// are purely character based; sentence structure is not respected.
pub fn split_into_chunks(text: &str, config: &ChunkingConfig) -> Result<Vec<ChunkPiece>> {
    config.validate()?;

    let cleaned = text.trim();
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = cleaned.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut index = 0u64;

    loop {
        let end = (start + config.chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();

        if !trimmed.is_empty() {
            pieces.push(ChunkPiece {
                chunk_index: index,
                chunk_text: trimmed.to_string(),
            });
            index += 1;
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(config.overlap);
    }

    Ok(pieces)
}

/// Materialize pieces into persistable chunks with stable content-derived
/// ids. Embeddings are filled in later by the pipeline.
pub fn build_document_chunks(
    document_id: Uuid,
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    let pieces = split_into_chunks(text, config)?;

    Ok(pieces
        .into_iter()
        .map(|piece| Chunk {
            chunk_id: make_chunk_id(document_id, piece.chunk_index, &piece.chunk_text),
            document_id,
            chunk_index: piece.chunk_index,
            chunk_text: piece.chunk_text,
            page_start: None,
            page_end: None,
            embedding: Vec::new(),
        })
        .collect())
}

fn make_chunk_id(document_id: Uuid, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
