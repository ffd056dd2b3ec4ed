use crate::embeddings::Embedder;
use crate::error::{QaError, Result};
use crate::generation::GenerationModel;
use crate::models::{AccessScope, Answer, AnswerRecord, AskFilters, SourceRef};
use crate::retriever::{Retrieval, Retriever};
use crate::traits::{AnswerStore, DocumentStore, VectorIndex};
use tracing::warn;

pub const SNIPPET_MAX_CHARS: usize = 220;

/// Deterministic-leaning generation, favoring faithfulness to the
/// sources over creativity.
pub const ANSWER_TEMPERATURE: f32 = 0.2;

const MIN_QUESTION_CHARS: usize = 3;

pub const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant information in your READY \
documents. Please process your PDFs (so they become READY) or upload the right one. \
Not legal advice.";

pub const EMPTY_GENERATION_ANSWER: &str =
    "I couldn't generate an answer from the sources. Not legal advice.";

const SYSTEM_RULES: &str = "You are a legal information assistant. \
Use ONLY the provided SOURCES. \
If the sources are not enough, say so and ask what document to upload or clarify. \
Do not invent laws or procedures. \
Add citations like [1], [2] matching SOURCE numbers. \
End with: Not legal advice.";

/// Builds a grounded prompt from retrieved chunks, invokes the
/// generation model, and returns a cited answer.
pub struct AnswerComposer<D, V, E, G, A> {
    retriever: Retriever<D, V, E>,
    generator: G,
    answers: A,
}

impl<D, V, E, G, A> AnswerComposer<D, V, E, G, A>
where
    D: DocumentStore,
    V: VectorIndex,
    E: Embedder,
    G: GenerationModel,
    A: AnswerStore,
{
    pub fn new(retriever: Retriever<D, V, E>, generator: G, answers: A) -> Self {
        Self {
            retriever,
            generator,
            answers,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        top_k: usize,
        filters: &AskFilters,
        scope: &AccessScope,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.chars().count() < MIN_QUESTION_CHARS {
            return Err(QaError::Validation(
                "question must be at least 3 characters".to_string(),
            ));
        }

        let retrieval = self
            .retriever
            .retrieve(question, top_k, scope, filters)
            .await?;

        // "No relevant information" is an expected outcome, not a fault,
        // and skipping generation avoids hallucination pressure.
        if retrieval.is_empty() {
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let sources = build_sources(&retrieval);
        let context = build_context(&retrieval);
        let prompt = format!(
            "{SYSTEM_RULES}\n\nQuestion:\n{question}\n\nSources:\n{context}\n\nAnswer:\n"
        );

        let generated = self.generator.generate(&prompt, ANSWER_TEMPERATURE).await?;
        let answer = if generated.trim().is_empty() {
            // Retrieval succeeded even though generation degenerated, so
            // the sources still go out.
            EMPTY_GENERATION_ANSWER.to_string()
        } else {
            generated.trim().to_string()
        };

        // The log is best effort: a failed append must not discard an
        // answer the generation model already produced.
        if let Err(error) = self
            .answers
            .append(AnswerRecord::new(
                scope.caller.clone(),
                question,
                answer.clone(),
                sources.clone(),
                filters.clone(),
            ))
            .await
        {
            warn!(error = %error, "failed to append answer record");
        }

        Ok(Answer { answer, sources })
    }
}

fn page_range_label(page_start: Option<u32>, page_end: Option<u32>) -> String {
    match (page_start, page_end) {
        (Some(start), Some(end)) => format!("p.{start}-{end}"),
        _ => "p.?".to_string(),
    }
}

/// One block per retrieved chunk, numbered in retrieval order so the
/// model can cite with bracketed numbers.
fn build_context(retrieval: &Retrieval) -> String {
    retrieval
        .chunks
        .iter()
        .enumerate()
        .map(|(position, scored)| {
            let title = retrieval
                .documents
                .get(&scored.chunk.document_id)
                .map(|document| document.title.as_str())
                .unwrap_or("Untitled");
            format!(
                "SOURCE [{}] - {} ({})\n{}\n",
                position + 1,
                title,
                page_range_label(scored.chunk.page_start, scored.chunk.page_end),
                scored.chunk.chunk_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_sources(retrieval: &Retrieval) -> Vec<SourceRef> {
    retrieval
        .chunks
        .iter()
        .enumerate()
        .map(|(position, scored)| SourceRef {
            number: position + 1,
            document_id: scored.chunk.document_id,
            title: retrieval
                .documents
                .get(&scored.chunk.document_id)
                .map(|document| document.title.clone())
                .unwrap_or_else(|| "Untitled".to_string()),
            page_start: scored.chunk.page_start,
            page_end: scored.chunk.page_end,
            score: scored.score,
            snippet: scored.chunk.chunk_text.chars().take(SNIPPET_MAX_CHARS).collect(),
        })
        .collect()
}
