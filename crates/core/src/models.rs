use crate::error::QaError;
use crate::status::DocumentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of legal domain tags a document can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Family,
    Land,
    Labor,
    Business,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Family => "FAMILY",
            Category::Land => "LAND",
            Category::Labor => "LABOR",
            Category::Business => "BUSINESS",
        };
        f.write_str(label)
    }
}

impl FromStr for Category {
    type Err = QaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "FAMILY" => Ok(Category::Family),
            "LAND" => Ok(Category::Land),
            "LABOR" => Ok(Category::Labor),
            "BUSINESS" => Ok(Category::Business),
            other => Err(QaError::Validation(format!(
                "invalid category: {other} (allowed: FAMILY, LAND, LABOR, BUSINESS)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    #[default]
    Law,
    Case,
    Contract,
    Other,
}

/// Reference to an already-stored file. Upload transport is handled
/// outside the core; this only records where the bytes live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub file_key: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub category: Category,
    pub doc_type: DocType,
    pub jurisdiction: String,
    pub file: Option<FileRef>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub extracted_text: Option<String>,
    pub text_length: usize,
    pub page_count: u32,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(owner: impl Into<String>, title: impl Into<String>, category: Category) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            title: title.into(),
            category,
            doc_type: DocType::default(),
            jurisdiction: "Rwanda".to_string(),
            file: None,
            status: DocumentStatus::Uploaded,
            error_message: None,
            extracted_text: None,
            text_length: 0,
            page_count: 0,
            processed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Attach (or replace) the stored file and reset the pipeline so the
    /// document has to be processed again from scratch.
    pub fn attach_file(&mut self, file: FileRef) {
        self.file = Some(file);
        self.status = DocumentStatus::Uploaded;
        self.error_message = None;
        self.extracted_text = None;
        self.text_length = 0;
        self.page_count = 0;
        self.processed_at = None;
    }

    /// Guarded entry into PROCESSING. A document with no attached file
    /// cannot start, and a document already processing cannot be entered
    /// a second time.
    pub fn begin_processing(&mut self) -> Result<(), QaError> {
        if self.file.is_none() {
            return Err(QaError::InvalidState(format!(
                "document {} has no attached file",
                self.id
            )));
        }
        self.status = self.status.transition(DocumentStatus::Processing)?;
        self.error_message = None;
        Ok(())
    }

    pub fn mark_ready(&mut self) -> Result<(), QaError> {
        self.status = self.status.transition(DocumentStatus::Ready)?;
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<(), QaError> {
        self.status = self.status.transition(DocumentStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: Uuid,
    pub chunk_index: u64,
    pub chunk_text: String,
    pub page_start: Option<u32>,
    pub page_end: Option<u32>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Listing filter for the document library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub category: Option<Category>,
    pub status: Option<DocumentStatus>,
    pub title_contains: Option<String>,
}

impl DocumentQuery {
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(category) = self.category {
            if document.category != category {
                return false;
            }
        }
        if let Some(status) = self.status {
            if document.status != status {
                return false;
            }
        }
        if let Some(needle) = &self.title_contains {
            if !document
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Verified caller identity, supplied by the auth collaborator. The core
/// trusts it without re-checking credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessScope {
    pub caller: String,
    pub role: Role,
}

impl AccessScope {
    pub fn admin(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            role: Role::Admin,
        }
    }

    pub fn user(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            role: Role::User,
        }
    }

    pub fn allows(&self, document: &Document) -> bool {
        self.role == Role::Admin || document.owner == self.caller
    }
}

/// Filters a caller can apply when asking a question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskFilters {
    pub category: Option<Category>,
    pub document_id: Option<Uuid>,
}

/// One citation entry attached to an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub number: usize,
    pub document_id: Uuid,
    pub title: String,
    pub page_start: Option<u32>,
    pub page_end: Option<u32>,
    pub score: f64,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Immutable record of one answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: Uuid,
    pub owner: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub filters: AskFilters,
    pub created_at: DateTime<Utc>,
}

impl AnswerRecord {
    pub fn new(
        owner: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        sources: Vec<SourceRef>,
        filters: AskFilters,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            question: question.into(),
            answer: answer.into(),
            sources,
            filters,
            created_at: Utc::now(),
        }
    }
}

/// Report for one successful processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub document_id: Uuid,
    pub status: DocumentStatus,
    pub page_count: u32,
    pub text_length: usize,
    pub chunks_created: usize,
    pub embeddings_saved: usize,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchItem {
    Processed {
        document_id: Uuid,
        title: String,
        report: ProcessOutcome,
    },
    Failed {
        document_id: Uuid,
        title: String,
        error: String,
    },
}

/// Result of a batch run, folded from per-document items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchReport {
    pub fn from_items(items: Vec<BatchItem>) -> Self {
        let (processed, failed) = items.iter().fold((0, 0), |(ok, err), item| match item {
            BatchItem::Processed { .. } => (ok + 1, err),
            BatchItem::Failed { .. } => (ok, err + 1),
        });

        Self {
            total: items.len(),
            processed,
            failed,
            results: items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_normalizes_case_and_whitespace() {
        let parsed: Category = " land ".parse().expect("parse should succeed");
        assert_eq!(parsed, Category::Land);
        assert!("TAX".parse::<Category>().is_err());
    }

    #[test]
    fn begin_processing_requires_an_attached_file() {
        let mut document = Document::new("admin", "Labour code", Category::Labor);
        let error = document.begin_processing().unwrap_err();
        assert!(error.to_string().contains("no attached file"));
        assert_eq!(document.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn attach_file_resets_pipeline_state() {
        let mut document = Document::new("admin", "Land law", Category::Land);
        document.attach_file(FileRef {
            file_key: "data/laws/land.pdf".to_string(),
            file_name: "land.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 10,
        });
        document.begin_processing().expect("file attached");
        document.mark_failed("boom").expect("processing can fail");

        document.attach_file(FileRef {
            file_key: "data/laws/land-v2.pdf".to_string(),
            file_name: "land-v2.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 12,
        });

        assert_eq!(document.status, DocumentStatus::Uploaded);
        assert!(document.error_message.is_none());
        assert!(document.extracted_text.is_none());
        assert_eq!(document.text_length, 0);
    }

    #[test]
    fn scope_restricts_ordinary_users_to_owned_documents() {
        let document = Document::new("alice", "Family code", Category::Family);
        assert!(AccessScope::user("alice").allows(&document));
        assert!(!AccessScope::user("bob").allows(&document));
        assert!(AccessScope::admin("bob").allows(&document));
    }

    #[test]
    fn batch_report_counts_are_folded_from_items() {
        let ok_id = Uuid::new_v4();
        let bad_id = Uuid::new_v4();
        let report = BatchReport::from_items(vec![
            BatchItem::Processed {
                document_id: ok_id,
                title: "a".to_string(),
                report: ProcessOutcome {
                    document_id: ok_id,
                    status: DocumentStatus::Ready,
                    page_count: 1,
                    text_length: 10,
                    chunks_created: 1,
                    embeddings_saved: 1,
                    processed_at: Utc::now(),
                },
            },
            BatchItem::Failed {
                document_id: bad_id,
                title: "b".to_string(),
                error: "broken".to_string(),
            },
        ]);

        assert_eq!(report.total, 2);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);
    }
}
