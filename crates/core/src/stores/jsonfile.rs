use crate::error::{QaError, Result};
use crate::models::{AnswerRecord, Document, DocumentQuery};
use crate::traits::{AnswerStore, DocumentStore};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Document metadata persisted as a single JSON file, so the CLI keeps
/// its library across runs without a database server.
pub struct JsonDocumentStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<Document>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, documents: &[Document]) -> Result<()> {
        write_json(&self.path, documents)
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn insert(&self, document: Document) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut documents = self.load()?;
        documents.push(document);
        self.save(&documents)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()?
            .into_iter()
            .find(|document| document.id == id))
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let _guard = self.lock.lock().await;
        let mut matching: Vec<Document> = self
            .load()?
            .into_iter()
            .filter(|document| query.matches(document))
            .collect();
        matching.sort_by_key(|document| document.created_at);
        Ok(matching)
    }

    async fn update(&self, document: &Document) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut documents = self.load()?;
        let slot = documents
            .iter_mut()
            .find(|existing| existing.id == document.id)
            .ok_or_else(|| QaError::NotFound(format!("document not found: {}", document.id)))?;
        *slot = document.clone();
        self.save(&documents)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Document>> {
        let _guard = self.lock.lock().await;
        let mut documents = self.load()?;
        let position = documents.iter().position(|document| document.id == id);
        let removed = position.map(|index| documents.remove(index));
        if removed.is_some() {
            self.save(&documents)?;
        }
        Ok(removed)
    }
}

/// Append-only answer log persisted next to the document library.
pub struct JsonAnswerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonAnswerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn records(&self) -> Result<Vec<AnswerRecord>> {
        let _guard = self.lock.lock().await;
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl AnswerStore for JsonAnswerStore {
    async fn append(&self, record: AnswerRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records: Vec<AnswerRecord> = if self.path.exists() {
            serde_json::from_str(&fs::read_to_string(&self.path)?)?
        } else {
            Vec::new()
        };
        records.push(record);
        write_json(&self.path, &records)
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::status::DocumentStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn documents_survive_a_store_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("documents.json");

        let document = Document::new("admin", "Land law", Category::Land);
        let id = document.id;

        JsonDocumentStore::new(&path).insert(document).await?;

        let reopened = JsonDocumentStore::new(&path);
        let loaded = reopened.get(id).await?.expect("document should persist");
        assert_eq!(loaded.title, "Land law");
        assert_eq!(loaded.status, DocumentStatus::Uploaded);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_the_document() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("documents.json");
        let store = JsonDocumentStore::new(&path);

        let document = Document::new("admin", "Family code", Category::Family);
        let id = document.id;
        store.insert(document).await?;

        assert!(store.delete(id).await?.is_some());
        assert!(store.get(id).await?.is_none());
        assert!(store.delete(id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn answer_log_appends_records() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JsonAnswerStore::new(dir.path().join("answers.json"));

        store
            .append(AnswerRecord::new(
                "alice",
                "What does Article 1 say?",
                "It says [1]. Not legal advice.",
                Vec::new(),
                Default::default(),
            ))
            .await?;

        let records = store.records().await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "alice");
        Ok(())
    }
}
