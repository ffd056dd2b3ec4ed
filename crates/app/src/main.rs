use chrono::Utc;
use clap::{Parser, Subcommand};
use legal_qa_core::{
    discover_pdf_files, file_ref_for, AccessScope, AnswerComposer, AskFilters, BatchItem,
    Category, Document, DocumentQuery, DocumentStatus, DocumentStore, IngestionPipeline,
    JsonAnswerStore, JsonDocumentStore, LopdfExtractor, OllamaEmbedder, OllamaGenerator,
    QaError, QdrantVectorIndex, Retriever, Uuid, DEFAULT_TOP_K,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "legal-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the document library and answer log
    #[arg(long, default_value = "legal-qa-data")]
    data_dir: PathBuf,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333", env = "QDRANT_URL")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "legal_chunks")]
    qdrant_collection: String,

    /// Vector dimensionality of the configured embedding model
    #[arg(long, default_value = "768")]
    embedding_dimensions: usize,

    /// Ollama base URL (embedding and generation endpoints)
    #[arg(long, default_value = "http://localhost:11434", env = "OLLAMA_URL")]
    ollama_url: String,

    /// Embedding model name
    #[arg(long, default_value = "nomic-embed-text:latest", env = "OLLAMA_EMBED_MODEL")]
    embed_model: String,

    /// Generation model name
    #[arg(long, default_value = "llama3.1:8b-instruct", env = "OLLAMA_CHAT_MODEL")]
    chat_model: String,

    /// Caller identity, normally supplied by the auth layer
    #[arg(long, default_value = "admin")]
    caller: String,

    /// Caller role: admin sees the whole library, user only owned documents
    #[arg(long, default_value = "admin")]
    role: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create document metadata without a file.
    Create {
        #[arg(long)]
        title: String,
        /// One of FAMILY, LAND, LABOR, BUSINESS.
        #[arg(long)]
        category: Category,
    },
    /// Attach a PDF to a new or existing document. Resets pipeline state.
    Upload {
        /// Path of the PDF on durable storage.
        #[arg(long)]
        file: PathBuf,
        /// Existing document to attach to; omit to create a new one.
        #[arg(long)]
        document_id: Option<Uuid>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category: Option<Category>,
    },
    /// Register every PDF under a folder as a new document.
    Register {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        category: Category,
    },
    /// List documents in the library.
    List {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        status: Option<DocumentStatus>,
        /// Case-insensitive title filter.
        #[arg(long)]
        query: Option<String>,
    },
    /// Show one document.
    Show {
        #[arg(long)]
        id: Uuid,
    },
    /// Update document metadata.
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category: Option<Category>,
    },
    /// Run the ingestion pipeline for one document.
    Process {
        #[arg(long)]
        id: Uuid,
    },
    /// Process all documents matching a status, sequentially.
    ProcessAll {
        #[arg(long, default_value = "UPLOADED")]
        status: DocumentStatus,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Ask a question grounded in the READY documents.
    Ask {
        #[arg(long)]
        question: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        document_id: Option<Uuid>,
    },
    /// Delete a document and its indexed chunks.
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

/// Ownership check for commands addressing one document. List and Ask
/// filter by scope instead of failing.
fn ensure_access(scope: &AccessScope, document: &Document) -> Result<(), QaError> {
    if scope.allows(document) {
        Ok(())
    } else {
        Err(QaError::Forbidden(format!(
            "document {} belongs to another owner",
            document.id
        )))
    }
}

fn print_document(document: &Document) {
    println!(
        "{} [{}] {} category={} pages={} text_length={}",
        document.id,
        document.status,
        document.title,
        document.category,
        document.page_count,
        document.text_length
    );
    if let Some(file) = &document.file {
        println!("  file={} size={}", file.file_key, file.file_size);
    }
    if let Some(message) = &document.error_message {
        println!("  error={message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let documents = JsonDocumentStore::new(cli.data_dir.join("documents.json"));
    let vector = QdrantVectorIndex::new(
        &cli.qdrant_url,
        &cli.qdrant_collection,
        cli.embedding_dimensions,
    )?;
    let embedder = OllamaEmbedder::new(&cli.ollama_url, &cli.embed_model)?;

    let scope = if cli.role.eq_ignore_ascii_case("admin") {
        AccessScope::admin(&cli.caller)
    } else {
        AccessScope::user(&cli.caller)
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        caller = %scope.caller,
        "legal-qa boot"
    );

    match cli.command {
        Command::Create { title, category } => {
            let document = Document::new(&scope.caller, title, category);
            print_document(&document);
            documents.insert(document).await?;
            println!("document created");
        }
        Command::Upload {
            file,
            document_id,
            title,
            category,
        } => {
            let file_ref = file_ref_for(&file)?;

            match document_id {
                Some(id) => {
                    let existing = documents
                        .get(id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("document not found: {id}"))?;
                    ensure_access(&scope, &existing)?;

                    let pipeline =
                        IngestionPipeline::new(documents, vector, embedder, LopdfExtractor);
                    let document = pipeline.attach_file(id, file_ref).await?;
                    print_document(&document);
                    println!("pdf attached, pipeline state reset");
                }
                None => {
                    let title = title.ok_or_else(|| {
                        anyhow::anyhow!("--title is required when creating a new document")
                    })?;
                    let category = category.ok_or_else(|| {
                        anyhow::anyhow!("--category is required when creating a new document")
                    })?;

                    let mut document = Document::new(&scope.caller, title, category);
                    document.attach_file(file_ref);
                    print_document(&document);
                    documents.insert(document).await?;
                    println!("pdf uploaded, document created");
                }
            }
        }
        Command::Register { folder, category } => {
            let files = discover_pdf_files(&folder);
            if files.is_empty() {
                warn!(folder = %folder.display(), "no pdf files found");
                return Ok(());
            }

            for path in files {
                let file_ref = file_ref_for(&path)?;
                let title = file_ref.file_name.clone();
                let mut document = Document::new(&scope.caller, title, category);
                document.attach_file(file_ref);
                info!(id = %document.id, path = %path.display(), "registered");
                documents.insert(document).await?;
            }
            println!("folder registered; run process-all to index");
        }
        Command::List {
            category,
            status,
            query,
        } => {
            let mut listing = documents
                .list(&DocumentQuery {
                    category,
                    status,
                    title_contains: query,
                })
                .await?;
            listing.retain(|document| scope.allows(document));
            for document in &listing {
                print_document(document);
            }
            println!("{} document(s)", listing.len());
        }
        Command::Show { id } => {
            let document = documents
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("document not found: {id}"))?;
            ensure_access(&scope, &document)?;
            print_document(&document);
        }
        Command::Update {
            id,
            title,
            category,
        } => {
            let mut document = documents
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("document not found: {id}"))?;
            ensure_access(&scope, &document)?;
            if let Some(title) = title {
                document.title = title.trim().to_string();
            }
            if let Some(category) = category {
                document.category = category;
            }
            documents.update(&document).await?;
            print_document(&document);
            println!("document updated");
        }
        Command::Process { id } => {
            let document = documents
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("document not found: {id}"))?;
            ensure_access(&scope, &document)?;

            vector.ensure_collection().await?;
            let pipeline = IngestionPipeline::new(documents, vector, embedder, LopdfExtractor);
            match pipeline.process_document(id).await {
                Ok(outcome) => {
                    println!(
                        "READY pages={} text_length={} chunks={} embeddings={}",
                        outcome.page_count,
                        outcome.text_length,
                        outcome.chunks_created,
                        outcome.embeddings_saved
                    );
                }
                Err(error) => {
                    warn!(id = %id, error = %error, "processing failed");
                    return Err(error.into());
                }
            }
        }
        Command::ProcessAll { status, limit } => {
            vector.ensure_collection().await?;
            let pipeline = IngestionPipeline::new(documents, vector, embedder, LopdfExtractor);
            let report = pipeline.process_batch(status, limit).await?;

            for item in &report.results {
                match item {
                    BatchItem::Processed {
                        title, report: outcome, ..
                    } => println!("ok    {} chunks={}", title, outcome.chunks_created),
                    BatchItem::Failed { title, error, .. } => {
                        println!("fail  {} error={}", title, error)
                    }
                }
            }
            println!(
                "batch finished: total={} processed={} failed={}",
                report.total, report.processed, report.failed
            );
        }
        Command::Ask {
            question,
            top_k,
            category,
            document_id,
        } => {
            let generator = OllamaGenerator::new(&cli.ollama_url, &cli.chat_model)?;
            let answers = JsonAnswerStore::new(cli.data_dir.join("answers.json"));
            let composer = AnswerComposer::new(
                Retriever::new(documents, vector, embedder),
                generator,
                answers,
            );

            let result = composer
                .answer(
                    &question,
                    top_k,
                    &AskFilters {
                        category,
                        document_id,
                    },
                    &scope,
                )
                .await?;

            println!("{}", result.answer);
            if !result.sources.is_empty() {
                println!("\nsources:");
                for source in &result.sources {
                    let pages = match (source.page_start, source.page_end) {
                        (Some(start), Some(end)) => format!("p.{start}-{end}"),
                        _ => "p.?".to_string(),
                    };
                    println!(
                        "[{}] {} ({}) score={:.4} document_id={}",
                        source.number, source.title, pages, source.score, source.document_id
                    );
                    println!("    {}", source.snippet);
                }
            }
        }
        Command::Delete { id } => {
            let document = documents
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("document not found: {id}"))?;
            ensure_access(&scope, &document)?;

            let pipeline = IngestionPipeline::new(documents, vector, embedder, LopdfExtractor);
            let document = pipeline.delete_document(id).await?;
            println!("deleted {} ({})", document.id, document.title);
        }
    }

    Ok(())
}
