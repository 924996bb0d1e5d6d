use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use docqa_core::{
    discover_pdf_files, is_pdf_path, select_embedder, select_store, Answer, DocumentId,
    EmbeddingGateway, IngestOutcome, IngestionPipeline, LopdfExtractor, OllamaClient,
    QueryPipeline, Settings, StoreProvider,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (TOML). Built-in defaults apply when omitted.
    #[arg(long, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF (or every PDF under a folder) into the vector store.
    Ingest {
        /// PDF file to ingest.
        #[arg(long, conflicts_with = "folder", required_unless_present = "folder")]
        file: Option<PathBuf>,
        /// Folder searched recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Ask a question about an ingested document.
    Ask {
        /// Document id printed by `ingest`.
        #[arg(long)]
        document_id: String,
        /// Question to answer from the document.
        #[arg(long)]
        question: String,
        /// Print the answer and context as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete everything stored for a document.
    Delete {
        #[arg(long)]
        document_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => {
            let settings = Settings::default();
            settings.validate()?;
            settings
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?settings.backend,
        started_at = %Utc::now().to_rfc3339(),
        "docqa boot"
    );

    let stores = select_store(&settings)?;
    let embeddings = EmbeddingGateway::new(select_embedder(&settings)?, settings.embed_dim)?;

    match cli.command {
        Command::Ingest { file, folder } => {
            let pipeline = IngestionPipeline::new(
                Arc::new(LopdfExtractor),
                embeddings,
                stores,
                settings.chunk_size,
            );

            match (file, folder) {
                (Some(file), _) => {
                    if !is_pdf_path(&file) {
                        bail!("file must be a PDF: {}", file.display());
                    }
                    ingest_file(&pipeline, &file).await?;
                }
                (None, Some(folder)) => ingest_folder(&pipeline, &folder).await?,
                (None, None) => bail!("either --file or --folder is required"),
            }
        }
        Command::Ask {
            document_id,
            question,
            json,
        } => {
            let llm = OllamaClient::new(
                settings.ollama.endpoint()?,
                settings.ollama.model.clone(),
                settings.ollama.timeout(),
            )?;
            let pipeline = QueryPipeline::new(embeddings, stores, Arc::new(llm));
            let answer = pipeline.query(&document_id, &question).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::Delete { document_id } => {
            let id = DocumentId::parse(&document_id)
                .with_context(|| format!("invalid document id: {document_id}"))?;
            if stores.delete(&id).await? {
                println!("deleted document_id={id}");
            } else {
                println!("nothing stored for document_id={id}");
            }
        }
    }

    Ok(())
}

async fn ingest_file(pipeline: &IngestionPipeline, path: &Path) -> anyhow::Result<DocumentId> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let report = pipeline.ingest(&bytes).await?;

    match report.outcome {
        IngestOutcome::Created { chunks } => println!(
            "PDF uploaded and processed successfully: document_id={} chunks={} at {}",
            report.document_id,
            chunks,
            Utc::now().to_rfc3339()
        ),
        IngestOutcome::AlreadyIngested => println!(
            "Document already uploaded: document_id={}",
            report.document_id
        ),
    }

    Ok(report.document_id)
}

async fn ingest_folder(pipeline: &IngestionPipeline, folder: &Path) -> anyhow::Result<()> {
    let files = discover_pdf_files(folder);
    if files.is_empty() {
        bail!("no pdf files found in {}", folder.display());
    }

    let mut skipped = 0usize;
    for path in &files {
        if let Err(error) = ingest_file(pipeline, path).await {
            skipped += 1;
            warn!(path = %path.display(), reason = %error, "skipped pdf");
        }
    }

    info!(folder = %folder.display(), files = files.len(), skipped, "folder ingestion finished");
    if skipped == files.len() {
        bail!("every pdf under {} failed to ingest", folder.display());
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("question: {}", answer.question);
    println!("answer: {}", answer.answer);
    for (rank, hit) in answer.context.iter().enumerate() {
        println!("[{}] score={:?}", rank + 1, hit.score);
        println!("  {}", hit.text);
    }
}
