//! `localrag`: fingerprint, chunk, or build a corpus and ask questions against it.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use localrag_core::chunker::Chunker;
use localrag_core::config::{Config, GeneratorConfig, Settings};
use localrag_core::traits::{Generator, Loader, TokenCounter};
use localrag_core::types::{CascadeOverrides, DocumentDescriptor, RetrievalRequest};
use localrag_corpus::{fingerprint, CorpusManager, DocumentLoader, Ingestor};
use localrag_embed::{get_default_embedder, get_default_reranker, get_default_token_counter};
use localrag_retrieval::context::NO_ANSWER;
use localrag_retrieval::{answer_with_sources, build_context, extract_sources, Answer};
use localrag_vector::{EmbeddingCache, IndexBuilder};

const SYSTEM_PROMPT: &str = "You answer questions using only the provided context. \
Keep answers brief and direct. Do not cite sources; they are listed separately. \
Say \"I don't know\" only when the context holds nothing relevant to the question.";

#[derive(Parser)]
#[command(name = "localrag")]
#[command(about = "Question answering over local documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the corpus fingerprint of a set of documents
    Fingerprint {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Load and chunk one document, one JSON chunk per line
    Chunk {
        path: String,
        /// Token budget per chunk [default: from config, 500]
        #[arg(long)]
        target: Option<usize>,
        /// Token overlap between sub-chunks [default: from config, 100]
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Build the corpus and answer a question against it
    Ask(AskCommand),
}

#[derive(Args)]
struct AskCommand {
    /// Document path or http(s) URL; repeat for several
    #[arg(short = 'd', long = "doc", required = true)]
    docs: Vec<String>,

    question: String,

    #[arg(long)]
    initial_pct: Option<f64>,

    #[arg(long)]
    rerank_pct: Option<f64>,

    #[arg(long)]
    mmr_pct: Option<f64>,

    /// MMR relevance/diversity trade-off (1.0 = relevance only)
    #[arg(long)]
    lambda: Option<f32>,

    /// Corpus size at or below which rerank and MMR are skipped
    #[arg(long)]
    min_chunk: Option<usize>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl AskCommand {
    fn overrides(&self) -> CascadeOverrides {
        CascadeOverrides {
            initial_pct: self.initial_pct,
            rerank_pct: self.rerank_pct,
            mmr_pct: self.mmr_pct,
            lambda_mult: self.lambda,
            min_chunk: self.min_chunk,
        }
    }
}

/// Non-streaming client for an Ollama-compatible `/api/generate` endpoint.
struct OllamaGenerator {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    fn from_config(config: &GeneratorConfig) -> Result<Option<Self>> {
        let Some(base) = config.base_url.as_deref() else { return Ok(None) };
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Some(Self {
            client,
            url: format!("{}/api/generate", base.trim_end_matches('/')),
            model: config.model.clone(),
        }))
    }
}

impl Generator for OllamaGenerator {
    fn generate(&self, context: &str, question: &str) -> Result<String> {
        let prompt = format!(
            "Context:\n{context}\n\nQuestion: {question}\n\n\
             Answer concisely using only the relevant information from the context above."
        );
        let body: Value = self
            .client
            .post(&self.url)
            .json(&json!({ "model": self.model, "system": SYSTEM_PROMPT, "prompt": prompt, "stream": false }))
            .send()?
            .error_for_status()?
            .json()?;
        body.get("response")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .context("generator reply has no 'response' field")
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn token_counter(settings: &Settings) -> Arc<dyn TokenCounter> {
    Arc::from(get_default_token_counter(&settings.tokenizer, &settings.embedding))
}

fn chunk(settings: &Settings, path: &str, target: Option<usize>, overlap: Option<usize>) -> Result<()> {
    let mut chunking = settings.chunking.clone();
    if let Some(t) = target {
        chunking.target_chunk_size = t;
    }
    if let Some(o) = overlap {
        chunking.chunk_overlap = o;
    }
    chunking.validate()?;
    let tokens = token_counter(settings);
    let units = DocumentLoader::new()?.load(path)?;
    let chunks = Chunker::new(chunking, tokens.as_ref()).chunk_units(&units)?;
    for c in &chunks {
        println!("{}", serde_json::to_string(c)?);
    }
    info!(path, units = units.len(), chunks = chunks.len(), "chunked document");
    Ok(())
}

fn ask(settings: &Settings, cmd: &AskCommand) -> Result<()> {
    let embedder = get_default_embedder(&settings.embedding)?;
    let reranker = get_default_reranker(&settings.reranker);
    let ingestor = Ingestor::new(Arc::new(DocumentLoader::new()?), token_counter(settings), settings.chunking.clone())?;
    let builder =
        IndexBuilder::new(embedder, Arc::new(EmbeddingCache::new())).with_batch_size(settings.embedding.batch_size);
    let manager = CorpusManager::new(ingestor, builder, reranker).with_cascade(settings.retrieval.clone());

    let descriptors: Vec<DocumentDescriptor> = cmd.docs.iter().map(DocumentDescriptor::new).collect();
    let snapshot = manager.build_or_reuse_index(&descriptors)?;
    info!(status = ?snapshot.status, fingerprint = ?snapshot.fingerprint, "corpus loaded");

    let request = RetrievalRequest { query: cmd.question.clone(), overrides: cmd.overrides() };
    let retrieved = manager.retrieve(&request)?;
    info!(retrieved = retrieved.len(), "retrieval finished");

    let answer = match OllamaGenerator::from_config(&settings.generator)? {
        Some(generator) => answer_with_sources(&generator, &cmd.question, retrieved)?,
        None => {
            let chunks = retrieved.into_chunks();
            let context = if chunks.is_empty() { NO_ANSWER.to_string() } else { build_context(&chunks) };
            Answer { answer: context, sources: extract_sources(&chunks, None) }
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }
    println!("{}\n", answer.answer);
    for (i, source) in answer.sources.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, source.path, source.page_info);
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;
    match cli.command {
        Commands::Fingerprint { paths } => {
            let descriptors: Vec<DocumentDescriptor> = paths.into_iter().map(DocumentDescriptor::new).collect();
            println!("{}", fingerprint(&descriptors));
        }
        Commands::Chunk { path, target, overlap } => chunk(&settings, &path, target, overlap)?,
        Commands::Ask(cmd) => ask(&settings, &cmd)?,
    }
    Ok(())
}
