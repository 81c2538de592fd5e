use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use hfembed_core::config::Config;
use hfembed_core::traits::BaseEmbedding;
use hfembed_core::types::{Embedding, SimilarityType};
use hfembed_embed::{HuggingFaceEmbedding, ModelStore};

const USAGE: &str = "Usage: hfembed <embed|query|compare|fetch> [args...]
  embed <text>                               embed a document text
  query <text>                               embed a search query
  compare <a> <b> [cosine|dot|euclidean]     similarity of two texts
  fetch                                      download the configured model files";

#[derive(Serialize)]
struct EmbeddingOutput<'a> {
    model: &'a str,
    quantized: bool,
    dims: usize,
    embedding: Embedding,
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn text_arg(args: &[String], idx: usize, what: &str) -> anyhow::Result<String> {
    match args.get(idx) {
        Some(s) => Ok(s.clone()),
        None => bail!("missing <{what}>\n{USAGE}"),
    }
}

fn print_embedding(embedder: &HuggingFaceEmbedding, embedding: Embedding) -> anyhow::Result<()> {
    let out = EmbeddingOutput {
        model: embedder.model_type().identifier(),
        quantized: embedder.quantized(),
        dims: embedding.len(),
        embedding,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

async fn fetch(config: &Config) -> anyhow::Result<()> {
    let model = config.embedding()?.model_type;
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    let bar = pb.clone();
    let store = ModelStore::from_config(&config.models()?).with_progress(Arc::new(move |file: &str, done: u64, total: u64| {
        if total > 0 { bar.set_length(total); }
        bar.set_position(done);
        bar.set_message(file.to_string());
    }));
    println!("📦 Fetching {} into {}", model, store.model_dir(model).display());
    let files = tokio::task::spawn_blocking(move || store.resolve(model)).await??;
    pb.finish_and_clear();
    tracing::info!(%model, dir = %files.dir.display(), "model files ready");
    println!("✅ config:    {}", files.config.display());
    println!("✅ tokenizer: {}", files.tokenizer.display());
    println!("✅ weights:   {}", files.weights.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().context("Error loading config")?;
    let (cmd, args) = parse_args();
    tracing::debug!(command = %cmd, args = args.len(), "dispatching");
    match cmd.as_str() {
        "embed" => {
            let text = text_arg(&args, 0, "text")?;
            let embedder = HuggingFaceEmbedding::from_config(&config)?;
            let embedding = embedder.get_text_embedding(&text).await?;
            print_embedding(&embedder, embedding)?;
        }
        "query" => {
            let query = text_arg(&args, 0, "text")?;
            let embedder = HuggingFaceEmbedding::from_config(&config)?;
            let embedding = embedder.get_query_embedding(&query).await?;
            print_embedding(&embedder, embedding)?;
        }
        "compare" => {
            let a = text_arg(&args, 0, "a")?;
            let b = text_arg(&args, 1, "b")?;
            let mode: SimilarityType = match args.get(2) {
                Some(m) => m.parse()?,
                None => SimilarityType::Cosine,
            };
            let embedder = HuggingFaceEmbedding::from_config(&config)?;
            let va = embedder.get_text_embedding(&a).await?;
            let vb = embedder.get_text_embedding(&b).await?;
            let score = embedder.similarity(&va, &vb, mode)?;
            println!("{score:.6}");
        }
        "fetch" => fetch(&config).await?,
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}
