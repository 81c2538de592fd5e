use hfembed_core::config::Config;
use hfembed_core::traits::BaseEmbedding;
use hfembed_embed::HuggingFaceEmbedding;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let embedder = HuggingFaceEmbedding::from_config(&Config::load()?)?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.get_text_embeddings(&texts).await?;
    println!("model={} B={} dim={}", embedder.model_type(), embs.len(), embs[0].len());
    Ok(())
}
