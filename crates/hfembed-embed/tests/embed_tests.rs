use std::sync::Arc;
use std::time::Duration;

use hfembed_core::config::EmbeddingConfig;
use hfembed_core::similarity::similarity;
use hfembed_core::traits::BaseEmbedding;
use hfembed_core::types::{ModelType, SimilarityType};
use hfembed_embed::{ExtractorState, FakePipeline, HuggingFaceEmbedding};

fn adapter(factory: &FakePipeline, config: EmbeddingConfig) -> HuggingFaceEmbedding {
    HuggingFaceEmbedding::new(config, Arc::new(factory.clone()))
}

fn norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

#[tokio::test]
async fn default_config_embeds_hello_world() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    assert_eq!(embedder.model_type(), ModelType::AllMiniLmL6V2);
    assert!(embedder.quantized());

    let v = embedder.get_text_embedding("hello world").await.expect("embedding");
    assert_eq!(v.len(), 384, "MiniLM-L6 embeds to 384 dims");
    assert!((norm(&v) - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={})", norm(&v));
}

#[tokio::test]
async fn construction_is_lazy_and_happens_once() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    assert_eq!(embedder.state(), ExtractorState::Uninitialized);
    assert_eq!(factory.constructions(), 0, "constructing the adapter loads nothing");

    for i in 0..5 {
        embedder.get_text_embedding(&format!("text number {i}")).await.unwrap();
    }
    embedder.get_query_embedding("a query").await.unwrap();
    assert_eq!(factory.constructions(), 1);
    assert_eq!(embedder.state(), ExtractorState::Ready);
}

#[tokio::test]
async fn get_extractor_returns_cached_handle() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    let a = embedder.get_extractor().await.unwrap();
    let b = embedder.get_extractor().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.dim(), 384);
    assert_eq!(factory.constructions(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_share_one_construction() {
    let factory = FakePipeline::new().with_load_delay(Duration::from_millis(50));
    let embedder = Arc::new(adapter(&factory, EmbeddingConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let embedder = Arc::clone(&embedder);
            tokio::spawn(async move { embedder.get_text_embedding(&format!("concurrent {i}")).await })
        })
        .collect();
    for h in handles {
        h.await.expect("join").expect("embedding");
    }
    assert_eq!(factory.constructions(), 1, "in-flight initialization is shared");
}

#[tokio::test]
async fn repeated_calls_are_deterministic() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    let v1 = embedder.get_text_embedding("the quick brown fox").await.unwrap();
    let v2 = embedder.get_text_embedding("the quick brown fox").await.unwrap();
    assert_eq!(v1.len(), v2.len());
    for (a, b) in v1.iter().zip(&v2) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn query_embedding_matches_text_embedding() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    for input in ["", "hello", "what is the capital of france?"] {
        let text = embedder.get_text_embedding(input).await.unwrap();
        let query = embedder.get_query_embedding(input).await.unwrap();
        assert_eq!(text, query, "pass-through for {input:?}");
    }
}

#[tokio::test]
async fn empty_string_is_accepted() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    for text in ["", "   \t "] {
        let v = embedder.get_text_embedding(text).await.unwrap();
        assert_eq!(v.len(), 384);
        assert!((norm(&v) - 1.0).abs() <= 1e-3, "{text:?}: norm={}", norm(&v));
    }
    assert_eq!(
        embedder.get_text_embedding("").await.unwrap(),
        embedder.get_text_embedding(" ").await.unwrap(),
        "blank inputs embed alike"
    );
}

#[tokio::test]
async fn zero_dimension_fails_initialization() {
    let factory = FakePipeline::new().with_dim(0);
    let embedder = adapter(&factory, EmbeddingConfig::default());
    let err = embedder.get_text_embedding("hello").await.unwrap_err();
    assert!(err.is_initialization(), "got {err:?}");
    assert_eq!(embedder.state(), ExtractorState::Uninitialized);
}

#[tokio::test]
async fn initialization_failure_surfaces_and_is_not_cached() {
    let factory = FakePipeline::new().failing("weights unavailable");
    let embedder = adapter(&factory, EmbeddingConfig::default());

    let err = embedder.get_text_embedding("hello world").await.unwrap_err();
    assert!(err.is_initialization(), "got {err:?}");
    assert!(err.to_string().contains("Xenova/all-MiniLM-L6-v2"));
    assert_eq!(embedder.state(), ExtractorState::Uninitialized);

    let err = embedder.get_query_embedding("hello world").await.unwrap_err();
    assert!(err.is_initialization());
    assert_eq!(factory.constructions(), 2, "the next call tries again");
}

#[tokio::test]
async fn inference_failure_propagates_unchanged() {
    let factory = FakePipeline::new().failing_on("poison");
    let embedder = adapter(&factory, EmbeddingConfig::default());

    let err = embedder.get_text_embedding("poison").await.unwrap_err();
    assert!(err.is_inference(), "got {err:?}");
    assert_eq!(embedder.state(), ExtractorState::Ready, "extractor stays cached");
    assert!(embedder.get_text_embedding("antidote").await.is_ok());
}

#[tokio::test]
async fn quantized_and_full_precision_are_close() {
    let quantized = adapter(&FakePipeline::new(), EmbeddingConfig { quantized: true, ..Default::default() });
    let full = adapter(&FakePipeline::new(), EmbeddingConfig { quantized: false, ..Default::default() });

    let input = "embeddings for retrieval augmented generation";
    let q = quantized.get_text_embedding(input).await.unwrap();
    let f = full.get_text_embedding(input).await.unwrap();
    assert_eq!(q.len(), f.len());
    let cos = similarity(&q, &f, SimilarityType::Cosine).unwrap();
    assert!(cos > 0.99, "cosine similarity {cos}");
}

#[tokio::test]
async fn separate_adapters_load_separately() {
    let factory = FakePipeline::new();
    let a = adapter(&factory, EmbeddingConfig::default());
    let b = adapter(&factory, EmbeddingConfig::default());
    a.get_text_embedding("x").await.unwrap();
    b.get_text_embedding("x").await.unwrap();
    assert_eq!(factory.constructions(), 2, "no process-wide cache");
}

#[tokio::test]
async fn batch_embeddings_follow_input_order() {
    let factory = FakePipeline::new();
    let embedder = adapter(&factory, EmbeddingConfig::default());
    let texts = vec!["alpha".to_string(), "bravo".to_string(), "alpha".to_string()];
    let embs = embedder.get_text_embeddings(&texts).await.unwrap();
    assert_eq!(embs.len(), 3);
    assert_eq!(embs[0], embs[2]);
    assert_ne!(embs[0], embs[1]);

    let score = embedder.similarity(&embs[0], &embs[2], SimilarityType::Cosine).unwrap();
    assert!((score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn model_choice_reaches_the_factory() {
    let factory = FakePipeline::new().with_dim(16);
    let embedder = adapter(&factory, EmbeddingConfig { model_type: ModelType::BgeSmallEnV15, quantized: false });
    let v = embedder.get_text_embedding("hello").await.unwrap();
    assert_eq!(v.len(), 16);
    assert_eq!(embedder.model_type().identifier(), "Xenova/bge-small-en-v1.5");
}
