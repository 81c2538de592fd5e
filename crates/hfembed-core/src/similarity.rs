use crate::error::{Error, Result};
use crate::types::SimilarityType;

/// Similarity between two embeddings; higher is always more similar.
///
/// Euclidean similarity is the negated distance. Cosine similarity of a
/// zero vector is 0.
pub fn similarity(a: &[f32], b: &[f32], mode: SimilarityType) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::inference(format!(
            "embedding dimensions mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let score = match mode {
        SimilarityType::DotProduct => dot_product(a, b),
        SimilarityType::Cosine => {
            let denom = l2_norm(a) * l2_norm(b);
            if denom <= 0.0 { 0.0 } else { dot_product(a, b) / denom }
        }
        SimilarityType::Euclidean => {
            let dist: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
            -dist
        }
    };
    Ok(score)
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
