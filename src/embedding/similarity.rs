use crate::embedding::EmbeddingError;

/// Cosine similarity of two vectors, in [-1, 1].
///
/// A zero-magnitude vector has similarity 0.0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (mag_a * mag_b);
    if !similarity.is_finite() {
        return Err(EmbeddingError::GenerationError(
            "non-finite values in embedding".to_string(),
        ));
    }

    Ok(similarity.clamp(-1.0, 1.0))
}
