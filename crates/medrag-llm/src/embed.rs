use std::future::Future;

use crate::error::LlmError;

/// Default sentence-embedding model shared by ingestion and queries.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output dimension of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Maps text to fixed-length vectors.
///
/// Implementations must return vectors of exactly [`Embedder::dimensions`] floats
/// and must be deterministic for a given input.
pub trait Embedder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the model is unavailable or returns a malformed vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns an error if any text fails to embed.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    fn dimensions(&self) -> usize;

    fn model_id(&self) -> &str;
}

/// Reject vectors whose length differs from the expected dimension.
///
/// # Errors
///
/// Returns [`LlmError::DimensionMismatch`] for the first offending vector.
pub fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<(), LlmError> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(LlmError::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_dimensions_accepts_matching() {
        assert!(check_dimensions(&[vec![0.0; 3], vec![1.0; 3]], 3).is_ok());
    }

    #[test]
    fn check_dimensions_rejects_mismatch() {
        let err = check_dimensions(&[vec![0.0; 3], vec![1.0; 2]], 3).unwrap_err();
        assert!(matches!(
            err,
            LlmError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn check_dimensions_empty_ok() {
        assert!(check_dimensions(&[], 384).is_ok());
    }
}
