//! Deterministic embedder for tests, previews and development

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::indexing::Embedder;
use crate::domain::DomainError;

const DEFAULT_DIMENSIONS: usize = 32;

/// Embeds text by expanding its SHA-256 digest into a unit vector
///
/// Identical text always yields the identical vector. Carries no semantic meaning.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut vector = Vec::with_capacity(self.dimensions);
        let mut counter: u32 = 0;

        while vector.len() < self.dimensions {
            let digest = Sha256::new()
                .chain_update(counter.to_le_bytes())
                .chain_update(text.as_bytes())
                .finalize();
            vector.extend(
                digest
                    .iter()
                    .take(self.dimensions - vector.len())
                    .map(|b| *b as f32 / 127.5 - 1.0),
            );
            counter += 1;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = HashEmbedder::new(48);

        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        let c = embedder.embed("world").await.unwrap();

        assert_eq!(a.len(), 48);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_embedding_is_normalized() {
        let vector = HashEmbedder::default().embed("text").await.unwrap();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
