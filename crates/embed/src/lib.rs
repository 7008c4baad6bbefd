//! Adapter to the embedding service with deterministic hash fallback (C5
//! EmbedGateway).

use sha2::{Digest, Sha256};

#[derive(Debug, serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct EmbedGateway {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl EmbedGateway {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
        }
    }

    /// Embed `text`. On any failure of the remote call — network error,
    /// non-2xx status, malformed response, or dimension mismatch — falls
    /// back to [`hash_embedding`]. The fallback is diagnostic, not
    /// semantic: it keeps storage and dedup paths functioning while the
    /// embedder is unavailable (§4.4).
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        match self.embed_remote(text).await {
            Ok(vector) if vector.len() == self.dimensions => vector,
            Ok(vector) => {
                tracing::warn!(
                    expected = self.dimensions,
                    got = vector.len(),
                    "embedder returned unexpected dimensionality, falling back"
                );
                hash_embedding(text, self.dimensions)
            }
            Err(err) => {
                tracing::warn!(error = %err, "embedding call failed, using hash fallback");
                hash_embedding(text, self.dimensions)
            }
        }
    }

    async fn embed_remote(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(&EmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?
            .error_for_status()?;
        let body: EmbedResponse = response.json().await?;
        Ok(body.embedding)
    }
}

/// Deterministic pseudo-embedding derived from a SHA-256 digest of `text`,
/// expanded to `dimensions` by re-hashing the digest with an incrementing
/// counter. Each component is mapped to `[-1, 1]` and the result is
/// L2-normalised so it behaves sensibly under cosine similarity.
pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = Vec::with_capacity(dimensions);
    let mut counter: u32 = 0;
    while vector.len() < dimensions {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for byte in digest {
            if vector.len() == dimensions {
                break;
            }
            vector.push((byte as f32 / 255.0) * 2.0 - 1.0);
        }
        counter += 1;
    }
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for component in &mut vector {
            *component /= magnitude;
        }
    }
    vector
}

/// Cosine similarity clamped to `[0, 1]`, matching the range VectorGateway
/// reports from the remote store (§4.3).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedding_is_deterministic_and_sized() {
        let a = hash_embedding("hello world", 384);
        let b = hash_embedding("hello world", 384);
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_embedding_differs_for_different_text() {
        let a = hash_embedding("hello", 64);
        let b = hash_embedding("goodbye", 64);
        assert_ne!(a, b);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = hash_embedding("some text", 32);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_mismatched_length_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn embed_falls_back_when_remote_unreachable() {
        let gateway = EmbedGateway::new("http://127.0.0.1:1", "test-model", 16);
        let vector = gateway.embed("fallback text").await;
        assert_eq!(vector.len(), 16);
    }
}
