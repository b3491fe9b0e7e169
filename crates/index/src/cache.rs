use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::embeddings::Encoder;

/// Encoder wrapper that memoizes embeddings by text for the process lifetime.
pub struct CachedEncoder {
    inner: Arc<dyn Encoder>,
    embeddings: DashMap<String, Vec<f32>>,
    max_entries: usize,
}

impl CachedEncoder {
    pub fn new(inner: Arc<dyn Encoder>, max_entries: usize) -> Self {
        Self {
            inner,
            embeddings: DashMap::new(),
            max_entries,
        }
    }

    fn set_embedding(&self, text: &str, embedding: Vec<f32>) {
        if self.max_entries == 0 {
            return;
        }
        if self.embeddings.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self.embeddings.iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.embeddings.remove(&key);
            }
        }
        let key = hash_text(text);
        self.embeddings.insert(key, embedding);
    }

    fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        let key = hash_text(text);
        self.embeddings.get(&key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl Encoder for CachedEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(embedding) = self.get_embedding(text) {
            return Ok(embedding);
        }
        let embedding = self.inner.encode(text).await?;
        self.set_embedding(text, embedding.clone());
        Ok(embedding)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let missing: Vec<String> = texts.iter()
            .filter(|t| self.get_embedding(t).is_none())
            .cloned()
            .collect();

        if !missing.is_empty() {
            let fresh = self.inner.encode_batch(&missing).await?;
            for (text, embedding) in missing.iter().zip(fresh) {
                self.set_embedding(text, embedding);
            }
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            // Evicted between the two passes: fall back to a single encode
            match self.get_embedding(text) {
                Some(embedding) => embeddings.push(embedding),
                None => embeddings.push(self.encode(text).await?),
            }
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEncoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Encoder for CountingEncoder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let inner = Arc::new(CountingEncoder { calls: AtomicUsize::new(0) });
        let cached = CachedEncoder::new(inner.clone(), 100);

        let a = cached.encode("works_at").await.unwrap();
        let b = cached.encode("works_at").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_only_encodes_missing() {
        let inner = Arc::new(CountingEncoder { calls: AtomicUsize::new(0) });
        let cached = CachedEncoder::new(inner.clone(), 100);
        cached.encode("a").await.unwrap();

        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let out = cached.encode_batch(&texts).await.unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[2], vec![3.0, 1.0]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_eviction_bounds_size() {
        let inner = Arc::new(CountingEncoder { calls: AtomicUsize::new(0) });
        let cached = CachedEncoder::new(inner, 4);

        for word in ["a", "b", "c", "d", "e", "f"] {
            cached.encode(word).await.unwrap();
        }

        assert!(cached.len() <= 4);
    }
}
