// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedder: lowercase words hashed into a fixed number of
//! buckets. Texts sharing words score high on cosine similarity; identical
//! texts score exactly 1.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use waynebot_core::{EmbeddingClient, WaynebotError};

pub struct MockEmbedder {
    dims: usize,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, WaynebotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_identical_vector() {
        let e = MockEmbedder::default();
        let a = e.embed("Uses SQLite").await.unwrap();
        let b = e.embed("uses sqlite").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(e.call_count(), 2);
    }
}
