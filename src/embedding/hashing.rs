// src/embedding/hashing.rs
//! Deterministic offline embedder: hashed character n-grams, L2-normalized.
//!
//! Used in mock/test mode and as a network-free provider. It captures lexical
//! overlap only ("금리 인상" lands near "금리"), nothing semantic.

use async_trait::async_trait;

use super::{EmbeddingService, EmbeddingServiceError};

pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(8) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        for token in lower.split_whitespace() {
            let chars: Vec<char> = token.chars().collect();
            self.bump(&mut v, "t", token);
            for c in &chars {
                let mut buf = [0u8; 4];
                self.bump(&mut v, "u", c.encode_utf8(&mut buf));
            }
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                self.bump(&mut v, "b", &bigram);
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }

    fn bump(&self, v: &mut [f32], kind: &str, feature: &str) {
        let idx = (fnv1a(kind, feature) % self.dims as u64) as usize;
        v[idx] += 1.0;
    }
}

fn fnv1a(kind: &str, feature: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in kind.bytes().chain([0u8]).chain(feature.bytes()) {
        h ^= b as u64;
        h = h.wrapping_mul(0x0100_0000_01b3);
    }
    h
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        Ok(inputs.iter().map(|s| self.embed_text(s)).collect())
    }
    fn name(&self) -> &'static str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_distance;

    #[test]
    fn identical_text_has_zero_distance() {
        let e = HashingEmbedder::new(512);
        let a = e.embed_text("기준금리");
        assert!(cosine_distance(&a, &e.embed_text("  기준금리 ")) < 1e-6);
    }

    #[test]
    fn phrasing_variant_is_closer_to_its_term() {
        let e = HashingEmbedder::new(512);
        let q = e.embed_text("금리 인상");
        let near = cosine_distance(&q, &e.embed_text("금리"));
        let far = cosine_distance(&q, &e.embed_text("환율"));
        assert!(near < far, "near={near} far={far}");
        assert!(near < 0.38, "near={near}");
    }

    #[test]
    fn empty_text_is_a_zero_vector() {
        let e = HashingEmbedder::new(16);
        assert!(e.embed_text("   ").iter().all(|x| *x == 0.0));
    }
}
