//! Reference in-memory vector index.
//!
//! Documents are embedded by signed feature hashing of their tokens and
//! searched by cosine similarity. Diversity search uses maximal marginal
//! relevance.
//! The index is loaded from a JSON snapshot: an array of
//! `{"content": ..., "metadata": {...}}` objects.

use crate::error::{IndexError, Result};
use crate::persistence::load_json;
use crate::rag::query::tokenize;
use crate::rag::retriever::{Capability, VectorSearch};
use crate::rag::types::{Candidate, Metadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
fn fnv1a(token: &str) -> u64 {
    token
        .bytes()
        .fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Signed feature-hashing embedder over the query tokenizer's vocabulary.
///
/// Each distinct token lands in bucket `hash % dimensions` with a sign taken
/// from the hash's top bit, so colliding tokens tend to cancel instead of
/// piling up. Repeats count once. Vectors are unit length, or all zero for
/// text without tokens.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> std::result::Result<Self, IndexError> {
        if dimensions == 0 {
            return Err(IndexError::ZeroDimensions);
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let hash = fnv1a(&token);
            let bucket = (hash % self.dimensions as u64) as usize;
            vector[bucket] += if hash >> 63 == 0 { 1.0 } else { -1.0 };
        }

        let norm = dot(&vector, &vector).sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// Similarity of two embeddings. Both are unit length or zero, so the dot
/// product is already the cosine.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// One snapshot entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Which searches the index answers. Disabled ones report `Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCapabilities {
    pub diversity: bool,
    pub similarity_with_scores: bool,
    pub similarity: bool,
}

impl IndexCapabilities {
    pub const ALL: Self = Self {
        diversity: true,
        similarity_with_scores: true,
        similarity: true,
    };
}

impl Default for IndexCapabilities {
    fn default() -> Self {
        Self::ALL
    }
}

pub struct InMemoryIndex {
    embedder: HashEmbedder,
    entries: Vec<(Candidate, Vec<f32>)>,
    mmr_lambda: f32,
    capabilities: IndexCapabilities,
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("documents", &self.entries.len())
            .field("dimensions", &self.embedder.dimensions())
            .field("mmr_lambda", &self.mmr_lambda)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl InMemoryIndex {
    pub fn from_documents(
        documents: Vec<IndexedDocument>,
        dimensions: usize,
        mmr_lambda: f32,
    ) -> std::result::Result<Self, IndexError> {
        let embedder = HashEmbedder::new(dimensions)?;
        let entries = documents
            .into_iter()
            .map(|doc| {
                let vector = embedder.embed(&doc.content);
                (Candidate::new(doc.content, doc.metadata), vector)
            })
            .collect();
        Ok(Self {
            embedder,
            entries,
            mmr_lambda: mmr_lambda.clamp(0.0, 1.0),
            capabilities: IndexCapabilities::ALL,
        })
    }

    /// Load a JSON snapshot from disk.
    pub fn load(
        path: &Path,
        dimensions: usize,
        mmr_lambda: f32,
    ) -> std::result::Result<Self, IndexError> {
        let documents: Vec<IndexedDocument> = load_json(path)
            .map_err(|e| IndexError::InvalidSnapshot {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .ok_or_else(|| IndexError::NotFound {
                path: path.to_path_buf(),
            })?;
        debug!(path = %path.display(), documents = documents.len(), "Index snapshot loaded");
        Self::from_documents(documents, dimensions, mmr_lambda)
    }

    pub fn with_capabilities(mut self, capabilities: IndexCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry indices and similarities, best first, at most `k`.
    fn nearest(&self, query_vec: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, dot(query_vec, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Maximal marginal relevance over the `fetch_k` nearest entries.
    fn mmr(&self, query: &str, k: usize, fetch_k: usize) -> Vec<Candidate> {
        let query_vec = self.embedder.embed(query);
        let mut pool = self.nearest(&query_vec, fetch_k.max(k));
        let mut selected: Vec<usize> = Vec::with_capacity(k);

        while selected.len() < k && !pool.is_empty() {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, (idx, relevance)) in pool.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|s| dot(&self.entries[*idx].1, &self.entries[*s].1))
                    .fold(0.0f32, f32::max);
                let score = self.mmr_lambda * relevance - (1.0 - self.mmr_lambda) * redundancy;
                if score > best_score {
                    best = pos;
                    best_score = score;
                }
            }
            selected.push(pool.remove(best).0);
        }

        selected
            .into_iter()
            .map(|i| self.entries[i].0.clone())
            .collect()
    }
}

#[async_trait]
impl VectorSearch for InMemoryIndex {
    async fn diversity_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
    ) -> Result<Capability<Vec<Candidate>>> {
        if !self.capabilities.diversity {
            return Ok(Capability::Unsupported);
        }
        Ok(Capability::Supported(self.mmr(query, k, fetch_k)))
    }

    async fn similarity_search_with_scores(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Capability<Vec<(Candidate, f32)>>> {
        if !self.capabilities.similarity_with_scores {
            return Ok(Capability::Unsupported);
        }
        let query_vec = self.embedder.embed(query);
        Ok(Capability::Supported(
            self.nearest(&query_vec, k)
                .into_iter()
                .map(|(i, score)| (self.entries[i].0.clone(), score))
                .collect(),
        ))
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Capability<Vec<Candidate>>> {
        if !self.capabilities.similarity {
            return Ok(Capability::Unsupported);
        }
        let query_vec = self.embedder.embed(query);
        Ok(Capability::Supported(
            self.nearest(&query_vec, k)
                .into_iter()
                .map(|(i, _)| self.entries[i].0.clone())
                .collect(),
        ))
    }
}
