//! Hybrid retriever: tiered primary search plus phrase-targeted supplemental search.

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::rag::query::NormalizedQuery;
use crate::rag::types::Candidate;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a capability probe: either the store ran the search, or it
/// does not offer that kind of search at all.
///
/// `Supported(vec![])` is a valid empty result and is not the same thing as
/// `Unsupported`.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<T> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Capability::Supported(v) => Some(v),
            Capability::Unsupported => None,
        }
    }
}

/// The vector-search collaborator.
///
/// Every method defaults to `Unsupported`, so a store implements only the
/// searches it actually has. `Err` is reserved for real failures.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Relevance- and diversity-maximizing search over a pool of `fetch_k`.
    async fn diversity_search(
        &self,
        _query: &str,
        _k: usize,
        _fetch_k: usize,
    ) -> Result<Capability<Vec<Candidate>>> {
        Ok(Capability::Unsupported)
    }

    async fn similarity_search_with_scores(
        &self,
        _query: &str,
        _k: usize,
    ) -> Result<Capability<Vec<(Candidate, f32)>>> {
        Ok(Capability::Unsupported)
    }

    async fn similarity_search(
        &self,
        _query: &str,
        _k: usize,
    ) -> Result<Capability<Vec<Candidate>>> {
        Ok(Capability::Unsupported)
    }
}

/// Primary retrieval strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalTier {
    Diversity,
    SimilarityWithScores,
    Similarity,
}

impl RetrievalTier {
    pub const ORDER: [RetrievalTier; 3] = [
        RetrievalTier::Diversity,
        RetrievalTier::SimilarityWithScores,
        RetrievalTier::Similarity,
    ];
}

impl fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalTier::Diversity => write!(f, "diversity"),
            RetrievalTier::SimilarityWithScores => write!(f, "similarity-with-scores"),
            RetrievalTier::Similarity => write!(f, "similarity"),
        }
    }
}

/// Candidates gathered for one query, before deduplication.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// The tier that ran, or `None` if the store supports none of them.
    pub tier: Option<RetrievalTier>,
    pub primary: Vec<Candidate>,
    pub supplemental: Vec<Candidate>,
}

impl Retrieval {
    /// Primary results followed by supplemental ones.
    pub fn into_combined(self) -> Vec<Candidate> {
        let mut all = self.primary;
        all.extend(self.supplemental);
        all
    }
}

/// Retriever widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub fetch_k: usize,
    pub phrase_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrieverConfig {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            top_k: cfg.top_k,
            fetch_k: cfg.fetch_k,
            phrase_k: cfg.phrase_k,
        }
    }
}

/// Hybrid retriever over a [`VectorSearch`] store.
pub struct HybridRetriever {
    store: Arc<dyn VectorSearch>,
    config: RetrieverConfig,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn VectorSearch>, config: RetrieverConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn VectorSearch> {
        Arc::clone(&self.store)
    }

    pub async fn retrieve(&self, query: &NormalizedQuery) -> Result<Retrieval> {
        let (tier, primary) = self.primary(&query.retrieval_query).await?;
        let supplemental = self.supplemental(&query.expanded_phrase_queries).await;
        debug!(
            tier = tier.map(|t| t.to_string()).unwrap_or_else(|| "none".into()),
            primary = primary.len(),
            supplemental = supplemental.len(),
            "Retrieval complete"
        );
        Ok(Retrieval {
            tier,
            primary,
            supplemental,
        })
    }

    /// Run the first tier the store supports. Exactly one tier executes.
    async fn primary(&self, query: &str) -> Result<(Option<RetrievalTier>, Vec<Candidate>)> {
        let RetrieverConfig { top_k, fetch_k, .. } = self.config;
        for tier in RetrievalTier::ORDER {
            let hits = match tier {
                RetrievalTier::Diversity => self
                    .store
                    .diversity_search(query, top_k, fetch_k)
                    .await?
                    .into_option()
                    .map(without_scores),
                RetrievalTier::SimilarityWithScores => self
                    .store
                    .similarity_search_with_scores(query, top_k)
                    .await?
                    .into_option()
                    .map(|pairs| {
                        pairs
                            .into_iter()
                            .map(|(candidate, score)| candidate.with_score(score))
                            .collect()
                    }),
                RetrievalTier::Similarity => self
                    .store
                    .similarity_search(query, top_k)
                    .await?
                    .into_option()
                    .map(without_scores),
            };
            match hits {
                Some(hits) => return Ok((Some(tier), hits)),
                None => debug!(%tier, "Store lacks capability, falling back"),
            }
        }
        warn!("Vector store supports no primary search capability");
        Ok((None, Vec::new()))
    }

    /// Phrase-targeted searches. A phrase whose search fails contributes
    /// nothing; the rest still run.
    async fn supplemental(&self, phrases: &[String]) -> Vec<Candidate> {
        let mut out = Vec::new();
        for phrase in phrases {
            match self
                .store
                .similarity_search(phrase, self.config.phrase_k)
                .await
            {
                Ok(Capability::Supported(hits)) => out.extend(without_scores(hits)),
                Ok(Capability::Unsupported) => {
                    debug!("Store lacks similarity search, skipping supplemental phrases");
                    return Vec::new();
                }
                Err(e) => {
                    warn!(error = %e, %phrase, "Supplemental phrase search failed, skipping");
                }
            }
        }
        out
    }
}

fn without_scores(hits: Vec<Candidate>) -> Vec<Candidate> {
    hits.into_iter()
        .map(|mut c| {
            c.score = None;
            c
        })
        .collect()
}
