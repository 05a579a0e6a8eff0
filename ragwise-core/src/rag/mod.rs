//! Retrieval and answer arbitration.

pub mod context;
pub mod dedup;
pub mod grounding;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod reranker;
pub mod retriever;
pub mod rules;
pub mod subject;
pub mod types;

pub use context::GroundingContext;
pub use dedup::{ScoredCandidate, deduplicate};
pub use grounding::{EntityGrounder, GroundingReport};
pub use pipeline::QueryPipeline;
pub use query::{EntityMatch, NormalizedQuery, QueryRules};
pub use reranker::{LexicalReranker, RankedCandidate, Reranker};
pub use retriever::{Capability, HybridRetriever, RetrievalTier, RetrieverConfig, VectorSearch};
pub use rules::{RuleEngine, RuleHit};
pub use subject::{Subject, SubjectInferencer};
pub use types::{ABSTAIN_ANSWER, AnswerResult, Candidate, Metadata};
