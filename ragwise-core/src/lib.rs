//! # Ragwise Core
//!
//! Grounded question answering over a private document collection.
//! Provides the query pipeline (normalization, hybrid retrieval, lexical
//! reranking, entity grounding, rule shortcuts, generation), the Ollama
//! generation backend, the append-only query event log, configuration, and a
//! reference in-memory vector index.

pub mod config;
pub mod error;
pub mod event_log;
pub mod generation;
pub mod index;
pub mod persistence;
pub mod rag;

// Re-export commonly used types at the crate root.
pub use config::{RagwiseConfig, load_config};
pub use error::{AbstainReason, IndexError, RagwiseError, Result};
pub use event_log::{EventRecord, EventSink, JsonlEventLog, LoggedEvent, MemoryEventSink};
pub use generation::{GenerationBackend, MockGenerationBackend, OllamaClient};
pub use index::{InMemoryIndex, IndexCapabilities, IndexedDocument};
pub use rag::{AnswerResult, Candidate, Capability, QueryPipeline, VectorSearch};
