//! Query event log.
//!
//! Every answered query, including abstentions and upstream failures, leaves
//! exactly one record. On disk the log is newline-delimited JSON, one object
//! per line, appended and never rewritten. The offline evaluator reads
//! `query`, `answer`, `retrieved[].content` and `retrieved[].metadata.source`.

use crate::error::{RagwiseError, Result};
use crate::persistence::append_line;
use crate::rag::types::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// One passage as it was handed to the answer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedEntry {
    pub content: String,
    pub metadata: Metadata,
    /// Retrieval score, when the search tier produced one.
    pub score: Option<f32>,
}

/// Everything known about one query's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The query as the user asked it.
    pub query: String,
    /// The query actually sent to primary retrieval.
    pub retrieval_query: String,
    /// Phrase queries used for supplemental retrieval and reranking.
    pub phrase_queries: Vec<String>,
    pub top_k: usize,
    pub entity: Option<String>,
    pub entity_enforced: bool,
    /// `None` when the query named no entity.
    pub entity_in_context: Option<bool>,
    pub context: String,
    pub retrieved: Vec<RetrievedEntry>,
    pub answer: String,
    pub abstained: bool,
    pub model: String,
    /// Name of the rule that answered the query, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_hit: Option<String>,
    /// Upstream failure message, if generation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventRecord {
    pub fn outcome(&self) -> EventOutcome {
        if self.error.is_some() {
            EventOutcome::Failed
        } else if self.abstained {
            EventOutcome::Abstained
        } else if self.rule_hit.is_some() {
            EventOutcome::RuleAnswered
        } else {
            EventOutcome::Generated
        }
    }
}

/// How a query ended, derived from its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Abstained,
    RuleAnswered,
    Generated,
    Failed,
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventOutcome::Abstained => write!(f, "abstained"),
            EventOutcome::RuleAnswered => write!(f, "rule"),
            EventOutcome::Generated => write!(f, "generated"),
            EventOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// A record as written, stamped at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    #[serde(flatten)]
    pub record: EventRecord,
    pub timestamp: DateTime<Utc>,
}

impl LoggedEvent {
    pub fn stamp(record: EventRecord) -> Self {
        Self {
            record,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for query event records.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &EventRecord) -> Result<()>;
}

/// Append-only NDJSON event log on disk.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlEventLog {
    fn record(&self, event: &EventRecord) -> Result<()> {
        let line = serde_json::to_string(&LoggedEvent::stamp(event.clone()))?;
        append_line(&self.path, &line).map_err(|source| RagwiseError::EventLog {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), outcome = %event.outcome(), "Event recorded");
        Ok(())
    }
}

/// In-memory sink that keeps every stamped record.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &EventRecord) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedEvent::stamp(event.clone()));
        Ok(())
    }
}

/// Read a log back, oldest first. Lines that don't parse are skipped.
///
/// A missing file reads as an empty log.
pub fn read_events(path: &Path) -> Result<Vec<LoggedEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    let mut events = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LoggedEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => debug!(line = n + 1, error = %e, "Skipping unparsable event line"),
        }
    }
    Ok(events)
}
