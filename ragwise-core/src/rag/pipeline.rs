//! End-to-end query pipeline.
//!
//! One call to [`QueryPipeline::answer`] walks normalize, retrieve,
//! dedup/rerank, ground, rule check, and generate, then writes exactly one
//! event record for whichever stage ended the request.

use crate::config::RagwiseConfig;
use crate::error::{AbstainReason, RagwiseError, Result};
use crate::event_log::{EventRecord, EventSink, RetrievedEntry};
use crate::generation::GenerationBackend;
use crate::rag::context::GroundingContext;
use crate::rag::dedup::deduplicate;
use crate::rag::grounding::EntityGrounder;
use crate::rag::prompt::{build_prompt, build_sources};
use crate::rag::query::{NormalizedQuery, QueryRules};
use crate::rag::reranker::{LexicalReranker, RankedCandidate, Reranker};
use crate::rag::retriever::{HybridRetriever, RetrieverConfig, VectorSearch};
use crate::rag::rules::RuleEngine;
use crate::rag::subject::SubjectInferencer;
use crate::rag::types::{ABSTAIN_ANSWER, AnswerResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct QueryPipeline {
    rules: QueryRules,
    retriever: HybridRetriever,
    reranker: Arc<dyn Reranker>,
    grounder: EntityGrounder,
    rule_engine: RuleEngine,
    subjects: SubjectInferencer,
    generator: Arc<dyn GenerationBackend>,
    events: Arc<dyn EventSink>,
}

impl QueryPipeline {
    pub fn new(
        store: Arc<dyn VectorSearch>,
        generator: Arc<dyn GenerationBackend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            rules: QueryRules::default(),
            retriever: HybridRetriever::new(store, RetrieverConfig::default()),
            reranker: Arc::new(LexicalReranker),
            grounder: EntityGrounder,
            rule_engine: RuleEngine::default(),
            subjects: SubjectInferencer,
            generator,
            events,
        }
    }

    /// Build a pipeline with retrieval widths and name rules from `config`.
    pub fn from_config(
        config: &RagwiseConfig,
        store: Arc<dyn VectorSearch>,
        generator: Arc<dyn GenerationBackend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::new(store, generator, events)
            .with_retriever_config(RetrieverConfig::from(&config.retrieval))
            .with_query_rules(
                QueryRules::default().with_fallback_names(config.rules.fallback_names.clone()),
            )
    }

    pub fn with_query_rules(mut self, rules: QueryRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_retriever_config(mut self, config: RetrieverConfig) -> Self {
        self.retriever = HybridRetriever::new(self.retriever.store(), config);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_rule_engine(mut self, rule_engine: RuleEngine) -> Self {
        self.rule_engine = rule_engine;
        self
    }

    /// Answer one query.
    ///
    /// Abstentions come back as `Ok` with `abstained` set. Upstream failures
    /// are logged and then returned as `Err`. A blank query is rejected
    /// before anything runs and leaves no record.
    pub async fn answer(&self, query: &str) -> Result<AnswerResult> {
        if query.trim().is_empty() {
            return Err(RagwiseError::InvalidQuery {
                reason: "query is empty".into(),
            });
        }

        let normalized = self.rules.normalize(query);
        debug!(
            entity = ?normalized.entity_name(),
            enforced = normalized.enforces_entity(),
            employment_intent = normalized.employment_intent,
            phrases = normalized.expanded_phrase_queries.len(),
            "Query normalized"
        );

        let mut record = self.draft_record(&normalized);
        let outcome = self.run(&normalized, &mut record).await;

        match &outcome {
            Ok(result) => {
                record.answer = result.answer.clone();
                record.abstained = result.abstained;
            }
            Err(e) => {
                warn!(error = %e, "Query failed");
                record.answer = String::new();
                record.abstained = false;
                record.error = Some(e.to_string());
            }
        }

        if let Err(log_err) = self.events.record(&record) {
            warn!(error = %log_err, "Failed to write query event");
            // A request failure takes precedence over the log failure.
            return Err(outcome.err().unwrap_or(log_err));
        }
        outcome
    }

    async fn run(
        &self,
        query: &NormalizedQuery,
        record: &mut EventRecord,
    ) -> Result<AnswerResult> {
        let top_k = self.retriever.config().top_k;
        let retrieval = self.retriever.retrieve(query).await?;
        let tier = retrieval.tier;
        let deduped = deduplicate(retrieval.into_combined());
        let deduped_len = deduped.len();
        let ranked = self.reranker.rerank(query, deduped, top_k);
        debug!(?tier, deduped = deduped_len, ranked = ranked.len(), "Candidates reranked");

        record.retrieved = ranked.iter().map(retrieved_entry).collect();

        if ranked.is_empty() {
            info!(reason = %AbstainReason::NoEvidence, "Abstaining");
            return Ok(AnswerResult::abstain());
        }

        let context = GroundingContext::assemble(&ranked);
        record.context = context.as_str().to_string();

        let grounding = self.grounder.check(query, &context);
        record.entity_in_context = grounding.entity_in_context;
        if !grounding.passes() {
            info!(
                reason = %AbstainReason::EntityNotGrounded,
                entity = ?grounding.entity,
                "Abstaining"
            );
            return Ok(AnswerResult::abstain());
        }

        let sources = build_sources(&ranked);

        if let Some(hit) = self.rule_engine.try_answer(query, &context) {
            info!(rule = hit.rule, role = %hit.role, "Answered by rule");
            record.rule_hit = Some(hit.rule.to_string());
            return Ok(AnswerResult {
                answer: hit.answer,
                sources,
                abstained: false,
            });
        }

        let subject = self.subjects.infer(&ranked, &context);
        if let Some(subject) = &subject {
            debug!(name = %subject.name, source = ?subject.source, "Subject inferred");
        }
        let prompt = build_prompt(&query.text, &context, subject.as_ref());

        let generated = self.generator.generate(&prompt).await?;
        let answer = generated.trim();
        if answer.is_empty() {
            info!(reason = %AbstainReason::EmptyGeneration, "Abstaining");
            return Ok(AnswerResult {
                answer: ABSTAIN_ANSWER.to_string(),
                sources,
                abstained: true,
            });
        }

        info!(model = self.generator.model(), answer_chars = answer.len(), "Answer generated");
        Ok(AnswerResult {
            answer: answer.to_string(),
            sources,
            abstained: false,
        })
    }

    fn draft_record(&self, query: &NormalizedQuery) -> EventRecord {
        EventRecord {
            query: query.text.clone(),
            retrieval_query: query.retrieval_query.clone(),
            phrase_queries: query.expanded_phrase_queries.clone(),
            top_k: self.retriever.config().top_k,
            entity: query.entity_name().map(str::to_string),
            entity_enforced: query.enforces_entity(),
            entity_in_context: None,
            context: String::new(),
            retrieved: Vec::new(),
            answer: ABSTAIN_ANSWER.to_string(),
            abstained: true,
            model: self.generator.model().to_string(),
            rule_hit: None,
            error: None,
        }
    }
}

fn retrieved_entry(ranked: &RankedCandidate) -> RetrievedEntry {
    RetrievedEntry {
        content: ranked.candidate.content.clone(),
        metadata: ranked.candidate.metadata.clone(),
        score: ranked.retrieval_score,
    }
}
