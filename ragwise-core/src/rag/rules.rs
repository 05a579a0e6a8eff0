//! Deterministic answer shortcuts that bypass generation.
//!
//! The only rule today is the employment-role rule: for an employment
//! question about an entity, a literal `"<Title>, <entity>"` line in the
//! context is taken as the answer.

use crate::rag::context::GroundingContext;
use crate::rag::query::NormalizedQuery;
use regex::Regex;
use tracing::warn;

/// Name recorded in the event log when the employment-role rule fires.
pub const EMPLOYMENT_ROLE_RULE: &str = "employment_role";

/// A capitalized title phrase such as "Senior Software Engineer".
pub const ROLE_TITLE_PATTERN: &str = r"\b[A-Z][A-Za-z]+(?:[ \t]+[A-Z][A-Za-z]+)*";

/// An answer produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub rule: &'static str,
    pub role: String,
    pub answer: String,
}

/// Rule engine for the employment-role shortcut.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    title_pattern: String,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            title_pattern: ROLE_TITLE_PATTERN.to_string(),
        }
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different title pattern (must be a valid regex fragment).
    pub fn with_title_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.title_pattern = pattern.into();
        self
    }

    /// Whether the query qualifies for the employment-role rule at all.
    pub fn applies(&self, query: &NormalizedQuery) -> bool {
        query.employment_intent && query.entity.is_some()
    }

    /// Try the employment-role rule. `None` means generation should proceed.
    pub fn try_answer(
        &self,
        query: &NormalizedQuery,
        context: &GroundingContext,
    ) -> Option<RuleHit> {
        if !self.applies(query) {
            return None;
        }
        let entity = query.entity_name()?;
        let pattern = format!(
            r"({}),\s*(?i:{})",
            self.title_pattern,
            regex::escape(entity)
        );
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!(error = %e, "Employment-role pattern failed to compile");
                return None;
            }
        };
        let caps = re.captures(context.as_str())?;
        let role = caps.get(1)?.as_str().trim().to_string();
        Some(RuleHit {
            rule: EMPLOYMENT_ROLE_RULE,
            answer: format!("{role}, {entity}"),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::query::QueryRules;
    use crate::rag::reranker::RankedCandidate;
    use crate::rag::types::{Candidate, Metadata};

    fn context(parts: &[&str]) -> GroundingContext {
        let ranked: Vec<_> = parts
            .iter()
            .map(|p| RankedCandidate {
                candidate: Candidate::new(*p, Metadata::new()),
                retrieval_score: None,
                lexical_score: 1,
            })
            .collect();
        GroundingContext::assemble(&ranked)
    }

    #[test]
    fn test_role_then_entity_fires() {
        let q = QueryRules::new().normalize("What is Jane Doe's role?");
        let hit = RuleEngine::new()
            .try_answer(&q, &context(&["Experience", "Software Engineer, Jane Doe"]))
            .unwrap();
        assert_eq!(hit.answer, "Software Engineer, Jane Doe");
        assert_eq!(hit.role, "Software Engineer");
        assert_eq!(hit.rule, EMPLOYMENT_ROLE_RULE);
    }

    #[test]
    fn test_entity_match_is_case_insensitive_and_answer_uses_query_entity() {
        let q = QueryRules::new().normalize("What position does Acme Labs offer?");
        let hit = RuleEngine::new()
            .try_answer(&q, &context(&["Worked as Staff Engineer, ACME LABS since 2020"]))
            .unwrap();
        assert_eq!(hit.answer, "Staff Engineer, Acme Labs");
    }

    #[test]
    fn test_requires_employment_intent() {
        let q = QueryRules::new().normalize("Who is Jane Doe?");
        assert!(
            RuleEngine::new()
                .try_answer(&q, &context(&["Software Engineer, Jane Doe"]))
                .is_none()
        );
    }

    #[test]
    fn test_requires_entity() {
        let q = QueryRules::new().normalize("what was the last job?");
        assert!(!RuleEngine::new().applies(&q));
    }

    #[test]
    fn test_no_pattern_in_context() {
        let q = QueryRules::new().normalize("What is Jane Doe's role?");
        assert!(
            RuleEngine::new()
                .try_answer(&q, &context(&["Jane Doe is a software engineer"]))
                .is_none()
        );
    }

    #[test]
    fn test_single_word_title() {
        let q = QueryRules::new().normalize("What role at Foo Bar?");
        assert!(
            RuleEngine::new()
                .try_answer(&q, &context(&["Lead, Foo Bar."]))
                .is_some()
        );
    }

    #[test]
    fn test_custom_title_pattern() {
        let q = QueryRules::new().normalize("What is Jane Doe's role?");
        let ctx = context(&["senior engineer, jane doe"]);
        assert!(RuleEngine::new().try_answer(&q, &ctx).is_none());

        let hit = RuleEngine::new()
            .with_title_pattern(r"[a-z]+(?: [a-z]+)*")
            .try_answer(&q, &ctx)
            .unwrap();
        assert_eq!(hit.role, "senior engineer");
        assert_eq!(hit.answer, "senior engineer, Jane Doe");
    }

    #[test]
    fn test_invalid_title_pattern_falls_through() {
        let q = QueryRules::new().normalize("What is Jane Doe's role?");
        assert!(
            RuleEngine::new()
                .with_title_pattern("[unclosed")
                .try_answer(&q, &context(&["Software Engineer, Jane Doe"]))
                .is_none()
        );
    }
}
