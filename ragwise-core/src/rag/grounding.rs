//! Entity grounding: a strictly detected entity must appear in the context.

use crate::rag::context::GroundingContext;
use crate::rag::query::NormalizedQuery;
use serde::{Deserialize, Serialize};

/// Outcome of the entity check for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReport {
    pub entity: Option<String>,
    pub enforced: bool,
    /// `None` when the query has no entity.
    pub entity_in_context: Option<bool>,
}

impl GroundingReport {
    /// Soft and absent entities always pass; a strict one must be present.
    pub fn passes(&self) -> bool {
        !self.enforced || self.entity_in_context == Some(true)
    }
}

/// Entity grounding checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityGrounder;

impl EntityGrounder {
    pub fn check(&self, query: &NormalizedQuery, context: &GroundingContext) -> GroundingReport {
        match &query.entity {
            Some(entity) => GroundingReport {
                entity: Some(entity.name.clone()),
                enforced: entity.enforced,
                entity_in_context: Some(context.contains_ignore_case(&entity.name)),
            },
            None => GroundingReport {
                entity: None,
                enforced: false,
                entity_in_context: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackName;
    use crate::rag::query::QueryRules;
    use crate::rag::reranker::RankedCandidate;
    use crate::rag::types::{Candidate, Metadata};

    fn context(text: &str) -> GroundingContext {
        GroundingContext::assemble(&[RankedCandidate {
            candidate: Candidate::new(text, Metadata::new()),
            retrieval_score: None,
            lexical_score: 1,
        }])
    }

    #[test]
    fn test_strict_entity_present_passes() {
        let q = QueryRules::new().normalize("What is Jane Doe's role?");
        let report = EntityGrounder.check(&q, &context("software engineer, jane doe"));
        assert_eq!(report.entity_in_context, Some(true));
        assert!(report.passes());
    }

    #[test]
    fn test_strict_entity_absent_fails() {
        let q = QueryRules::new().normalize("Where did John Smith work?");
        let report = EntityGrounder.check(&q, &context("Jane Doe worked at Acme Labs"));
        assert!(report.enforced);
        assert_eq!(report.entity_in_context, Some(false));
        assert!(!report.passes());
    }

    #[test]
    fn test_soft_entity_absent_still_passes() {
        let rules = QueryRules::new().with_fallback_names(vec![FallbackName {
            token: "jane".into(),
            canonical: "Jane Doe".into(),
        }]);
        let q = rules.normalize("what does jane know?");
        let report = EntityGrounder.check(&q, &context("Skills: Rust, Kubernetes"));
        assert!(!report.enforced);
        assert_eq!(report.entity_in_context, Some(false));
        assert!(report.passes());
    }

    #[test]
    fn test_no_entity_passes() {
        let q = QueryRules::new().normalize("what languages are listed?");
        let report = EntityGrounder.check(&q, &context("Rust"));
        assert_eq!(report.entity, None);
        assert_eq!(report.entity_in_context, None);
        assert!(report.passes());
    }
}
