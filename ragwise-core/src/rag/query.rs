//! Query normalization: entity detection, tokens, proper-noun phrases, and
//! employment-intent augmentation of the retrieval query.
//!
//! All heuristics live in [`QueryRules`], so a policy change is a different
//! `QueryRules` value rather than an edit to scattered literals.

use crate::config::FallbackName;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Tokens that signal a question about someone's job or role.
pub const EMPLOYMENT_VOCABULARY: &[&str] = &[
    "role",
    "work",
    "worked",
    "working",
    "job",
    "position",
    "employment",
    "experience",
];

/// Two or more space-separated capitalized words ("Jane Doe", "Acme Labs Inc").
pub const PROPER_NOUN_PATTERN: &str = r"\b[A-Z][a-z]+(?: +[A-Z][a-z]+)+\b";

/// Appended to the retrieval query when employment intent is detected.
pub const EMPLOYMENT_QUERY_SUFFIX: &str = " experience";

/// Role-oriented variants generated for each phrase under employment intent.
pub const ROLE_PHRASE_SUFFIXES: &[&str] = &[" Software Engineer", " role"];

static DEFAULT_PROPER_NOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PROPER_NOUN_PATTERN).expect("proper-noun pattern is valid"));

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("token pattern is valid"));

/// Lowercase alphanumeric words of `text`, as a set.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    TOKEN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A detected entity and whether grounding must be enforced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMatch {
    pub name: String,
    /// True for the strict multi-word pattern, false for a fallback-name match.
    pub enforced: bool,
}

/// A query with everything the later stages derive from it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    /// The trimmed query text.
    pub text: String,
    pub tokens: BTreeSet<String>,
    pub entity: Option<EntityMatch>,
    /// Unique proper-noun phrases in first-seen order.
    pub phrase_queries: Vec<String>,
    pub employment_intent: bool,
    pub retrieval_query: String,
    /// `phrase_queries` plus role variants when employment intent is present.
    pub expanded_phrase_queries: Vec<String>,
}

impl NormalizedQuery {
    pub fn entity_name(&self) -> Option<&str> {
        self.entity.as_ref().map(|e| e.name.as_str())
    }

    /// Whether the entity was strictly detected and must be grounded.
    pub fn enforces_entity(&self) -> bool {
        self.entity.as_ref().is_some_and(|e| e.enforced)
    }
}

/// Heuristic tables used by query normalization.
#[derive(Debug, Clone)]
pub struct QueryRules {
    proper_noun: Regex,
    employment_vocabulary: BTreeSet<String>,
    fallback_names: Vec<FallbackName>,
}

impl Default for QueryRules {
    fn default() -> Self {
        Self {
            proper_noun: DEFAULT_PROPER_NOUN.clone(),
            employment_vocabulary: EMPLOYMENT_VOCABULARY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_names: Vec::new(),
        }
    }
}

impl QueryRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the proper-noun pattern used for entities and phrases.
    pub fn with_proper_noun_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.proper_noun = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn with_employment_vocabulary<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.employment_vocabulary = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    pub fn with_fallback_names(mut self, names: Vec<FallbackName>) -> Self {
        self.fallback_names = names;
        self
    }

    pub fn fallback_names(&self) -> &[FallbackName] {
        &self.fallback_names
    }

    pub fn has_employment_intent(&self, tokens: &BTreeSet<String>) -> bool {
        tokens.iter().any(|t| self.employment_vocabulary.contains(t))
    }

    /// Strict entity first, then the fallback-name table.
    pub fn detect_entity(&self, query: &str) -> Option<EntityMatch> {
        if let Some(m) = self.proper_noun.find(query) {
            return Some(EntityMatch {
                name: m.as_str().to_string(),
                enforced: true,
            });
        }
        let lowered = query.to_lowercase();
        self.fallback_names
            .iter()
            .find(|f| !f.token.is_empty() && lowered.contains(&f.token.to_lowercase()))
            .map(|f| EntityMatch {
                name: f.canonical.clone(),
                enforced: false,
            })
    }

    /// All non-overlapping proper-noun phrases, unique, in first-seen order.
    pub fn extract_phrases(&self, query: &str) -> Vec<String> {
        let mut phrases = Vec::new();
        for m in self.proper_noun.find_iter(query) {
            push_unique(&mut phrases, m.as_str().to_string());
        }
        phrases
    }

    pub fn normalize(&self, raw: &str) -> NormalizedQuery {
        let text = raw.trim().to_string();
        let tokens = tokenize(&text);
        let entity = self.detect_entity(&text);
        let phrase_queries = self.extract_phrases(&text);
        let employment_intent = self.has_employment_intent(&tokens);

        let mut retrieval_query = text.clone();
        let mut expanded_phrase_queries = phrase_queries.clone();
        if employment_intent {
            retrieval_query.push_str(EMPLOYMENT_QUERY_SUFFIX);
            for phrase in &phrase_queries {
                for suffix in ROLE_PHRASE_SUFFIXES {
                    push_unique(&mut expanded_phrase_queries, format!("{phrase}{suffix}"));
                }
            }
        }

        NormalizedQuery {
            text,
            tokens,
            entity,
            phrase_queries,
            employment_intent,
            retrieval_query,
            expanded_phrase_queries,
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn jane_rules() -> QueryRules {
        QueryRules::new().with_fallback_names(vec![FallbackName {
            token: "jane".into(),
            canonical: "Jane Doe".into(),
        }])
    }

    #[test]
    fn test_strict_entity_detection() {
        let q = QueryRules::new().normalize("  What is Jane Doe's role?  ");
        assert_eq!(q.text, "What is Jane Doe's role?");
        assert_eq!(
            q.entity,
            Some(EntityMatch {
                name: "Jane Doe".into(),
                enforced: true
            })
        );
    }

    #[test]
    fn test_single_capitalized_word_is_not_an_entity() {
        let q = QueryRules::new().normalize("What is the capital of France?");
        assert_eq!(q.entity, None);
        assert!(q.phrase_queries.is_empty());
    }

    #[test]
    fn test_fallback_name_is_soft() {
        let q = jane_rules().normalize("what programming languages does jane know?");
        assert_eq!(
            q.entity,
            Some(EntityMatch {
                name: "Jane Doe".into(),
                enforced: false
            })
        );
        assert!(!q.enforces_entity());
    }

    #[test]
    fn test_fallback_names_are_exposed_in_order() {
        let rules = QueryRules::new().with_fallback_names(vec![
            FallbackName {
                token: "jane".into(),
                canonical: "Jane Doe".into(),
            },
            FallbackName {
                token: "acme".into(),
                canonical: "Acme Labs".into(),
            },
        ]);
        let tokens: Vec<&str> = rules.fallback_names().iter().map(|f| f.token.as_str()).collect();
        assert_eq!(tokens, vec!["jane", "acme"]);
        assert!(QueryRules::new().fallback_names().is_empty());
    }

    #[test]
    fn test_strict_match_wins_over_fallback() {
        let q = jane_rules().normalize("Did jane work with John Smith?");
        assert_eq!(q.entity_name(), Some("John Smith"));
        assert!(q.enforces_entity());
    }

    #[test]
    fn test_tokens_are_lowercase_alphanumeric() {
        let tokens = tokenize("Rust, C++ and K8s: 2024!");
        let expected: BTreeSet<String> = ["rust", "c", "and", "k8s", "2024"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_phrases_unique_in_first_seen_order() {
        let phrases = QueryRules::new()
            .extract_phrases("compare Acme Labs and Jane Doe, then Acme Labs again");
        assert_eq!(phrases, vec!["Acme Labs".to_string(), "Jane Doe".to_string()]);
    }

    #[test]
    fn test_employment_intent_expands_queries() {
        let q = QueryRules::new().normalize("Where did John Smith work?");
        assert!(q.employment_intent);
        assert_eq!(q.retrieval_query, "Where did John Smith work? experience");
        assert_eq!(
            q.expanded_phrase_queries,
            vec![
                "John Smith".to_string(),
                "John Smith Software Engineer".to_string(),
                "John Smith role".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_employment_intent_leaves_queries_alone() {
        let q = QueryRules::new().normalize("Which university did Jane Doe attend?");
        assert!(!q.employment_intent);
        assert_eq!(q.retrieval_query, q.text);
        assert_eq!(q.expanded_phrase_queries, q.phrase_queries);
    }

    #[test]
    fn test_custom_vocabulary() {
        let rules = QueryRules::new().with_employment_vocabulary(["Employer"]);
        assert!(rules.has_employment_intent(&tokenize("who was the employer")));
        assert!(!rules.has_employment_intent(&tokenize("what was the role")));
    }

    #[test]
    fn test_invalid_custom_pattern_is_an_error() {
        assert!(QueryRules::new().with_proper_noun_pattern("(").is_err());
    }
}
