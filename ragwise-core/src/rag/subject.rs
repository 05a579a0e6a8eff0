//! Implicit subject inference for pronoun-free questions about a single document.

use crate::rag::context::GroundingContext;
use crate::rag::reranker::RankedCandidate;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

/// How many leading non-empty context lines are scanned for a name line.
pub const NAME_LINE_SCAN_LIMIT: usize = 10;

/// Filename token stripped when deriving a subject from a file stem.
pub const RESUME_TOKEN: &str = "resume";

static NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)+$").expect("name-line pattern is valid")
});

/// Which strategy produced the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSource {
    FileStem,
    NameLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
    pub source: SubjectSource,
}

impl Subject {
    /// Sentence appended to the prompt to pin unattributed facts on the subject.
    pub fn disambiguation(&self) -> String {
        format!(
            "This document is the resume of {name}. All experience and skills mentioned refer to {name} unless explicitly stated otherwise.",
            name = self.name
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectInferencer;

impl SubjectInferencer {
    pub fn infer(
        &self,
        ranked: &[RankedCandidate],
        context: &GroundingContext,
    ) -> Option<Subject> {
        self.from_file_stem(ranked)
            .map(|name| Subject {
                name,
                source: SubjectSource::FileStem,
            })
            .or_else(|| {
                self.from_name_line(context).map(|name| Subject {
                    name,
                    source: SubjectSource::NameLine,
                })
            })
    }

    /// A subject from the one file every candidate came from.
    pub fn from_file_stem(&self, ranked: &[RankedCandidate]) -> Option<String> {
        if ranked.is_empty() {
            return None;
        }
        let mut stems = BTreeSet::new();
        for r in ranked {
            let stem = Path::new(r.candidate.source()?).file_stem()?.to_str()?;
            stems.insert(stem.to_string());
        }
        if stems.len() != 1 {
            return None;
        }
        stems.pop_first().and_then(|stem| subject_from_stem(&stem))
    }

    /// The first name-like line among the leading non-empty context lines.
    pub fn from_name_line(&self, context: &GroundingContext) -> Option<String> {
        context
            .non_empty_lines()
            .take(NAME_LINE_SCAN_LIMIT)
            .find(|line| NAME_LINE.is_match(line))
            .map(str::to_string)
    }
}

/// `"Jane_Doe-Resume"` -> `"Jane Doe"`.
pub fn subject_from_stem(stem: &str) -> Option<String> {
    let name = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .filter(|w| !w.eq_ignore_ascii_case(RESUME_TOKEN))
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::{Candidate, Metadata, metadata};

    fn ranked(content: &str, meta: Metadata) -> RankedCandidate {
        RankedCandidate {
            candidate: Candidate::new(content, meta),
            retrieval_score: None,
            lexical_score: 1,
        }
    }

    fn from(source: &str) -> Metadata {
        metadata([("source", source)])
    }

    #[test]
    fn test_subject_from_stem() {
        assert_eq!(subject_from_stem("Jane_Doe_Resume"), Some("Jane Doe".into()));
        assert_eq!(subject_from_stem("resume-john-smith"), Some("john smith".into()));
        assert_eq!(subject_from_stem("RESUME"), None);
        // Only standalone tokens are stripped.
        assert_eq!(subject_from_stem("resumes_2024"), Some("resumes 2024".into()));
    }

    #[test]
    fn test_single_source_file_wins() {
        let items = vec![
            ranked("Skills", from("uploads/Jane_Doe_Resume.pdf")),
            ranked("Acme", from("/abs/path/Jane_Doe_Resume.pdf")),
        ];
        let ctx = GroundingContext::assemble(&items);
        let subject = SubjectInferencer.infer(&items, &ctx).unwrap();
        assert_eq!(subject.name, "Jane Doe");
        assert_eq!(subject.source, SubjectSource::FileStem);
    }

    #[test]
    fn test_multiple_sources_fall_back_to_name_line() {
        let items = vec![
            ranked("John Smith\nBackend Engineer 2019", from("a.pdf")),
            ranked("Skills", from("b.pdf")),
        ];
        let ctx = GroundingContext::assemble(&items);
        let subject = SubjectInferencer.infer(&items, &ctx).unwrap();
        assert_eq!(subject.name, "John Smith");
        assert_eq!(subject.source, SubjectSource::NameLine);
    }

    #[test]
    fn test_missing_source_disables_stem_strategy() {
        let items = vec![
            ranked("skills list", from("Jane_Doe.pdf")),
            ranked("more", Metadata::new()),
        ];
        assert_eq!(SubjectInferencer.from_file_stem(&items), None);
    }

    #[test]
    fn test_name_line_rejects_digits_and_single_words() {
        let items = vec![ranked(
            "Resume\nRoom 101 Main\nJane Doe\n",
            Metadata::new(),
        )];
        let ctx = GroundingContext::assemble(&items);
        assert_eq!(SubjectInferencer.from_name_line(&ctx), Some("Jane Doe".into()));
    }

    #[test]
    fn test_name_line_only_scans_leading_lines() {
        let mut text: Vec<String> = (0..NAME_LINE_SCAN_LIMIT).map(|i| format!("line {i}")).collect();
        text.push("Jane Doe".into());
        let items = vec![ranked(&text.join("\n"), Metadata::new())];
        let ctx = GroundingContext::assemble(&items);
        assert_eq!(SubjectInferencer.from_name_line(&ctx), None);
    }

    #[test]
    fn test_disambiguation_sentence() {
        let subject = Subject {
            name: "Jane Doe".into(),
            source: SubjectSource::FileStem,
        };
        assert!(subject.disambiguation().starts_with("This document is the resume of Jane Doe."));
    }
}
