//! Content derivation for downward transitions
//!
//! Producing a SUMMARY from raw text and a SEED from a summary is delegated to
//! a `Summarizer`. The engine bounds every call with a timeout and only swaps
//! node content after the summarizer succeeded.
//!
//! `RuleSummarizer` is the deterministic default. It splits text into
//! sentences and sorts them by marker words:
//!
//! 1. Sentences with a decision marker ("decided", "chose", ...) become decisions.
//! 2. Otherwise, sentences with an outcome marker ("resulted", "shipped", ...) become outcomes.
//! 3. Any sentence with a causal marker ("because", "so that", ...) feeds the rationale.
//!
//! Seeds keep short text whole and cut long text to a fixed prefix. Nodes
//! carrying sigils are kept at higher detail: up to 80 characters survive
//! instead of 60 whole or a 40-character prefix.

use crate::error::{Error, Result};
use crate::memory::{NodeId, StructuredSummary};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;

/// Texts at or under this many characters are kept whole as seeds
pub const SEED_KEEP_CHARS: usize = 60;

/// Prefix length kept when a seed is cut
pub const SEED_PREFIX_CHARS: usize = 40;

/// Characters kept, whole or as a prefix, for nodes carrying sigils
pub const MARKED_SEED_CHARS: usize = 80;

/// Derives lower-fidelity content for a node
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// RAW -> SUMMARY
    async fn summarize(&self, node_id: &NodeId, text: &str) -> Result<StructuredSummary>;

    /// SUMMARY -> SEED; returns the seed and its metadata.
    ///
    /// `sigils` is the number of sigils on the node; marked nodes may keep
    /// more detail.
    async fn seed(
        &self,
        node_id: &NodeId,
        summary: &StructuredSummary,
        sigils: usize,
    ) -> Result<(String, BTreeMap<String, String>)>;
}

/// Deterministic marker-word summarizer
pub struct RuleSummarizer {
    sentence_split: Regex,
    decision: Regex,
    outcome: Regex,
    causal: Regex,
}

impl RuleSummarizer {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Config(format!("Invalid summarizer rule: {e}")))
        };
        Ok(Self {
            sentence_split: compile(r"[.!?\n]+")?,
            decision: compile(
                r"(?i)\b(decided|decide|chose|choose|chosen|agreed|will|plan to|going to|selected|opted)\b",
            )?,
            outcome: compile(
                r"(?i)\b(result|resulted|outcome|achieved|completed|failed|succeeded|shipped|fixed|resolved|works)\b",
            )?,
            causal: compile(r"(?i)\b(because|since|due to|so that|in order to|therefore)\b")?,
        })
    }

    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.sentence_split
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Synchronous core of `summarize`
    pub fn summarize_text(&self, text: &str) -> StructuredSummary {
        let sentences = self.sentences(text);
        let mut summary = StructuredSummary::default();
        let mut rationale: Vec<&str> = Vec::new();

        for sentence in &sentences {
            if self.decision.is_match(sentence) {
                summary.decisions.push(sentence.to_string());
            } else if self.outcome.is_match(sentence) {
                summary.outcomes.push(sentence.to_string());
            }
            if self.causal.is_match(sentence) {
                rationale.push(sentence);
            }
        }

        if !rationale.is_empty() {
            summary.rationale = Some(rationale.join(". "));
        }

        // Unmarked text keeps its lead sentence
        if summary.is_empty() {
            if let Some(first) = sentences.first() {
                summary.decisions.push(first.to_string());
            }
        }

        summary
    }
}

/// Flatten a summary back into prose for seeding
pub fn summary_text(summary: &StructuredSummary) -> String {
    let mut parts: Vec<&str> = summary
        .decisions
        .iter()
        .chain(summary.outcomes.iter())
        .map(String::as_str)
        .collect();
    if let Some(ref rationale) = summary.rationale {
        if !parts.contains(&rationale.as_str()) {
            parts.push(rationale);
        }
    }
    parts.join(". ")
}

/// Cut text down to a seed
pub fn seed_text(text: &str) -> String {
    cut(text, SEED_KEEP_CHARS, SEED_PREFIX_CHARS)
}

/// Cut text down to a seed, keeping more of it for marked nodes
pub fn seed_text_for(text: &str, sigils: usize) -> String {
    if sigils == 0 {
        seed_text(text)
    } else {
        cut(text, MARKED_SEED_CHARS, MARKED_SEED_CHARS)
    }
}

fn cut(text: &str, keep: usize, prefix_len: usize) -> String {
    if text.chars().count() <= keep {
        return text.to_string();
    }
    let prefix: String = text.chars().take(prefix_len).collect();
    format!("[SEED] {prefix}...")
}

#[async_trait]
impl Summarizer for RuleSummarizer {
    async fn summarize(&self, _node_id: &NodeId, text: &str) -> Result<StructuredSummary> {
        Ok(self.summarize_text(text))
    }

    async fn seed(
        &self,
        _node_id: &NodeId,
        summary: &StructuredSummary,
        sigils: usize,
    ) -> Result<(String, BTreeMap<String, String>)> {
        let seed = seed_text_for(&summary_text(summary), sigils);
        let mut metadata = BTreeMap::new();
        metadata.insert("decisions".to_string(), summary.decisions.len().to_string());
        metadata.insert("outcomes".to_string(), summary.outcomes.len().to_string());
        metadata.insert(
            "has_rationale".to_string(),
            summary.rationale.is_some().to_string(),
        );
        metadata.insert("sigils".to_string(), sigils.to_string());
        Ok((seed, metadata))
    }
}
