//! Reconstructed views of a node

use crate::memory::{CompressionLevel, NodeId, StructuredSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of the original meaning a view carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// Original content, unchanged
    Verbatim,
    /// Stored decisions, outcomes and rationale
    Structured,
    /// Decision-level recall, not verbatim
    DecisionLevel,
    /// Directional only, assembled from related anchors
    Forensic,
}

impl Fidelity {
    pub fn description(self) -> &'static str {
        match self {
            Fidelity::Verbatim => "verbatim",
            Fidelity::Structured => "structured summary",
            Fidelity::DecisionLevel => "decision-level, not verbatim",
            Fidelity::Forensic => "forensic/directional",
        }
    }
}

/// Content added by an external service, never mistaken for stored content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredContent {
    /// Service that produced it
    pub source: String,
    pub text: String,
}

/// What the view holds, by level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewContent {
    Raw {
        text: String,
    },
    Summary {
        summary: StructuredSummary,
    },
    Seed {
        seed: String,
        metadata: BTreeMap<String, String>,
    },
    Anchors {
        related: Vec<NodeId>,
        fragments: Vec<String>,
    },
}

/// Read-only reconstruction of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructedView {
    pub node_id: NodeId,
    pub level: CompressionLevel,
    pub fidelity: Fidelity,
    pub content: ViewContent,
    /// Labelled external additions; empty unless an enricher ran
    pub inferred: Vec<InferredContent>,
    /// An external service failed and the view carries only stored content
    pub degraded: bool,
    pub sigil_count: usize,
    pub last_active_at: DateTime<Utc>,
}

impl ReconstructedView {
    /// Render as indented text lines
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        match &self.content {
            ViewContent::Raw { text } => lines.push(format!("[RAW] {text}")),
            ViewContent::Summary { summary } => {
                lines.push("[SUMMARY]".to_string());
                for decision in &summary.decisions {
                    lines.push(format!("  decision: {decision}"));
                }
                for outcome in &summary.outcomes {
                    lines.push(format!("  outcome: {outcome}"));
                }
                if let Some(ref rationale) = summary.rationale {
                    lines.push(format!("  rationale: {rationale}"));
                }
            }
            ViewContent::Seed { seed, metadata } => {
                let seed = seed.strip_prefix("[SEED] ").unwrap_or(seed);
                if seed.is_empty() {
                    lines.push("[SEED] [no seed available]".to_string());
                } else {
                    lines.push(format!("[SEED] {seed}"));
                }
                for (key, value) in metadata {
                    lines.push(format!("  {key}: {value}"));
                }
            }
            ViewContent::Anchors { related, fragments } => {
                lines.push("[SIGIL_ONLY] [anchor - reconstruction required]".to_string());
                for id in related {
                    lines.push(format!("  related: {id}"));
                }
                for fragment in fragments {
                    lines.push(format!("  fragment: {fragment}"));
                }
            }
        }
        for inferred in &self.inferred {
            lines.push(format!("  inferred ({}): {}", inferred.source, inferred.text));
        }
        if self.degraded {
            lines.push("  [degraded: enrichment unavailable]".to_string());
        }
        lines.join("\n")
    }
}
