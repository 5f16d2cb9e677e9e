//! Memory node data types
//!
//! A `MemoryNode` is one unit of retained context. Its `content` shape is
//! tied to its `compression_level`: full text at RAW, a structured summary at
//! SUMMARY, a seed plus metadata at SEED, and nothing but the anchor at
//! SIGIL_ONLY. Sigils attached to a node outlive its content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque, stable node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(format!("node-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Fidelity tier of a node, ordered by strictly decreasing fidelity.
///
/// The derived ordering follows the index: `Raw < Summary < Seed < SigilOnly`,
/// so a *greater* level means *less* fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressionLevel {
    /// Full original content
    Raw = 0,
    /// Structured summary (decisions, outcomes, rationale)
    Summary = 1,
    /// Seed plus metadata
    Seed = 2,
    /// Anchor only; the floor
    SigilOnly = 3,
}

impl CompressionLevel {
    /// All levels in transition order
    pub const ALL: [CompressionLevel; 4] = [
        CompressionLevel::Raw,
        CompressionLevel::Summary,
        CompressionLevel::Seed,
        CompressionLevel::SigilOnly,
    ];

    /// Ordinal index, 0 (RAW) to 3 (SIGIL_ONLY)
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Look up a level by index; `None` past SIGIL_ONLY
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// The next lower-fidelity level, `None` at the floor
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn is_floor(self) -> bool {
        self == CompressionLevel::SigilOnly
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLevel::Raw => "RAW",
            CompressionLevel::Summary => "SUMMARY",
            CompressionLevel::Seed => "SEED",
            CompressionLevel::SigilOnly => "SIGIL_ONLY",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision-oriented summary stored at SUMMARY level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSummary {
    /// Decisions taken
    pub decisions: Vec<String>,
    /// Outcomes observed
    pub outcomes: Vec<String>,
    /// Why the decisions were taken
    pub rationale: Option<String>,
}

impl StructuredSummary {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.outcomes.is_empty() && self.rationale.is_none()
    }
}

/// Node payload; the variant always matches the node's compression level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeContent {
    /// Full content
    Raw { text: String },
    /// Structured summary
    Summary { summary: StructuredSummary },
    /// Seed with free-form metadata
    Seed {
        seed: String,
        metadata: BTreeMap<String, String>,
    },
    /// No semantic content left, only the anchor
    Anchor,
}

impl NodeContent {
    /// The compression level this payload shape belongs to
    pub fn level(&self) -> CompressionLevel {
        match self {
            NodeContent::Raw { .. } => CompressionLevel::Raw,
            NodeContent::Summary { .. } => CompressionLevel::Summary,
            NodeContent::Seed { .. } => CompressionLevel::Seed,
            NodeContent::Anchor => CompressionLevel::SigilOnly,
        }
    }
}

/// A durable importance anchor attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sigil {
    /// Unique sigil identifier
    pub sigil_id: Uuid,
    /// Node this sigil is attached to
    pub node_id: NodeId,
    /// When the sigil was placed
    pub placed_at: DateTime<Utc>,
}

impl Sigil {
    pub fn new(node_id: NodeId, placed_at: DateTime<Utc>) -> Self {
        Self {
            sigil_id: Uuid::new_v4(),
            node_id,
            placed_at,
        }
    }
}

/// A unit of retained context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Stable identifier
    pub node_id: NodeId,
    /// Current fidelity tier
    pub compression_level: CompressionLevel,
    /// Level before the most recent change
    pub previous_level: Option<CompressionLevel>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Start of the current density window
    pub last_active_at: DateTime<Utc>,
    /// Attached sigils, append-only
    pub sigils: Vec<Sigil>,
    /// Level-dependent payload
    pub content: NodeContent,
}

impl MemoryNode {
    /// Create a node at RAW level holding `text`
    pub fn new(node_id: NodeId, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            node_id,
            compression_level: CompressionLevel::Raw,
            previous_level: None,
            created_at: now,
            last_active_at: now,
            sigils: Vec::new(),
            content: NodeContent::Raw { text: text.into() },
        }
    }

    /// Placement time of the most recent sigil
    pub fn latest_sigil_at(&self) -> Option<DateTime<Utc>> {
        self.sigils.iter().map(|s| s.placed_at).max()
    }

    /// Swap level and content in one step, recording the previous level.
    ///
    /// Callers are responsible for checking that `to` is lower fidelity.
    pub(crate) fn apply_level(&mut self, to: CompressionLevel, content: NodeContent) {
        debug_assert!(to > self.compression_level);
        debug_assert_eq!(content.level(), to);
        self.previous_level = Some(self.compression_level);
        self.compression_level = to;
        self.content = content;
    }
}
