//! Fidelity compression
//!
//! - [`engine`]: the per-node RAW > SUMMARY > SEED > SIGIL_ONLY state machine
//! - [`summarizer`]: content derivation for each downward step

pub mod engine;
pub mod summarizer;

pub use engine::{CompressionEngine, Transition, TransitionCause};
pub use summarizer::{RuleSummarizer, Summarizer};
