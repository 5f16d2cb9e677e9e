//! Reconstruction of compressed nodes
//!
//! - [`engine`]: level-aware, read-only view building
//! - [`traversal`]: external context and enrichment seams
//! - [`view`]: the resulting views and their text rendering

pub mod engine;
pub mod traversal;
pub mod view;

pub use engine::ReconstructionEngine;
pub use traversal::{ContextTraversal, NoTraversal, SeedEnricher, TemporalTraversal, TraversalResult};
pub use view::{Fidelity, InferredContent, ReconstructedView, ViewContent};
