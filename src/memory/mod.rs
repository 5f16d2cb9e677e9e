//! Memory nodes, per-node locking and delegated persistence
//!
//! Nodes move through four fidelity tiers (RAW, SUMMARY, SEED, SIGIL_ONLY).
//! This module only holds the data and its storage; transitions belong to
//! [`crate::compression`].

pub mod node;
pub mod registry;
pub mod store;

pub use node::{CompressionLevel, MemoryNode, NodeContent, NodeId, Sigil, StructuredSummary};
pub use registry::{NodeHandle, NodeRegistry};
pub use store::{FileNodeStore, MemoryNodeStore, NodeStore};
