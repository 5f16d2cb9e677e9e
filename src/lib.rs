//! memgov - Memory Governance Core
//!
//! memgov governs a long-lived personal memory store. Every operation on a
//! memory node is judged by an authority gate, the judgment is written to an
//! audit trail, and node fidelity degrades over time while staying
//! recoverable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          MemoryGovernor                              │
//! │                                                                      │
//! │   request ──► ┌───────────────┐ GateResult ┌──────────────────────┐  │
//! │               │ AuthorityGate │──────────► │    AuditRecorder     │  │
//! │               │ (pure, no I/O)│            │ level filter, chain  │  │
//! │               └───────┬───────┘            └──────────┬───────────┘  │
//! │                       │ allowed                       │ append       │
//! │                       ▼                               ▼              │
//! │   ┌───────────────────────────────────┐      ┌─────────────────┐     │
//! │   │ NodeRegistry (per-node RwLocks)   │      │   AuditSink     │     │
//! │   │  ┌─────────────────────────────┐  │      │ memory / JSONL  │     │
//! │   │  │ CompressionEngine           │  │      └─────────────────┘     │
//! │   │  │ RAW ► SUMMARY ► SEED ► SIGIL│  │                              │
//! │   │  └─────────────────────────────┘  │      ┌─────────────────┐     │
//! │   │  ┌─────────────────────────────┐  │ ───► │   NodeStore     │     │
//! │   │  │ ReconstructionEngine (read) │  │      │ memory / files  │     │
//! │   │  └─────────────────────────────┘  │      └─────────────────┘     │
//! │   └───────────────────────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Guarantees
//!
//! - Denials are results, not errors, and are audited per the configured level
//! - Audit reasons are copied verbatim from the gate; READ is not audited by default
//! - Compression never regains fidelity and stops at SIGIL_ONLY
//! - Sigils extend a node's window but never pause compression
//! - Reconstruction is read-only and labels anything it infers
//!
//! ## Modules
//!
//! - [`governance`]: authority gate, operation types, authority policy
//! - [`audit`]: recorder, sinks, integrity chain and queries
//! - [`compression`]: fidelity state machine and summarizers
//! - [`reconstruct`]: level-aware views and traversal seams
//! - [`memory`]: node data model, per-node lock registry, node stores
//! - [`governor`]: the entry points tying it all together
//! - [`config`]: configuration management

pub mod audit;
pub mod compression;
pub mod config;
pub mod error;
pub mod governance;
pub mod governor;
pub mod memory;
pub mod reconstruct;

pub use config::GovernanceConfig;
pub use error::{Error, Result};
pub use governor::{ActionOutcome, MemoryGovernor, MemoryGovernorBuilder, SweepReport};
