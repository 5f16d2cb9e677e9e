//! Audit trail
//!
//! Gate judgments are offered to the `AuditRecorder`, which filters them by
//! `AuditLevel` and appends the survivors to an `AuditSink`. Stored entries
//! are sealed onto a SHA-256 hash chain so tampering is detectable.

pub mod integrity;
pub mod query;
pub mod recorder;
pub mod sink;
pub mod types;

pub use integrity::{
    verify_chain, verify_entries, ChainVerification, IntegrityChain, SealedRecord,
};
pub use query::AuditFilter;
pub use recorder::AuditRecorder;
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};
pub use types::{AuditLevel, AuditRecord};
