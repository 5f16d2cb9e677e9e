//! memgov error types

use crate::memory::NodeId;
use thiserror::Error;

/// memgov error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An audit record could not be durably stored
    #[error("Audit persistence failure: {0}")]
    AuditPersistence(String),

    /// Attempted upgrade, no-op transition, or transition past the floor
    #[error("Invalid transition for node {node_id}: {from} -> {to}")]
    InvalidTransition {
        node_id: NodeId,
        from: String,
        to: String,
    },

    /// No recoverable path exists for an anchor-only node
    #[error("Reconstruction unavailable for node {node_id}: no traversal path")]
    ReconstructionUnavailable { node_id: NodeId },

    /// A summarization/traversal dependency did not respond in time
    #[error("External service '{service}' timed out after {timeout_ms}ms")]
    ExternalServiceTimeout { service: String, timeout_ms: u64 },

    /// A summarization/traversal dependency failed
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Node does not exist in the registry or store
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Environmental failures the caller may retry or degrade around.
    ///
    /// Invariant violations (invalid transitions) and missing nodes are
    /// caller misuse and retrying them cannot succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AuditPersistence(_)
                | Error::ExternalServiceTimeout { .. }
                | Error::ExternalService(_)
                | Error::Io(_)
        )
    }
}

/// Result type alias for memgov operations
pub type Result<T> = std::result::Result<T, Error>;
