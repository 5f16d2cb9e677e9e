//! Authority and judgment types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of operation being judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Read a node (not audited by default)
    Read,
    /// Create or update a node
    Write,
    /// Place a sigil
    Mark,
    /// Governance action, including compression transitions
    Govern,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Read => "READ",
            OperationType::Write => "WRITE",
            OperationType::Mark => "MARK",
            OperationType::Govern => "GOVERN",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric authority ordinal; actors and operations are compared on this scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorityLevel(pub u8);

impl AuthorityLevel {
    pub const NONE: AuthorityLevel = AuthorityLevel(0);
    pub const MAX: AuthorityLevel = AuthorityLevel(u8::MAX);

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for AuthorityLevel {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

/// Interaction cycle an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleContext(pub u64);

impl fmt::Display for CycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AC-{}", self.0)
    }
}

/// Outcome of an authority judgment.
///
/// Immutable once produced: fields are private and only readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    allowed: bool,
    reason: String,
    actor_authority: AuthorityLevel,
    required_authority: AuthorityLevel,
}

impl GateResult {
    pub(crate) fn new(
        allowed: bool,
        reason: String,
        actor_authority: AuthorityLevel,
        required_authority: AuthorityLevel,
    ) -> Self {
        Self {
            allowed,
            reason,
            actor_authority,
            required_authority,
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn actor_authority(&self) -> AuthorityLevel {
        self.actor_authority
    }

    pub fn required_authority(&self) -> AuthorityLevel {
        self.required_authority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serde_names() {
        let json = serde_json::to_string(&OperationType::Govern).unwrap();
        assert_eq!(json, "\"GOVERN\"");
        let op: OperationType = serde_json::from_str("\"MARK\"").unwrap();
        assert_eq!(op, OperationType::Mark);
    }

    #[test]
    fn test_authority_ordering() {
        assert!(AuthorityLevel(2) < AuthorityLevel(5));
        assert!(AuthorityLevel::MAX > AuthorityLevel(254));
        assert_eq!(AuthorityLevel::from(7).value(), 7);
    }

    #[test]
    fn test_cycle_display() {
        assert_eq!(CycleContext(7).to_string(), "AC-7");
    }
}
