//! Required-authority policy for node operations

use super::types::{AuthorityLevel, OperationType};
use serde::{Deserialize, Serialize};

/// Required authority per operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityPolicy {
    /// Required authority for READ
    pub read: AuthorityLevel,
    /// Required authority for WRITE
    pub write: AuthorityLevel,
    /// Required authority for MARK
    pub mark: AuthorityLevel,
    /// Required authority for GOVERN (including gated downgrades)
    pub govern: AuthorityLevel,
}

impl Default for AuthorityPolicy {
    fn default() -> Self {
        Self {
            read: AuthorityLevel(0),
            write: AuthorityLevel(1),
            mark: AuthorityLevel(2),
            govern: AuthorityLevel(3),
        }
    }
}

impl AuthorityPolicy {
    /// Required authority for an operation
    pub fn required_for(&self, operation: OperationType) -> AuthorityLevel {
        match operation {
            OperationType::Read => self.read,
            OperationType::Write => self.write,
            OperationType::Mark => self.mark,
            OperationType::Govern => self.govern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = AuthorityPolicy::default();
        assert_eq!(policy.required_for(OperationType::Read), AuthorityLevel(0));
        assert_eq!(policy.required_for(OperationType::Write), AuthorityLevel(1));
        assert_eq!(policy.required_for(OperationType::Mark), AuthorityLevel(2));
        assert_eq!(policy.required_for(OperationType::Govern), AuthorityLevel(3));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let policy: AuthorityPolicy = toml::from_str("govern = 7").unwrap();
        assert_eq!(policy.govern, AuthorityLevel(7));
        assert_eq!(policy.mark, AuthorityLevel(2));
    }
}
