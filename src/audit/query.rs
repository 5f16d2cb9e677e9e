//! Audit query support

use super::types::AuditRecord;
use crate::governance::OperationType;
use crate::memory::NodeId;
use chrono::{DateTime, Utc};

/// Filter for `query_audit`
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Time range start (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Time range end (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Only this operation
    pub operation: Option<OperationType>,
    /// `Some(true)` for allowed only, `Some(false)` for denied only
    pub allowed: Option<bool>,
    /// Only records targeting this node
    pub target_node_id: Option<NodeId>,
    /// Maximum number of results (oldest first)
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn operation(mut self, op: OperationType) -> Self {
        self.operation = Some(op);
        self
    }

    pub fn denied_only(mut self) -> Self {
        self.allowed = Some(false);
        self
    }

    pub fn allowed_only(mut self) -> Self {
        self.allowed = Some(true);
        self
    }

    pub fn node(mut self, id: impl Into<NodeId>) -> Self {
        self.target_node_id = Some(id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a record matches this filter
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(from) = self.from {
            if record.timestamp() < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.timestamp() >= to {
                return false;
            }
        }
        if let Some(op) = self.operation {
            if record.operation() != op {
                return false;
            }
        }
        if let Some(allowed) = self.allowed {
            if record.allowed() != allowed {
                return false;
            }
        }
        if let Some(ref node) = self.target_node_id {
            if record.target_node_id() != Some(node) {
                return false;
            }
        }
        true
    }

    /// Apply the filter to records in append order
    pub fn apply(&self, records: Vec<AuditRecord>) -> Vec<AuditRecord> {
        let matching = records.into_iter().filter(|r| self.matches(r));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}
