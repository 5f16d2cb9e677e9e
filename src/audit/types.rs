//! Audit record and verbosity types

use crate::governance::{AuthorityLevel, CycleContext, GateResult, OperationType};
use crate::memory::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which judgments get persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Never record
    Off,
    /// Record GOVERN operations only
    Govern,
    /// Record MARK and GOVERN operations
    MarkPlus,
    /// Record every denial, regardless of operation
    AllDeny,
    /// Record every governed operation
    #[default]
    Full,
}

impl AuditLevel {
    /// Level filter for one judgment; READ exclusion is applied by the recorder
    pub fn admits(self, operation: OperationType, allowed: bool) -> bool {
        match self {
            AuditLevel::Off => false,
            AuditLevel::Govern => operation == OperationType::Govern,
            AuditLevel::MarkPlus => {
                matches!(operation, OperationType::Mark | OperationType::Govern)
            }
            AuditLevel::AllDeny => !allowed,
            AuditLevel::Full => true,
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditLevel::Off => "off",
            AuditLevel::Govern => "govern",
            AuditLevel::MarkPlus => "mark_plus",
            AuditLevel::AllDeny => "all_deny",
            AuditLevel::Full => "full",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AuditLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(AuditLevel::Off),
            "govern" => Ok(AuditLevel::Govern),
            "mark_plus" | "mark+" => Ok(AuditLevel::MarkPlus),
            "all_deny" => Ok(AuditLevel::AllDeny),
            "full" => Ok(AuditLevel::Full),
            other => Err(format!("unknown audit level '{other}'")),
        }
    }
}

/// Immutable snapshot of one judgment plus its context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    timestamp: DateTime<Utc>,
    operation: OperationType,
    allowed: bool,
    reason: String,
    actor_authority: AuthorityLevel,
    required_authority: AuthorityLevel,
    target_node_id: Option<NodeId>,
    cycle_context: Option<CycleContext>,
}

impl AuditRecord {
    /// Snapshot a gate result; every judgment field is copied unchanged
    pub(crate) fn from_gate(
        timestamp: DateTime<Utc>,
        gate: &GateResult,
        operation: OperationType,
        target_node_id: Option<&NodeId>,
        cycle_context: Option<CycleContext>,
    ) -> Self {
        Self {
            timestamp,
            operation,
            allowed: gate.allowed(),
            reason: gate.reason().to_string(),
            actor_authority: gate.actor_authority(),
            required_authority: gate.required_authority(),
            target_node_id: target_node_id.cloned(),
            cycle_context,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    pub fn allowed(&self) -> bool {
        self.allowed
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

    pub fn target_node_id(&self) -> Option<&NodeId> {
        self.target_node_id.as_ref()
    }

    pub fn cycle_context(&self) -> Option<CycleContext> {
        self.cycle_context
    }
}
