//! Authority Gate: the sentinel that judges every operation
//!
//! `evaluate` is a pure function of its inputs. It touches no storage, holds
//! no state and cannot fail; every call yields a `GateResult`. The reason
//! string comes from a fixed vocabulary keyed to the comparison performed,
//! because audit records later copy it verbatim.

use super::types::{AuthorityLevel, CycleContext, GateResult, OperationType};
use crate::memory::NodeId;

/// Stateless authority gate
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorityGate;

impl AuthorityGate {
    pub fn new() -> Self {
        Self
    }

    /// Judge whether `actor_authority` may perform `operation`.
    ///
    /// `target_node_id` and `cycle_context` identify the judgment for the
    /// audit trail; they do not influence the outcome.
    pub fn evaluate(
        &self,
        operation: OperationType,
        actor_authority: AuthorityLevel,
        required_authority: AuthorityLevel,
        target_node_id: Option<&NodeId>,
        cycle_context: Option<CycleContext>,
    ) -> GateResult {
        let allowed = actor_authority >= required_authority;
        let reason = Self::reason_for(actor_authority, required_authority);

        tracing::debug!(
            operation = %operation,
            actor = actor_authority.value(),
            required = required_authority.value(),
            node = target_node_id.map(NodeId::as_str),
            cycle = cycle_context.map(|c| c.0),
            allowed,
            "gate judgment"
        );

        GateResult::new(allowed, reason, actor_authority, required_authority)
    }

    fn reason_for(actor: AuthorityLevel, required: AuthorityLevel) -> String {
        use std::cmp::Ordering;
        match actor.cmp(&required) {
            Ordering::Less => format!("insufficient authority: {actor}<{required}"),
            Ordering::Equal => format!("authority meets requirement: {actor}={required}"),
            Ordering::Greater => format!("authority exceeds requirement: {actor}>{required}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_reason_format() {
        let gate = AuthorityGate::new();
        let result = gate.evaluate(
            OperationType::Govern,
            AuthorityLevel(2),
            AuthorityLevel(5),
            None,
            None,
        );
        assert!(!result.allowed());
        assert_eq!(result.reason(), "insufficient authority: 2<5");
        assert_eq!(result.actor_authority(), AuthorityLevel(2));
        assert_eq!(result.required_authority(), AuthorityLevel(5));
    }

    #[test]
    fn test_equal_authority_is_allowed() {
        let gate = AuthorityGate::new();
        let result = gate.evaluate(
            OperationType::Write,
            AuthorityLevel(3),
            AuthorityLevel(3),
            Some(&NodeId::new("n-1")),
            Some(CycleContext(4)),
        );
        assert!(result.allowed());
        assert_eq!(result.reason(), "authority meets requirement: 3=3");
    }

    #[test]
    fn test_greater_authority_is_allowed() {
        let gate = AuthorityGate::new();
        let result = gate.evaluate(
            OperationType::Mark,
            AuthorityLevel(9),
            AuthorityLevel(1),
            None,
            None,
        );
        assert!(result.allowed());
        assert_eq!(result.reason(), "authority exceeds requirement: 9>1");
    }

    #[test]
    fn test_evaluation_is_deterministic_and_context_free() {
        let gate = AuthorityGate::new();
        let a = gate.evaluate(
            OperationType::Read,
            AuthorityLevel(1),
            AuthorityLevel(4),
            None,
            None,
        );
        let b = gate.evaluate(
            OperationType::Read,
            AuthorityLevel(1),
            AuthorityLevel(4),
            Some(&NodeId::new("other")),
            Some(CycleContext(99)),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_gate_is_shareable_across_threads() {
        let gate = AuthorityGate::new();
        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                std::thread::spawn(move || {
                    gate.evaluate(
                        OperationType::Write,
                        AuthorityLevel(i),
                        AuthorityLevel(4),
                        None,
                        None,
                    )
                    .allowed()
                })
            })
            .collect();
        let allowed: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(allowed, vec![false, false, false, false, true, true, true, true]);
    }
}
