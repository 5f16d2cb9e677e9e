//! Authority judgments
//!
//! The [`AuthorityGate`] decides whether an actor may perform an operation;
//! [`AuthorityPolicy`] supplies default required authorities per operation.

pub mod gate;
mod policy;
pub mod types;

pub use gate::AuthorityGate;
pub use policy::AuthorityPolicy;
pub use types::{AuthorityLevel, CycleContext, GateResult, OperationType};
