//! Audit Recorder
//!
//! Turns gate judgments into audit records under a configured verbosity and
//! hands them to an `AuditSink`. The recorder never alters a judgment: the
//! reason, the outcome and both authorities are copied as produced.
//!
//! Appends go through a single mutex that also assigns timestamps, so
//! records are stored in submission order with non-decreasing timestamps.
//! `record_at` stamps a record with the caller's clock, the same `now` the
//! governor hands to the compression engine, so audit time ranges line up
//! with transition history. A stamp earlier than the previous record is
//! raised to it.

use super::integrity::ChainVerification;
use super::query::AuditFilter;
use super::sink::AuditSink;
use super::types::{AuditLevel, AuditRecord};
use crate::error::{Error, Result};
use crate::governance::{CycleContext, GateResult, OperationType};
use crate::memory::NodeId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Level-filtered writer of audit records
pub struct AuditRecorder {
    level: AuditLevel,
    include_reads: bool,
    sink: Arc<dyn AuditSink>,
    /// Last assigned timestamp; held across the append
    last_ts: Mutex<Option<DateTime<Utc>>>,
}

impl AuditRecorder {
    /// Create a recorder writing to `sink` at `level`, with READ excluded
    pub fn new(level: AuditLevel, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            level,
            include_reads: false,
            sink,
            last_ts: Mutex::new(None),
        }
    }

    /// Opt READ operations into the level filter
    pub fn with_reads(mut self, include_reads: bool) -> Self {
        self.include_reads = include_reads;
        self
    }

    pub fn level(&self) -> AuditLevel {
        self.level
    }

    /// Whether a judgment of `operation` with outcome `allowed` is recorded
    pub fn should_record(&self, operation: OperationType, allowed: bool) -> bool {
        if operation == OperationType::Read && !self.include_reads {
            return false;
        }
        self.level.admits(operation, allowed)
    }

    /// Record one judgment stamped with the wall clock.
    ///
    /// Returns `Ok(None)` when the level filter excludes it and
    /// `Ok(Some(record))` once the sink acknowledged the append. A sink
    /// failure surfaces as `Error::AuditPersistence`.
    pub async fn record(
        &self,
        gate: &GateResult,
        operation: OperationType,
        target_node_id: Option<&NodeId>,
        cycle_context: Option<CycleContext>,
    ) -> Result<Option<AuditRecord>> {
        self.record_at(gate, operation, target_node_id, cycle_context, Utc::now())
            .await
    }

    /// `record` with an explicit timestamp
    pub async fn record_at(
        &self,
        gate: &GateResult,
        operation: OperationType,
        target_node_id: Option<&NodeId>,
        cycle_context: Option<CycleContext>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuditRecord>> {
        if !self.should_record(operation, gate.allowed()) {
            return Ok(None);
        }

        let mut last_ts = self.last_ts.lock().await;
        let timestamp = match *last_ts {
            Some(prev) if prev > now => prev,
            _ => now,
        };

        let record = AuditRecord::from_gate(timestamp, gate, operation, target_node_id, cycle_context);
        if let Err(e) = self.sink.append(&record).await {
            tracing::warn!(
                operation = %operation,
                node = target_node_id.map(NodeId::as_str),
                error = %e,
                "Failed to persist audit record"
            );
            return Err(match e {
                Error::AuditPersistence(msg) => Error::AuditPersistence(msg),
                other => Error::AuditPersistence(other.to_string()),
            });
        }

        *last_ts = Some(timestamp);
        Ok(Some(record))
    }

    /// Read back records matching `filter`, oldest first
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let records = self.sink.read_all().await?;
        Ok(filter.apply(records))
    }

    /// Verify the integrity chain of everything the sink holds
    pub async fn verify(&self) -> Result<ChainVerification> {
        self.sink.verify().await
    }
}
