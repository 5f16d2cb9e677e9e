//! Memory Governor: the entry points of the governance core
//!
//! Every operation follows the same path:
//!
//! ```text
//! request ─► AuthorityGate ─► AuditRecorder ─► (allowed) effect on node
//!                                                   │
//!                                     CompressionEngine / NodeStore
//! ```
//!
//! A denial is not an error. It comes back as a `GateResult` with
//! `allowed == false` after being offered to the audit trail. Errors are
//! reserved for audit persistence, storage, invalid transitions and
//! external services.
//!
//! Node changes are prepared on a copy and saved to the `NodeStore` before
//! they replace the registered node, so a failed save leaves memory and
//! store in agreement. Audit records of operations that take a `now` are
//! stamped with it.

use crate::audit::{
    AuditFilter, AuditRecord, AuditRecorder, AuditSink, ChainVerification, FileAuditSink,
    MemoryAuditSink,
};
use crate::compression::{CompressionEngine, RuleSummarizer, Summarizer, Transition};
use crate::config::GovernanceConfig;
use crate::error::{Error, Result};
use crate::governance::{
    AuthorityGate, AuthorityLevel, AuthorityPolicy, CycleContext, GateResult, OperationType,
};
use crate::memory::{
    CompressionLevel, FileNodeStore, MemoryNode, MemoryNodeStore, NodeContent, NodeId,
    NodeRegistry, NodeStore, Sigil,
};
use crate::reconstruct::{
    ContextTraversal, ReconstructedView, ReconstructionEngine, SeedEnricher, TemporalTraversal,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Judgment plus, when allowed, the effect of an operation
#[derive(Debug, Clone)]
pub struct ActionOutcome<T> {
    pub gate: GateResult,
    pub effect: Option<T>,
}

impl<T> ActionOutcome<T> {
    fn denied(gate: GateResult) -> Self {
        Self { gate, effect: None }
    }

    fn allowed(gate: GateResult, effect: T) -> Self {
        Self {
            gate,
            effect: Some(effect),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.gate.allowed()
    }
}

/// Result of advancing every node
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Nodes that moved, with their new level
    pub advanced: Vec<(NodeId, CompressionLevel)>,
    /// Nodes whose window has not elapsed or that sit at the floor
    pub unchanged: usize,
    /// Nodes that could not be advanced
    pub failed: Vec<(NodeId, Error)>,
}

/// Authority gate, audit trail and fidelity engines behind one facade
pub struct MemoryGovernor {
    config: GovernanceConfig,
    gate: AuthorityGate,
    policy: AuthorityPolicy,
    recorder: AuditRecorder,
    registry: NodeRegistry,
    store: Arc<dyn NodeStore>,
    compression: CompressionEngine,
    reconstruction: ReconstructionEngine,
}

impl MemoryGovernor {
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn compression(&self) -> &CompressionEngine {
        &self.compression
    }

    /// Judge an operation and offer the judgment to the audit trail.
    ///
    /// Only an audit persistence failure makes this return `Err`.
    pub async fn submit_action(
        &self,
        operation: OperationType,
        actor_authority: AuthorityLevel,
        required_authority: AuthorityLevel,
        target_node_id: Option<&NodeId>,
        cycle_context: Option<CycleContext>,
    ) -> Result<GateResult> {
        self.judge(
            operation,
            actor_authority,
            required_authority,
            target_node_id,
            cycle_context,
            Utc::now(),
        )
        .await
    }

    /// Audit records matching `filter`, oldest first
    pub async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        self.recorder.query(filter).await
    }

    /// Check the audit trail's hash chain
    pub async fn verify_audit(&self) -> Result<ChainVerification> {
        self.recorder.verify().await
    }

    /// Tick one node and return its level afterwards.
    ///
    /// Idempotent within a window: a second call before the new window
    /// elapses returns the same level.
    pub async fn advance_compression(
        &self,
        node_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<CompressionLevel> {
        self.advance(node_id, now).await.map(|(level, _)| level)
    }

    /// Read-only view of a node at its current level
    pub async fn reconstruct(&self, node_id: &NodeId) -> Result<ReconstructedView> {
        let node = self
            .registry
            .snapshot(node_id)
            .await
            .ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
        self.reconstruction.reconstruct(&node).await
    }

    /// WRITE: create the node at RAW, or refresh an existing one.
    ///
    /// A RAW node gets the new text; a compressed node only has its window
    /// restarted, since its original text is gone.
    pub async fn write(
        &self,
        actor: AuthorityLevel,
        node_id: &NodeId,
        text: impl Into<String>,
        now: DateTime<Utc>,
        cycle: Option<CycleContext>,
    ) -> Result<ActionOutcome<MemoryNode>> {
        let gate = self
            .judge(
                OperationType::Write,
                actor,
                self.required(OperationType::Write),
                Some(node_id),
                cycle,
                now,
            )
            .await?;
        if gate.is_denied() {
            return Ok(ActionOutcome::denied(gate));
        }

        let text = text.into();
        let (handle, created) = self
            .registry
            .get_or_insert_with(node_id, || MemoryNode::new(node_id.clone(), text.clone(), now))
            .await;

        let mut node = handle.write().await;
        let mut written = node.clone();
        if !created {
            written.last_active_at = written.last_active_at.max(now);
            if let NodeContent::Raw { text: ref mut current } = written.content {
                *current = text;
            }
        }
        if let Err(e) = self.store.save(&written).await {
            if created {
                self.registry.remove_handle(node_id, &handle).await;
            }
            return Err(e);
        }
        *node = written;

        tracing::debug!(
            node = node_id.as_str(),
            created,
            level = %node.compression_level,
            "node written"
        );
        Ok(ActionOutcome::allowed(gate, node.clone()))
    }

    /// MARK: place a sigil on an existing node
    pub async fn mark(
        &self,
        actor: AuthorityLevel,
        node_id: &NodeId,
        now: DateTime<Utc>,
        cycle: Option<CycleContext>,
    ) -> Result<ActionOutcome<Sigil>> {
        let handle = self
            .registry
            .handle(node_id)
            .await
            .ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
        let mut node = handle.write().await;

        let gate = self
            .judge(
                OperationType::Mark,
                actor,
                self.required(OperationType::Mark),
                Some(node_id),
                cycle,
                now,
            )
            .await?;
        if gate.is_denied() {
            return Ok(ActionOutcome::denied(gate));
        }

        let sigil = Sigil::new(node_id.clone(), now);
        let mut marked = node.clone();
        self.compression.attach_sigil(&mut marked, sigil.clone());
        self.store.save(&marked).await?;
        *node = marked;
        Ok(ActionOutcome::allowed(gate, sigil))
    }

    /// READ: snapshot a node. Not audited unless `audit.include_reads` is set.
    pub async fn read(
        &self,
        actor: AuthorityLevel,
        node_id: &NodeId,
    ) -> Result<ActionOutcome<MemoryNode>> {
        let gate = self
            .submit_action(
                OperationType::Read,
                actor,
                self.required(OperationType::Read),
                Some(node_id),
                None,
            )
            .await?;
        if gate.is_denied() {
            return Ok(ActionOutcome::denied(gate));
        }
        let node = self
            .registry
            .snapshot(node_id)
            .await
            .ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
        Ok(ActionOutcome::allowed(gate, node))
    }

    /// GOVERN: force a node down to `target` (next level when `None`).
    ///
    /// Judged against the GOVERN requirement when
    /// `compression.gate_transitions` is set; always audited as GOVERN.
    pub async fn downgrade(
        &self,
        actor: AuthorityLevel,
        node_id: &NodeId,
        target: Option<CompressionLevel>,
        now: DateTime<Utc>,
        cycle: Option<CycleContext>,
    ) -> Result<ActionOutcome<Option<Transition>>> {
        let handle = self
            .registry
            .handle(node_id)
            .await
            .ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
        let mut node = handle.write().await;

        let required = if self.config.compression.gate_transitions {
            self.required(OperationType::Govern)
        } else {
            AuthorityLevel::NONE
        };
        let gate = self
            .judge(OperationType::Govern, actor, required, Some(node_id), cycle, now)
            .await?;
        if gate.is_denied() {
            return Ok(ActionOutcome::denied(gate));
        }

        let mut lowered = node.clone();
        let transition = self.compression.downgrade(&mut lowered, target, now).await?;
        if transition.is_some() {
            self.store.save(&lowered).await?;
            *node = lowered;
        }
        Ok(ActionOutcome::allowed(gate, transition))
    }

    /// Advance every registered node concurrently
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let ids = self.registry.ids().await;
        let results =
            futures::future::join_all(ids.iter().map(|id| self.advance(id, now))).await;

        let mut report = SweepReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok((level, Some(_))) => report.advanced.push((id, level)),
                Ok((_, None)) => report.unchanged += 1,
                Err(e) => report.failed.push((id, e)),
            }
        }

        tracing::info!(
            advanced = report.advanced.len(),
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "compression sweep complete"
        );
        report
    }

    /// Populate the registry from the node store; returns the node count
    pub async fn load_nodes(&self) -> Result<usize> {
        let nodes = self.store.load_all().await?;
        let count = nodes.len();
        for node in nodes {
            self.registry.insert(node).await;
        }
        tracing::info!(count, "nodes loaded");
        Ok(count)
    }

    /// Tick under the node's write lock. Scheduled transitions are judged
    /// with the system authority and audited as GOVERN before they apply.
    async fn advance(
        &self,
        node_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<(CompressionLevel, Option<Transition>)> {
        let handle = self
            .registry
            .handle(node_id)
            .await
            .ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
        let mut node = handle.write().await;

        if !self.compression.is_due(&node, now) {
            return Ok((node.compression_level, None));
        }

        let gate = self
            .judge(
                OperationType::Govern,
                self.config.compression.system_authority,
                self.required(OperationType::Govern),
                Some(node_id),
                None,
                now,
            )
            .await?;
        if gate.is_denied() {
            tracing::warn!(
                node = node_id.as_str(),
                reason = gate.reason(),
                "scheduled transition denied"
            );
            return Ok((node.compression_level, None));
        }

        let mut ticked = node.clone();
        let transition = self.compression.tick(&mut ticked, now).await?;
        if transition.is_some() {
            self.store.save(&ticked).await?;
            *node = ticked;
        }
        Ok((node.compression_level, transition))
    }

    fn required(&self, operation: OperationType) -> AuthorityLevel {
        self.policy.required_for(operation)
    }

    async fn judge(
        &self,
        operation: OperationType,
        actor_authority: AuthorityLevel,
        required_authority: AuthorityLevel,
        target_node_id: Option<&NodeId>,
        cycle_context: Option<CycleContext>,
        at: DateTime<Utc>,
    ) -> Result<GateResult> {
        let gate = self.gate.evaluate(
            operation,
            actor_authority,
            required_authority,
            target_node_id,
            cycle_context,
        );
        self.recorder
            .record_at(&gate, operation, target_node_id, cycle_context, at)
            .await?;
        Ok(gate)
    }
}

/// Builder for `MemoryGovernor`
pub struct MemoryGovernorBuilder {
    config: GovernanceConfig,
    audit_sink: Option<Arc<dyn AuditSink>>,
    node_store: Option<Arc<dyn NodeStore>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    traversal: Option<Arc<dyn ContextTraversal>>,
    enricher: Option<Arc<dyn SeedEnricher>>,
}

impl MemoryGovernorBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self {
            config: GovernanceConfig::default(),
            audit_sink: None,
            node_store: None,
            summarizer: None,
            traversal: None,
            enricher: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: GovernanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this sink instead of the one `audit.log_path` selects
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Use this store instead of the one `storage.nodes_dir` selects
    pub fn node_store(mut self, store: Arc<dyn NodeStore>) -> Self {
        self.node_store = Some(store);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn traversal(mut self, traversal: Arc<dyn ContextTraversal>) -> Self {
        self.traversal = Some(traversal);
        self
    }

    pub fn enricher(mut self, enricher: Arc<dyn SeedEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Build the governor, opening file-backed sinks and stores as configured
    pub async fn build(self) -> Result<MemoryGovernor> {
        let config = self.config;
        config.validate()?;

        let sink: Arc<dyn AuditSink> = match (self.audit_sink, &config.audit.log_path) {
            (Some(sink), _) => sink,
            (None, Some(path)) => Arc::new(FileAuditSink::new(path.clone(), config.audit.durable).await?),
            (None, None) => Arc::new(MemoryAuditSink::new()),
        };
        let store: Arc<dyn NodeStore> = match (self.node_store, &config.storage.nodes_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileNodeStore::new(dir.clone()).await?),
            (None, None) => Arc::new(MemoryNodeStore::new()),
        };
        let summarizer: Arc<dyn Summarizer> = match self.summarizer {
            Some(summarizer) => summarizer,
            None => Arc::new(RuleSummarizer::new()?),
        };

        let registry = NodeRegistry::new();
        let traversal: Arc<dyn ContextTraversal> = match self.traversal {
            Some(traversal) => traversal,
            None => Arc::new(TemporalTraversal::new(
                registry.clone(),
                config.reconstruction.traversal_radius(),
            )),
        };
        let mut reconstruction = ReconstructionEngine::new(&config.reconstruction, traversal);
        if let Some(enricher) = self.enricher {
            reconstruction = reconstruction.with_enricher(enricher);
        }

        let recorder = AuditRecorder::new(config.audit.level, sink).with_reads(config.audit.include_reads);
        let compression = CompressionEngine::new(&config.compression, summarizer);

        tracing::info!(
            audit_level = %config.audit.level,
            gate_transitions = config.compression.gate_transitions,
            "memory governor ready"
        );

        Ok(MemoryGovernor {
            gate: AuthorityGate::new(),
            policy: config.authority,
            recorder,
            registry,
            store,
            compression,
            reconstruction,
            config,
        })
    }
}

impl Default for MemoryGovernorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLevel;
    use crate::reconstruct::{Fidelity, NoTraversal};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    async fn governor(config: GovernanceConfig) -> MemoryGovernor {
        MemoryGovernorBuilder::new().config(config).build().await.unwrap()
    }

    /// Memory store whose saves start failing once `failing` is set
    struct FlakyStore {
        inner: MemoryNodeStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn new(failing: bool) -> Self {
            Self {
                inner: MemoryNodeStore::new(),
                failing: AtomicBool::new(failing),
            }
        }
    }

    #[async_trait]
    impl NodeStore for FlakyStore {
        async fn save(&self, node: &MemoryNode) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.save(node).await
        }

        async fn load(&self, id: &NodeId) -> Result<Option<MemoryNode>> {
            self.inner.load(id).await
        }

        async fn load_all(&self) -> Result<Vec<MemoryNode>> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn test_denied_govern_is_audited_verbatim() {
        let gov = governor(GovernanceConfig::default()).await;
        let node = NodeId::new("n-1");

        let gate = gov
            .submit_action(
                OperationType::Govern,
                AuthorityLevel(2),
                AuthorityLevel(5),
                Some(&node),
                Some(CycleContext(1)),
            )
            .await
            .unwrap();
        assert!(!gate.allowed());
        assert_eq!(gate.reason(), "insufficient authority: 2<5");

        let records = gov
            .query_audit(&AuditFilter::new().denied_only())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason(), gate.reason());
        assert_eq!(records[0].target_node_id(), Some(&node));
    }

    #[tokio::test]
    async fn test_read_allowed_but_not_audited_at_full() {
        let gov = governor(GovernanceConfig::default()).await;
        let node = NodeId::new("n-1");
        let now = Utc::now();
        gov.write(AuthorityLevel(1), &node, "hello", now, None).await.unwrap();

        let outcome = gov.read(AuthorityLevel(1), &node).await.unwrap();
        assert!(outcome.is_allowed());
        let records = gov
            .query_audit(&AuditFilter::new().operation(OperationType::Read))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_denied_write_creates_nothing() {
        let gov = governor(GovernanceConfig::default()).await;
        let node = NodeId::new("n-1");
        let outcome = gov
            .write(AuthorityLevel(0), &node, "hello", Utc::now(), None)
            .await
            .unwrap();
        assert!(!outcome.is_allowed());
        assert!(outcome.effect.is_none());
        assert!(gov.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_sigil_extends_window_then_compresses() {
        let gov = governor(GovernanceConfig::default()).await;
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "We chose the blue design.", t0, None)
            .await
            .unwrap();
        let mark = gov.mark(AuthorityLevel(2), &node, t0, None).await.unwrap();
        assert!(mark.is_allowed());

        let level = gov
            .advance_compression(&node, t0 + Duration::days(7))
            .await
            .unwrap();
        assert_eq!(level, CompressionLevel::Raw);

        let level = gov
            .advance_compression(&node, t0 + Duration::days(10))
            .await
            .unwrap();
        assert_eq!(level, CompressionLevel::Summary);

        let node_state = gov.read(AuthorityLevel(0), &node).await.unwrap().effect.unwrap();
        assert_eq!(node_state.sigils.len(), 1);
        assert_eq!(node_state.previous_level, Some(CompressionLevel::Raw));

        // Idempotent within the new window
        let level = gov
            .advance_compression(&node, t0 + Duration::days(10))
            .await
            .unwrap();
        assert_eq!(level, CompressionLevel::Summary);

        let transitions = gov
            .query_audit(&AuditFilter::new().operation(OperationType::Govern).node("n-1"))
            .await
            .unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].actor_authority(), AuthorityLevel::MAX);
    }

    #[tokio::test]
    async fn test_downgrade_backward_fails_and_leaves_node() {
        let gov = governor(GovernanceConfig::default()).await;
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "text", t0, None).await.unwrap();
        gov.downgrade(AuthorityLevel(3), &node, None, t0, None)
            .await
            .unwrap();
        let before = gov.registry().snapshot(&node).await.unwrap();

        let err = gov
            .downgrade(AuthorityLevel(3), &node, Some(CompressionLevel::Raw), t0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(gov.registry().snapshot(&node).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_gated_downgrade_denied_is_audited() {
        let mut config = GovernanceConfig::default();
        config.compression.gate_transitions = true;
        let gov = governor(config).await;
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "text", t0, None).await.unwrap();

        let outcome = gov
            .downgrade(AuthorityLevel(1), &node, None, t0, None)
            .await
            .unwrap();
        assert!(!outcome.is_allowed());
        assert_eq!(
            gov.registry().snapshot(&node).await.unwrap().compression_level,
            CompressionLevel::Raw
        );

        let denied = gov
            .query_audit(&AuditFilter::new().operation(OperationType::Govern).denied_only())
            .await
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].reason(), "insufficient authority: 1<3");
    }

    #[tokio::test]
    async fn test_low_system_authority_blocks_scheduled_ticks() {
        let mut config = GovernanceConfig::default();
        config.compression.system_authority = AuthorityLevel(0);
        let gov = governor(config).await;
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "text", t0, None).await.unwrap();

        let level = gov
            .advance_compression(&node, t0 + Duration::days(30))
            .await
            .unwrap();
        assert_eq!(level, CompressionLevel::Raw);
    }

    #[tokio::test]
    async fn test_anchor_reconstruction_unavailable() {
        let gov = MemoryGovernorBuilder::new()
            .traversal(Arc::new(NoTraversal))
            .build()
            .await
            .unwrap();
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "text", t0, None).await.unwrap();
        gov.downgrade(AuthorityLevel(3), &node, Some(CompressionLevel::SigilOnly), t0, None)
            .await
            .unwrap();

        let err = gov.reconstruct(&node).await.unwrap_err();
        assert!(matches!(err, Error::ReconstructionUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_anchor_reconstructed_from_neighbours() {
        let gov = governor(GovernanceConfig::default()).await;
        let t0 = Utc::now();
        let gone = NodeId::new("gone");
        let near = NodeId::new("near");
        gov.write(AuthorityLevel(1), &gone, "old plan", t0, None).await.unwrap();
        gov.write(AuthorityLevel(1), &near, "launch moved to May", t0, None)
            .await
            .unwrap();
        gov.downgrade(AuthorityLevel(3), &gone, Some(CompressionLevel::SigilOnly), t0, None)
            .await
            .unwrap();

        let view = gov.reconstruct(&gone).await.unwrap();
        assert_eq!(view.fidelity, Fidelity::Forensic);
        assert!(view.render().contains("related: near"));
    }

    #[tokio::test]
    async fn test_sweep_advances_due_nodes_only() {
        let gov = governor(GovernanceConfig::default()).await;
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &NodeId::new("old"), "a", t0, None)
            .await
            .unwrap();
        gov.write(
            AuthorityLevel(1),
            &NodeId::new("fresh"),
            "b",
            t0 + Duration::days(5),
            None,
        )
        .await
        .unwrap();

        let report = gov.sweep(t0 + Duration::days(7)).await;
        assert_eq!(
            report.advanced,
            vec![(NodeId::new("old"), CompressionLevel::Summary)]
        );
        assert_eq!(report.unchanged, 1);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = TempDir::new().unwrap();
        let mut config = GovernanceConfig::default();
        config.audit.log_path = Some(dir.path().join("audit.jsonl"));
        config.storage.nodes_dir = Some(dir.path().join("nodes"));
        config.audit.level = AuditLevel::MarkPlus;

        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        {
            let gov = governor(config.clone()).await;
            gov.write(AuthorityLevel(1), &node, "kept", t0, None).await.unwrap();
            gov.mark(AuthorityLevel(2), &node, t0, Some(CycleContext(4)))
                .await
                .unwrap();
        }

        let gov = governor(config).await;
        assert_eq!(gov.load_nodes().await.unwrap(), 1);
        let restored = gov.registry().snapshot(&node).await.unwrap();
        assert_eq!(restored.sigils.len(), 1);

        let records = gov.query_audit(&AuditFilter::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation(), OperationType::Mark);
        assert_eq!(records[0].cycle_context(), Some(CycleContext(4)));
        assert!(gov.verify_audit().await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_concurrent_operations_on_one_node_stay_monotonic() {
        let gov = Arc::new(governor(GovernanceConfig::default()).await);
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "We decided to go.", t0, None)
            .await
            .unwrap();

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let gov = gov.clone();
                let node = node.clone();
                tokio::spawn(async move {
                    let now = t0 + Duration::days(7 * (i + 1));
                    if i % 2 == 0 {
                        let _ = gov.advance_compression(&node, now).await;
                    } else {
                        let _ = gov.downgrade(AuthorityLevel(3), &node, None, now, None).await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let history = gov.compression().history(&node).await;
        assert!(history.windows(2).all(|w| w[0].to <= w[1].from));
        let node_state = gov.registry().snapshot(&node).await.unwrap();
        assert_eq!(node_state.compression_level, CompressionLevel::SigilOnly);
        assert_eq!(node_state.content, NodeContent::Anchor);
    }

    #[tokio::test]
    async fn test_failed_save_does_not_register_new_node() {
        let store = Arc::new(FlakyStore::new(true));
        let gov = MemoryGovernorBuilder::new()
            .node_store(store.clone())
            .build()
            .await
            .unwrap();
        let node = NodeId::new("n-1");

        let err = gov
            .write(AuthorityLevel(1), &node, "hello", Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(gov.registry().is_empty().await);
        assert!(store.load(&node).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_existing_node_as_stored() {
        let store = Arc::new(FlakyStore::new(false));
        let gov = MemoryGovernorBuilder::new()
            .node_store(store.clone())
            .build()
            .await
            .unwrap();
        let node = NodeId::new("n-1");
        let t0 = Utc::now();
        gov.write(AuthorityLevel(1), &node, "first", t0, None).await.unwrap();
        store.failing.store(true, Ordering::SeqCst);

        assert!(gov
            .write(AuthorityLevel(1), &node, "second", t0 + Duration::days(1), None)
            .await
            .is_err());
        assert!(gov.mark(AuthorityLevel(2), &node, t0, None).await.is_err());
        assert!(gov
            .downgrade(AuthorityLevel(3), &node, None, t0, None)
            .await
            .is_err());

        let live = gov.registry().snapshot(&node).await.unwrap();
        assert_eq!(Some(live.clone()), store.load(&node).await.unwrap());
        assert_eq!(live.content, NodeContent::Raw { text: "first".to_string() });
        assert_eq!(live.last_active_at, t0);
        assert!(live.sigils.is_empty());
    }

    #[tokio::test]
    async fn test_mark_unknown_node_is_not_audited() {
        let gov = governor(GovernanceConfig::default()).await;
        let err = gov
            .mark(AuthorityLevel(2), &NodeId::new("missing"), Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
        assert!(gov.query_audit(&AuditFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_times_follow_operation_clock() {
        let gov = governor(GovernanceConfig::default()).await;
        let node = NodeId::new("n-1");
        let t0 = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        gov.write(AuthorityLevel(1), &node, "We chose May.", t0, None)
            .await
            .unwrap();
        let t1 = t0 + Duration::days(7);
        gov.advance_compression(&node, t1).await.unwrap();

        let history = gov.compression().history(&node).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].at, t1);

        let window = gov
            .query_audit(
                &AuditFilter::new()
                    .from(t1)
                    .to(t1 + Duration::seconds(1)),
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].operation(), OperationType::Govern);
        assert_eq!(window[0].timestamp(), history[0].at);

        let all = gov.query_audit(&AuditFilter::new()).await.unwrap();
        assert_eq!(all[0].timestamp(), t0);
    }

    #[tokio::test]
    async fn test_configured_policy_gates_writes() {
        let mut config = GovernanceConfig::default();
        config.authority.write = AuthorityLevel(4);
        let gov = governor(config).await;

        let outcome = gov
            .write(AuthorityLevel(2), &NodeId::new("n-1"), "text", Utc::now(), None)
            .await
            .unwrap();
        assert!(!outcome.is_allowed());
        assert_eq!(outcome.gate.reason(), "insufficient authority: 2<4");
    }
}
