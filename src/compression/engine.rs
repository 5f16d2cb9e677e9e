//! Compression Engine
//!
//! Owns each node's fidelity level. A node moves one way only:
//!
//! ```text
//! RAW ──► SUMMARY ──► SEED ──► SIGIL_ONLY (floor)
//! ```
//!
//! `tick` drops a node one level once its active window has elapsed.
//! `downgrade` forces a drop to an explicit target. Sigils lengthen the
//! window but never stop it. Callers hold the node's write lock while
//! calling in, which serializes transitions per node.
//!
//! Lower-fidelity content is derived before anything is changed. If the
//! summarizer fails or times out, the node is left exactly as it was.

use super::summarizer::Summarizer;
use crate::config::CompressionConfig;
use crate::error::{Error, Result};
use crate::memory::{CompressionLevel, MemoryNode, NodeContent, NodeId, Sigil};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What triggered a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// The active window elapsed
    Tick,
    /// Explicit forced downgrade
    Downgrade,
}

/// One applied level change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub node_id: NodeId,
    pub from: CompressionLevel,
    pub to: CompressionLevel,
    pub at: DateTime<Utc>,
    pub cause: TransitionCause,
}

/// Per-node fidelity state machine
pub struct CompressionEngine {
    density_window: Duration,
    sigil_extension: Duration,
    summarizer: Arc<dyn Summarizer>,
    summarizer_timeout: std::time::Duration,
    history: RwLock<HashMap<NodeId, Vec<Transition>>>,
}

impl CompressionEngine {
    pub fn new(config: &CompressionConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            density_window: config.density_window(),
            sigil_extension: config.sigil_extension(),
            summarizer,
            summarizer_timeout: config.summarizer_timeout(),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// When the node's current window runs out.
    ///
    /// The latest sigil grants one extension past its own window; earlier
    /// sigils are subsumed by it.
    /// Saturates at the end of representable time, so a huge window means
    /// "not yet" rather than an overflow.
    pub fn window_deadline(&self, node: &MemoryNode) -> DateTime<Utc> {
        let base = later_by(node.last_active_at, &[self.density_window]);
        match node.latest_sigil_at() {
            Some(placed_at) => {
                base.max(later_by(placed_at, &[self.density_window, self.sigil_extension]))
            }
            None => base,
        }
    }

    /// Whether `tick` at `now` would move the node
    pub fn is_due(&self, node: &MemoryNode, now: DateTime<Utc>) -> bool {
        !node.compression_level.is_floor() && now >= self.window_deadline(node)
    }

    /// Drop the node one level if its window has elapsed.
    ///
    /// The window restarts at `now`, so repeated ticks inside the new window
    /// do nothing. A node at the floor is left alone.
    pub async fn tick(&self, node: &mut MemoryNode, now: DateTime<Utc>) -> Result<Option<Transition>> {
        if !self.is_due(node, now) {
            return Ok(None);
        }
        let Some(next) = node.compression_level.next() else {
            return Ok(None);
        };
        self.transition(node, next, now, TransitionCause::Tick)
            .await
            .map(Some)
    }

    /// Attach a sigil; extends the window without touching the level.
    ///
    /// Returns the node's new window deadline.
    pub fn attach_sigil(&self, node: &mut MemoryNode, sigil: Sigil) -> DateTime<Utc> {
        tracing::debug!(
            node = node.node_id.as_str(),
            sigil = %sigil.sigil_id,
            level = %node.compression_level,
            "sigil attached"
        );
        node.sigils.push(sigil);
        self.window_deadline(node)
    }

    /// Force a drop to `target`, or to the next level when `target` is `None`.
    ///
    /// Moving to the current level or back toward RAW is an
    /// `InvalidTransition`. A node at the floor is left alone.
    pub async fn downgrade(
        &self,
        node: &mut MemoryNode,
        target: Option<CompressionLevel>,
        now: DateTime<Utc>,
    ) -> Result<Option<Transition>> {
        let from = node.compression_level;
        if from.is_floor() {
            return Ok(None);
        }
        let to = match target {
            Some(to) => to,
            None => from.next().unwrap_or(CompressionLevel::SigilOnly),
        };
        if to <= from {
            return Err(Error::InvalidTransition {
                node_id: node.node_id.clone(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.transition(node, to, now, TransitionCause::Downgrade)
            .await
            .map(Some)
    }

    /// `downgrade` addressed by level index, rejecting indices past the floor
    pub async fn downgrade_to_index(
        &self,
        node: &mut MemoryNode,
        index: u8,
        now: DateTime<Utc>,
    ) -> Result<Option<Transition>> {
        if node.compression_level.is_floor() {
            return Ok(None);
        }
        match CompressionLevel::from_index(index) {
            Some(target) => self.downgrade(node, Some(target), now).await,
            None => Err(Error::InvalidTransition {
                node_id: node.node_id.clone(),
                from: node.compression_level.to_string(),
                to: format!("index {index}"),
            }),
        }
    }

    /// Transitions applied to a node, oldest first
    pub async fn history(&self, node_id: &NodeId) -> Vec<Transition> {
        self.history
            .read()
            .await
            .get(node_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Walk every intermediate level on a scratch copy, then commit once
    async fn transition(
        &self,
        node: &mut MemoryNode,
        to: CompressionLevel,
        now: DateTime<Utc>,
        cause: TransitionCause,
    ) -> Result<Transition> {
        let from = node.compression_level;
        let mut work = node.clone();
        while let Some(next) = work.compression_level.next().filter(|n| *n <= to) {
            let content = self.derive(&work, next).await.map_err(|e| {
                tracing::warn!(
                    node = node.node_id.as_str(),
                    from = %work.compression_level,
                    to = %next,
                    error = %e,
                    "Content derivation failed; node left unchanged"
                );
                e
            })?;
            work.apply_level(next, content);
        }
        work.previous_level = Some(from);
        work.last_active_at = now;
        *node = work;

        let transition = Transition {
            node_id: node.node_id.clone(),
            from,
            to,
            at: now,
            cause,
        };
        self.history
            .write()
            .await
            .entry(node.node_id.clone())
            .or_default()
            .push(transition.clone());

        tracing::info!(
            node = node.node_id.as_str(),
            from = %from,
            to = %to,
            cause = ?cause,
            "compression transition"
        );
        Ok(transition)
    }

    async fn derive(&self, node: &MemoryNode, to: CompressionLevel) -> Result<NodeContent> {
        match (&node.content, to) {
            (NodeContent::Raw { text }, CompressionLevel::Summary) => {
                let summary = self
                    .bounded(self.summarizer.summarize(&node.node_id, text))
                    .await?;
                Ok(NodeContent::Summary { summary })
            }
            (NodeContent::Summary { summary }, CompressionLevel::Seed) => {
                let (seed, metadata) = self
                    .bounded(self.summarizer.seed(&node.node_id, summary, node.sigils.len()))
                    .await?;
                Ok(NodeContent::Seed { seed, metadata })
            }
            (_, CompressionLevel::SigilOnly) => Ok(NodeContent::Anchor),
            (content, to) => Err(Error::InvalidTransition {
                node_id: node.node_id.clone(),
                from: content.level().to_string(),
                to: to.to_string(),
            }),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.summarizer_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::ExternalServiceTimeout {
                service: "summarizer".to_string(),
                timeout_ms: self.summarizer_timeout.as_millis() as u64,
            }),
        }
    }
}

fn later_by(at: DateTime<Utc>, spans: &[Duration]) -> DateTime<Utc> {
    spans
        .iter()
        .try_fold(at, |t, span| t.checked_add_signed(*span))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
