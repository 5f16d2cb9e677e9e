//! Reconstruction Engine
//!
//! Builds a read-only view of a node from whatever its level still holds.
//! The engine takes a snapshot and never writes back: level, content and
//! sigils are exactly as they were before the call.
//!
//! | Level      | View                         | External call                  |
//! |------------|------------------------------|--------------------------------|
//! | RAW        | text, verbatim               | none                           |
//! | SUMMARY    | stored structured summary    | none                           |
//! | SEED       | seed + metadata              | optional enricher, may degrade |
//! | SIGIL_ONLY | related anchors, fragments   | context traversal, required    |

use super::traversal::{ContextTraversal, SeedEnricher};
use super::view::{Fidelity, ReconstructedView, ViewContent};
use crate::config::ReconstructionConfig;
use crate::error::{Error, Result};
use crate::memory::{MemoryNode, NodeContent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Read-only reconstruction of nodes at any level
pub struct ReconstructionEngine {
    traversal: Arc<dyn ContextTraversal>,
    enricher: Option<Arc<dyn SeedEnricher>>,
    timeout: Duration,
}

impl ReconstructionEngine {
    pub fn new(config: &ReconstructionConfig, traversal: Arc<dyn ContextTraversal>) -> Self {
        Self {
            traversal,
            enricher: None,
            timeout: config.traversal_timeout(),
        }
    }

    /// Enrich seed-level views with labelled inferred content
    pub fn with_enricher(mut self, enricher: Arc<dyn SeedEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub async fn reconstruct(&self, node: &MemoryNode) -> Result<ReconstructedView> {
        let mut view = ReconstructedView {
            node_id: node.node_id.clone(),
            level: node.compression_level,
            fidelity: Fidelity::Verbatim,
            content: ViewContent::Raw {
                text: String::new(),
            },
            inferred: Vec::new(),
            degraded: false,
            sigil_count: node.sigils.len(),
            last_active_at: node.last_active_at,
        };

        match &node.content {
            NodeContent::Raw { text } => {
                view.content = ViewContent::Raw { text: text.clone() };
            }
            NodeContent::Summary { summary } => {
                view.fidelity = Fidelity::Structured;
                view.content = ViewContent::Summary {
                    summary: summary.clone(),
                };
            }
            NodeContent::Seed { seed, metadata } => {
                view.fidelity = Fidelity::DecisionLevel;
                if let Some(ref enricher) = self.enricher {
                    match self
                        .bounded("seed_enricher", enricher.enrich(&node.node_id, seed, metadata))
                        .await
                    {
                        Ok(inferred) => view.inferred = inferred,
                        Err(e) => {
                            tracing::warn!(
                                node = node.node_id.as_str(),
                                error = %e,
                                "Seed enrichment failed; returning degraded view"
                            );
                            view.degraded = true;
                        }
                    }
                }
                view.content = ViewContent::Seed {
                    seed: seed.clone(),
                    metadata: metadata.clone(),
                };
            }
            NodeContent::Anchor => {
                view.fidelity = Fidelity::Forensic;
                let found = self
                    .bounded("context_traversal", self.traversal.traverse(node))
                    .await?;
                match found {
                    Some(result) if !result.related.is_empty() => {
                        view.content = ViewContent::Anchors {
                            related: result.related,
                            fragments: result.fragments,
                        };
                    }
                    _ => {
                        tracing::debug!(
                            node = node.node_id.as_str(),
                            "no traversal path for anchor"
                        );
                        return Err(Error::ReconstructionUnavailable {
                            node_id: node.node_id.clone(),
                        });
                    }
                }
            }
        }

        Ok(view)
    }

    async fn bounded<T>(&self, service: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::ExternalServiceTimeout {
                service: service.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
