//! External context services used during reconstruction

use super::view::InferredContent;
use crate::compression::summarizer::seed_text;
use crate::error::Result;
use crate::memory::{MemoryNode, NodeContent, NodeId, NodeRegistry};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::BTreeMap;

/// Anchors and fragments found around an anchor-only node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalResult {
    pub related: Vec<NodeId>,
    pub fragments: Vec<String>,
}

/// Finds context related to a node that has lost its own content
#[async_trait]
pub trait ContextTraversal: Send + Sync {
    /// `Ok(None)` when no path to related context exists
    async fn traverse(&self, node: &MemoryNode) -> Result<Option<TraversalResult>>;
}

/// Adds inferred content to a seed-level view
#[async_trait]
pub trait SeedEnricher: Send + Sync {
    async fn enrich(
        &self,
        node_id: &NodeId,
        seed: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<Vec<InferredContent>>;
}

/// Traversal with no context source; every anchor is unreachable
pub struct NoTraversal;

#[async_trait]
impl ContextTraversal for NoTraversal {
    async fn traverse(&self, _node: &MemoryNode) -> Result<Option<TraversalResult>> {
        Ok(None)
    }
}

/// Treats nodes created close in time as related context
pub struct TemporalTraversal {
    registry: NodeRegistry,
    radius: Duration,
    max_related: usize,
}

impl TemporalTraversal {
    pub fn new(registry: NodeRegistry, radius: Duration) -> Self {
        Self {
            registry,
            radius,
            max_related: 5,
        }
    }

    pub fn max_related(mut self, max_related: usize) -> Self {
        self.max_related = max_related;
        self
    }

    fn fragment(node: &MemoryNode) -> Option<String> {
        match &node.content {
            NodeContent::Raw { text } => Some(seed_text(text)),
            NodeContent::Summary { summary } => summary
                .decisions
                .first()
                .or_else(|| summary.outcomes.first())
                .cloned(),
            NodeContent::Seed { seed, .. } => Some(seed.clone()),
            NodeContent::Anchor => None,
        }
    }
}

#[async_trait]
impl ContextTraversal for TemporalTraversal {
    async fn traverse(&self, node: &MemoryNode) -> Result<Option<TraversalResult>> {
        let mut neighbours: Vec<(Duration, MemoryNode)> = self
            .registry
            .snapshots()
            .await
            .into_iter()
            .filter(|other| other.node_id != node.node_id)
            .map(|other| ((other.created_at - node.created_at).abs(), other))
            .filter(|(distance, _)| *distance <= self.radius)
            .collect();

        if neighbours.is_empty() {
            return Ok(None);
        }

        neighbours.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.node_id.cmp(&b.1.node_id)));
        neighbours.truncate(self.max_related);

        let mut result = TraversalResult::default();
        for (_, other) in neighbours {
            if let Some(fragment) = Self::fragment(&other) {
                result.fragments.push(fragment);
            }
            result.related.push(other.node_id);
        }
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_no_traversal_finds_nothing() {
        let node = MemoryNode::new(NodeId::new("n-1"), "x", Utc::now());
        assert!(NoTraversal.traverse(&node).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_temporal_traversal_picks_nearby_nodes() {
        let registry = NodeRegistry::new();
        let t0 = Utc::now();
        let target = MemoryNode::new(NodeId::new("target"), "gone", t0);
        registry.insert(target.clone()).await;
        registry
            .insert(MemoryNode::new(NodeId::new("near"), "planned the launch", t0 + Duration::hours(2)))
            .await;
        registry
            .insert(MemoryNode::new(NodeId::new("far"), "unrelated", t0 + Duration::days(30)))
            .await;

        let traversal = TemporalTraversal::new(registry, Duration::days(1));
        let result = traversal.traverse(&target).await.unwrap().unwrap();
        assert_eq!(result.related, vec![NodeId::new("near")]);
        assert_eq!(result.fragments, vec!["planned the launch".to_string()]);
    }

    #[tokio::test]
    async fn test_temporal_traversal_isolated_node() {
        let registry = NodeRegistry::new();
        let target = MemoryNode::new(NodeId::new("target"), "gone", Utc::now());
        registry.insert(target.clone()).await;

        let traversal = TemporalTraversal::new(registry, Duration::days(1));
        assert!(traversal.traverse(&target).await.unwrap().is_none());
    }
}
