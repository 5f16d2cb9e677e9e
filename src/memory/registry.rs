//! Per-node lock arena
//!
//! Every node lives behind its own `tokio::sync::RwLock`. Writers
//! (`tick`, `attach_sigil`, `downgrade`, WRITE) take the node's write lock,
//! which serializes them per node while unrelated nodes proceed in parallel.
//! Readers take the read lock and clone, so a snapshot never observes a
//! half-applied transition. The outer map lock is only held long enough to
//! look up or insert a handle.

use super::node::{MemoryNode, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to a single node
pub type NodeHandle = Arc<RwLock<MemoryNode>>;

/// Index of per-node locks
#[derive(Clone)]
pub struct NodeRegistry {
    nodes: Arc<RwLock<HashMap<NodeId, NodeHandle>>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a node, replacing any previous handle for the same ID
    pub async fn insert(&self, node: MemoryNode) -> NodeHandle {
        let id = node.node_id.clone();
        let handle = Arc::new(RwLock::new(node));
        self.nodes.write().await.insert(id, handle.clone());
        handle
    }

    /// Return the existing handle or insert the node built by `create`.
    ///
    /// The boolean is `true` when a new node was inserted.
    pub async fn get_or_insert_with<F>(&self, id: &NodeId, create: F) -> (NodeHandle, bool)
    where
        F: FnOnce() -> MemoryNode,
    {
        if let Some(handle) = self.handle(id).await {
            return (handle, false);
        }
        let mut map = self.nodes.write().await;
        // Another writer may have inserted between the read and write lock
        if let Some(handle) = map.get(id) {
            return (handle.clone(), false);
        }
        let handle = Arc::new(RwLock::new(create()));
        map.insert(id.clone(), handle.clone());
        (handle, true)
    }

    /// Look up the lock handle for a node
    pub async fn handle(&self, id: &NodeId) -> Option<NodeHandle> {
        self.nodes.read().await.get(id).cloned()
    }

    /// Unregister `id` if it still maps to `handle`; returns whether it did
    pub async fn remove_handle(&self, id: &NodeId, handle: &NodeHandle) -> bool {
        let mut map = self.nodes.write().await;
        match map.get(id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                map.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Consistent copy of a node's current state
    pub async fn snapshot(&self, id: &NodeId) -> Option<MemoryNode> {
        let handle = self.handle(id).await?;
        let node = handle.read().await;
        Some(node.clone())
    }

    /// Snapshots of every registered node (no ordering guarantee)
    pub async fn snapshots(&self) -> Vec<MemoryNode> {
        let handles: Vec<NodeHandle> = self.nodes.read().await.values().cloned().collect();
        let mut nodes = Vec::with_capacity(handles.len());
        for handle in handles {
            nodes.push(handle.read().await.clone());
        }
        nodes
    }

    /// All registered node IDs (no ordering guarantee)
    pub async fn ids(&self) -> Vec<NodeId> {
        self.nodes.read().await.keys().cloned().collect()
    }

    /// Number of registered nodes
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
