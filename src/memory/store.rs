//! Delegated node persistence
//!
//! The physical node database is external to the core; `NodeStore` is the
//! seam it plugs into. Two implementations ship with the crate:
//! an in-memory store for tests and embedding, and a file store that keeps
//! one JSON document per node.
//!
//! Directory layout of `FileNodeStore`:
//! ```text
//! <nodes_dir>/
//! ├── <encoded-node-id>.json
//! └── ...
//! ```
//!
//! File names percent-encode every byte of the node ID outside
//! `[A-Za-z0-9-]`, so distinct IDs never share a file.

use super::node::{MemoryNode, NodeId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence backend for memory nodes
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persist the full state of a node (upsert)
    async fn save(&self, node: &MemoryNode) -> Result<()>;

    /// Load a single node
    async fn load(&self, id: &NodeId) -> Result<Option<MemoryNode>>;

    /// Load every stored node
    async fn load_all(&self) -> Result<Vec<MemoryNode>>;
}

/// In-memory node store
pub struct MemoryNodeStore {
    nodes: Arc<RwLock<HashMap<NodeId, MemoryNode>>>,
}

impl MemoryNodeStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn save(&self, node: &MemoryNode) -> Result<()> {
        self.nodes
            .write()
            .await
            .insert(node.node_id.clone(), node.clone());
        Ok(())
    }

    async fn load(&self, id: &NodeId) -> Result<Option<MemoryNode>> {
        Ok(self.nodes.read().await.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<MemoryNode>> {
        Ok(self.nodes.read().await.values().cloned().collect())
    }
}

/// File-backed node store, one pretty-printed JSON file per node
pub struct FileNodeStore {
    dir: PathBuf,
}

impl FileNodeStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &NodeId) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(id.as_str())))
    }
}

fn encode_file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

#[async_trait]
impl NodeStore for FileNodeStore {
    async fn save(&self, node: &MemoryNode) -> Result<()> {
        let path = self.path_for(&node.node_id);
        let json = serde_json::to_string_pretty(node)?;
        // Readers see either the old file or the new one, never a partial write
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, id: &NodeId) -> Result<Option<MemoryNode>> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let node: MemoryNode = serde_json::from_str(&data)?;
                if &node.node_id != id {
                    tracing::warn!(
                        "Node file {} holds {}, expected {}",
                        path.display(),
                        node.node_id,
                        id
                    );
                    return Ok(None);
                }
                Ok(Some(node))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_all(&self) -> Result<Vec<MemoryNode>> {
        let mut nodes = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<MemoryNode>(&data) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    tracing::warn!("Failed to parse node file {}: {}", path.display(), e);
                }
            }
        }

        Ok(nodes)
    }
}
