//! Adjacency structures backing the streaming triangle engine.
//!
//! The original kept these as process-wide static maps; here they're plain
//! owned state on `TriangleEngine`; see `graph::triangles` for the lifetime.
//! `LocalAdjacency` covers same-partition edges, `CentralAdjacency` the
//! cross-partition edge view, keyed by the concatenation of the partition
//! ids that contributed to it (the "joined string key" from the glossary).

use std::collections::{HashMap, HashSet};

use crate::common::NodeId;

/// Undirected adjacency over local (same-partition) edges. Edges are only
/// ever added; both directions are recorded on insertion.
#[derive(Debug, Default, Clone)]
pub struct LocalAdjacency {
    neighbors: HashMap<NodeId, HashSet<NodeId>>,
}

impl LocalAdjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_edge(&mut self, u: NodeId, v: NodeId) {
        self.neighbors.entry(u).or_default().insert(v);
        self.neighbors.entry(v).or_default().insert(u);
    }

    pub fn neighbors(&self, node: NodeId) -> &HashSet<NodeId> {
        static EMPTY: std::sync::OnceLock<HashSet<NodeId>> = std::sync::OnceLock::new();
        self.neighbors.get(&node).unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }

    pub fn as_map(&self) -> &HashMap<NodeId, HashSet<NodeId>> {
        &self.neighbors
    }
}

/// Cross-partition adjacency, one adjacency map per joined-partition-id key.
#[derive(Debug, Default, Clone)]
pub struct CentralAdjacency {
    by_key: HashMap<String, LocalAdjacency>,
}

impl CentralAdjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_edge(&mut self, key: &str, u: NodeId, v: NodeId) {
        self.by_key.entry(key.to_string()).or_default().insert_edge(u, v);
    }

    pub fn get(&self, key: &str) -> Option<&LocalAdjacency> {
        self.by_key.get(key)
    }

    /// Canonical key for a set of partition ids: their concatenation in the
    /// order given (callers are expected to pass ids in a stable order).
    pub fn joined_key(partition_ids: &[String]) -> String {
        partition_ids.concat()
    }
}
