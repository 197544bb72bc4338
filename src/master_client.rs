//! The boundary between this crate and the cluster master.
//!
//! `ExpandAll` and `CartesianProduct` both need to know which partition owns
//! a node, and how many partitions exist, before they can decide whether to
//! serve a step locally or dispatch a sub-query elsewhere. The real RPC
//! transport to the master lives outside this crate; `StaticMasterClient` is
//! a fixed-table double for tests and single-process wiring.

use std::collections::BTreeMap;

use crate::common::{NodeId, PartitionId};
use crate::error::{Result, WorkerError};

/// Collaborator resolving partition placement and cluster topology.
/// Implementations typically proxy an RPC call to the master node.
pub trait MasterClient: Send + Sync {
    /// Partition that owns `node`, if known.
    fn home_partition(&self, node: NodeId) -> Result<PartitionId>;

    /// Total number of partitions in the graph, including this worker's own.
    fn partition_count(&self) -> u32;

    /// Name of the partitioning algorithm used to place nodes (`hash`,
    /// `fennel`, ...), informational only for this crate.
    fn partition_algorithm(&self) -> &str;

    /// Publish-channel address of the worker owning `partition`, used to
    /// dispatch cross-partition sub-queries.
    fn worker_address(&self, partition: PartitionId) -> Result<String>;

    /// Full central-relation edge list (directed `(source, destination)`
    /// pairs) held by `partition`. Backs `count_central_static`'s
    /// per-partition fetch-and-merge step; a real implementation proxies
    /// this to the owning worker's own central-relation store.
    fn central_adjacency(&self, partition: PartitionId) -> Result<Vec<(NodeId, NodeId)>>;

    /// Central-relation edges created on `partition` after its
    /// `since_count`'th relation, used by `count_central_dynamic`'s
    /// per-partition delta fetch.
    fn central_edges_since(&self, partition: PartitionId, since_count: i64) -> Result<Vec<(NodeId, NodeId)>>;
}

/// Fixed-table `MasterClient` double: placement decided up front instead of
/// over RPC. Useful for tests and for driving the executor in a single
/// process against a pre-partitioned graph.
#[derive(Debug, Clone)]
pub struct StaticMasterClient {
    placements: BTreeMap<NodeId, PartitionId>,
    addresses: BTreeMap<PartitionId, String>,
    central_edges: BTreeMap<PartitionId, Vec<(NodeId, NodeId)>>,
    partition_count: u32,
    algorithm: String,
}

impl StaticMasterClient {
    pub fn new(partition_count: u32) -> Self {
        Self {
            placements: BTreeMap::new(),
            addresses: BTreeMap::new(),
            central_edges: BTreeMap::new(),
            partition_count,
            algorithm: "hash".to_string(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn place(&mut self, node: NodeId, partition: PartitionId) {
        self.placements.insert(node, partition);
    }

    pub fn set_worker_address(&mut self, partition: PartitionId, address: impl Into<String>) {
        self.addresses.insert(partition, address.into());
    }

    /// Fixes `partition`'s full central-relation edge list for
    /// `central_adjacency`/`central_edges_since` to serve back.
    pub fn set_central_edges(&mut self, partition: PartitionId, edges: Vec<(NodeId, NodeId)>) {
        self.central_edges.insert(partition, edges);
    }
}

impl MasterClient for StaticMasterClient {
    fn home_partition(&self, node: NodeId) -> Result<PartitionId> {
        self.placements
            .get(&node)
            .copied()
            .ok_or_else(|| WorkerError::UnknownPartition(format!("no placement for node {node}")))
    }

    fn partition_count(&self) -> u32 {
        self.partition_count
    }

    fn partition_algorithm(&self) -> &str {
        &self.algorithm
    }

    fn worker_address(&self, partition: PartitionId) -> Result<String> {
        self.addresses
            .get(&partition)
            .cloned()
            .ok_or_else(|| WorkerError::UnknownPartition(format!("no address for partition {partition}")))
    }

    fn central_adjacency(&self, partition: PartitionId) -> Result<Vec<(NodeId, NodeId)>> {
        Ok(self.central_edges.get(&partition).cloned().unwrap_or_default())
    }

    fn central_edges_since(&self, partition: PartitionId, since_count: i64) -> Result<Vec<(NodeId, NodeId)>> {
        let all = self.central_edges.get(&partition).cloned().unwrap_or_default();
        Ok(all.into_iter().skip(since_count.max(0) as usize).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unplaced_node_is_an_error() {
        let client = StaticMasterClient::new(4);
        assert!(client.home_partition(1).is_err());
    }

    #[test]
    fn placed_node_resolves_to_its_partition() {
        let mut client = StaticMasterClient::new(4);
        client.place(7, 2);
        assert_eq!(client.home_partition(7).unwrap(), 2);
    }

    #[test]
    fn central_edges_since_skips_the_already_seen_prefix() {
        let mut client = StaticMasterClient::new(2);
        client.set_central_edges(0, vec![(1, 2), (2, 3), (3, 1)]);
        assert_eq!(client.central_adjacency(0).unwrap().len(), 3);
        assert_eq!(client.central_edges_since(0, 1).unwrap(), vec![(2, 3), (3, 1)]);
    }
}
