//! The boundary between this crate and the partition's on-disk block store.
//!
//! `GraphStore` is the seam: the real store lives in a separate crate (the
//! memory-mapped node/relation block files), and this crate only needs to
//! pull nodes, local relations, and central (cross-partition) relations
//! through the trait. `MemoryStore` is an in-memory double used by tests and
//! by anything exercising the executor without a real store attached.
//!
//! A partition's node index can hold nodes it doesn't own: a central
//! relation's far endpoint is represented locally by a placeholder node
//! block so traversal can resolve it without a round trip, carrying the
//! *owning* partition id rather than this worker's own. `partition_id` on
//! `NodeRecord` is that owning id, not "is this node local" — operators
//! compare it against `ExecutionContext::partition_id` to decide locality.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::common::{NodeId, PartitionId, Value};
use crate::error::{Result, WorkerError};

/// One relation (edge) as handed to the executor by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub source: NodeId,
    pub destination: NodeId,
    /// Partition owning the destination node; `None` when destination is local.
    pub destination_partition: Option<PartitionId>,
    /// Partition whose relation-file block this edge was read from; used by
    /// `UndirectedAllRelationshipScan` to skip central blocks replicated
    /// from a partition other than the one currently scanning.
    pub meta_partition: PartitionId,
    pub properties: BTreeMap<String, Value>,
}

impl Relation {
    pub fn reversed(&self) -> Relation {
        Relation {
            source: self.destination,
            destination: self.source,
            destination_partition: self.destination_partition,
            meta_partition: self.meta_partition,
            properties: self.properties.clone(),
        }
    }
}

/// A node's properties plus the label set it carries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRecord {
    pub id: NodeId,
    /// Partition that owns this node. Compare against a query's
    /// `ExecutionContext::partition_id` to test locality.
    pub partition_id: PartitionId,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

/// Read/create boundary the executor reaches past to a partition's graph
/// data. Implementations own whatever on-disk or in-memory representation
/// backs nodes and relations; the executor never reaches past this trait.
///
/// Methods take `&self`, not `&mut self`: the real store serializes its own
/// block-file writes internally, and the executor calls these concurrently
/// from several operator threads (e.g. `Create` fed by a streaming child).
pub trait GraphStore: Send + Sync {
    fn get_node(&self, id: NodeId) -> Result<NodeRecord>;

    /// All node ids resident in this partition, for scans and for building
    /// a full adjacency view. Does not include foreign placeholder nodes.
    fn local_node_ids(&self) -> Vec<NodeId>;

    /// Relations incident on `node` whose destination lives in this same
    /// partition — i.e. `node`'s local adjacency-list entries, in either
    /// original direction, reoriented so `node` is always `source`.
    fn get_local_relations(&self, node: NodeId) -> Result<Vec<Relation>>;

    /// Relations incident on `node` whose destination lives in a different
    /// partition, reoriented the same way as [`GraphStore::get_local_relations`].
    fn get_central_relations(&self, node: NodeId) -> Result<Vec<Relation>>;

    /// Every local relation exactly once, in relation-file order — the raw
    /// iteration `UndirectedAllRelationshipScan` walks, as opposed to the
    /// per-node adjacency view above.
    fn all_local_relations(&self) -> Result<Vec<Relation>>;

    /// Every central relation exactly once, in relation-file order.
    fn all_central_relations(&self) -> Result<Vec<Relation>>;

    /// Total count of nodes resident in this partition.
    fn local_node_count(&self) -> usize;

    /// Total count of local (same-partition) relations.
    fn local_relation_count(&self) -> usize;

    /// Total count of central (cross-partition) relations.
    fn central_relation_count(&self) -> usize;

    /// Creates a node owned by `partition_id` and returns its freshly
    /// assigned id. Backs the `Create` operator's node-creation path.
    fn create_node(
        &self,
        partition_id: PartitionId,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<NodeId>;

    /// Creates an edge between two already-placed nodes. `destination_partition`
    /// is `None` when both endpoints are local (a local relation), `Some` when
    /// the edge crosses partitions (a central relation).
    fn create_relation(
        &self,
        source: NodeId,
        destination: NodeId,
        destination_partition: Option<PartitionId>,
        properties: BTreeMap<String, Value>,
    ) -> Result<()>;
}

/// Simple in-memory `GraphStore`, backed by adjacency maps keyed on node id.
/// Used in tests and anywhere a real block-file store hasn't been wired up.
///
/// Maintains two independent views of its relations: `all_local`/`all_central`
/// (each edge recorded exactly once, in insertion order — what the raw
/// relation-file scan walks) and `local_adjacency`/`central_adjacency` (each
/// edge recorded under both endpoints, reoriented so the lookup key is always
/// `source` — what per-node traversal walks). A single `insert_*_relation`
/// call populates both.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Mutex<BTreeMap<NodeId, NodeRecord>>,
    all_local: Mutex<Vec<Relation>>,
    all_central: Mutex<Vec<Relation>>,
    local_adjacency: Mutex<BTreeMap<NodeId, Vec<Relation>>>,
    central_adjacency: Mutex<BTreeMap<NodeId, Vec<Relation>>>,
    next_node_id: Mutex<NodeId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { next_node_id: Mutex::new(1), ..Self::default() }
    }

    pub fn insert_node(&mut self, node: NodeRecord) {
        let mut next = self.next_node_id.lock();
        if node.id >= *next {
            *next = node.id + 1;
        }
        self.nodes.get_mut().insert(node.id, node);
    }

    pub fn insert_local_relation(&mut self, relation: Relation) {
        self.local_adjacency.get_mut().entry(relation.source).or_default().push(relation.clone());
        self.local_adjacency.get_mut().entry(relation.destination).or_default().push(relation.reversed());
        self.all_local.get_mut().push(relation);
    }

    pub fn insert_central_relation(&mut self, relation: Relation) {
        self.central_adjacency.get_mut().entry(relation.source).or_default().push(relation.clone());
        self.central_adjacency.get_mut().entry(relation.destination).or_default().push(relation.reversed());
        self.all_central.get_mut().push(relation);
    }
}

impl GraphStore for MemoryStore {
    fn get_node(&self, id: NodeId) -> Result<NodeRecord> {
        self.nodes
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkerError::StoreIo(format!("no such node: {id}")))
    }

    fn local_node_ids(&self) -> Vec<NodeId> {
        self.nodes.lock().keys().copied().collect()
    }

    fn get_local_relations(&self, node: NodeId) -> Result<Vec<Relation>> {
        Ok(self.local_adjacency.lock().get(&node).cloned().unwrap_or_default())
    }

    fn get_central_relations(&self, node: NodeId) -> Result<Vec<Relation>> {
        Ok(self.central_adjacency.lock().get(&node).cloned().unwrap_or_default())
    }

    fn all_local_relations(&self) -> Result<Vec<Relation>> {
        Ok(self.all_local.lock().clone())
    }

    fn all_central_relations(&self) -> Result<Vec<Relation>> {
        Ok(self.all_central.lock().clone())
    }

    fn local_node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    fn local_relation_count(&self) -> usize {
        self.all_local.lock().len()
    }

    fn central_relation_count(&self) -> usize {
        self.all_central.lock().len()
    }

    fn create_node(
        &self,
        partition_id: PartitionId,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<NodeId> {
        let mut next = self.next_node_id.lock();
        let id = *next;
        *next += 1;
        self.nodes.lock().insert(id, NodeRecord { id, partition_id, labels, properties });
        Ok(id)
    }

    fn create_relation(
        &self,
        source: NodeId,
        destination: NodeId,
        destination_partition: Option<PartitionId>,
        properties: BTreeMap<String, Value>,
    ) -> Result<()> {
        let meta_partition = self
            .nodes
            .lock()
            .get(&source)
            .map(|n| n.partition_id)
            .unwrap_or_default();
        let relation = Relation { source, destination, destination_partition, meta_partition, properties };
        match destination_partition {
            None => {
                self.local_adjacency.lock().entry(relation.source).or_default().push(relation.clone());
                self.local_adjacency.lock().entry(relation.destination).or_default().push(relation.reversed());
                self.all_local.lock().push(relation);
            }
            Some(_) => {
                self.central_adjacency.lock().entry(relation.source).or_default().push(relation.clone());
                self.central_adjacency.lock().entry(relation.destination).or_default().push(relation.reversed());
                self.all_central.lock().push(relation);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_relation(source: NodeId, destination: NodeId) -> Relation {
        Relation { source, destination, destination_partition: None, meta_partition: 0, properties: BTreeMap::new() }
    }

    #[test]
    fn memory_store_reports_missing_node() {
        let store = MemoryStore::new();
        assert!(store.get_node(1).is_err());
    }

    #[test]
    fn memory_store_splits_local_and_central_relations() {
        let mut store = MemoryStore::new();
        store.insert_node(NodeRecord { id: 1, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
        store.insert_local_relation(local_relation(1, 2));
        store.insert_central_relation(Relation {
            source: 1,
            destination: 3,
            destination_partition: Some(1),
            meta_partition: 0,
            properties: BTreeMap::new(),
        });

        assert_eq!(store.get_local_relations(1).unwrap().len(), 1);
        assert_eq!(store.get_central_relations(1).unwrap().len(), 1);
        assert_eq!(store.local_relation_count(), 1);
        assert_eq!(store.central_relation_count(), 1);
    }

    #[test]
    fn local_relations_are_visible_from_either_endpoint() {
        let mut store = MemoryStore::new();
        store.insert_local_relation(local_relation(1, 2));

        let from_source = store.get_local_relations(1).unwrap();
        assert_eq!(from_source[0].destination, 2);

        let from_destination = store.get_local_relations(2).unwrap();
        assert_eq!(from_destination[0].destination, 1);
    }

    #[test]
    fn all_local_relations_lists_each_edge_once() {
        let mut store = MemoryStore::new();
        store.insert_local_relation(local_relation(1, 2));
        store.insert_local_relation(local_relation(2, 3));
        assert_eq!(store.all_local_relations().unwrap().len(), 2);
    }

    #[test]
    fn create_node_assigns_an_unused_id() {
        let store = MemoryStore::new();
        let id = store.create_node(0, vec!["Person".into()], BTreeMap::new()).unwrap();
        assert!(store.get_node(id).is_ok());
    }

    #[test]
    fn create_relation_is_visible_from_both_endpoints() {
        let store = MemoryStore::new();
        let a = store.create_node(0, vec![], BTreeMap::new()).unwrap();
        let b = store.create_node(0, vec![], BTreeMap::new()).unwrap();
        store.create_relation(a, b, None, BTreeMap::new()).unwrap();
        assert_eq!(store.get_local_relations(a).unwrap().len(), 1);
        assert_eq!(store.get_local_relations(b).unwrap().len(), 1);
    }
}
