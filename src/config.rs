//! Per-worker runtime configuration.
//!
//! Mirrors the handful of settings a partition worker process actually
//! needs at startup: where it listens, how it identifies itself to the
//! master, how deep the inter-operator buffers run, and the two properties
//! the core reads off the (out-of-scope) `jasminegraph.properties` loader —
//! `org.jasminegraph.nativestore.max.label.size` and
//! `org.jasminegraph.server.npartitions`.

use serde::{Deserialize, Serialize};

use crate::common::PartitionId;

/// Default capacity of the bounded FIFO connecting adjacent operators in a
/// physical plan. Matches the fixed-size ring the original streaming
/// executor used between pipeline stages.
pub const DEFAULT_BUFFER_CAPACITY: usize = 5;

/// Worker-lifetime settings, sourced from `jasminegraph.properties` by the
/// (out-of-scope) config loader. Constructing one of these is the only
/// place in the crate that should ever read those two property names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// This worker's partition id within the graph.
    pub partition_id: PartitionId,
    /// Address the publish channel listener binds to.
    pub listen_address: String,
    /// TCP port other workers and the master connect to for streaming results.
    pub publish_port: u16,
    /// Capacity of the bounded buffer between each pair of operators.
    pub buffer_capacity: usize,
    /// Identifier of the graph this worker holds a partition of.
    pub graph_id: String,
    /// `org.jasminegraph.nativestore.max.label.size`.
    pub max_label_size: usize,
    /// `org.jasminegraph.server.npartitions`.
    pub npartitions: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            partition_id: 0,
            listen_address: "0.0.0.0".to_string(),
            publish_port: 7777,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            graph_id: "default".to_string(),
            max_label_size: 1024,
            npartitions: 1,
        }
    }
}

impl WorkerConfig {
    pub fn with_partition(mut self, partition_id: PartitionId) -> Self {
        self.partition_id = partition_id;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Builds the per-query `GraphConfig` this worker stamps onto every plan
    /// it runs: its own identity plus the application tag the master
    /// attaches to the query.
    pub fn graph_config(&self, application_tag: impl Into<String>) -> GraphConfig {
        GraphConfig {
            graph_id: self.graph_id.clone(),
            partition_id: self.partition_id,
            max_label_size: self.max_label_size,
            application_tag: application_tag.into(),
        }
    }
}

/// Per-query configuration: which graph, which partition, how wide a label
/// can be, and the application tag the master stamped this query with.
/// Immutable for the lifetime of one query's operator tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub graph_id: String,
    pub partition_id: PartitionId,
    pub max_label_size: usize,
    pub application_tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_fixed_buffer_capacity() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn graph_config_inherits_worker_identity() {
        let worker = WorkerConfig::default().with_partition(3);
        let gc = worker.graph_config("app-1");
        assert_eq!(gc.partition_id, 3);
        assert_eq!(gc.graph_id, worker.graph_id);
        assert_eq!(gc.application_tag, "app-1");
    }
}
