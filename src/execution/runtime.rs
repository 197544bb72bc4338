//! The piece that ties a parsed plan, a store, and a master client together
//! and actually runs a query: spawning an operator thread per plan node,
//! joining children once their sentinel has been observed, and reporting
//! plan/store errors as an `ERROR` status instead of panicking the worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::Value as Json;

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::common::PartitionId;
use crate::config::GraphConfig;
use crate::error::Result;
use crate::execution::registry;
use crate::master_client::MasterClient;
use crate::network::{StatusBuffer, StatusKind, StatusMessage};
use crate::store::GraphStore;

/// Equivalent of the source's `GraphConfig` plus the collaborators every
/// operator needs: the store, the master client, and the shared status
/// queue. Cloning an `ExecutionContext` is cheap — everything behind it is
/// `Arc`'d — which is what lets each operator thread own its copy.
#[derive(Clone)]
pub struct ExecutionContext {
    pub graph_id: String,
    pub partition_id: PartitionId,
    pub max_label_size: usize,
    pub buffer_capacity: usize,
    pub worker_id: i64,
    pub store: Arc<dyn GraphStore>,
    pub master: Arc<dyn MasterClient>,
    pub status: StatusBuffer,
}

impl ExecutionContext {
    /// Builds the context a top-level `execute` call needs from a per-query
    /// `GraphConfig` plus the collaborators a plan actually touches.
    pub fn new(
        config: GraphConfig,
        buffer_capacity: usize,
        worker_id: i64,
        store: Arc<dyn GraphStore>,
        master: Arc<dyn MasterClient>,
        status: StatusBuffer,
    ) -> Self {
        Self {
            graph_id: config.graph_id,
            partition_id: config.partition_id,
            max_label_size: config.max_label_size,
            buffer_capacity,
            worker_id,
            store,
            master,
            status,
        }
    }

    pub fn new_buffer(&self) -> BoundedBuffer {
        BoundedBuffer::new(self.buffer_capacity)
    }
}

/// Spawns `plan_json` on its own thread, wired to a freshly allocated
/// bounded buffer, and returns the buffer (for the parent to pull from) and
/// the join handle (for the parent to join once it has observed the
/// sentinel). A parse or operator error is reported as an `ERROR` status and
/// the buffer still receives exactly one `StreamItem::End` so the parent
/// never blocks forever.
pub fn spawn_child(plan_json: String, ctx: ExecutionContext) -> (BoundedBuffer, JoinHandle<()>) {
    let buffer = ctx.new_buffer();
    let buffer_for_thread = buffer.clone();
    let status = ctx.status.clone();
    let worker_id = ctx.worker_id;

    let handle = thread::spawn(move || {
        let result = run_plan_json(&plan_json, ctx, buffer_for_thread.clone());
        if let Err(e) = result {
            status.push(StatusMessage::new(worker_id, StatusKind::Error, e.to_string()));
            status.push(StatusMessage::sentinel(worker_id));
            buffer_for_thread.add(StreamItem::End);
        }
    });

    (buffer, handle)
}

fn run_plan_json(plan_json: &str, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let plan: Json = serde_json::from_str(plan_json)?;
    registry::dispatch(&plan, ctx, output)
}

/// Runs a top-level plan (expected to be rooted at `ProduceResult`) in the
/// calling thread's child, returning the buffer the caller should drain
/// into its publish channel, and the handle to join once it sees `End`.
pub fn execute(plan_json: &str, ctx: ExecutionContext) -> (BoundedBuffer, JoinHandle<()>) {
    spawn_child(plan_json.to_string(), ctx)
}

/// Reads a required child plan string out of `"NextOperator"`.
pub fn next_operator(plan: &Json) -> Option<String> {
    plan.get("NextOperator").and_then(Json::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::master_client::StaticMasterClient;
    use crate::store::MemoryStore;

    #[test]
    fn new_takes_its_identity_from_the_graph_config() {
        let worker = WorkerConfig::default().with_partition(2);
        let config = worker.graph_config("app-7");
        let ctx = ExecutionContext::new(
            config,
            worker.buffer_capacity,
            9,
            Arc::new(MemoryStore::new()),
            Arc::new(StaticMasterClient::new(worker.npartitions)),
            StatusBuffer::new(),
        );

        assert_eq!(ctx.partition_id, 2);
        assert_eq!(ctx.graph_id, "default");
        assert_eq!(ctx.worker_id, 9);
    }
}
