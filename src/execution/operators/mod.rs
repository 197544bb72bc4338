//! Operator implementations dispatched by [`crate::execution::registry`].
//!
//! Grouped the way the two source `OperatorExecutor.h` headers this crate
//! unions group them: scans (leaves reading the store), expansion
//! (traversal, local or cross-partition), transforms (pull-one,
//! emit-zero-or-one), mutation (`Create`), binary/ordering combinators, and
//! the root (`ProduceResult`).

pub mod combine;
pub mod expand;
pub mod mutate;
pub mod produce;
pub mod scan;
pub mod transform;

use std::thread::JoinHandle;

use serde_json::Value as Json;

use crate::buffer::BoundedBuffer;
use crate::common::{NodeId, Tuple, Value};
use crate::error::{Result, WorkerError};
use crate::execution::runtime::{self, ExecutionContext};
use crate::network::{StatusKind, StatusMessage};
use crate::store::NodeRecord;

/// Spawns the single unary child named by `plan["NextOperator"]`, returning
/// the buffer to pull from and the handle to join once `StreamItem::End`
/// has been observed.
pub(crate) fn spawn_next(plan: &Json, ctx: &ExecutionContext) -> Result<(BoundedBuffer, JoinHandle<()>)> {
    let child_json = runtime::next_operator(plan)
        .ok_or_else(|| WorkerError::PlanMalformed("operator missing NextOperator".into()))?;
    Ok(runtime::spawn_child(child_json, ctx.clone()))
}

/// Reads a required string field off a plan node.
pub(crate) fn required_str<'a>(plan: &'a Json, field: &str) -> Result<&'a str> {
    plan.get(field)
        .and_then(Json::as_str)
        .ok_or_else(|| WorkerError::PlanMalformed(format!("operator missing '{field}' field")))
}

/// Reads an optional string field off a plan node.
pub(crate) fn optional_str<'a>(plan: &'a Json, field: &str) -> Option<&'a str> {
    plan.get(field).and_then(Json::as_str)
}

/// Reads a required integer field off a plan node.
pub(crate) fn required_i64(plan: &Json, field: &str) -> Result<i64> {
    plan.get(field)
        .and_then(Json::as_i64)
        .ok_or_else(|| WorkerError::PlanMalformed(format!("operator missing '{field}' field")))
}

/// Converts a node record into the `Value::Node` shape every node-typed
/// tuple binding carries: its own properties plus the reserved `id` and
/// `partitionID` keys (the latter always present, per the data-model
/// invariant that a node tuple's `partitionID` matches its owning partition).
pub(crate) fn node_value(node: &NodeRecord) -> Value {
    let mut props = node.properties.clone();
    props.insert("id".to_string(), Value::Integer(node.id as i64));
    props.insert("partitionID".to_string(), Value::String(node.partition_id.to_string()));
    Value::Node(props)
}

/// Whether `node` is owned by the partition this query is running on.
pub(crate) fn is_local(node: &NodeRecord, ctx: &ExecutionContext) -> bool {
    node.partition_id == ctx.partition_id
}

/// Reads the node id bound under `variable` in `tuple`, whether it's a full
/// `Value::Node` (the common case) or a bare integer id.
pub(crate) fn tuple_node_id(tuple: &Tuple, variable: &str) -> Option<NodeId> {
    match tuple.get(variable) {
        Some(Value::Node(props)) => props.get("id").and_then(Value::as_node_id),
        Some(Value::Integer(i)) if *i >= 0 => Some(*i as NodeId),
        _ => None,
    }
}

/// Tracks which of the 25/50/75% progress thresholds have already fired for
/// one scan, so each is reported at most once.
#[derive(Default)]
pub(crate) struct ScanProgress {
    fired: [bool; 3],
}

const THRESHOLDS: [usize; 3] = [25, 50, 75];

impl ScanProgress {
    /// Pushes a PROGRESS status for each threshold crossed by `done/total`
    /// since the last call.
    pub(crate) fn report(&mut self, ctx: &ExecutionContext, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let pct = done.saturating_mul(100) / total;
        for (i, threshold) in THRESHOLDS.iter().enumerate() {
            if !self.fired[i] && pct >= *threshold {
                self.fired[i] = true;
                ctx.status.push(StatusMessage::new(
                    ctx.worker_id,
                    StatusKind::Progress,
                    format!("{threshold}%"),
                ));
            }
        }
    }
}
