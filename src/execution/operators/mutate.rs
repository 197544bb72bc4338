//! `Create`: the one operator that writes to the store instead of reading
//! from it. With a `NextOperator` child, creates one batch of nodes/edges
//! per input tuple (a `CREATE` clause chained off a `MATCH`); without one,
//! creates its statically-specified elements exactly once.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::common::{NodeId, PartitionId, Tuple, Value};
use crate::error::{Result, WorkerError};
use crate::execution::expr::json_to_value;
use crate::execution::operators::{node_value, spawn_next, tuple_node_id};
use crate::execution::runtime::ExecutionContext;

/// One node to create: the binding it's assigned to in the row it produces,
/// its labels, its properties, and (optionally) an explicit target partition.
struct NodeSpec {
    variable: String,
    labels: Vec<String>,
    properties: BTreeMap<String, Value>,
    partition_id: Option<PartitionId>,
}

/// One edge to create, referencing already-bound or already-created
/// variables for its endpoints.
struct RelationSpec {
    from: String,
    to: String,
    properties: BTreeMap<String, Value>,
}

fn parse_node_specs(plan: &Json) -> Result<Vec<NodeSpec>> {
    let Some(array) = plan.get("nodes").and_then(Json::as_array) else {
        return Ok(Vec::new());
    };
    array
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| WorkerError::PlanMalformed("Create node spec is not an object".into()))?;
            let variable = obj
                .get("variable")
                .and_then(Json::as_str)
                .ok_or_else(|| WorkerError::PlanMalformed("Create node spec missing variable".into()))?
                .to_string();
            let labels = obj
                .get("labels")
                .and_then(Json::as_array)
                .map(|a| a.iter().filter_map(Json::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            let properties = obj
                .get("properties")
                .and_then(Json::as_object)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
                .unwrap_or_default();
            let partition_id = obj.get("partitionId").and_then(Json::as_u64).map(|p| p as PartitionId);
            Ok(NodeSpec { variable, labels, properties, partition_id })
        })
        .collect()
}

fn parse_relation_specs(plan: &Json) -> Result<Vec<RelationSpec>> {
    let Some(array) = plan.get("relations").and_then(Json::as_array) else {
        return Ok(Vec::new());
    };
    array
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| WorkerError::PlanMalformed("Create relation spec is not an object".into()))?;
            let from = obj
                .get("from")
                .and_then(Json::as_str)
                .ok_or_else(|| WorkerError::PlanMalformed("Create relation spec missing from".into()))?
                .to_string();
            let to = obj
                .get("to")
                .and_then(Json::as_str)
                .ok_or_else(|| WorkerError::PlanMalformed("Create relation spec missing to".into()))?
                .to_string();
            let properties = obj
                .get("properties")
                .and_then(Json::as_object)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
                .unwrap_or_default();
            Ok(RelationSpec { from, to, properties })
        })
        .collect()
}

/// Resolves the partition a new node is created on: the spec's explicit
/// `partitionId` when given, otherwise this worker's own partition. A real
/// deployment would consult `ctx.master.partition_algorithm()`'s hash/fennel
/// scheme to place a node with no explicit partition; this crate only
/// surfaces that algorithm's name (see `MasterClient`), so foreign creation
/// without an explicit `partitionId` falls back to local placement.
fn resolve_partition(spec: &NodeSpec, ctx: &ExecutionContext) -> PartitionId {
    spec.partition_id.unwrap_or_else(|| {
        tracing::debug!(
            algorithm = ctx.master.partition_algorithm(),
            "Create: no explicit partitionId, placing node on this worker's partition"
        );
        ctx.partition_id
    })
}

/// Creates every node/edge spec once against `row`, returning the row with
/// newly created nodes bound in under their variable names.
fn create_once(
    node_specs: &[NodeSpec],
    relation_specs: &[RelationSpec],
    ctx: &ExecutionContext,
    mut row: Tuple,
) -> Result<Tuple> {
    for spec in node_specs {
        let partition_id = resolve_partition(spec, ctx);
        let id = ctx.store.create_node(partition_id, spec.labels.clone(), spec.properties.clone())?;
        let node = ctx.store.get_node(id)?;
        row.set(spec.variable.clone(), node_value(&node));
    }

    for spec in relation_specs {
        let source = resolve_endpoint(&row, &spec.from)?;
        let destination = resolve_endpoint(&row, &spec.to)?;
        let destination_node = ctx.store.get_node(destination)?;
        let destination_partition =
            if destination_node.partition_id == ctx.partition_id { None } else { Some(destination_node.partition_id) };
        ctx.store.create_relation(source, destination, destination_partition, spec.properties.clone())?;
    }

    Ok(row)
}

fn resolve_endpoint(row: &Tuple, variable: &str) -> Result<NodeId> {
    tuple_node_id(row, variable)
        .ok_or_else(|| WorkerError::TypeMismatch(format!("Create: '{variable}' is not a bound node")))
}

/// With a `NextOperator`, drains it and creates one batch per input row;
/// without one, creates its statically-specified elements exactly once and
/// emits a single row.
pub fn create(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let node_specs = parse_node_specs(plan)?;
    let relation_specs = parse_relation_specs(plan)?;

    if plan.get("NextOperator").is_some() {
        let (child_buf, child_handle) = spawn_next(plan, &ctx)?;
        loop {
            match child_buf.get() {
                StreamItem::Row(tuple) => {
                    let row = create_once(&node_specs, &relation_specs, &ctx, tuple)?;
                    output.add(StreamItem::Row(row));
                }
                StreamItem::End => break,
            }
        }
        output.add(StreamItem::End);
        let _ = child_handle.join();
    } else {
        let row = create_once(&node_specs, &relation_specs, &ctx, Tuple::new())?;
        output.add(StreamItem::Row(row));
        output.add(StreamItem::End);
    }
    Ok(())
}
