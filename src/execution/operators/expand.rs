//! `ExpandAll`: for each input tuple, walk the source node's relation
//! adjacency (local, then central) one hop, optionally filtered by
//! `relType`. A remote source dispatches a templated sub-plan to the owning
//! partition instead of touching the store directly.

use serde_json::Value as Json;

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::common::{NodeId, Value};
use crate::error::Result;
use crate::execution::operators::{is_local, node_value, optional_str, required_str, spawn_next, tuple_node_id};
use crate::execution::runtime::ExecutionContext;
use crate::network::spawn_subquery;
use crate::store::Relation;

/// For each input tuple, if the bound source node is local: walks both the
/// local and central relation lists rooted at it, optionally filtering by
/// `relType`, emitting one tuple per neighbor under `relVariable`/`toVariable`.
/// If the source is remote: asks the master for its home partition and
/// streams a templated `ExpandAll` sub-plan's results back from there.
pub fn expand_all(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let from_variable = required_str(plan, "fromVariable")?.to_string();
    let rel_variable = required_str(plan, "relVariable")?.to_string();
    let to_variable = required_str(plan, "toVariable")?.to_string();
    let rel_type = optional_str(plan, "relType").map(str::to_string);

    let (child_buf, child_handle) = spawn_next(plan, &ctx)?;

    loop {
        match child_buf.get() {
            StreamItem::Row(tuple) => {
                let Some(source_id) = tuple_node_id(&tuple, &from_variable) else { continue };

                let source_node = ctx.store.get_node(source_id);
                let local = source_node.as_ref().map(|n| is_local(n, &ctx)).unwrap_or(false);

                if local {
                    expand_locally(&ctx, &tuple, source_id, &rel_variable, &to_variable, rel_type.as_deref(), &output)?;
                } else {
                    expand_remotely(&ctx, &tuple, source_id, &from_variable, &rel_variable, &to_variable, rel_type.as_deref(), &output)?;
                }
            }
            StreamItem::End => break,
        }
    }

    output.add(StreamItem::End);
    let _ = child_handle.join();
    Ok(())
}

fn expand_locally(
    ctx: &ExecutionContext,
    tuple: &crate::common::Tuple,
    source_id: NodeId,
    rel_variable: &str,
    to_variable: &str,
    rel_type: Option<&str>,
    output: &BoundedBuffer,
) -> Result<()> {
    for relation in ctx.store.get_local_relations(source_id)?.into_iter().chain(ctx.store.get_central_relations(source_id)?) {
        if !matches_rel_type(&relation, rel_type) {
            continue;
        }
        let neighbor = match ctx.store.get_node(relation.destination) {
            Ok(node) => node_value(&node),
            Err(_) => placeholder_node(&relation),
        };
        let row = tuple
            .clone()
            .with(rel_variable.to_string(), Value::Node(relation.properties.clone()))
            .with(to_variable.to_string(), neighbor);
        output.add(StreamItem::Row(row));
    }
    Ok(())
}

fn matches_rel_type(relation: &Relation, rel_type: Option<&str>) -> bool {
    match rel_type {
        None => true,
        Some(wanted) => relation.properties.get("relType").and_then(Value::as_str) == Some(wanted),
    }
}

fn placeholder_node(relation: &Relation) -> Value {
    let mut props = std::collections::BTreeMap::new();
    props.insert("id".to_string(), Value::Integer(relation.destination as i64));
    let partition = relation.destination_partition.unwrap_or(relation.meta_partition);
    props.insert("partitionID".to_string(), Value::String(partition.to_string()));
    Value::Node(props)
}

/// Builds and dispatches the "expand from this id" sub-plan template: a
/// `NodeByIdSeek` for `source_id` feeding an `ExpandAll` with the same
/// bindings, run on the partition that actually owns the node.
fn expand_remotely(
    ctx: &ExecutionContext,
    tuple: &crate::common::Tuple,
    source_id: NodeId,
    from_variable: &str,
    rel_variable: &str,
    to_variable: &str,
    rel_type: Option<&str>,
    output: &BoundedBuffer,
) -> Result<()> {
    let home = ctx.master.home_partition(source_id)?;
    let address = ctx.master.worker_address(home)?;

    let seek = serde_json::json!({"Operator": "NodeByIdSeek", "variable": from_variable, "id": source_id as i64});
    let mut subplan = serde_json::json!({
        "Operator": "ExpandAll",
        "fromVariable": from_variable,
        "relVariable": rel_variable,
        "toVariable": to_variable,
        "NextOperator": seek.to_string(),
    });
    if let Some(rel_type) = rel_type {
        subplan["relType"] = Json::String(rel_type.to_string());
    }

    let remote_buf = ctx.new_buffer();
    let handle = spawn_subquery(
        address,
        ctx.graph_id.clone(),
        home.to_string(),
        subplan.to_string(),
        remote_buf.clone(),
    );

    loop {
        match remote_buf.get() {
            StreamItem::Row(remote_tuple) => output.add(StreamItem::Row(tuple.merge(&remote_tuple))),
            StreamItem::End => break,
        }
    }
    let _ = handle.join();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Tuple;
    use crate::master_client::StaticMasterClient;
    use crate::network::StatusBuffer;
    use crate::store::{MemoryStore, NodeRecord};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn seek_plan(id: NodeId) -> String {
        json!({"Operator": "NodeByIdSeek", "variable": "x", "id": id as i64}).to_string()
    }

    #[test]
    fn expands_two_local_edges() {
        let mut store = MemoryStore::new();
        for id in [1, 2, 3] {
            store.insert_node(NodeRecord { id, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
        }
        store.insert_local_relation(crate::store::Relation {
            source: 1,
            destination: 2,
            destination_partition: None,
            meta_partition: 0,
            properties: BTreeMap::new(),
        });
        store.insert_local_relation(crate::store::Relation {
            source: 1,
            destination: 3,
            destination_partition: None,
            meta_partition: 0,
            properties: BTreeMap::new(),
        });

        let ctx = ExecutionContext {
            graph_id: "g".to_string(),
            partition_id: 0,
            max_label_size: 32,
            buffer_capacity: 5,
            worker_id: 1,
            store: Arc::new(store),
            master: Arc::new(StaticMasterClient::new(1)),
            status: StatusBuffer::new(),
        };

        let plan = json!({
            "Operator": "ExpandAll",
            "fromVariable": "x",
            "relVariable": "rel",
            "toVariable": "dst",
            "NextOperator": seek_plan(1),
        });
        let output = crate::buffer::BoundedBuffer::new(8);
        expand_all(&plan, ctx, output.clone()).unwrap();

        let mut destinations = Vec::new();
        loop {
            match output.get() {
                StreamItem::Row(t) => {
                    if let Some(Value::Node(props)) = t.get("dst") {
                        destinations.push(props.get("id").and_then(Value::as_node_id).unwrap());
                    }
                }
                StreamItem::End => break,
            }
        }
        destinations.sort_unstable();
        assert_eq!(destinations, vec![2, 3]);
    }
}
