//! Leaf operators: scans of the node index and the relation file, the only
//! operators that read the store directly rather than pulling from a child.

use serde_json::Value as Json;

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::common::{NodeId, Tuple};
use crate::execution::operators::{is_local, node_value, required_i64, required_str, ScanProgress};
use crate::execution::runtime::ExecutionContext;
use crate::error::Result;
use crate::store::Relation;

/// Iterates the node index, emitting `{variable: <node>}` for every node
/// whose `partitionID == gc.partitionID`, with PROGRESS notifications at
/// 25/50/75% of the scan.
pub fn all_node_scan(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let variable = required_str(plan, "variable")?.to_string();
    let ids = ctx.store.local_node_ids();
    let total = ids.len();
    let mut progress = ScanProgress::default();

    for (done, id) in ids.into_iter().enumerate() {
        let node = ctx.store.get_node(id)?;
        if is_local(&node, &ctx) {
            output.add(StreamItem::Row(Tuple::new().with(variable.clone(), node_value(&node))));
        }
        progress.report(&ctx, done + 1, total);
    }
    output.add(StreamItem::End);
    Ok(())
}

/// Looks up a single node id; emits it iff it lives in this partition.
pub fn node_by_id_seek(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let variable = required_str(plan, "variable")?.to_string();
    let id = required_i64(plan, "id")? as NodeId;

    if let Ok(node) = ctx.store.get_node(id) {
        if is_local(&node, &ctx) {
            output.add(StreamItem::Row(Tuple::new().with(variable, node_value(&node))));
        }
    }
    output.add(StreamItem::End);
    Ok(())
}

/// Scans the node index, emitting each local node under the binding named
/// by the plan's `relType` field — the legacy operator's own name doubles
/// as its output binding, matching the union of both source
/// `OperatorExecutor.h` headers' inconsistent naming for this operator.
pub fn undirected_relationship_type_scan(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let binding = required_str(plan, "relType")?.to_string();
    let ids = ctx.store.local_node_ids();
    let total = ids.len();
    let mut progress = ScanProgress::default();

    for (done, id) in ids.into_iter().enumerate() {
        let node = ctx.store.get_node(id)?;
        if is_local(&node, &ctx) {
            output.add(StreamItem::Row(Tuple::new().with(binding.clone(), node_value(&node))));
        }
        progress.report(&ctx, done + 1, total);
    }
    output.add(StreamItem::End);
    Ok(())
}

/// Iterates every local relation exactly once, emitting both directions
/// (`src`→`dst` and `dst`→`src`); then iterates central relations, skipping
/// blocks whose meta-property partition id doesn't match this partition,
/// doing the same. Binding names default to `src`/`dst`/`r` but can be
/// overridden via the plan's `srcVariable`/`dstVariable`/`relVariable` fields.
pub fn undirected_all_relationship_scan(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let src_binding = plan.get("srcVariable").and_then(Json::as_str).unwrap_or("src").to_string();
    let dst_binding = plan.get("dstVariable").and_then(Json::as_str).unwrap_or("dst").to_string();
    let rel_binding = plan.get("relVariable").and_then(Json::as_str).unwrap_or("r").to_string();

    let emit_pair = |relation: &Relation| {
        let rel_value = crate::common::Value::Node(relation.properties.clone());
        let forward = Tuple::new()
            .with(src_binding.clone(), crate::common::Value::Integer(relation.source as i64))
            .with(dst_binding.clone(), crate::common::Value::Integer(relation.destination as i64))
            .with(rel_binding.clone(), rel_value.clone());
        let backward = Tuple::new()
            .with(src_binding.clone(), crate::common::Value::Integer(relation.destination as i64))
            .with(dst_binding.clone(), crate::common::Value::Integer(relation.source as i64))
            .with(rel_binding.clone(), rel_value);
        (forward, backward)
    };

    for relation in ctx.store.all_local_relations()? {
        let (forward, backward) = emit_pair(&relation);
        output.add(StreamItem::Row(forward));
        output.add(StreamItem::Row(backward));
    }

    for relation in ctx.store.all_central_relations()? {
        if relation.meta_partition != ctx.partition_id {
            continue;
        }
        let (forward, backward) = emit_pair(&relation);
        output.add(StreamItem::Row(forward));
        output.add(StreamItem::Row(backward));
    }

    output.add(StreamItem::End);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedBuffer;
    use crate::execution::runtime::ExecutionContext;
    use crate::master_client::StaticMasterClient;
    use crate::network::StatusBuffer;
    use crate::store::{MemoryStore, NodeRecord};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn ctx_with(store: MemoryStore, partition_id: u32) -> ExecutionContext {
        ExecutionContext {
            graph_id: "g".to_string(),
            partition_id,
            max_label_size: 32,
            buffer_capacity: 5,
            worker_id: 1,
            store: Arc::new(store),
            master: Arc::new(StaticMasterClient::new(1)),
            status: StatusBuffer::new(),
        }
    }

    #[test]
    fn all_node_scan_emits_only_local_nodes() {
        let mut store = MemoryStore::new();
        store.insert_node(NodeRecord { id: 1, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
        store.insert_node(NodeRecord { id: 2, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
        store.insert_node(NodeRecord { id: 3, partition_id: 1, labels: vec![], properties: BTreeMap::new() });

        let ctx = ctx_with(store, 0);
        let output = BoundedBuffer::new(8);
        all_node_scan(&json!({"variable": "n"}), ctx, output.clone()).unwrap();

        let mut rows = 0;
        loop {
            match output.get() {
                StreamItem::Row(t) => {
                    assert!(t.get("n").is_some());
                    rows += 1;
                }
                StreamItem::End => break,
            }
        }
        assert_eq!(rows, 2);
    }

    #[test]
    fn node_by_id_seek_skips_foreign_nodes() {
        let mut store = MemoryStore::new();
        store.insert_node(NodeRecord { id: 9, partition_id: 1, labels: vec![], properties: BTreeMap::new() });
        let ctx = ctx_with(store, 0);
        let output = BoundedBuffer::new(4);
        node_by_id_seek(&json!({"variable": "n", "id": 9}), ctx, output.clone()).unwrap();

        assert_eq!(output.get(), StreamItem::End);
    }

    #[test]
    fn relationship_scan_emits_both_directions_once_each() {
        let mut store = MemoryStore::new();
        store.insert_local_relation(crate::store::Relation {
            source: 1,
            destination: 2,
            destination_partition: None,
            meta_partition: 0,
            properties: BTreeMap::new(),
        });
        let ctx = ctx_with(store, 0);
        let output = BoundedBuffer::new(8);
        undirected_all_relationship_scan(&json!({}), ctx, output.clone()).unwrap();

        let mut pairs = Vec::new();
        loop {
            match output.get() {
                StreamItem::Row(t) => {
                    let src = t.get("src").unwrap().as_integer().unwrap();
                    let dst = t.get("dst").unwrap().as_integer().unwrap();
                    pairs.push((src, dst));
                }
                StreamItem::End => break,
            }
        }
        assert_eq!(pairs, vec![(1, 2), (2, 1)]);
    }
}
