//! End-to-end scenarios from the operator executor's testable-properties
//! list: small plan trees run against an in-memory store, asserting on the
//! tuple sequence each produces.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use graph_worker_core::buffer::StreamItem;
use graph_worker_core::common::Value;
use graph_worker_core::execution::{execute, ExecutionContext};
use graph_worker_core::master_client::StaticMasterClient;
use graph_worker_core::network::{StatusBuffer, StatusKind};
use graph_worker_core::store::{MemoryStore, NodeRecord, Relation};

fn ctx(store: MemoryStore, partition_id: u32, partition_count: u32) -> ExecutionContext {
    ExecutionContext {
        graph_id: "g".to_string(),
        partition_id,
        max_label_size: 32,
        buffer_capacity: 5,
        worker_id: 1,
        store: Arc::new(store),
        master: Arc::new(StaticMasterClient::new(partition_count)),
        status: StatusBuffer::new(),
    }
}

fn local_relation(source: u64, destination: u64) -> Relation {
    Relation { source, destination, destination_partition: None, meta_partition: 0, properties: BTreeMap::new() }
}

/// Scenario 1: AllNodeScan + ProduceResult emits one row per local node,
/// then End, and a SUCCESS status.
#[test]
fn all_node_scan_feeds_produce_result() {
    let mut store = MemoryStore::new();
    store.insert_node(NodeRecord { id: 1, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
    store.insert_node(NodeRecord { id: 2, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
    store.insert_node(NodeRecord { id: 3, partition_id: 1, labels: vec![], properties: BTreeMap::new() });

    let ctx = ctx(store, 0, 1);
    let status = ctx.status.clone();

    let plan = json!({
        "Operator": "ProduceResult",
        "variable": ["n"],
        "NextOperator": json!({"Operator": "AllNodeScan", "variable": "n"}).to_string(),
    });

    let (output, handle) = execute(&plan.to_string(), ctx);
    let mut ids = Vec::new();
    loop {
        match output.get() {
            StreamItem::Row(tuple) => {
                let Some(Value::Node(props)) = tuple.get("n") else { panic!("expected node") };
                assert_eq!(props.get("partitionID"), Some(&Value::String("0".to_string())));
                ids.push(props.get("id").and_then(Value::as_node_id).unwrap());
            }
            StreamItem::End => break,
        }
    }
    handle.join().unwrap();

    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(status.pop().kind, StatusKind::Success);
    assert!(status.pop().is_sentinel());
}

/// Scenario 2: UndirectedAllRelationshipScan on one local edge emits both
/// directions, then End.
#[test]
fn relationship_scan_emits_both_directions() {
    let mut store = MemoryStore::new();
    store.insert_local_relation(local_relation(1, 2));

    let ctx = ctx(store, 0, 1);
    let plan = json!({"Operator": "UndirectedAllRelationshipScan"});
    let (output, handle) = execute(&plan.to_string(), ctx);

    let mut pairs = Vec::new();
    loop {
        match output.get() {
            StreamItem::Row(tuple) => {
                let src = tuple.get("src").unwrap().as_integer().unwrap();
                let dst = tuple.get("dst").unwrap().as_integer().unwrap();
                pairs.push((src, dst));
            }
            StreamItem::End => break,
        }
    }
    handle.join().unwrap();
    assert_eq!(pairs, vec![(1, 2), (2, 1)]);
}

/// Scenario 5: CartesianProduct of a two-row left and a two-row right on a
/// single-partition cluster emits the full outer product in left-major order.
#[test]
fn cartesian_product_emits_left_major_outer_product() {
    let mut store = MemoryStore::new();
    store.insert_node(NodeRecord { id: 1, partition_id: 0, labels: vec![], properties: BTreeMap::new() });
    store.insert_node(NodeRecord { id: 2, partition_id: 0, labels: vec![], properties: BTreeMap::new() });

    let ctx = ctx(store, 0, 1);
    let plan = json!({
        "Operator": "CartesianProduct",
        "left": json!({"Operator": "AllNodeScan", "variable": "a"}).to_string(),
        "right": json!({"Operator": "AllNodeScan", "variable": "b"}).to_string(),
    });

    let (output, handle) = execute(&plan.to_string(), ctx);
    let mut pairs = Vec::new();
    loop {
        match output.get() {
            StreamItem::Row(tuple) => {
                let Some(Value::Node(a)) = tuple.get("a") else { panic!("expected a") };
                let Some(Value::Node(b)) = tuple.get("b") else { panic!("expected b") };
                pairs.push((
                    a.get("id").and_then(Value::as_node_id).unwrap(),
                    b.get("id").and_then(Value::as_node_id).unwrap(),
                ));
            }
            StreamItem::End => break,
        }
    }
    handle.join().unwrap();

    assert_eq!(pairs, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
}

/// Scenario 6: OrderBy ASC over unsorted input emits a non-decreasing
/// sequence, then End.
#[test]
fn order_by_asc_sorts_the_whole_stream() {
    let mut store = MemoryStore::new();
    // AllNodeScan is the cheapest way to get three known rows through a
    // child thread without a dedicated fixture operator.
    store.insert_node(NodeRecord {
        id: 3,
        partition_id: 0,
        labels: vec![],
        properties: BTreeMap::from([("n".to_string(), Value::Integer(3))]),
    });
    store.insert_node(NodeRecord {
        id: 1,
        partition_id: 0,
        labels: vec![],
        properties: BTreeMap::from([("n".to_string(), Value::Integer(1))]),
    });
    store.insert_node(NodeRecord {
        id: 2,
        partition_id: 0,
        labels: vec![],
        properties: BTreeMap::from([("n".to_string(), Value::Integer(2))]),
    });

    let ctx = ctx(store, 0, 1);
    let plan = json!({
        "Operator": "OrderBy",
        "variable": "n",
        "direction": "ASC",
        "NextOperator": json!({
            "Operator": "Projection",
            "project": [{"variable": "raw", "property": "n", "assign": "n"}],
            "NextOperator": json!({"Operator": "AllNodeScan", "variable": "raw"}).to_string(),
        }).to_string(),
    });

    let (output, handle) = execute(&plan.to_string(), ctx);
    let mut values = Vec::new();
    loop {
        match output.get() {
            StreamItem::Row(tuple) => values.push(tuple.get("n").unwrap().as_integer().unwrap()),
            StreamItem::End => break,
        }
    }
    handle.join().unwrap();
    assert_eq!(values, vec![1, 2, 3]);
}
