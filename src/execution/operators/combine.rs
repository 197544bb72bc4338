//! Binary and whole-stream operators: `CartesianProduct` (fans its right
//! side out to every partition) and `OrderBy` (bounded top-K heap sort).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde_json::Value as Json;

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::common::{Tuple, Value};
use crate::error::{Result, WorkerError};
use crate::execution::operators::required_str;
use crate::execution::runtime::{self, ExecutionContext};
use crate::network::spawn_subquery;

/// Top-K cap for `OrderBy`: a physical plan never needs to carry more rows
/// through a single sort stage than this.
const ORDER_BY_TOP_K: usize = 5000;

/// Outer product of `left` and `right`. For each left tuple, opens a fresh
/// right stream — the local right plan plus one sub-query per other
/// partition — merges every right row into the current left tuple, and
/// emits. The right side is drained to exactly `partition_count` sentinels
/// (one per partition, including this one); the merge loop here reads each
/// of those N buffers to its own End rather than polling in a shared loop,
/// so it cannot spin the way the unfixed source's right-side loop could
/// (see the REDESIGN FLAGS note on this operator).
pub fn cartesian_product(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let left_json = required_str(plan, "left")?.to_string();
    let right_json = required_str(plan, "right")?.to_string();

    let (left_buf, left_handle) = runtime::spawn_child(left_json, ctx.clone());

    loop {
        match left_buf.get() {
            StreamItem::Row(left_tuple) => {
                run_right_fanout(&ctx, &right_json, &left_tuple, &output)?;
            }
            StreamItem::End => break,
        }
    }

    output.add(StreamItem::End);
    let _ = left_handle.join();
    Ok(())
}

fn run_right_fanout(
    ctx: &ExecutionContext,
    right_json: &str,
    left_tuple: &Tuple,
    output: &BoundedBuffer,
) -> Result<()> {
    let (local_buf, local_handle) = runtime::spawn_child(right_json.to_string(), ctx.clone());

    let mut remote_handles = Vec::new();
    let mut remote_bufs = Vec::new();
    for partition in other_partitions(ctx) {
        let address = ctx.master.worker_address(partition)?;
        let remote_buf = ctx.new_buffer();
        let handle = spawn_subquery(
            address,
            ctx.graph_id.clone(),
            partition.to_string(),
            right_json.to_string(),
            remote_buf.clone(),
        );
        remote_bufs.push(remote_buf);
        remote_handles.push(handle);
    }

    for right_buf in std::iter::once(local_buf).chain(remote_bufs) {
        loop {
            match right_buf.get() {
                StreamItem::Row(right_tuple) => output.add(StreamItem::Row(left_tuple.merge(&right_tuple))),
                StreamItem::End => break,
            }
        }
    }

    let _ = local_handle.join();
    for handle in remote_handles {
        let _ = handle.join();
    }
    Ok(())
}

fn other_partitions(ctx: &ExecutionContext) -> Vec<u32> {
    (0..ctx.master.partition_count()).filter(|&p| p != ctx.partition_id).collect()
}

#[derive(Debug, Clone, PartialEq)]
struct OrderKey(f64);
impl Eq for OrderKey {}
impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

struct HeapEntry {
    key: OrderKey,
    tuple: Tuple,
    /// `Reverse` direction: for ASC we keep the *smallest* K, so the heap is
    /// a max-heap over keys and we evict its max; for DESC we keep the
    /// *largest* K, so the heap is a min-heap over keys (comparisons
    /// reversed) and we evict its min. `descending` picks which comparison
    /// this entry type uses so a single `BinaryHeap<HeapEntry>` serves both.
    descending: bool,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.descending {
            other.key.cmp(&self.key)
        } else {
            self.key.cmp(&other.key)
        }
    }
}

/// Drains the child into a bounded top-K heap keyed on `variable`
/// (ASC keeps the smallest K, DESC the largest K), then emits the heap in
/// sorted order. A projection operand whose value doesn't parse as a
/// number is skipped with a warning rather than failing the whole sort,
/// matching the source's per-tuple exception handling in this hot loop.
pub fn order_by(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let variable = required_str(plan, "variable")?.to_string();
    let direction = plan.get("direction").and_then(Json::as_str).unwrap_or("ASC").to_string();
    let descending = match direction.as_str() {
        "ASC" => false,
        "DESC" => true,
        other => return Err(WorkerError::PlanMalformed(format!("OrderBy unknown direction: {other}"))),
    };

    let (child_buf, child_handle) = crate::execution::operators::spawn_next(plan, &ctx)?;
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();

    loop {
        match child_buf.get() {
            StreamItem::Row(tuple) => {
                let Some(key) = sort_key(&tuple, &variable) else {
                    tracing::warn!(%variable, "OrderBy: skipping tuple with unparseable sort key");
                    continue;
                };
                heap.push(HeapEntry { key: OrderKey(key), tuple, descending });
                if heap.len() > ORDER_BY_TOP_K {
                    heap.pop();
                }
            }
            StreamItem::End => break,
        }
    }

    // `into_sorted_vec` yields ascending order under `HeapEntry::Ord`. For
    // `descending == false` that `Ord` is the plain key comparison, so the
    // result is already ascending-by-key. For `descending == true` the
    // comparison is reversed, so "ascending under `Ord`" is already
    // descending-by-key. Neither case needs a further reversal.
    let sorted: Vec<HeapEntry> = heap.into_sorted_vec();
    for entry in sorted {
        output.add(StreamItem::Row(entry.tuple));
    }
    output.add(StreamItem::End);
    let _ = child_handle.join();
    Ok(())
}

fn sort_key(tuple: &Tuple, variable: &str) -> Option<f64> {
    match tuple.get(variable)? {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_asc_yields_non_decreasing_sequence() {
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        for v in [3, 1, 2] {
            heap.push(HeapEntry {
                key: OrderKey(v as f64),
                tuple: Tuple::new().with("n", Value::Integer(v)),
                descending: false,
            });
        }
        let sorted = heap.into_sorted_vec();
        let keys: Vec<f64> = sorted.iter().map(|e| e.key.0).collect();
        assert_eq!(keys, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn order_by_desc_yields_non_increasing_sequence() {
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        for v in [3, 1, 2] {
            heap.push(HeapEntry {
                key: OrderKey(v as f64),
                tuple: Tuple::new().with("n", Value::Integer(v)),
                descending: true,
            });
        }
        let sorted = heap.into_sorted_vec();
        let keys: Vec<f64> = sorted.iter().map(|e| e.key.0).collect();
        assert_eq!(keys, vec![3.0, 2.0, 1.0]);
    }
}
