//! Process-wide operator registry: maps an `Operator` tag to the function
//! that implements it. Populated once at startup and read-only thereafter,
//! matching the original's `methodMap` dispatch table.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value as Json;

use crate::buffer::BoundedBuffer;
use crate::error::{Result, WorkerError};
use crate::execution::operators::{combine, expand, mutate, produce, scan, transform};
use crate::execution::runtime::ExecutionContext;

pub type OperatorFn = fn(&Json, ExecutionContext, BoundedBuffer) -> Result<()>;

static REGISTRY: Lazy<HashMap<&'static str, OperatorFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, OperatorFn> = HashMap::new();
    m.insert("AllNodeScan", scan::all_node_scan);
    m.insert("NodeByIdSeek", scan::node_by_id_seek);
    m.insert("UndirectedRelationshipTypeScan", scan::undirected_relationship_type_scan);
    m.insert("UndirectedAllRelationshipScan", scan::undirected_all_relationship_scan);
    m.insert("ExpandAll", expand::expand_all);
    m.insert("Filter", transform::filter);
    m.insert("Projection", transform::projection);
    m.insert("Distinct", transform::distinct);
    m.insert("EagerFunction", transform::eager_function);
    m.insert("Create", mutate::create);
    m.insert("CartesianProduct", combine::cartesian_product);
    m.insert("OrderBy", combine::order_by);
    m.insert("ProduceResult", produce::produce_result);
    m
});

/// Looks up and invokes the operator named by `plan["Operator"]`.
pub fn dispatch(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let tag = plan
        .get("Operator")
        .and_then(Json::as_str)
        .ok_or_else(|| WorkerError::PlanMalformed("plan node missing Operator tag".into()))?;
    let operator_fn = REGISTRY
        .get(tag)
        .ok_or_else(|| WorkerError::UnknownOperator(tag.to_string()))?;
    operator_fn(plan, ctx, output)
}
