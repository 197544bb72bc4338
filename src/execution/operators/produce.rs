//! `ProduceResult`: the root operator. Projects each child row onto the
//! plan's `variable` list and forwards it to the caller-supplied output
//! buffer; on the child's sentinel, pushes a SUCCESS status before
//! forwarding the sentinel itself.

use serde_json::Value as Json;

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::error::{Result, WorkerError};
use crate::execution::operators::spawn_next;
use crate::execution::runtime::ExecutionContext;
use crate::network::{StatusKind, StatusMessage};

/// Reads the `variable` list a root plan projects its result rows onto.
fn variables(plan: &Json) -> Result<Vec<String>> {
    let array = plan
        .get("variable")
        .and_then(Json::as_array)
        .ok_or_else(|| WorkerError::PlanMalformed("ProduceResult missing variable list".into()))?;
    array
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| WorkerError::PlanMalformed("ProduceResult variable entry is not a string".into()))
        })
        .collect()
}

/// Drains the child, projecting each row onto `variable` before forwarding
/// it. Once the child's sentinel arrives, pushes a SUCCESS status and the
/// StatusBuffer sentinel, then forwards the tuple sentinel.
pub fn produce_result(plan: &Json, ctx: ExecutionContext, output: BoundedBuffer) -> Result<()> {
    let bindings = variables(plan)?;
    let (child_buf, child_handle) = spawn_next(plan, &ctx)?;

    loop {
        match child_buf.get() {
            StreamItem::Row(tuple) => output.add(StreamItem::Row(tuple.project(&bindings))),
            StreamItem::End => break,
        }
    }

    ctx.status.push(StatusMessage::new(ctx.worker_id, StatusKind::Success, "query complete".to_string()));
    ctx.status.push(StatusMessage::sentinel(ctx.worker_id));
    output.add(StreamItem::End);
    let _ = child_handle.join();
    Ok(())
}
