//! Client side of a cross-partition sub-query dispatch.
//!
//! `ExpandAll` uses this when its input node isn't local: it asks the
//! master for the node's home partition, builds a templated sub-plan, and
//! hands both to a `Connector`, which owns a dedicated thread that streams
//! the remote partition's results back into the same bounded buffer the
//! local operator would otherwise have filled. `CartesianProduct` uses the
//! identical mechanism to fan its right side out to every other partition.

use std::net::TcpStream;
use std::thread::{self, JoinHandle};

use crate::buffer::{BoundedBuffer, StreamItem};
use crate::common::Tuple;
use crate::error::{Result, WorkerError};
use crate::network::publish::PublishChannel;

/// Dispatches one sub-query over a fresh TCP connection and streams the
/// results into `output` until the remote worker's `"-1"` sentinel.
pub fn dispatch_subquery(
    address: &str,
    graph_id: &str,
    partition_id: &str,
    subplan_json: &str,
    output: BoundedBuffer,
) -> Result<()> {
    let stream = TcpStream::connect(address).map_err(WorkerError::Io)?;
    let mut channel = PublishChannel::new(stream);

    channel.send_query(graph_id, partition_id, subplan_json)?;

    loop {
        let frame = channel.recv_query_frame()?;
        if frame == "-1" {
            break;
        }
        let tuple: Tuple = serde_json::from_str(&frame)?;
        output.add(StreamItem::Row(tuple));
    }

    channel.finish_query()?;
    output.add(StreamItem::End);
    Ok(())
}

/// Spawns `dispatch_subquery` on its own thread, matching the thread-per-
/// remote-connection model used elsewhere in the executor. Errors surface
/// as a logged warning and an immediate `StreamItem::End` on the buffer,
/// since a broken cross-partition connection shouldn't hang the parent
/// operator waiting on its buffer forever.
pub fn spawn_subquery(
    address: String,
    graph_id: String,
    partition_id: String,
    subplan_json: String,
    output: BoundedBuffer,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = dispatch_subquery(&address, &graph_id, &partition_id, &subplan_json, output.clone()) {
            tracing::warn!(error = %e, partition_id = %partition_id, "cross-partition sub-query failed");
            output.add(StreamItem::End);
        }
    })
}
