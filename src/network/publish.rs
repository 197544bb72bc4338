//! The publish channel: a single TCP connection multiplexing result tuples
//! (from the root `ProduceResult` operator) and status notifications (from
//! the notification thread) to the master, one length-prefixed, ack-per-frame
//! message at a time.
//!
//! Two independent threads can hold a `PublishChannel` clone and call
//! `publish`/`publish_status` concurrently; frames never interleave because
//! every write path takes the connection's mutex first. That mutex lives in
//! a process-wide map keyed by the connection's OS-level identity, mirroring
//! the original's per-fd mutex map guarded by a meta-mutex (`DashMap` gives
//! us that meta-mutex for free via its internal sharding).

use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::buffer::StreamItem;
use crate::error::{Result, WorkerError};
use crate::network::protocol::*;

#[cfg(unix)]
fn connection_identity(stream: &TcpStream) -> u64 {
    use std::os::unix::io::AsRawFd;
    stream.as_raw_fd() as u64
}

#[cfg(windows)]
fn connection_identity(stream: &TcpStream) -> u64 {
    use std::os::windows::io::AsRawSocket;
    stream.as_raw_socket() as u64
}

static CONNECTION_LOCKS: Lazy<DashMap<u64, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

fn lock_for(identity: u64) -> Arc<Mutex<()>> {
    CONNECTION_LOCKS.entry(identity).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
}

/// Severity of a status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Progress,
    Success,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusKind::Progress => "PROGRESS",
            StatusKind::Success => "SUCCESS",
            StatusKind::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

impl FromStr for StatusKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PROGRESS" => Ok(StatusKind::Progress),
            "SUCCESS" => Ok(StatusKind::Success),
            "ERROR" => Ok(StatusKind::Error),
            other => Err(WorkerError::PlanMalformed(format!("unknown status kind: {other}"))),
        }
    }
}

/// A single status notification, wire form `"<workerId>|<TYPE>|<message>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub worker_id: i64,
    pub kind: StatusKind,
    pub message: String,
}

impl StatusMessage {
    pub fn new(worker_id: i64, kind: StatusKind, message: impl Into<String>) -> Self {
        Self { worker_id, kind, message: message.into() }
    }

    /// The in-band sentinel the notification thread uses to know the
    /// StatusBuffer has been drained for good.
    pub fn sentinel(worker_id: i64) -> Self {
        Self { worker_id, kind: StatusKind::Success, message: "-1".to_string() }
    }

    pub fn is_sentinel(&self) -> bool {
        self.message == "-1"
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.worker_id, self.kind, self.message)
    }
}

impl FromStr for StatusMessage {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '|');
        let worker_id = parts
            .next()
            .ok_or_else(|| WorkerError::PlanMalformed("missing workerId".into()))?
            .parse::<i64>()
            .map_err(|e| WorkerError::PlanMalformed(e.to_string()))?;
        let kind = parts
            .next()
            .ok_or_else(|| WorkerError::PlanMalformed("missing status type".into()))?
            .parse::<StatusKind>()?;
        let message = parts.next().ok_or_else(|| WorkerError::PlanMalformed("missing message".into()))?;
        Ok(StatusMessage { worker_id, kind, message: message.to_string() })
    }
}

/// Thread-safe FIFO of status notifications. The notification thread pops
/// in a loop, shipping each message through a `PublishChannel`, until the
/// sentinel is observed.
#[derive(Clone)]
pub struct StatusBuffer {
    queue: Arc<Mutex<std::collections::VecDeque<StatusMessage>>>,
    not_empty: Arc<parking_lot::Condvar>,
}

impl StatusBuffer {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(std::collections::VecDeque::new())),
            not_empty: Arc::new(parking_lot::Condvar::new()),
        }
    }

    pub fn push(&self, message: StatusMessage) {
        let mut queue = self.queue.lock();
        queue.push_back(message);
        self.not_empty.notify_one();
    }

    pub fn pop(&self) -> StatusMessage {
        let mut queue = self.queue.lock();
        while queue.is_empty() {
            self.not_empty.wait(&mut queue);
        }
        queue.pop_front().expect("queue checked non-empty above")
    }
}

impl Default for StatusBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One TCP connection to the master, framed per the length-prefixed,
/// ack-per-frame protocol. Both result tuples and status notifications flow
/// through the same `publish` entry point, matching the original's single
/// generic publish path.
pub struct PublishChannel {
    stream: TcpStream,
    lock: Arc<Mutex<()>>,
    loop_exit: Arc<AtomicBool>,
}

impl PublishChannel {
    pub fn new(stream: TcpStream) -> Self {
        let identity = connection_identity(&stream);
        Self { stream, lock: lock_for(identity), loop_exit: Arc::new(AtomicBool::new(false)) }
    }

    /// Whether a prior hard transport error has torn down this channel.
    /// Callers SHOULD stop publishing once this returns `true`.
    pub fn loop_exit(&self) -> bool {
        self.loop_exit.load(Ordering::SeqCst)
    }

    fn mark_loop_exit(&self) {
        self.loop_exit.store(true, Ordering::SeqCst);
    }

    /// Sends one frame tagged `GRAPH_STREAM_START` carrying `payload`, used
    /// for both tuple rows and status notifications.
    pub fn publish(&mut self, payload: &str) -> Result<()> {
        let _guard = self.lock.lock();

        if let Err(e) = write_tag(&mut self.stream, GRAPH_STREAM_START) {
            self.mark_loop_exit();
            return Err(e);
        }

        match read_tag(&mut self.stream) {
            Ok(ack) if ack == GRAPH_STREAM_START_ACK => {}
            Ok(ack) => tracing::warn!(expected = GRAPH_STREAM_START_ACK, got = %ack, "unexpected start ack"),
            Err(e) => {
                self.mark_loop_exit();
                return Err(e);
            }
        }

        let bytes = payload.as_bytes();
        write_length(&mut self.stream, bytes.len() as u32)?;

        if let Err(e) = read_length(&mut self.stream) {
            self.mark_loop_exit();
            return Err(e);
        }

        write_payload(&mut self.stream, bytes)?;

        match read_terminator(&mut self.stream) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_loop_exit();
                Err(e)
            }
        }
    }

    pub fn publish_tuple(&mut self, item: &StreamItem) -> Result<()> {
        let json = match item {
            StreamItem::Row(tuple) => serde_json::to_string(tuple)?,
            StreamItem::End => "\"-1\"".to_string(),
        };
        self.publish(&json)
    }

    pub fn publish_status(&mut self, message: &StatusMessage) -> Result<()> {
        self.publish(&message.to_string())
    }

    /// Sends a sub-query to the partition owning `partition_id`. Issues the
    /// `QUERY_START` handshake and the three length-prefixed fields
    /// (graph id, partition id, sub-plan JSON); the caller then pulls
    /// response frames one at a time with [`PublishChannel::recv_query_frame`].
    pub fn send_query(&mut self, graph_id: &str, partition_id: &str, message: &str) -> Result<()> {
        let _guard = self.lock.lock();

        write_tag(&mut self.stream, QUERY_START)?;
        match read_tag(&mut self.stream)? {
            ack if ack == QUERY_START_ACK => {}
            ack => tracing::warn!(expected = QUERY_START_ACK, got = %ack, "unexpected start ack"),
        }

        self.send_length_prefixed(graph_id.as_bytes())?;
        self.send_length_prefixed(partition_id.as_bytes())?;
        self.send_length_prefixed(message.as_bytes())
    }

    /// Blocks for the next `QUERY_DATA_START`-tagged response frame and
    /// returns its payload. The caller keeps calling this until it sees the
    /// `"-1"` sentinel payload.
    ///
    /// Replaces the original's 1-second, 200-iteration poll loop with a
    /// single blocking read per frame: the connector thread already owns the
    /// only reader of this stream, so there is nothing to interleave with and
    /// no reason to wake up on a timer.
    pub fn recv_query_frame(&mut self) -> Result<String> {
        let _guard = self.lock.lock();

        match read_tag(&mut self.stream)? {
            tag if tag == QUERY_DATA_START => {}
            tag => tracing::warn!(expected = QUERY_DATA_START, got = %tag, "unexpected data-start tag"),
        }
        write_tag(&mut self.stream, QUERY_DATA_ACK)?;

        let length = read_length(&mut self.stream)?;
        write_tag(&mut self.stream, GRAPH_STREAM_C_LENGTH_ACK)?;

        let payload = read_payload(&mut self.stream, length)?;
        write_tag(&mut self.stream, GRAPH_DATA_SUCCESS)?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    /// Reads the out-of-band `\r\n` terminator the master emits once a
    /// query's frame sequence is exhausted.
    pub fn finish_query(&mut self) -> Result<()> {
        let _guard = self.lock.lock();
        read_terminator(&mut self.stream)
    }

    fn send_length_prefixed(&mut self, payload: &[u8]) -> Result<()> {
        write_length(&mut self.stream, payload.len() as u32)?;
        let _ = read_length(&mut self.stream)?;
        write_payload(&mut self.stream, payload)
    }
}

/// Reads bytes until the `\r\n` out-of-band message terminator, as the
/// master emits after the `GRAPH_STREAM_START` payload ack. A short read
/// (<1 byte) is a hard error.
fn read_terminator<R: Read>(stream: &mut R) -> Result<()> {
    let mut byte = [0u8; 1];
    loop {
        let got = stream.read(&mut byte).map_err(WorkerError::Io)?;
        if got < 1 {
            return Err(WorkerError::TransportShortRead { expected: 1, got: 0 });
        }
        if byte[0] == b'\r' {
            let got = stream.read(&mut byte).map_err(WorkerError::Io)?;
            if got < 1 {
                return Err(WorkerError::TransportShortRead { expected: 1, got: 0 });
            }
            if byte[0] == b'\n' {
                return Ok(());
            }
        }
    }
}

impl Drop for PublishChannel {
    fn drop(&mut self) {
        let _guard = self.lock.lock();
        let _ = write_tag(&mut self.stream, CLOSE);
    }
}
