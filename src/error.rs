//! Error types for the per-partition query executor, publish channel, and
//! triangle engine.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("malformed plan: {0}")]
    PlanMalformed(String),

    #[error("store io error: {0}")]
    StoreIo(String),

    #[error("transport short read: expected {expected} bytes, got {got}")]
    TransportShortRead { expected: usize, got: usize },

    #[error("transport short write: expected {expected} bytes, wrote {wrote}")]
    TransportShortWrite { expected: usize, wrote: usize },

    #[error("protocol received unexpected ack: expected {expected}, got {got}")]
    ProtocolUnexpectedAck { expected: String, got: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("unknown partition: {0}")]
    UnknownPartition(String),
}

impl Clone for WorkerError {
    fn clone(&self) -> Self {
        match self {
            WorkerError::PlanMalformed(s) => WorkerError::PlanMalformed(s.clone()),
            WorkerError::StoreIo(s) => WorkerError::StoreIo(s.clone()),
            WorkerError::TransportShortRead { expected, got } => {
                WorkerError::TransportShortRead { expected: *expected, got: *got }
            }
            WorkerError::TransportShortWrite { expected, wrote } => {
                WorkerError::TransportShortWrite { expected: *expected, wrote: *wrote }
            }
            WorkerError::ProtocolUnexpectedAck { expected, got } => {
                WorkerError::ProtocolUnexpectedAck { expected: expected.clone(), got: got.clone() }
            }
            WorkerError::TypeMismatch(s) => WorkerError::TypeMismatch(s.clone()),
            WorkerError::Io(e) => WorkerError::StoreIo(e.to_string()),
            WorkerError::Json(e) => WorkerError::PlanMalformed(e.to_string()),
            WorkerError::UnknownOperator(s) => WorkerError::UnknownOperator(s.clone()),
            WorkerError::UnknownPartition(s) => WorkerError::UnknownPartition(s.clone()),
        }
    }
}
