//! Per-partition worker core: the operator executor, the publish channel to
//! the master, and the streaming triangle engine.
//!
//! This crate is a library seam, not a process. An integrating binary owns
//! `main`, config-file loading, the real block-file-backed `GraphStore`, and
//! the RPC transport behind `MasterClient`; this crate only needs the typed
//! traits those collaborators implement.

pub mod buffer;
pub mod common;
pub mod config;
pub mod error;
pub mod execution;
pub mod graph;
pub mod master_client;
pub mod network;
pub mod store;

pub use error::{Result, WorkerError};
