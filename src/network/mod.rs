//! Wire protocol, publish channel, and cross-partition connector.

pub mod connector;
pub mod protocol;
pub mod publish;

pub use connector::{dispatch_subquery, spawn_subquery};
pub use publish::{PublishChannel, StatusBuffer, StatusKind, StatusMessage};
