//! Adjacency structures and the streaming triangle engine.

pub mod adjacency;
pub mod triangles;

pub use adjacency::{CentralAdjacency, LocalAdjacency};
pub use triangles::{LocalTriangleResult, RelationWatermark, TriangleEngine};
