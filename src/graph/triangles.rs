//! Streaming triangle counting: static full recompute and dynamic,
//! watermark-diffed incremental counting, for both local and central
//! (cross-partition) edge views.
//!
//! Ownership of the adjacency state is tied to a `TriangleEngine` instance
//! rather than held in process-wide statics, so that a worker hosting
//! multiple graphs (or running tests) doesn't cross-contaminate adjacency
//! between them — see the "global mutable adjacency maps" re-architecture
//! note this crate follows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use crate::common::{NodeId, PartitionId};
use crate::error::Result;
use crate::graph::adjacency::{CentralAdjacency, LocalAdjacency};
use crate::master_client::MasterClient;
use crate::store::GraphStore;

/// `(localRelationCount, centralRelationCount)` recorded at the end of a
/// dynamic triangle call; the caller supplies it back on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationWatermark {
    pub local_relation_count: i64,
    pub central_relation_count: i64,
}

/// Result of a local triangle count, static or dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTriangleResult {
    pub local_relation_count: i64,
    pub central_relation_count: i64,
    pub triangle_count: i64,
}

/// Counts triangles in an undirected adjacency by intersecting each vertex's
/// neighbor set against its higher-numbered neighbors', the same
/// neighbor-intersection approach the store-backed triangle counter uses.
fn count_all_triangles(adjacency: &HashMap<NodeId, HashSet<NodeId>>) -> i64 {
    let mut total = 0i64;
    for (&u, neighbors_u) in adjacency {
        for &v in neighbors_u {
            if v <= u {
                continue;
            }
            let empty = HashSet::new();
            let neighbors_v = adjacency.get(&v).unwrap_or(&empty);
            for &w in neighbors_u {
                if w <= v {
                    continue;
                }
                if neighbors_v.contains(&w) {
                    total += 1;
                }
            }
        }
    }
    total
}

/// Sum, over every `(u, v)` edge, of `|neighbors_of(u, g1) ∩ neighbors_of(v, g2)|`.
fn count(g1: &HashMap<NodeId, HashSet<NodeId>>, g2: &HashMap<NodeId, HashSet<NodeId>>, edges: &[(NodeId, NodeId)]) -> i64 {
    let empty = HashSet::new();
    let mut total = 0i64;
    for &(u, v) in edges {
        let nu = g1.get(&u).unwrap_or(&empty);
        let nv = g2.get(&v).unwrap_or(&empty);
        total += nu.iter().filter(|w| nv.contains(w)).count() as i64;
    }
    total
}

/// `0.5 * ((S1 - S2) + (S3 / 3))`, S3/3 truncated before the halving, the
/// halving truncated back to an integer — preserves the source's exact
/// integer/double-conversion semantics rather than switching to rational
/// arithmetic (see the differential-formula design note).
fn differential_triangle_count(
    old_adjacency: &HashMap<NodeId, HashSet<NodeId>>,
    new_adjacency: &HashMap<NodeId, HashSet<NodeId>>,
    new_edges: &[(NodeId, NodeId)],
) -> i64 {
    let s1 = count(old_adjacency, old_adjacency, new_edges);
    let s2 = count(old_adjacency, new_adjacency, new_edges);
    let s3 = count(new_adjacency, new_adjacency, new_edges);
    let inner = (s1 - s2) + (s3 / 3);
    (0.5_f64 * inner as f64) as i64
}

/// Owns a worker's local and central adjacency state across successive
/// dynamic triangle calls for one graph.
#[derive(Debug, Default)]
pub struct TriangleEngine {
    local: LocalAdjacency,
    central: CentralAdjacency,
}

impl TriangleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full recompute over the store's current local adjacency.
    pub fn count_local_static<S: GraphStore>(&self, store: &S) -> Result<LocalTriangleResult> {
        let adjacency = build_adjacency(store)?;
        let triangle_count = count_all_triangles(&adjacency);
        Ok(LocalTriangleResult {
            local_relation_count: store.local_relation_count() as i64,
            central_relation_count: store.central_relation_count() as i64,
            triangle_count,
        })
    }

    /// Full recompute over central adjacency fetched fresh from every
    /// partition in `partition_ids` — one thread per partition, merged
    /// before counting — returned as the canonical `"a,b,c:..."` triple
    /// string.
    pub fn count_central_static(master: &Arc<dyn MasterClient>, partition_ids: &[PartitionId]) -> String {
        let handles: Vec<_> = partition_ids
            .iter()
            .map(|&partition| {
                let master = Arc::clone(master);
                thread::spawn(move || (partition, master.central_adjacency(partition)))
            })
            .collect();

        let mut merged: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        for handle in handles {
            let (partition, edges) = handle.join().expect("central adjacency fetch thread panicked");
            match edges {
                Ok(edges) => {
                    for (u, v) in edges {
                        merged.entry(u).or_default().insert(v);
                        merged.entry(v).or_default().insert(u);
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, partition, "failed to fetch central adjacency for partition");
                }
            }
        }

        render_triangle_triples(enumerate_triangles(&merged))
    }

    /// Diffs the store's current relation counts against `watermark`; if
    /// unchanged, returns zero new triangles and the same watermark.
    /// Otherwise folds the new edges into this engine's adjacency and
    /// returns the differential triangle count.
    pub fn count_local_dynamic<S: GraphStore>(
        &mut self,
        store: &S,
        watermark: RelationWatermark,
    ) -> Result<(LocalTriangleResult, RelationWatermark)> {
        let new_local_count = store.local_relation_count() as i64;
        let new_central_count = store.central_relation_count() as i64;

        if watermark.local_relation_count == new_local_count
            && watermark.central_relation_count == new_central_count
        {
            let result = LocalTriangleResult {
                local_relation_count: new_local_count,
                central_relation_count: new_central_count,
                triangle_count: 0,
            };
            return Ok((result, watermark));
        }

        let mut new_edges = Vec::new();
        let mut delta = LocalAdjacency::new();

        for relation in store.all_local_relations()? {
            new_edges.push((relation.source, relation.destination));
            new_edges.push((relation.destination, relation.source));
            delta.insert_edge(relation.source, relation.destination);
            self.local.insert_edge(relation.source, relation.destination);
        }
        for relation in store.all_central_relations()? {
            new_edges.push((relation.source, relation.destination));
            new_edges.push((relation.destination, relation.source));
            delta.insert_edge(relation.source, relation.destination);
            self.local.insert_edge(relation.source, relation.destination);
        }

        let triangle_count =
            differential_triangle_count(self.local.as_map(), delta.as_map(), &new_edges);

        let result = LocalTriangleResult {
            local_relation_count: new_local_count,
            central_relation_count: new_central_count,
            triangle_count,
        };
        let new_watermark = RelationWatermark {
            local_relation_count: new_local_count,
            central_relation_count: new_central_count,
        };
        Ok((result, new_watermark))
    }

    /// Fetches each partition's new central edges since its watermark —
    /// one thread per partition, via `old_central_counts`' `(partition,
    /// since_count)` pairs — folds them into `key`'s central adjacency, and
    /// returns the newly formed triangles as canonical `"a,b,c:..."`
    /// triples.
    pub fn count_central_dynamic(
        &mut self,
        master: &Arc<dyn MasterClient>,
        key: &str,
        old_central_counts: &[(PartitionId, i64)],
    ) -> String {
        let handles: Vec<_> = old_central_counts
            .iter()
            .map(|&(partition, since_count)| {
                let master = Arc::clone(master);
                thread::spawn(move || (partition, master.central_edges_since(partition, since_count)))
            })
            .collect();

        let mut new_edges = Vec::new();
        for handle in handles {
            let (partition, edges) = handle.join().expect("central edge delta fetch thread panicked");
            match edges {
                Ok(edges) => new_edges.extend(edges),
                Err(error) => {
                    tracing::warn!(%error, partition, "failed to fetch central edge delta for partition");
                }
            }
        }

        for &(u, v) in &new_edges {
            self.central.insert_edge(key, u, v);
        }

        let adjacency = match self.central.get(key) {
            Some(a) => a.as_map().clone(),
            None => return String::new(),
        };

        let empty = HashSet::new();
        let mut triples = Vec::new();
        for &(u, v) in &new_edges {
            let nu = adjacency.get(&u).unwrap_or(&empty);
            let nv = adjacency.get(&v).unwrap_or(&empty);
            for &w in nu {
                if nv.contains(&w) {
                    triples.push(canonical_triple(u, v, w));
                }
            }
        }
        render_triangle_triples(triples)
    }
}

fn build_adjacency<S: GraphStore>(store: &S) -> Result<HashMap<NodeId, HashSet<NodeId>>> {
    let mut adjacency: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
    for relation in store.all_local_relations()? {
        adjacency.entry(relation.source).or_default().insert(relation.destination);
        adjacency.entry(relation.destination).or_default().insert(relation.source);
    }
    Ok(adjacency)
}

fn enumerate_triangles(adjacency: &HashMap<NodeId, HashSet<NodeId>>) -> Vec<(NodeId, NodeId, NodeId)> {
    let mut triples = Vec::new();
    for (&u, neighbors_u) in adjacency {
        for &v in neighbors_u {
            if v <= u {
                continue;
            }
            let empty = HashSet::new();
            let neighbors_v = adjacency.get(&v).unwrap_or(&empty);
            for &w in neighbors_u {
                if w <= v {
                    continue;
                }
                if neighbors_v.contains(&w) {
                    triples.push((u, v, w));
                }
            }
        }
    }
    triples
}

fn canonical_triple(a: NodeId, b: NodeId, c: NodeId) -> (NodeId, NodeId, NodeId) {
    let mut t = [a, b, c];
    t.sort_unstable();
    (t[0], t[1], t[2])
}

fn render_triangle_triples(mut triples: Vec<(NodeId, NodeId, NodeId)>) -> String {
    triples.sort_unstable();
    triples
        .iter()
        .map(|(a, b, c)| format!("{a},{b},{c}"))
        .collect::<Vec<_>>()
        .join(":")
}
