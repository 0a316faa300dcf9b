//! Platform-to-graph snapping via a precomputed 2D spatial index.
//!
//! Platform boundary markers rarely sit exactly on a rail node. Snapping
//! resolves a marker to the graph node that should anchor its paths: an
//! exact packed-id hit wins outright, otherwise candidates within a bounded
//! horizontal radius are ranked by ring distance with a closest-elevation
//! tie-break, mirroring the expanding-ring search the renderer expects.

use std::collections::HashSet;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use tracing::debug;

use crate::blockpos::{BlockPos, NodeId};
use crate::graph::RailGraph;

/// Maximum horizontal snap distance in blocks.
pub const MAX_SNAP_RADIUS: f64 = 8.0;

/// KD-tree bucket size (kiddo default).
const BUCKET_SIZE: usize = 32;

/// Tolerance when grouping candidates into the same distance ring.
const RING_EPSILON: f64 = 1e-6;

/// Spatial index over the horizontal positions of all graph nodes.
pub struct NodeLocator {
    tree: KdTree<f64, usize, 2, BUCKET_SIZE, u32>,
    nodes: Vec<(NodeId, BlockPos)>,
    ids: HashSet<NodeId>,
}

impl NodeLocator {
    /// Index every node of a graph by its (x, z) position.
    pub fn build(graph: &RailGraph) -> Self {
        let mut nodes = Vec::with_capacity(graph.len());
        let mut ids = HashSet::with_capacity(graph.len());
        let mut tree: KdTree<f64, usize, 2, BUCKET_SIZE, u32> = KdTree::new();

        for (id, pos) in graph.nodes() {
            let index = nodes.len();
            tree.add(&[pos.x as f64, pos.z as f64], index);
            nodes.push((id, *pos));
            ids.insert(id);
        }

        debug!(node_count = nodes.len(), "built node locator");
        Self { tree, nodes, ids }
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snap a block position to the nearest graph node.
    ///
    /// Exact position matches short-circuit. Otherwise all nodes within
    /// [`MAX_SNAP_RADIUS`] horizontally are considered; the nearest ring
    /// wins and ties within a ring prefer the candidate whose elevation is
    /// closest to the query. Returns `None` when nothing is in range.
    pub fn snap(&self, pos: BlockPos) -> Option<NodeId> {
        let packed = pos.pack();
        if self.ids.contains(&packed) {
            return Some(packed);
        }

        let query = [pos.x as f64, pos.z as f64];
        let max_squared = MAX_SNAP_RADIUS * MAX_SNAP_RADIUS + RING_EPSILON;
        let candidates = self.tree.within::<SquaredEuclidean>(&query, max_squared);
        if candidates.is_empty() {
            return None;
        }

        // Results arrive sorted by distance; keep only the nearest ring.
        let ring = candidates[0].distance;
        candidates
            .iter()
            .take_while(|c| c.distance <= ring + RING_EPSILON)
            .min_by(|a, b| {
                let (_, pa) = self.nodes[a.item];
                let (_, pb) = self.nodes[b.item];
                let da = (pa.y - pos.y).abs();
                let db = (pb.y - pos.y).abs();
                da.cmp(&db).then_with(|| {
                    let (ia, _) = self.nodes[a.item];
                    let (ib, _) = self.nodes[b.item];
                    ia.cmp(&ib)
                })
            })
            .map(|c| self.nodes[c.item].0)
    }
}
