//! Cost-aware route finding over a rail graph.
//!
//! `RouteFinder` stitches ordered waypoint groups (platform boundary nodes)
//! into a continuous path with a multi-source Dijkstra, and answers
//! single-source/many-sink variant queries for depot discovery.
//!
//! The finder keeps a per-instance density counter for every directed edge,
//! seeded from the node's out-degree at graph-build time and incremented
//! each time a computed path traverses the edge. Later searches on the same
//! instance are pulled toward corridors chosen by earlier ones, so repeated
//! calls are order-dependent by design. The density discount may push an
//! edge's cost below zero; that is intentional and must not be clamped.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::blockpos::{BlockPos, NodeId};
use crate::graph::{PreferredCurve, RailConnection, RailGraph};

/// Global bound on queue pops per search; pathological graphs terminate
/// with "no path" instead of running away.
pub const MAX_VISITED_NODES: usize = 20_000;

const SECONDARY_DIR_PENALTY: f64 = 12.0;
const PRIMARY_REVERSE_PENALTY: f64 = 20.0;
const SECONDARY_REVERSE_PENALTY: f64 = 10.0;
const PREFERRED_SECONDARY_PENALTY: f64 = 6.0;
const DENSITY_DISCOUNT: f64 = 0.5;

/// A platform identifier plus its candidate boundary nodes (1-2, deduplicated).
#[derive(Debug, Clone)]
pub struct PlatformNode {
    pub platform_id: i64,
    pub nodes: Vec<NodeId>,
}

impl PlatformNode {
    /// Build from up to two candidate nodes, dropping a coinciding second.
    pub fn new(platform_id: i64, first: NodeId, second: Option<NodeId>) -> Self {
        let mut nodes = vec![first];
        if let Some(second) = second {
            if second != first {
                nodes.push(second);
            }
        }
        Self { platform_id, nodes }
    }
}

/// One traversed edge of a reconstructed path, carrying the forward
/// metadata from `start` to `end`.
#[derive(Debug, Clone)]
pub struct PathSegment {
    pub start: NodeId,
    pub end: NodeId,
    pub connection: RailConnection,
}

/// A computed path: ordered points plus the parallel segment list.
#[derive(Debug, Clone, Default)]
pub struct PathResult {
    pub points: Vec<BlockPos>,
    pub segments: Vec<PathSegment>,
}

/// Pathfinder bound to one graph, owning that graph's density map.
///
/// Never share a finder across unrelated graphs or scopes.
pub struct RouteFinder<'g> {
    graph: &'g RailGraph,
    density: HashMap<(NodeId, NodeId), u64>,
}

impl<'g> RouteFinder<'g> {
    /// Create a finder and seed every directed edge's density with its
    /// origin's out-degree, an approximation of how major the junction is.
    pub fn new(graph: &'g RailGraph) -> Self {
        let mut density = HashMap::new();
        for (u, _) in graph.nodes() {
            let degree = graph.degree(u) as u64;
            for v in graph.neighbours(u) {
                density.insert((u, v), degree);
            }
        }
        Self { graph, density }
    }

    /// Current traversal density of a directed edge.
    pub fn density(&self, from: NodeId, to: NodeId) -> u64 {
        self.density.get(&(from, to)).copied().unwrap_or(0)
    }

    /// Stitch an ordered list of platform waypoint groups into one path.
    ///
    /// Zero platforms yield `None`; a single platform yields its own node
    /// positions with no segments. With two or more, each consecutive pair
    /// is connected by a shortest path and the pieces are concatenated,
    /// dropping a duplicated joint point. Each pairwise path bumps edge
    /// densities before the next pair is searched, so path cost within one
    /// call reflects selections already made by that call.
    pub fn find_route(&mut self, platforms: &[PlatformNode]) -> Option<PathResult> {
        match platforms {
            [] => None,
            [single] => {
                let points = single
                    .nodes
                    .iter()
                    .filter_map(|id| self.graph.position(*id).copied())
                    .collect();
                Some(PathResult {
                    points,
                    segments: Vec::new(),
                })
            }
            _ => {
                let mut combined = PathResult::default();
                for pair in platforms.windows(2) {
                    let leg = self.find_path_between(&pair[0].nodes, &pair[1].nodes)?;
                    self.record_traversal(&leg);
                    append_leg(&mut combined, leg);
                }
                Some(combined)
            }
        }
    }

    /// For each start node independently, find one shortest path to any
    /// node in the target set, bumping density per discovered path.
    pub fn find_route_variants(
        &mut self,
        start_nodes: &[NodeId],
        target_nodes: &[NodeId],
    ) -> Vec<PathResult> {
        let mut results = Vec::new();
        for &start in start_nodes {
            if let Some(path) = self.find_path_between(&[start], target_nodes) {
                self.record_traversal(&path);
                results.push(path);
            }
        }
        results
    }

    /// Multi-source Dijkstra from all `starts` to the cheapest node of
    /// `targets`. Returns `None` when the target set is unreachable or the
    /// expansion cap is exhausted.
    pub fn find_path_between(&self, starts: &[NodeId], targets: &[NodeId]) -> Option<PathResult> {
        let targets: HashSet<NodeId> = targets
            .iter()
            .copied()
            .filter(|id| self.graph.contains(*id))
            .collect();
        if targets.is_empty() {
            return None;
        }

        let mut distances: HashMap<NodeId, f64> = HashMap::new();
        let mut parents: HashMap<NodeId, Option<NodeId>> = HashMap::new();
        let mut queue = BinaryHeap::new();

        for &start in starts {
            if !self.graph.contains(start) {
                continue;
            }
            distances.insert(start, 0.0);
            parents.insert(start, None);
            queue.push(QueueEntry::new(start, 0.0));
        }
        if queue.is_empty() {
            return None;
        }

        let mut expansions = 0usize;
        while let Some(entry) = queue.pop() {
            let best = match distances.get(&entry.node) {
                Some(d) if *d < entry.cost.0 => continue,
                Some(d) => *d,
                None => continue,
            };

            if targets.contains(&entry.node) {
                return Some(self.reconstruct(&parents, entry.node));
            }

            expansions += 1;
            if expansions >= MAX_VISITED_NODES {
                return None;
            }

            for next in self.graph.neighbours(entry.node) {
                let Some(connection) = self.graph.connection(entry.node, next) else {
                    continue;
                };
                let cost = best + self.edge_cost(entry.node, next, connection);
                if cost < *distances.get(&next).unwrap_or(&f64::INFINITY) {
                    distances.insert(next, cost);
                    parents.insert(next, Some(entry.node));
                    queue.push(QueueEntry::new(next, cost));
                }
            }
        }

        None
    }

    fn edge_cost(&self, from: NodeId, to: NodeId, connection: &RailConnection) -> f64 {
        let (Some(a), Some(b)) = (self.graph.position(from), self.graph.position(to)) else {
            return f64::INFINITY;
        };
        let mut cost = a.distance_to(b);

        if connection.is_secondary_dir {
            cost += SECONDARY_DIR_PENALTY;
        }
        if connection.primary.map(|c| c.reverse).unwrap_or(false) {
            cost += PRIMARY_REVERSE_PENALTY;
        }
        if connection.secondary.map(|c| c.reverse).unwrap_or(false) {
            cost += SECONDARY_REVERSE_PENALTY;
        }
        if connection.preferred_curve == Some(PreferredCurve::Secondary) {
            cost += PREFERRED_SECONDARY_PENALTY;
        }

        cost - DENSITY_DISCOUNT * (1.0 + self.density(from, to) as f64).ln()
    }

    /// Bump the density of every directed edge a path traversed.
    pub(crate) fn record_traversal(&mut self, path: &PathResult) {
        for segment in &path.segments {
            *self.density.entry((segment.start, segment.end)).or_insert(0) += 1;
        }
    }

    fn reconstruct(&self, parents: &HashMap<NodeId, Option<NodeId>>, goal: NodeId) -> PathResult {
        let mut ids = Vec::new();
        let mut current = Some(goal);
        while let Some(node) = current {
            ids.push(node);
            current = parents.get(&node).copied().flatten();
        }
        ids.reverse();

        let points = ids
            .iter()
            .filter_map(|id| self.graph.position(*id).copied())
            .collect();
        let segments = ids
            .windows(2)
            .filter_map(|pair| {
                self.graph
                    .connection(pair[0], pair[1])
                    .map(|connection| PathSegment {
                        start: pair[0],
                        end: pair[1],
                        connection: connection.clone(),
                    })
            })
            .collect();

        PathResult { points, segments }
    }
}

fn append_leg(combined: &mut PathResult, leg: PathResult) {
    let mut points = leg.points.into_iter();
    if let (Some(last), Some(first)) = (combined.points.last(), points.as_slice().first()) {
        if last == first {
            points.next();
        }
    }
    combined.points.extend(points);
    combined.segments.extend(leg.segments);
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    node: NodeId,
    cost: FloatOrd,
}

impl QueueEntry {
    fn new(node: NodeId, cost: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
