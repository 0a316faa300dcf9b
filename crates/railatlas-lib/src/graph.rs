//! Rail graph construction.
//!
//! Turns a flat collection of rail-segment records into an undirected
//! multigraph keyed by packed node identifiers. Adjacency is symmetric;
//! connection metadata is directional, with the reverse direction
//! synthesized from the forward record.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blockpos::{BlockPos, NodeId};
use crate::records::{CurveRecord, RailRecord};

/// Which of the two curve parameterizations a renderer should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredCurve {
    Primary,
    Secondary,
}

/// Per-direction metadata for one graph edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailConnection {
    pub rail_type: Option<String>,
    pub transport_mode: Option<String>,
    pub is_secondary_dir: bool,
    pub primary: Option<CurveRecord>,
    pub secondary: Option<CurveRecord>,
    pub y_start: f64,
    pub y_end: f64,
    pub vertical_curve_radius: Option<f64>,
    pub preferred_curve: Option<PreferredCurve>,
}

impl RailConnection {
    /// Choose the curve to render: whichever is not flagged `reverse`, with
    /// ties and absences falling back to primary.
    pub fn derive_preferred(
        primary: Option<&CurveRecord>,
        secondary: Option<&CurveRecord>,
    ) -> Option<PreferredCurve> {
        match (primary, secondary) {
            (Some(p), _) if !p.reverse => Some(PreferredCurve::Primary),
            (_, Some(s)) if !s.reverse => Some(PreferredCurve::Secondary),
            (Some(_), _) => Some(PreferredCurve::Primary),
            _ => None,
        }
    }

    /// Metadata for travelling this edge in the opposite direction.
    ///
    /// Flips each curve's `reverse` flag and swaps the vertical endpoints,
    /// but carries `preferred_curve` over unchanged: the rendered curve must
    /// not flip with the direction of travel.
    pub fn reversed(&self) -> Self {
        let flip = |curve: &Option<CurveRecord>| {
            curve.map(|c| CurveRecord {
                reverse: !c.reverse,
                ..c
            })
        };
        Self {
            rail_type: self.rail_type.clone(),
            transport_mode: self.transport_mode.clone(),
            is_secondary_dir: self.is_secondary_dir,
            primary: flip(&self.primary),
            secondary: flip(&self.secondary),
            y_start: self.y_end,
            y_end: self.y_start,
            vertical_curve_radius: self.vertical_curve_radius,
            preferred_curve: self.preferred_curve,
        }
    }
}

/// Undirected multigraph over packed node identifiers.
///
/// Invariant: every id present in `adjacency` or `connections` also exists
/// in `positions`, and adjacency is symmetric.
#[derive(Debug, Clone, Default)]
pub struct RailGraph {
    positions: HashMap<NodeId, BlockPos>,
    adjacency: HashMap<NodeId, HashSet<NodeId>>,
    connections: HashMap<NodeId, HashMap<NodeId, RailConnection>>,
}

impl RailGraph {
    /// Build a graph from the rail records of one scope.
    ///
    /// Records without a usable node position are skipped. Returns `None`
    /// when no nodes were registered, signalling callers to fall back to
    /// non-graph geometry.
    pub fn build(rails: &[RailRecord]) -> Option<Self> {
        let mut graph = RailGraph::default();
        let mut skipped = 0usize;

        for rail in rails {
            let Some(packed) = rail.node_pos else {
                skipped += 1;
                continue;
            };
            let from = graph.register(packed);

            for conn in &rail.connections {
                let Some(target_packed) = conn.target_node_pos else {
                    skipped += 1;
                    continue;
                };
                let to = graph.register(target_packed);

                graph.adjacency.entry(from).or_default().insert(to);
                graph.adjacency.entry(to).or_default().insert(from);

                let forward = RailConnection {
                    rail_type: conn.rail_type.clone(),
                    transport_mode: conn.transport_mode.clone(),
                    is_secondary_dir: conn.is_secondary_dir,
                    primary: conn.primary,
                    secondary: conn.secondary,
                    y_start: conn.y_start,
                    y_end: conn.y_end,
                    vertical_curve_radius: conn.vertical_curve_radius,
                    preferred_curve: RailConnection::derive_preferred(
                        conn.primary.as_ref(),
                        conn.secondary.as_ref(),
                    ),
                };
                let backward = forward.reversed();

                graph.connections.entry(from).or_default().insert(to, forward);
                graph
                    .connections
                    .entry(to)
                    .or_default()
                    .entry(from)
                    .or_insert(backward);
            }
        }

        if skipped > 0 {
            debug!(skipped, "skipped rail entries without decodable positions");
        }

        if graph.positions.is_empty() {
            return None;
        }
        Some(graph)
    }

    fn register(&mut self, packed: NodeId) -> NodeId {
        self.positions
            .entry(packed)
            .or_insert_with(|| BlockPos::unpack(packed));
        packed
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<&BlockPos> {
        self.positions.get(&id)
    }

    /// Iterate all registered node ids with their positions.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &BlockPos)> {
        self.positions.iter().map(|(id, pos)| (*id, pos))
    }

    /// Neighbour set of a node (empty for unknown ids).
    pub fn neighbours(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.get(&id).into_iter().flatten().copied()
    }

    /// Out-degree of a node at build time.
    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency.get(&id).map(HashSet::len).unwrap_or(0)
    }

    /// Directional metadata for the edge `from -> to`.
    pub fn connection(&self, from: NodeId, to: NodeId) -> Option<&RailConnection> {
        self.connections.get(&from).and_then(|m| m.get(&to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{chain_rails, rail, straight_connection};

    #[test]
    fn empty_input_yields_no_graph() {
        assert!(RailGraph::build(&[]).is_none());
    }

    #[test]
    fn undecodable_records_are_skipped_without_failing() {
        let mut bad = rail(1, BlockPos::new(0, 0, 0));
        bad.node_pos = None;
        let good = rail(2, BlockPos::new(5, 0, 5));
        let graph = RailGraph::build(&[bad, good]).expect("one node registered");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let rails = chain_rails(&[
            BlockPos::new(0, 0, 0),
            BlockPos::new(0, 0, 10),
            BlockPos::new(0, 0, 20),
        ]);
        let graph = RailGraph::build(&rails).unwrap();

        for (u, _) in graph.nodes() {
            for v in graph.neighbours(u) {
                assert!(
                    graph.neighbours(v).any(|w| w == u),
                    "edge {u} -> {v} missing its mirror"
                );
            }
        }
    }

    #[test]
    fn every_connection_endpoint_has_a_position() {
        let rails = chain_rails(&[
            BlockPos::new(0, 0, 0),
            BlockPos::new(0, 0, 10),
            BlockPos::new(10, 0, 10),
        ]);
        let graph = RailGraph::build(&rails).unwrap();
        for (u, _) in graph.nodes() {
            for v in graph.neighbours(u) {
                assert!(graph.position(v).is_some());
                assert!(graph.connection(u, v).is_some());
            }
        }
    }

    #[test]
    fn reverse_metadata_swaps_elevation_and_flips_curves() {
        let a = BlockPos::new(0, 4, 0);
        let b = BlockPos::new(0, 8, 10);
        let mut conn = straight_connection(b);
        conn.y_start = 4.0;
        conn.y_end = 8.0;
        conn.primary = Some(CurveRecord {
            h: 1.0,
            k: 2.0,
            r: 3.0,
            t_start: 0.0,
            t_end: 1.0,
            reverse: false,
            is_straight: true,
        });
        conn.secondary = Some(CurveRecord {
            h: 4.0,
            k: 5.0,
            r: 6.0,
            t_start: 0.0,
            t_end: 1.0,
            reverse: true,
            is_straight: false,
        });
        let mut record = rail(1, a);
        record.connections = vec![conn];

        let graph = RailGraph::build(&[record]).unwrap();
        let forward = graph.connection(a.pack(), b.pack()).unwrap();
        let backward = graph.connection(b.pack(), a.pack()).unwrap();

        assert_eq!(backward.y_start, forward.y_end);
        assert_eq!(backward.y_end, forward.y_start);
        assert_eq!(
            backward.primary.unwrap().reverse,
            !forward.primary.unwrap().reverse
        );
        assert_eq!(
            backward.secondary.unwrap().reverse,
            !forward.secondary.unwrap().reverse
        );
        assert_eq!(backward.preferred_curve, forward.preferred_curve);
    }

    #[test]
    fn preferred_curve_avoids_reversed_curves() {
        let fwd = CurveRecord {
            h: 0.0,
            k: 0.0,
            r: 0.0,
            t_start: 0.0,
            t_end: 1.0,
            reverse: false,
            is_straight: true,
        };
        let rev = CurveRecord {
            reverse: true,
            ..fwd
        };

        assert_eq!(
            RailConnection::derive_preferred(Some(&fwd), Some(&rev)),
            Some(PreferredCurve::Primary)
        );
        assert_eq!(
            RailConnection::derive_preferred(Some(&rev), Some(&fwd)),
            Some(PreferredCurve::Secondary)
        );
        // Both reversed: fall back to primary.
        assert_eq!(
            RailConnection::derive_preferred(Some(&rev), Some(&rev)),
            Some(PreferredCurve::Primary)
        );
        // Only a reversed secondary: nothing usable to fall back on.
        assert_eq!(RailConnection::derive_preferred(None, Some(&rev)), None);
        assert_eq!(RailConnection::derive_preferred(None, None), None);
    }
}
