//! Path promotion graph
//!
//! Paths (branches) fork from parent paths at an origin time. The graph is
//! stored child -> parent with the origin time as edge weight, so ancestry
//! queries walk outgoing edges.
//!
//! Origins are authored data. Cycles are found once at build time with
//! Kosaraju's SCC algorithm; a query whose walk reaches a cyclic path fails
//! with [`StampError::CyclicPathGraph`] instead of traversing it.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::error::{Result, StampError};
use crate::stamp::{ComponentId, StampTime};

/// A fork point: `path` was branched from `parent` at `time`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub parent: ComponentId,
    pub time: StampTime,
}

/// Builder for a [`PathGraph`]
#[derive(Debug, Default)]
pub struct PathGraphBuilder {
    graph: DiGraph<ComponentId, StampTime>,
    node_indices: HashMap<ComponentId, NodeIndex>,
}

impl PathGraphBuilder {
    fn node(&mut self, path: ComponentId) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&path) {
            return idx;
        }
        let idx = self.graph.add_node(path);
        self.node_indices.insert(path, idx);
        idx
    }

    /// Register a path without origins (a root)
    pub fn path(mut self, path: ComponentId) -> Self {
        self.node(path);
        self
    }

    /// Record that `child` forked from `parent` at `time`
    pub fn origin(mut self, child: ComponentId, parent: ComponentId, time: impl Into<StampTime>) -> Self {
        let from = self.node(child);
        let to = self.node(parent);
        self.graph.add_edge(from, to, time.into());
        self
    }

    pub fn build(self) -> PathGraph {
        let mut cyclic = HashSet::new();
        for scc in kosaraju_scc(&self.graph) {
            let self_origin = scc.len() == 1 && self.graph.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_origin {
                for idx in scc {
                    cyclic.insert(self.graph[idx]);
                }
            }
        }
        if !cyclic.is_empty() {
            debug!(count = cyclic.len(), "path graph contains cyclic origins");
        }

        PathGraph {
            graph: self.graph,
            node_indices: self.node_indices,
            cyclic,
        }
    }
}

/// Read-only promotion graph of paths
#[derive(Debug, Clone, Default)]
pub struct PathGraph {
    graph: DiGraph<ComponentId, StampTime>,
    node_indices: HashMap<ComponentId, NodeIndex>,
    /// Paths that sit on an origin cycle
    cyclic: HashSet<ComponentId>,
}

impl PathGraph {
    pub fn builder() -> PathGraphBuilder {
        PathGraphBuilder::default()
    }

    /// The usual two-path layout: development forked from master at `fork_time`
    pub fn development_from_master(fork_time: impl Into<StampTime>) -> Self {
        Self::builder()
            .path(crate::metadata::MASTER_PATH)
            .origin(
                crate::metadata::DEVELOPMENT_PATH,
                crate::metadata::MASTER_PATH,
                fork_time,
            )
            .build()
    }

    pub fn contains(&self, path: ComponentId) -> bool {
        self.node_indices.contains_key(&path)
    }

    pub fn path_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Direct origins of `path`, sorted by parent id
    pub fn origins(&self, path: ComponentId) -> Vec<Origin> {
        let Some(&idx) = self.node_indices.get(&path) else {
            return Vec::new();
        };
        let mut origins: Vec<Origin> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| Origin {
                parent: self.graph[e.target()],
                time: *e.weight(),
            })
            .collect();
        origins.sort_by_key(|o| (o.parent, o.time));
        origins
    }

    /// Is `candidate` the query path, or reachable from it through origins
    /// no later than `as_of`?
    pub fn is_ancestor(&self, candidate: ComponentId, query: ComponentId, as_of: StampTime) -> Result<bool> {
        Ok(self.distance(candidate, query, as_of)?.is_some())
    }

    /// Promotion hops on the shortest chain from `query` to `candidate`;
    /// `None` when unreachable
    pub fn distance(&self, candidate: ComponentId, query: ComponentId, as_of: StampTime) -> Result<Option<usize>> {
        let mut found = None;
        self.walk(query, as_of, |path, depth| {
            if path == candidate {
                found = Some(depth);
                return false;
            }
            true
        })?;
        Ok(found)
    }

    /// Every path visible from `query` at `as_of` with its distance,
    /// sorted by (distance, path)
    pub fn ancestors(&self, query: ComponentId, as_of: StampTime) -> Result<Vec<(ComponentId, usize)>> {
        let mut seen = HashSet::new();
        let mut ancestors = Vec::new();
        self.walk(query, as_of, |path, depth| {
            if seen.insert(path) {
                ancestors.push((path, depth));
            }
            true
        })?;
        ancestors.sort_by_key(|&(path, depth)| (depth, path));
        Ok(ancestors)
    }

    /// Breadth-first walk up the origin chains of `query`.
    ///
    /// An origin is taken only if it is no later than the bound carried so
    /// far, and its own time becomes the bound for the rest of the chain.
    /// `visit` sees every path first at its shortest depth; a path is seen
    /// again only when reached with a looser bound. Returning `false` stops
    /// the walk. Reaching a path on an origin cycle fails.
    fn walk(
        &self,
        query: ComponentId,
        as_of: StampTime,
        mut visit: impl FnMut(ComponentId, usize) -> bool,
    ) -> Result<()> {
        let Some(&start) = self.node_indices.get(&query) else {
            visit(query, 0);
            return Ok(());
        };

        // loosest bound each path has been queued with
        let mut reached: HashMap<NodeIndex, StampTime> = HashMap::from([(start, as_of)]);
        let mut queue = VecDeque::from([(start, as_of, 0usize)]);

        while let Some((idx, bound, depth)) = queue.pop_front() {
            let path = self.graph[idx];
            if self.cyclic.contains(&path) {
                warn!(%query, %path, "refusing to traverse cyclic path origins");
                return Err(StampError::CyclicPathGraph { path });
            }
            if !visit(path, depth) {
                return Ok(());
            }
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let time = *edge.weight();
                if time > bound {
                    continue;
                }
                let parent = edge.target();
                if reached.get(&parent).map_or(true, |&seen| time > seen) {
                    reached.insert(parent, time);
                    queue.push_back((parent, time, depth + 1));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ComponentId = ComponentId(100);
    const B: ComponentId = ComponentId(101);
    const C: ComponentId = ComponentId(102);
    const D: ComponentId = ComponentId(103);

    fn t(millis: i64) -> StampTime {
        StampTime(millis)
    }

    #[test]
    fn test_path_is_its_own_ancestor() {
        let graph = PathGraph::builder().path(A).build();
        assert!(graph.is_ancestor(A, A, t(0)).unwrap());
        assert_eq!(graph.distance(A, A, t(0)).unwrap(), Some(0));
    }

    #[test]
    fn test_unknown_paths_are_roots() {
        let graph = PathGraph::default();
        assert_eq!(graph.distance(A, A, t(5)).unwrap(), Some(0));
        assert_eq!(graph.distance(B, A, t(5)).unwrap(), None);
    }

    #[test]
    fn test_origin_time_bounds_ancestry() {
        // B forked from A at 10
        let graph = PathGraph::builder().origin(B, A, 10).build();
        assert!(graph.is_ancestor(A, B, t(10)).unwrap());
        assert!(graph.is_ancestor(A, B, t(50)).unwrap());
        assert!(!graph.is_ancestor(A, B, t(9)).unwrap());
        // promotion is one-way
        assert!(!graph.is_ancestor(B, A, t(50)).unwrap());
    }

    #[test]
    fn test_distance_takes_shortest_chain() {
        // D -> C -> B -> A and D -> A directly
        let graph = PathGraph::builder()
            .origin(B, A, 10)
            .origin(C, B, 20)
            .origin(D, C, 30)
            .origin(D, A, 40)
            .build();

        assert_eq!(graph.distance(A, D, t(100)).unwrap(), Some(1));
        assert_eq!(graph.distance(A, D, t(35)).unwrap(), Some(3));
        assert_eq!(graph.distance(B, D, t(100)).unwrap(), Some(2));
        assert_eq!(graph.distance(C, D, t(25)).unwrap(), None);
    }

    #[test]
    fn test_nested_origin_bounds_tighten() {
        // C forked from B at 20, B forked from A at 30: at the fork point
        // of C, B had not yet forked from A.
        let graph = PathGraph::builder().origin(B, A, 30).origin(C, B, 20).build();
        assert_eq!(graph.distance(A, C, t(100)).unwrap(), None);
        assert_eq!(graph.distance(A, B, t(100)).unwrap(), Some(1));
    }

    #[test]
    fn test_parent_revisions_after_fork_stay_reachable() {
        // ancestry depends on the origin time only, never on revision times
        let graph = PathGraph::builder().origin(B, A, 10).build();
        assert_eq!(graph.distance(A, B, t(100)).unwrap(), Some(1));
        assert_eq!(graph.distance(A, B, t(9)).unwrap(), None);
    }

    #[test]
    fn test_layered_diamonds_resolve_quickly() {
        // every path forks from both paths of the layer above: 2^40 chains
        let layers = 40;
        let id = |layer: i32, side: i32| ComponentId(1_000 + layer * 2 + side);
        let mut builder = PathGraph::builder();
        for layer in 1..=layers {
            for side in 0..2 {
                let time = i64::from(1_000 + layer);
                builder = builder
                    .origin(id(layer, side), id(layer - 1, 0), time)
                    .origin(id(layer, side), id(layer - 1, 1), time);
            }
        }
        let graph = builder.path(D).build();
        let bottom = id(layers, 0);

        assert_eq!(graph.distance(D, bottom, StampTime::LATEST).unwrap(), None);
        assert_eq!(
            graph.distance(id(0, 1), bottom, StampTime::LATEST).unwrap(),
            Some(layers as usize)
        );
        assert_eq!(graph.ancestors(bottom, StampTime::LATEST).unwrap().len(), 2 * layers as usize + 1);
    }

    #[test]
    fn test_cycle_is_detected_not_traversed() {
        let graph = PathGraph::builder().origin(A, B, 0).origin(B, A, 0).build();

        let err = graph.is_ancestor(C, A, StampTime::LATEST).unwrap_err();
        assert!(matches!(err, StampError::CyclicPathGraph { .. }));

        let err = graph.distance(B, A, StampTime::LATEST).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_self_origin_is_a_cycle() {
        let graph = PathGraph::builder().origin(A, A, 0).build();
        assert!(graph.distance(A, A, t(1)).is_err());
    }

    #[test]
    fn test_cycle_elsewhere_does_not_poison_unrelated_paths() {
        let graph = PathGraph::builder()
            .origin(A, B, 0)
            .origin(B, A, 0)
            .origin(D, C, 5)
            .build();
        assert_eq!(graph.distance(C, D, t(10)).unwrap(), Some(1));
    }

    #[test]
    fn test_cycle_behind_later_origin_is_not_reached() {
        // C forked from A at 50; A and B form a cycle
        let graph = PathGraph::builder()
            .origin(C, A, 50)
            .origin(A, B, 0)
            .origin(B, A, 0)
            .build();
        assert_eq!(graph.distance(A, C, t(10)).unwrap(), None);
        assert!(graph.distance(A, C, t(60)).unwrap_err().is_integrity());
    }

    #[test]
    fn test_ancestors_sorted_by_distance() {
        let graph = PathGraph::builder()
            .origin(B, A, 10)
            .origin(C, B, 20)
            .build();
        let ancestors = graph.ancestors(C, t(100)).unwrap();
        assert_eq!(ancestors, vec![(C, 0), (B, 1), (A, 2)]);
    }

    #[test]
    fn test_origins_listing() {
        let graph = PathGraph::development_from_master(1_000);
        let origins = graph.origins(crate::metadata::DEVELOPMENT_PATH);
        assert_eq!(
            origins,
            vec![Origin {
                parent: crate::metadata::MASTER_PATH,
                time: t(1_000)
            }]
        );
        assert!(graph.origins(crate::metadata::MASTER_PATH).is_empty());
    }
}
