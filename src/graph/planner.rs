//! Path Planning
//!
//! Computes the ordered list of modes to traverse from a source to a
//! destination, under one of three strategies:
//!
//! - `MinCost`: Dijkstra over labels `(cost, hops, edge order)`
//! - `MinHop`: Dijkstra over labels `(hops, cost, edge order)`
//! - `MaxCost`: exhaustive simple-path search, highest cost wins, fewest hops
//!   and then earliest declared edges on ties
//!
//! Labels compare lexicographically and only grow when a path is extended,
//! which keeps Dijkstra exact with the extra tie-break components. Edge order
//! is the position of the edge in the declaration, so equal candidates always
//! resolve the same way.
//!
//! Forced waypoints (`followpath`) are best effort: undeclared or unreachable
//! waypoints are skipped, the plan continues from the last anchored waypoint,
//! and trailing waypoints are abandoned if the destination cannot be reached
//! from them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::ModeGraph;
use crate::error::{Error, Result};
use crate::models::{Mode, Path, PathStep, Strategy};

/// Planner borrowing an immutable [`ModeGraph`]
#[derive(Debug, Clone, Copy)]
pub struct PathPlanner<'g> {
    graph: &'g ModeGraph,
}

/// Lexicographic search label; `edges` doubles as the declaration-order key
#[derive(Debug, Clone, PartialEq, Eq)]
struct Label {
    primary: u64,
    secondary: u64,
    edges: Vec<usize>,
}

impl Label {
    fn origin() -> Self {
        Self {
            primary: 0,
            secondary: 0,
            edges: Vec::new(),
        }
    }

    fn extend(&self, edge: usize, cost: u32, strategy: Strategy) -> Self {
        let (primary, secondary) = match strategy {
            Strategy::MinHop => (self.primary + 1, self.secondary + u64::from(cost)),
            _ => (self.primary + u64::from(cost), self.secondary + 1),
        };
        let mut edges = Vec::with_capacity(self.edges.len() + 1);
        edges.extend_from_slice(&self.edges);
        edges.push(edge);
        Self {
            primary,
            secondary,
            edges,
        }
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.primary
            .cmp(&other.primary)
            .then_with(|| self.secondary.cmp(&other.secondary))
            .then_with(|| self.edges.cmp(&other.edges))
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Wrapper for BinaryHeap to get min-heap behavior
#[derive(Debug, PartialEq, Eq)]
struct MinHeapEntry {
    label: Label,
    node: usize,
}

impl Ord for MinHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .label
            .cmp(&self.label)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for MinHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best simple path found so far by the MaxCost search
struct MaxCostBest {
    cost: u64,
    edges: Vec<usize>,
}

impl<'g> PathPlanner<'g> {
    pub fn new(graph: &'g ModeGraph) -> Self {
        Self { graph }
    }

    /// Plan a path from `from` to `to`
    ///
    /// Returns an empty path when `from == to`, whatever the strategy or
    /// waypoints. Undeclared endpoints fail eagerly with `UnknownMode`;
    /// waypoints are best effort and never raise.
    ///
    /// # Errors
    ///
    /// - `UnknownMode` if `from` or `to` was never declared
    /// - `NoPathFound` if `to` is unreachable from `from`
    pub fn get_path(
        &self,
        from: &Mode,
        to: &Mode,
        strategy: Strategy,
        followpath: &[Mode],
    ) -> Result<Path> {
        let source = self.graph.require(from)?;
        let destination = self.graph.require(to)?;

        if source == destination {
            return Ok(Path::empty());
        }

        let no_path = || Error::NoPathFound {
            from: from.clone(),
            to: to.clone(),
        };

        if followpath.is_empty() {
            let path = self.segment(source, destination, strategy).ok_or_else(no_path)?;
            debug!(
                "Planned {} -> {} ({}): {} hop(s), cost {}",
                from,
                to,
                strategy,
                path.hop_count(),
                path.total_cost()
            );
            return Ok(path);
        }

        // Anchor each resolvable waypoint in order
        let mut anchored: Vec<(usize, Path)> = Vec::new();
        let mut anchor = source;
        for waypoint in followpath {
            let Some(target) = self.graph.index_of(waypoint) else {
                debug!("Skipping undeclared waypoint '{}'", waypoint);
                continue;
            };
            if target == anchor {
                continue;
            }
            match self.segment(anchor, target, strategy) {
                Some(segment) => {
                    anchored.push((target, segment));
                    anchor = target;
                }
                None => {
                    debug!(
                        "Skipping waypoint '{}': unreachable from '{}'",
                        waypoint,
                        self.graph.node(anchor).mode
                    );
                }
            }
        }

        // Connect the last anchor to the destination, abandoning trailing
        // waypoints that cannot reach it
        loop {
            let tail_from = anchored.last().map(|(w, _)| *w).unwrap_or(source);
            if let Some(tail) = self.segment(tail_from, destination, strategy) {
                let mut path = Path::empty();
                for (_, segment) in anchored {
                    path.extend_with(segment);
                }
                path.extend_with(tail);
                debug!(
                    "Planned {} -> {} ({}) via waypoints: {} hop(s), cost {}",
                    from,
                    to,
                    strategy,
                    path.hop_count(),
                    path.total_cost()
                );
                return Ok(path);
            }
            match anchored.pop() {
                Some((abandoned, _)) => debug!(
                    "Abandoning waypoint '{}': '{}' unreachable from it",
                    self.graph.node(abandoned).mode,
                    to
                ),
                None => return Err(no_path()),
            }
        }
    }

    /// Plan a path and return `(mode, edge cost)` pairs, 0 for the source
    pub fn get_path_with_cost(
        &self,
        from: &Mode,
        to: &Mode,
        strategy: Strategy,
        followpath: &[Mode],
    ) -> Result<Vec<(Mode, u32)>> {
        Ok(self.get_path(from, to, strategy, followpath)?.with_cost())
    }

    /// Single segment between two node indices; a one-step path when equal
    fn segment(&self, source: usize, destination: usize, strategy: Strategy) -> Option<Path> {
        if source == destination {
            return Some(Path::from_steps(vec![PathStep {
                mode: self.graph.node(source).mode.clone(),
                cost: 0,
            }]));
        }

        let edges = match strategy {
            Strategy::MinCost | Strategy::MinHop => self.search_labelled(source, destination, strategy),
            Strategy::MaxCost => self.search_max_cost(source, destination),
        }?;

        Some(self.path_from_edges(source, &edges))
    }

    fn path_from_edges(&self, source: usize, edges: &[usize]) -> Path {
        let all_edges = self.graph.edges();
        let mut steps = Vec::with_capacity(edges.len() + 1);
        steps.push(PathStep {
            mode: self.graph.node(source).mode.clone(),
            cost: 0,
        });
        for &e in edges {
            steps.push(PathStep {
                mode: all_edges[e].to.clone(),
                cost: all_edges[e].cost,
            });
        }
        Path::from_steps(steps)
    }

    /// Dijkstra with lexicographic labels
    fn search_labelled(&self, source: usize, destination: usize, strategy: Strategy) -> Option<Vec<usize>> {
        let all_edges = self.graph.edges();
        let mut best: Vec<Option<Label>> = vec![None; self.graph.node_count()];
        let mut heap: BinaryHeap<MinHeapEntry> = BinaryHeap::new();

        best[source] = Some(Label::origin());
        heap.push(MinHeapEntry {
            label: Label::origin(),
            node: source,
        });

        while let Some(MinHeapEntry { label, node }) = heap.pop() {
            // Stale entry: a better label was found after this one was queued
            if best[node].as_ref() != Some(&label) {
                continue;
            }
            if node == destination {
                return Some(label.edges);
            }

            for &e in self.graph.out_edges(node) {
                let edge = &all_edges[e];
                let Some(next) = self.graph.index_of(&edge.to) else {
                    continue;
                };
                let candidate = label.extend(e, edge.cost, strategy);
                let improves = best[next].as_ref().map_or(true, |current| candidate < *current);
                if improves {
                    best[next] = Some(candidate.clone());
                    heap.push(MinHeapEntry {
                        label: candidate,
                        node: next,
                    });
                }
            }
        }

        None
    }

    /// Highest-cost simple path, explored depth-first in edge declaration order
    fn search_max_cost(&self, source: usize, destination: usize) -> Option<Vec<usize>> {
        let mut visited = vec![false; self.graph.node_count()];
        let mut current = Vec::new();
        let mut best: Option<MaxCostBest> = None;

        visited[source] = true;
        self.explore_simple_paths(source, destination, 0, &mut visited, &mut current, &mut best);

        best.map(|b| b.edges)
    }

    fn explore_simple_paths(
        &self,
        node: usize,
        destination: usize,
        cost: u64,
        visited: &mut [bool],
        current: &mut Vec<usize>,
        best: &mut Option<MaxCostBest>,
    ) {
        if node == destination {
            // Depth-first order visits edge sequences lexicographically, so the
            // first path at a given (cost, hops) is the earliest declared one
            let better = match best {
                None => true,
                Some(b) => cost > b.cost || (cost == b.cost && current.len() < b.edges.len()),
            };
            if better {
                *best = Some(MaxCostBest {
                    cost,
                    edges: current.clone(),
                });
            }
            return;
        }

        let all_edges = self.graph.edges();
        for &e in self.graph.out_edges(node) {
            let edge = &all_edges[e];
            let Some(next) = self.graph.index_of(&edge.to) else {
                continue;
            };
            if visited[next] {
                continue;
            }
            visited[next] = true;
            current.push(e);
            self.explore_simple_paths(
                next,
                destination,
                cost + u64::from(edge.cost),
                visited,
                current,
                best,
            );
            current.pop();
            visited[next] = false;
        }
    }
}
