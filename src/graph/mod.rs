//! Mode Graph
//!
//! Immutable directed weighted graph of device modes and the transitions
//! declared between them. Built once from static definitions and shared
//! read-only (through `Arc`) by every session; it performs no I/O.

pub mod planner;

use std::collections::HashMap;

use crate::error::{DefinitionError, Error, Result};
use crate::models::{Edge, Mode, Path, Strategy};

pub use planner::PathPlanner;

/// A declared mode and its outgoing edges
#[derive(Debug, Clone)]
pub struct ModeNode {
    /// Mode key
    pub mode: Mode,
    /// Whether the mode's identity cannot be confirmed from the prompt alone
    pub stateful: bool,
    /// Indices into the graph's edge list, in declaration order
    out_edges: Vec<usize>,
}

/// Directed, costed mode graph
#[derive(Debug, Clone, Default)]
pub struct ModeGraph {
    nodes: Vec<ModeNode>,
    index: HashMap<Mode, usize>,
    edges: Vec<Edge>,
}

impl ModeGraph {
    /// Start declaring a graph
    pub fn builder() -> ModeGraphBuilder {
        ModeGraphBuilder::new()
    }

    /// Path planner over this graph
    pub fn planner(&self) -> PathPlanner<'_> {
        PathPlanner::new(self)
    }

    /// Plan a path; see [`PathPlanner::get_path`]
    pub fn get_path(
        &self,
        from: &Mode,
        to: &Mode,
        strategy: Strategy,
        followpath: &[Mode],
    ) -> Result<Path> {
        self.planner().get_path(from, to, strategy, followpath)
    }

    pub fn contains(&self, mode: &Mode) -> bool {
        self.index.contains_key(mode)
    }

    /// Node index of a declared mode, or `UnknownMode`
    pub fn require(&self, mode: &Mode) -> Result<usize> {
        self.index
            .get(mode)
            .copied()
            .ok_or_else(|| Error::UnknownMode { mode: mode.clone() })
    }

    pub(crate) fn index_of(&self, mode: &Mode) -> Option<usize> {
        self.index.get(mode).copied()
    }

    pub(crate) fn node(&self, index: usize) -> &ModeNode {
        &self.nodes[index]
    }

    pub(crate) fn out_edges(&self, index: usize) -> &[usize] {
        &self.nodes[index].out_edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Declared modes in declaration order
    pub fn modes(&self) -> impl Iterator<Item = &Mode> {
        self.nodes.iter().map(|n| &n.mode)
    }

    /// Declared nodes in declaration order
    pub fn nodes(&self) -> &[ModeNode] {
        &self.nodes
    }

    /// All edges in declaration order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Outgoing edges of a mode in declaration order (empty for unknown modes)
    pub fn edges_from<'a>(&'a self, mode: &Mode) -> impl Iterator<Item = &'a Edge> + 'a {
        let out: &'a [usize] = match self.index.get(mode) {
            Some(&i) => &self.nodes[i].out_edges,
            None => &[],
        };
        out.iter().map(move |&e| &self.edges[e])
    }

    /// Cheapest declared edge between two modes, earliest declared on ties
    pub fn edge(&self, from: &Mode, to: &Mode) -> Option<&Edge> {
        self.edges_from(from)
            .filter(|e| &e.to == to)
            .min_by_key(|e| (e.cost, e.order))
    }

    pub fn is_stateful(&self, mode: &Mode) -> bool {
        self.index
            .get(mode)
            .map(|&i| self.nodes[i].stateful)
            .unwrap_or(false)
    }

    /// Declared modes sharing a textual name, in declaration order
    pub fn modes_named(&self, name: &str) -> Vec<&Mode> {
        self.modes().filter(|m| m.name() == name).collect()
    }
}

/// Declares modes and edges, then validates them into a [`ModeGraph`]
#[derive(Debug, Default)]
pub struct ModeGraphBuilder {
    declared: Vec<(Mode, bool, Vec<(Mode, u32)>)>,
}

impl ModeGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a mode and its outgoing `(destination, cost)` edges
    pub fn add_mode<M, I, T>(&mut self, mode: M, edges: I) -> &mut Self
    where
        M: Into<Mode>,
        I: IntoIterator<Item = (T, u32)>,
        T: Into<Mode>,
    {
        self.add_mode_with(mode, edges, false)
    }

    /// Declare a stateful mode
    pub fn add_stateful_mode<M, I, T>(&mut self, mode: M, edges: I) -> &mut Self
    where
        M: Into<Mode>,
        I: IntoIterator<Item = (T, u32)>,
        T: Into<Mode>,
    {
        self.add_mode_with(mode, edges, true)
    }

    /// Declare a mode with an explicit stateful flag
    pub fn add_mode_with<M, I, T>(&mut self, mode: M, edges: I, stateful: bool) -> &mut Self
    where
        M: Into<Mode>,
        I: IntoIterator<Item = (T, u32)>,
        T: Into<Mode>,
    {
        let edges = edges.into_iter().map(|(to, cost)| (to.into(), cost)).collect();
        self.declared.push((mode.into(), stateful, edges));
        self
    }

    /// Validate declarations and freeze the graph
    ///
    /// Every edge endpoint must be a declared mode and every mode is declared
    /// exactly once. Edge declaration order is preserved for tie-breaking.
    pub fn build(self) -> std::result::Result<ModeGraph, DefinitionError> {
        let mut graph = ModeGraph::default();

        for (mode, stateful, _) in &self.declared {
            if mode.name().trim().is_empty() {
                return Err(DefinitionError::EmptyModeName);
            }
            if graph.index.contains_key(mode) {
                return Err(DefinitionError::DuplicateMode(mode.clone()));
            }
            graph.index.insert(mode.clone(), graph.nodes.len());
            graph.nodes.push(ModeNode {
                mode: mode.clone(),
                stateful: *stateful,
                out_edges: Vec::new(),
            });
        }

        for (node_index, (from, _, edges)) in self.declared.into_iter().enumerate() {
            for (to, cost) in edges {
                if !graph.index.contains_key(&to) {
                    return Err(DefinitionError::UndeclaredEdgeTarget { from, to });
                }
                let order = graph.edges.len();
                graph.edges.push(Edge::new(from.clone(), to, cost, order));
                graph.nodes[node_index].out_edges.push(order);
            }
        }

        debug!(
            "Mode graph built: {} modes, {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }
}
