//! Planned Paths
//!
//! A path lists modes from source to destination, both included. Each step
//! carries the cost of the edge used to reach it (0 for the source). An empty
//! path means the device is already at the destination.

use serde::{Deserialize, Serialize};

use super::Mode;

/// One mode in a planned path and the cost of the edge that reached it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub mode: Mode,
    pub cost: u32,
}

/// A single edge traversal taken from a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    /// Position of the hop within its path, starting at 0
    pub index: usize,
    pub from: Mode,
    pub to: Mode,
    pub cost: u32,
}

/// Ordered sequence of modes from source to destination inclusive
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// The empty path: no transition required
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Build a path from steps; the first step is the source
    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of modes in the path (hops + 1, or 0 when empty)
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Number of edge traversals
    pub fn hop_count(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn source(&self) -> Option<&Mode> {
        self.steps.first().map(|s| &s.mode)
    }

    pub fn destination(&self) -> Option<&Mode> {
        self.steps.last().map(|s| &s.mode)
    }

    /// Modes in order
    pub fn modes(&self) -> Vec<Mode> {
        self.steps.iter().map(|s| s.mode.clone()).collect()
    }

    /// Mode keys in order, e.g. `["s1", "s2", "s6", "s5"]`
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.mode.to_string()).collect()
    }

    /// `(mode, cost)` pairs with 0 for the source
    pub fn with_cost(&self) -> Vec<(Mode, u32)> {
        self.steps
            .iter()
            .map(|s| (s.mode.clone(), s.cost))
            .collect()
    }

    /// Sum of edge costs along the path
    pub fn total_cost(&self) -> u64 {
        self.steps.iter().skip(1).map(|s| u64::from(s.cost)).sum()
    }

    /// Consecutive (from, to) pairs
    pub fn hops(&self) -> Vec<Hop> {
        self.steps
            .windows(2)
            .enumerate()
            .map(|(index, pair)| Hop {
                index,
                from: pair[0].mode.clone(),
                to: pair[1].mode.clone(),
                cost: pair[1].cost,
            })
            .collect()
    }

    /// Append another path that starts where this one ends
    pub(crate) fn extend_with(&mut self, segment: Path) {
        if self.steps.is_empty() {
            self.steps = segment.steps;
            return;
        }
        self.steps.extend(segment.steps.into_iter().skip(1));
    }
}
