//! Mode Transitions

use serde::{Deserialize, Serialize};

use super::Mode;

/// A declared, directed transition between two modes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source mode
    pub from: Mode,
    /// Destination mode
    pub to: Mode,
    /// Non-negative traversal cost
    pub cost: u32,
    /// Position in declaration order, used only to break ties deterministically
    pub order: usize,
}

impl Edge {
    /// Create a new edge
    pub fn new(from: Mode, to: Mode, cost: u32, order: usize) -> Self {
        Self {
            from,
            to,
            cost,
            order,
        }
    }

    /// True when the edge connects `from` to `to`
    pub fn connects(&self, from: &Mode, to: &Mode) -> bool {
        &self.from == from && &self.to == to
    }
}
