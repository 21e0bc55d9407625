//! Path Selection Strategies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Optimization rule used when planning a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Lowest summed edge cost; ties broken by fewest hops, then declaration order
    #[default]
    MinCost,
    /// Highest summed edge cost among simple paths (burn-in / coverage runs)
    MaxCost,
    /// Fewest hops; ties broken by lowest summed cost
    MinHop,
}

impl Strategy {
    /// Get a string representation of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::MinCost => "mincost",
            Strategy::MaxCost => "maxcost",
            Strategy::MinHop => "minhop",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    /// Case-insensitive; accepts `mincost`, `min_cost` and `min-cost` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "mincost" => Ok(Strategy::MinCost),
            "maxcost" => Ok(Strategy::MaxCost),
            "minhop" | "minhops" => Ok(Strategy::MinHop),
            _ => Err(format!("unknown strategy '{}'", s)),
        }
    }
}
