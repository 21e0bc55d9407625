//! Core data models for modepilot
//!
//! This module contains the data structures shared by planning and
//! execution: mode keys, declared edges, strategies, and planned paths.

pub mod edge;
pub mod mode;
pub mod path;
pub mod strategy;

// Re-exports for convenience
pub use edge::Edge;
pub use mode::Mode;
pub use path::{Hop, Path, PathStep};
pub use strategy::Strategy;
