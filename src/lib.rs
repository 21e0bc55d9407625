//! modepilot - move a device under test between console modes
//!
//! A device exposes a series of execution contexts ("modes") on its console:
//! a bootloader, a Linux shell, a diagnostic shell, a vendor CLI. modepilot
//! plans a route through the declared mode graph and drives the device along
//! it, one verified hop at a time.
//!
//! ## Module Organization
//!
//! ### Planning
//!
//! - [`graph`] - Immutable mode graph and the path planner
//! - [`models`] - Mode keys, edges, strategies, paths
//!
//! ### Execution
//!
//! - [`manager`] - Per-session executor (`goto_mode`, `get_current_mode`, `is_mode`)
//! - [`transition`] - Transition capability trait, registry, scripted transitions
//! - [`console`] - Console capability trait, prompt matching, PTY transport
//! - [`cancel`] - Cancellation between and during hops
//!
//! ### Definitions
//!
//! - [`config`] - Product definition files (TOML / JSON)
//! - [`context`] - Shared product context handed to every session
//! - [`skeleton`] - Transition stub generator
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use modepilot::{GotoOptions, Mode, ModeContext, PtyConsole};
//!
//! # async fn run() -> modepilot::Result<()> {
//! let context = ModeContext::load(std::path::Path::new("product.toml"))?;
//! let console = PtyConsole::spawn("telnet", &["10.0.0.5".into(), "2003".into()])?;
//! let mut manager = context.manager(console);
//!
//! let report = manager
//!     .goto_mode(&Mode::new("linux"), GotoOptions::new().refresh(true))
//!     .await?;
//! println!("reached {} after {} hops", report.reached, report.hops_executed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! The graph, prompt table and transition registry are built once and
//! shared read-only through [`ModeContext`]. Each console gets its own
//! [`ModeManager`], owned by one task; many managers run in parallel.

#[macro_use]
extern crate tracing;

pub mod cancel;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod graph;
pub mod manager;
pub mod models;
pub mod skeleton;
pub mod transition;

// Re-exports for core functionality
pub use cancel::{CancelHandle, CancelToken};
pub use config::{ConfigLoader, ProductConfig};
pub use console::{Console, ConsoleBuffer, PromptMatcher, PtyConsole, Resolution};
pub use context::ModeContext;
pub use error::{DefinitionError, Error, Result};
pub use graph::{ModeGraph, ModeGraphBuilder, PathPlanner};
pub use manager::{
    AttemptResult, ExecutorState, GotoOptions, GotoReport, HopRecord, ManagerSettings,
    ModeManager, SessionState,
};
pub use models::{Edge, Hop, Mode, Path, PathStep, Strategy};
pub use transition::{HopContext, HopOutcome, ScriptedTransition, Transition, TransitionRegistry};

/// The current version of modepilot from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The crate name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load the product definition found in the default search paths
///
/// # Errors
///
/// `ConfigNotFound` when no definition exists, or any load, parse or
/// validation error of the definition that was found.
pub fn load_context() -> Result<ModeContext> {
    let mut loader = ConfigLoader::new();
    let config = loader.load()?;
    if let Some(path) = loader.current_path() {
        info!("{} v{} using {}", NAME, VERSION, path.display());
    }
    ModeContext::from_config(&config)
}
