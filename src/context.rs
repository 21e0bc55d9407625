//! Product context
//!
//! Everything a session needs to know about a product, built once and shared
//! by reference counting: the mode graph, the prompt table, the transition
//! registry and the executor settings. Sessions receive it explicitly.

use std::path::Path;
use std::sync::Arc;

use crate::config::{ConfigLoader, ProductConfig};
use crate::console::{Console, PromptMatcher};
use crate::error::Result;
use crate::graph::ModeGraph;
use crate::manager::{ManagerSettings, ModeManager};
use crate::transition::TransitionRegistry;

/// Shared, read-only product definition
#[derive(Debug, Clone)]
pub struct ModeContext {
    graph: Arc<ModeGraph>,
    prompts: Arc<PromptMatcher>,
    transitions: Arc<TransitionRegistry>,
    settings: ManagerSettings,
}

impl ModeContext {
    /// Combine the parts, checking that prompts and transitions only refer
    /// to declared modes and edges
    pub fn new(
        graph: ModeGraph,
        prompts: PromptMatcher,
        transitions: TransitionRegistry,
        settings: ManagerSettings,
    ) -> Result<Self> {
        prompts.validate_against(&graph)?;
        transitions.validate_against(&graph)?;
        Ok(Self {
            graph: Arc::new(graph),
            prompts: Arc::new(prompts),
            transitions: Arc::new(transitions),
            settings,
        })
    }

    /// Build from a product definition with its scripted transitions
    pub fn from_config(config: &ProductConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.build_graph()?,
            config.build_prompts()?,
            config.build_transitions()?,
            config.manager_settings(),
        )
    }

    /// Build from a product definition, registering extra transitions on top
    /// of the scripted ones
    pub fn from_config_with<F>(config: &ProductConfig, register: F) -> Result<Self>
    where
        F: FnOnce(&mut TransitionRegistry),
    {
        config.validate()?;
        let mut transitions = config.build_transitions()?;
        register(&mut transitions);
        Self::new(
            config.build_graph()?,
            config.build_prompts()?,
            transitions,
            config.manager_settings(),
        )
    }

    /// Load a product definition file
    pub fn load(path: &Path) -> Result<Self> {
        let config = ConfigLoader::new().load_from_path(path)?;
        Self::from_config(&config)
    }

    /// Start a session on `console`
    pub fn manager<C: Console>(&self, console: C) -> ModeManager<C> {
        ModeManager::new(self.clone(), console)
    }

    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn graph(&self) -> &ModeGraph {
        &self.graph
    }

    pub fn prompts(&self) -> &PromptMatcher {
        &self.prompts
    }

    pub fn transitions(&self) -> &TransitionRegistry {
        &self.transitions
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }
}
