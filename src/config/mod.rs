//! Product definitions
//!
//! A product definition declares the modes of a device, the edges between
//! them, the prompt shown in each mode, and optional scripted transitions.
//! It is read once per product (see [`loader::ConfigLoader`]) and turned into
//! the immutable graph, prompt table and transition registry every session
//! shares.

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::console::PromptMatcher;
use crate::error::{DefinitionError, Error, Result};
use crate::graph::ModeGraph;
use crate::manager::ManagerSettings;
use crate::models::{Mode, Strategy};
use crate::transition::{ScriptedTransition, TransitionRegistry};

pub use loader::{ConfigFormat, ConfigLoader};

/// Complete product definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    pub settings: SettingsConfig,
    pub modes: Vec<ModeConfig>,
    /// Evaluated in this order; more specific prompts first
    pub prompts: Vec<PromptConfig>,
    pub transitions: Vec<TransitionConfig>,
}

/// Executor tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Retries per hop after the first attempt
    pub max_retries: u32,
    pub hop_timeout_secs: u64,
    pub wake_settle_ms: u64,
    /// Characters of console tail searched for a prompt
    pub tail_chars: usize,
    pub default_strategy: Strategy,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            hop_timeout_secs: 30,
            wake_settle_ms: 500,
            tail_chars: crate::console::prompt::DEFAULT_TAIL_CHARS,
            default_strategy: Strategy::MinCost,
        }
    }
}

/// A declared mode and its outgoing edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default)]
    pub stateful: bool,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
}

impl ModeConfig {
    pub fn key(&self) -> Mode {
        match &self.variant {
            Some(variant) => Mode::with_variant(self.name.clone(), variant.clone()),
            None => Mode::new(self.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub to: Mode,
    pub cost: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub mode: Mode,
    pub pattern: String,
}

/// Commands that move the device across one edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub from: Mode,
    pub to: Mode,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub send: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
}

impl ProductConfig {
    /// Check settings bounds and that the definition is not empty
    pub fn validate(&self) -> Result<()> {
        let settings = &self.settings;

        if settings.max_retries > 10 {
            return Err(Error::ConfigValidationFailed {
                field: "settings.max_retries".to_string(),
                reason: "Retries per hop cannot exceed 10".to_string(),
            });
        }

        if !(1..=3600).contains(&settings.hop_timeout_secs) {
            return Err(Error::ConfigValidationFailed {
                field: "settings.hop_timeout_secs".to_string(),
                reason: "Hop timeout must be between 1 and 3600 seconds".to_string(),
            });
        }

        if !(16..=65536).contains(&settings.tail_chars) {
            return Err(Error::ConfigValidationFailed {
                field: "settings.tail_chars".to_string(),
                reason: "Prompt tail must be between 16 and 65536 characters".to_string(),
            });
        }

        if self.modes.is_empty() {
            return Err(Error::ConfigValidationFailed {
                field: "modes".to_string(),
                reason: "At least one mode must be declared".to_string(),
            });
        }

        for (i, transition) in self.transitions.iter().enumerate() {
            for (j, step) in transition.steps.iter().enumerate() {
                if let Some(expect) = &step.expect {
                    if let Err(e) = regex::Regex::new(expect) {
                        return Err(Error::ConfigValidationFailed {
                            field: format!("transitions[{}].steps[{}].expect", i, j),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    pub fn build_graph(&self) -> std::result::Result<ModeGraph, DefinitionError> {
        let mut builder = ModeGraph::builder();
        for mode in &self.modes {
            builder.add_mode_with(
                mode.key(),
                mode.edges.iter().map(|e| (e.to.clone(), e.cost)),
                mode.stateful,
            );
        }
        builder.build()
    }

    pub fn build_prompts(&self) -> std::result::Result<PromptMatcher, DefinitionError> {
        let mut matcher = PromptMatcher::new().with_tail_chars(self.settings.tail_chars);
        for prompt in &self.prompts {
            matcher.add(prompt.mode.clone(), &prompt.pattern)?;
        }
        Ok(matcher)
    }

    /// Scripted transitions declared in the definition
    pub fn build_transitions(&self) -> Result<TransitionRegistry> {
        let mut registry = TransitionRegistry::new();
        for transition in &self.transitions {
            let mut script = ScriptedTransition::new();
            for step in &transition.steps {
                script = match &step.expect {
                    Some(expect) => script.send_expect(step.send.clone(), expect)?,
                    None => script.send(step.send.clone()),
                };
            }
            registry.register(transition.from.clone(), transition.to.clone(), script);
        }
        Ok(registry)
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            max_retries: self.settings.max_retries,
            hop_timeout: Duration::from_secs(self.settings.hop_timeout_secs),
            wake_settle: Duration::from_millis(self.settings.wake_settle_ms),
            default_strategy: self.settings.default_strategy,
        }
    }
}
