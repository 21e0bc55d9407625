//! Transition Functions
//!
//! A transition drives the device across one edge of the mode graph: it
//! sends commands over the console and waits for the text that shows the
//! hop took effect. Product code implements [`Transition`] per edge and
//! registers it in a [`TransitionRegistry`]; the manager only ever sees the
//! trait.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::cancel::CancelToken;
use crate::console::{Console, PromptMatcher};
use crate::error::{DefinitionError, Error, Result};
use crate::graph::ModeGraph;
use crate::models::{Hop, Mode, Path};

/// What a transition gets to know about the hop it runs
#[derive(Debug, Clone)]
pub struct HopContext<'a> {
    /// 1 for the first attempt, 2 for the first retry
    pub attempt: u32,
    /// Upper bound the transition must honour for its own waits
    pub timeout: Duration,
    pub cancel: CancelToken,
    pub prompts: &'a PromptMatcher,
}

/// What a transition reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopOutcome {
    /// Console text to resolve the arrival mode from; the console buffer is
    /// used when absent
    pub text: Option<String>,
    /// Mode the transition itself determined it landed in
    ///
    /// Taken as authoritative over prompt matching. Boot sequences that may
    /// end in one of several modes report the one they observed here.
    pub reached: Option<Mode>,
}

impl HopOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            reached: None,
        }
    }

    pub fn reached(mode: Mode) -> Self {
        Self {
            text: None,
            reached: Some(mode),
        }
    }
}

/// Drives the device across one edge
#[async_trait]
pub trait Transition: Send + Sync {
    /// Perform the hop from `from` to `to`
    ///
    /// Must return within `ctx.timeout` (plus whatever slack the transport
    /// needs); an `Err` counts as a failed attempt.
    async fn execute(
        &self,
        from: &Mode,
        to: &Mode,
        console: &mut dyn Console,
        ctx: &HopContext<'_>,
    ) -> Result<HopOutcome>;

    /// Short description for logs
    fn describe(&self) -> String {
        "transition".to_string()
    }
}

/// Transition functions keyed by edge
#[derive(Clone, Default)]
pub struct TransitionRegistry {
    by_edge: HashMap<(Mode, Mode), Arc<dyn Transition>>,
    fallback: Option<Arc<dyn Transition>>,
}

impl fmt::Debug for TransitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRegistry")
            .field("edges", &self.by_edge.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl TransitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transition for one edge, replacing any previous one
    pub fn register<T>(&mut self, from: impl Into<Mode>, to: impl Into<Mode>, transition: T) -> &mut Self
    where
        T: Transition + 'static,
    {
        self.register_arc(from, to, Arc::new(transition))
    }

    pub fn register_arc(
        &mut self,
        from: impl Into<Mode>,
        to: impl Into<Mode>,
        transition: Arc<dyn Transition>,
    ) -> &mut Self {
        self.by_edge.insert((from.into(), to.into()), transition);
        self
    }

    /// Transition used for edges without a dedicated one
    pub fn set_fallback<T>(&mut self, transition: T) -> &mut Self
    where
        T: Transition + 'static,
    {
        self.fallback = Some(Arc::new(transition));
        self
    }

    pub fn get(&self, from: &Mode, to: &Mode) -> Option<Arc<dyn Transition>> {
        self.by_edge
            .get(&(from.clone(), to.clone()))
            .or(self.fallback.as_ref())
            .cloned()
    }

    pub fn contains(&self, from: &Mode, to: &Mode) -> bool {
        self.get(from, to).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_edge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_edge.is_empty() && self.fallback.is_none()
    }

    /// First hop of `path` that has no transition
    pub fn first_missing(&self, path: &Path) -> Option<Hop> {
        path.hops().into_iter().find(|h| !self.contains(&h.from, &h.to))
    }

    /// Every registered edge must exist in the graph
    pub fn validate_against(&self, graph: &ModeGraph) -> std::result::Result<(), DefinitionError> {
        for (from, to) in self.by_edge.keys() {
            if graph.edge(from, to).is_none() {
                return Err(DefinitionError::UndeclaredTransitionEdge {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One command of a scripted transition
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub send: String,
    /// Text to wait for after sending
    pub expect: Option<Regex>,
}

/// Sends a fixed list of commands, then waits for the target prompt
#[derive(Debug, Clone)]
pub struct ScriptedTransition {
    steps: Vec<ScriptStep>,
    await_target_prompt: bool,
}

impl Default for ScriptedTransition {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransition {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            await_target_prompt: true,
        }
    }

    /// Send a line without waiting for anything in particular
    pub fn send(mut self, line: impl Into<String>) -> Self {
        self.steps.push(ScriptStep {
            send: line.into(),
            expect: None,
        });
        self
    }

    /// Send a line and wait for `expect`
    pub fn send_expect(mut self, line: impl Into<String>, expect: &str) -> Result<Self> {
        self.steps.push(ScriptStep {
            send: line.into(),
            expect: Some(Regex::new(expect)?),
        });
        Ok(self)
    }

    /// Return after the last step instead of waiting for the target prompt
    pub fn without_target_prompt(mut self) -> Self {
        self.await_target_prompt = false;
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

#[async_trait]
impl Transition for ScriptedTransition {
    async fn execute(
        &self,
        from: &Mode,
        to: &Mode,
        console: &mut dyn Console,
        ctx: &HopContext<'_>,
    ) -> Result<HopOutcome> {
        let mut last_text = None;

        for step in &self.steps {
            if ctx.cancel.is_cancelled() {
                return Err(cancelled(from, to));
            }
            console.buffer_mut().consume_all();
            console.send_line(&step.send).await?;
            if let Some(expect) = &step.expect {
                last_text = Some(wait_cancellable(console, expect, from, to, ctx).await?);
            }
        }

        if self.await_target_prompt {
            if let Some(prompt) = ctx.prompts.expected_prompt(to) {
                last_text = Some(wait_cancellable(console, prompt, from, to, ctx).await?);
            }
        }

        Ok(HopOutcome {
            text: last_text,
            reached: None,
        })
    }

    fn describe(&self) -> String {
        let sends: Vec<&str> = self.steps.iter().map(|s| s.send.as_str()).collect();
        format!("script {:?}", sends)
    }
}

/// Wait for `pattern` unless the goto is cancelled first
pub async fn wait_cancellable(
    console: &mut dyn Console,
    pattern: &Regex,
    from: &Mode,
    to: &Mode,
    ctx: &HopContext<'_>,
) -> Result<String> {
    tokio::select! {
        result = console.wait_for(pattern, ctx.timeout) => result,
        _ = ctx.cancel.cancelled() => Err(cancelled(from, to)),
    }
}

fn cancelled(from: &Mode, to: &Mode) -> Error {
    Error::Cancelled {
        from: from.clone(),
        to: to.clone(),
        hops_completed: 0,
        last_confirmed: from.clone(),
    }
}
