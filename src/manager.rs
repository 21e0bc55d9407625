//! Mode Manager
//!
//! Per-console executor that moves a device to a requested mode. A goto
//! resolves where the device is, plans a path over the shared mode graph,
//! then runs one transition per hop and verifies arrival from the console
//! prompt before moving on. Hops never overlap: `goto_mode` takes
//! `&mut self`, and one manager owns one console.
//!
//! ## Belief
//!
//! The manager keeps a belief of the current mode. It is refreshed from the
//! console on the first goto, on request, and whenever a failed hop left the
//! device somewhere uncertain (the belief is then marked stale). After a
//! failure the belief is the last mode confirmed on the console, so the
//! next goto plans from the device's actual position.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::cancel::{CancelHandle, CancelToken};
use crate::console::{Console, Resolution};
use crate::context::ModeContext;
use crate::error::{Error, Result};
use crate::models::{Hop, Mode, Path, Strategy};
use crate::transition::{HopContext, HopOutcome};

/// Executor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorState {
    Idle,
    Planning,
    ExecutingHop,
    Verifying,
    Succeeded,
    Failed,
}

/// Tunables shared by every manager of a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Extra attempts per hop after the first one
    pub max_retries: u32,
    /// Bound handed to transitions for each attempt
    pub hop_timeout: Duration,
    /// How long a refresh collects output after waking the console
    pub wake_settle: Duration,
    pub default_strategy: Strategy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            hop_timeout: Duration::from_secs(30),
            wake_settle: Duration::from_millis(500),
            default_strategy: Strategy::MinCost,
        }
    }
}

/// Per-call options for [`ModeManager::goto_mode`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GotoOptions {
    /// Overrides the product's default strategy
    pub strategy: Option<Strategy>,
    /// Waypoints to visit where feasible
    pub followpath: Vec<Mode>,
    /// Re-read the current mode from the console before planning
    pub refresh: bool,
    /// Overrides the product's retry bound
    pub max_retries: Option<u32>,
}

impl GotoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn via<I, M>(mut self, waypoints: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Mode>,
    {
        self.followpath = waypoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Result of a successful goto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotoReport {
    pub reached: Mode,
    pub hops_executed: usize,
    pub path: Path,
    pub elapsed: Duration,
}

/// How one hop attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptResult {
    Arrived(Mode),
    /// The prompt belonged to a different known mode
    Unexpected(Mode),
    /// The prompt could not be resolved to the expected mode
    Unresolved(String),
    /// The transition returned an error
    Failed(String),
    Cancelled,
}

/// One executed hop attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRecord {
    pub from: Mode,
    pub to: Mode,
    pub attempt: u32,
    pub result: AttemptResult,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// State owned by one console session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Believed current mode
    pub current_mode: Option<Mode>,
    /// The belief must be re-read from the console before use
    pub stale: bool,
    /// Attempts used by the latest run of each edge
    pub hop_attempts: HashMap<(Mode, Mode), u32>,
    pub last_error: Option<String>,
    pub history: Vec<HopRecord>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            current_mode: None,
            stale: false,
            hop_attempts: HashMap::new(),
            last_error: None,
            history: Vec::new(),
        }
    }

    fn confirm(&mut self, mode: Mode) {
        self.current_mode = Some(mode);
        self.stale = false;
    }

    fn suspect(&mut self, mode: Mode) {
        self.current_mode = Some(mode);
        self.stale = true;
    }
}

/// Verification verdict for one attempt
enum Verdict {
    Arrived(Mode),
    Unexpected(Mode),
    Unresolved(String),
}

/// Drives one console through mode transitions
pub struct ModeManager<C: Console> {
    context: ModeContext,
    console: C,
    session: SessionState,
    state: ExecutorState,
    cancel: CancelHandle,
}

impl<C: Console> std::fmt::Debug for ModeManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeManager")
            .field("session", &self.session.id)
            .field("state", &self.state)
            .field("current_mode", &self.session.current_mode)
            .field("stale", &self.session.stale)
            .finish()
    }
}

impl<C: Console> ModeManager<C> {
    pub fn new(context: ModeContext, console: C) -> Self {
        let session = SessionState::new();
        debug!("Session {} created", session.id);
        Self {
            context,
            console,
            session,
            state: ExecutorState::Idle,
            cancel: CancelHandle::new(),
        }
    }

    /// Start with a known current mode instead of reading the console
    pub fn with_initial_mode(mut self, mode: impl Into<Mode>) -> Self {
        self.session.confirm(mode.into());
        self
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn history(&self) -> &[HopRecord] {
        &self.session.history
    }

    /// Current belief without touching the console
    pub fn belief(&self) -> Option<&Mode> {
        self.session.current_mode.as_ref()
    }

    /// Force the next goto to re-read the mode from the console
    pub fn invalidate(&mut self) {
        self.session.stale = true;
    }

    pub fn context(&self) -> &ModeContext {
        &self.context
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Handle that cancels the running goto
    ///
    /// The request is checked before each hop and retry and handed to
    /// transitions; it is cleared when the goto returns.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Current mode, from the belief or from the console
    pub async fn get_current_mode(&mut self, refresh: bool) -> Result<Mode> {
        if !refresh && !self.session.stale {
            if let Some(mode) = &self.session.current_mode {
                return Ok(mode.clone());
            }
        }
        self.refresh_mode().await
    }

    /// Whether the device is in `candidate`
    pub async fn is_mode(&mut self, candidate: &Mode, refresh: bool) -> Result<bool> {
        self.context.graph().require(candidate)?;
        let current = self.get_current_mode(refresh).await?;
        Ok(&current == candidate)
    }

    /// Move the device to `target`
    pub async fn goto_mode(&mut self, target: &Mode, options: GotoOptions) -> Result<GotoReport> {
        let span = info_span!("goto", session = %self.session.id, target = %target);
        let result = self.run_goto(target, options).instrument(span).await;
        self.cancel.reset();
        result
    }

    async fn run_goto(&mut self, target: &Mode, options: GotoOptions) -> Result<GotoReport> {
        let started = Instant::now();
        let context = self.context.clone();
        self.state = ExecutorState::Planning;

        if let Err(e) = context.graph().require(target) {
            return self.fail(e);
        }

        let needs_refresh =
            options.refresh || self.session.stale || self.session.current_mode.is_none();
        let current = match self.get_current_mode(needs_refresh).await {
            Ok(mode) => mode,
            Err(e) => return self.fail(e),
        };

        let strategy = options.strategy.unwrap_or(context.settings().default_strategy);
        let path = match context
            .graph()
            .get_path(&current, target, strategy, &options.followpath)
        {
            Ok(path) => path,
            Err(e) => return self.fail(e),
        };

        if let Some(hop) = context.transitions().first_missing(&path) {
            return self.fail(Error::MissingTransition {
                from: hop.from,
                to: hop.to,
            });
        }

        info!(
            "Going from {} to {} ({}, {} hops): {}",
            current,
            target,
            strategy,
            path.hop_count(),
            path.names().join(" -> ")
        );

        let max_retries = options.max_retries.unwrap_or(context.settings().max_retries);
        let token = self.cancel.token();
        let mut confirmed = current;

        for hop in path.hops() {
            if token.is_cancelled() {
                return self.fail(Error::Cancelled {
                    from: hop.from,
                    to: hop.to,
                    hops_completed: hop.index,
                    last_confirmed: confirmed,
                });
            }

            match self.execute_hop(&context, &hop, max_retries, &token).await {
                Ok(arrived) => {
                    info!("Arrived in {} (hop {}/{})", arrived, hop.index + 1, path.hop_count());
                    self.session.confirm(arrived.clone());
                    confirmed = arrived;
                }
                Err(e) => return self.fail(e),
            }
        }

        self.state = ExecutorState::Succeeded;
        self.session.last_error = None;
        let report = GotoReport {
            reached: confirmed,
            hops_executed: path.hop_count(),
            path,
            elapsed: started.elapsed(),
        };
        info!(
            "Reached {} in {} hops ({:?})",
            report.reached, report.hops_executed, report.elapsed
        );
        Ok(report)
    }

    /// Run one hop with retries, returning the confirmed arrival mode
    async fn execute_hop(
        &mut self,
        context: &ModeContext,
        hop: &Hop,
        max_retries: u32,
        token: &CancelToken,
    ) -> Result<Mode> {
        let transition = context
            .transitions()
            .get(&hop.from, &hop.to)
            .ok_or_else(|| Error::MissingTransition {
                from: hop.from.clone(),
                to: hop.to.clone(),
            })?;
        let allowed = max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.session
                .hop_attempts
                .insert((hop.from.clone(), hop.to.clone()), attempt);

            if attempt > 1 && token.is_cancelled() {
                self.session.suspect(hop.from.clone());
                return Err(self.cancelled(hop));
            }

            self.state = ExecutorState::ExecutingHop;
            debug!(
                "Hop {} -> {} attempt {}/{} via {}",
                hop.from,
                hop.to,
                attempt,
                allowed,
                transition.describe()
            );

            let ctx = HopContext {
                attempt,
                timeout: context.settings().hop_timeout,
                cancel: token.clone(),
                prompts: context.prompts(),
            };
            let started_at = Utc::now();
            let clock = Instant::now();
            let result = transition
                .execute(&hop.from, &hop.to, &mut self.console, &ctx)
                .await;
            self.state = ExecutorState::Verifying;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() || token.is_cancelled() => {
                    self.record(hop, attempt, AttemptResult::Cancelled, started_at, clock);
                    self.session.suspect(hop.from.clone());
                    return Err(self.cancelled(hop));
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.record(hop, attempt, AttemptResult::Failed(reason.clone()), started_at, clock);
                    if attempt < allowed {
                        warn!("Hop {} -> {} failed, retrying: {}", hop.from, hop.to, reason);
                        continue;
                    }
                    self.session.suspect(hop.from.clone());
                    return Err(Error::HopExecutionFailed {
                        from: hop.from.clone(),
                        to: hop.to.clone(),
                        attempts: attempt,
                        hops_completed: hop.index,
                        last_confirmed: hop.from.clone(),
                        reason,
                    });
                }
            };

            match self.verify(context, &hop.to, &outcome) {
                Verdict::Arrived(mode) => {
                    self.record(hop, attempt, AttemptResult::Arrived(mode.clone()), started_at, clock);
                    return Ok(mode);
                }
                Verdict::Unexpected(actual) if self.still_in_source(context, hop, &actual) => {
                    // The command did not take; the device is still where it was
                    self.record(hop, attempt, AttemptResult::Unexpected(actual.clone()), started_at, clock);
                    if attempt < allowed {
                        warn!("Still in {} after hop to {}, retrying", hop.from, hop.to);
                        continue;
                    }
                    self.session.confirm(hop.from.clone());
                    return Err(self.mismatch(hop, Some(hop.from.clone()), attempt));
                }
                Verdict::Unexpected(actual) => {
                    warn!("Expected {} but landed in {}", hop.to, actual);
                    self.record(hop, attempt, AttemptResult::Unexpected(actual.clone()), started_at, clock);
                    self.session.confirm(actual.clone());
                    return Err(self.mismatch(hop, Some(actual), attempt));
                }
                Verdict::Unresolved(reason) => {
                    self.record(hop, attempt, AttemptResult::Unresolved(reason.clone()), started_at, clock);
                    if attempt < allowed {
                        warn!("Arrival in {} not confirmed ({}), retrying", hop.to, reason);
                        continue;
                    }
                    self.session.suspect(hop.from.clone());
                    return Err(self.mismatch(hop, None, attempt));
                }
            }
        }
    }

    /// Whether `actual` is the hop's source mode, including a stateful
    /// source whose variant the prompt cannot show
    fn still_in_source(&self, context: &ModeContext, hop: &Hop, actual: &Mode) -> bool {
        *actual == hop.from
            || (context.graph().is_stateful(&hop.from) && actual.same_name(&hop.from))
    }

    /// Decide where a hop attempt landed
    ///
    /// A mode reported by the transition wins over prompt matching. A
    /// stateful mode is confirmed by any prompt of the same name, since its
    /// variant cannot be seen on the console.
    fn verify(&self, context: &ModeContext, expected: &Mode, outcome: &HopOutcome) -> Verdict {
        if let Some(reached) = &outcome.reached {
            return if reached == expected {
                Verdict::Arrived(reached.clone())
            } else {
                Verdict::Unexpected(reached.clone())
            };
        }

        let text = outcome
            .text
            .as_deref()
            .unwrap_or_else(|| self.console.buffer().text());
        let stateful = context.graph().is_stateful(expected);
        let resolution = context.prompts().resolve(text);
        debug!("Verifying {}: prompt resolved to {}", expected, resolution);

        match resolution {
            Resolution::Matched(mode) if &mode == expected => Verdict::Arrived(mode),
            Resolution::Matched(mode) if stateful && mode.same_name(expected) => {
                Verdict::Arrived(expected.clone())
            }
            Resolution::Matched(mode) => Verdict::Unexpected(mode),
            Resolution::Ambiguous(candidates)
                if candidates
                    .iter()
                    .any(|m| m == expected || (stateful && m.same_name(expected))) =>
            {
                Verdict::Arrived(expected.clone())
            }
            ambiguous @ Resolution::Ambiguous(_) => Verdict::Unresolved(ambiguous.to_string()),
            Resolution::NoMatch => Verdict::Unresolved("no prompt matched".to_string()),
        }
    }

    /// Re-read the current mode from the console
    async fn refresh_mode(&mut self) -> Result<Mode> {
        let settle = self.context.settings().wake_settle;
        let text = self.console.wake(settle).await?;
        let resolution = self.context.prompts().resolve(&text);
        debug!("Refreshed console prompt: {}", resolution);

        let belief = self.session.current_mode.clone();
        let keeps_belief = |mode: &Mode| match &belief {
            Some(b) => b == mode || (b.same_name(mode) && self.context.graph().is_stateful(b)),
            None => false,
        };

        let mode = match resolution {
            Resolution::Matched(mode) if keeps_belief(&mode) => belief.clone().unwrap_or(mode),
            Resolution::Matched(mode) => mode,
            Resolution::Ambiguous(candidates) => {
                let kept = candidates.iter().any(|m| keeps_belief(m));
                match (&belief, kept) {
                    (Some(b), true) => b.clone(),
                    _ => return Err(Error::AmbiguousPrompt { candidates }),
                }
            }
            Resolution::NoMatch => {
                return Err(Error::NoMatch {
                    tail: crate::console::buffer::tail_chars(&text, 80).to_string(),
                })
            }
        };

        self.session.confirm(mode.clone());
        Ok(mode)
    }

    fn record(
        &mut self,
        hop: &Hop,
        attempt: u32,
        result: AttemptResult,
        started_at: DateTime<Utc>,
        clock: Instant,
    ) {
        self.session.history.push(HopRecord {
            from: hop.from.clone(),
            to: hop.to.clone(),
            attempt,
            result,
            started_at,
            elapsed: clock.elapsed(),
        });
    }

    fn cancelled(&self, hop: &Hop) -> Error {
        Error::Cancelled {
            from: hop.from.clone(),
            to: hop.to.clone(),
            hops_completed: hop.index,
            last_confirmed: hop.from.clone(),
        }
    }

    fn mismatch(&self, hop: &Hop, actual: Option<Mode>, attempts: u32) -> Error {
        let last_confirmed = actual.clone().unwrap_or_else(|| hop.from.clone());
        Error::VerificationMismatch {
            from: hop.from.clone(),
            to: hop.to.clone(),
            actual,
            attempts,
            hops_completed: hop.index,
            last_confirmed,
        }
    }

    fn fail<T>(&mut self, error: Error) -> Result<T> {
        self.state = ExecutorState::Failed;
        self.session.last_error = Some(error.to_string());
        if error.is_planning_error() {
            warn!("Goto rejected: {}", error);
        } else {
            error!("Goto aborted: {}", error);
        }
        Err(error)
    }
}
