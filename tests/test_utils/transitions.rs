//! Instrumented transition functions

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use modepilot::console::Console;
use modepilot::error::{Error, Result};
use modepilot::transition::{HopContext, HopOutcome, Transition};
use modepilot::Mode;

/// Wraps another transition and counts how often it runs
pub struct CountingTransition<T> {
    inner: T,
    calls: Arc<AtomicUsize>,
}

impl<T> CountingTransition<T> {
    pub fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl<T: Transition> Transition for CountingTransition<T> {
    async fn execute(
        &self,
        from: &Mode,
        to: &Mode,
        console: &mut dyn Console,
        ctx: &HopContext<'_>,
    ) -> Result<HopOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(from, to, console, ctx).await
    }
}

/// Fails the first `failures` attempts, then reports arrival
pub struct FlakyTransition {
    remaining: AtomicU32,
}

impl FlakyTransition {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining: AtomicU32::new(failures),
        }
    }

    pub fn always() -> Self {
        Self::new(u32::MAX)
    }
}

#[async_trait]
impl Transition for FlakyTransition {
    async fn execute(
        &self,
        _from: &Mode,
        to: &Mode,
        _console: &mut dyn Console,
        ctx: &HopContext<'_>,
    ) -> Result<HopOutcome> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining.store(left - 1, Ordering::SeqCst);
            return Err(Error::ConsoleTimeout {
                pattern: format!("{} prompt", to),
                duration: ctx.timeout,
            });
        }
        Ok(HopOutcome::reached(to.clone()))
    }
}

/// Reports a fixed arrival mode without touching the console
pub struct ReportingTransition(pub Mode);

#[async_trait]
impl Transition for ReportingTransition {
    async fn execute(
        &self,
        _from: &Mode,
        _to: &Mode,
        _console: &mut dyn Console,
        _ctx: &HopContext<'_>,
    ) -> Result<HopOutcome> {
        Ok(HopOutcome::reached(self.0.clone()))
    }
}

/// Returns fixed console text for the manager to resolve
pub struct TextTransition(pub String);

#[async_trait]
impl Transition for TextTransition {
    async fn execute(
        &self,
        _from: &Mode,
        _to: &Mode,
        _console: &mut dyn Console,
        _ctx: &HopContext<'_>,
    ) -> Result<HopOutcome> {
        Ok(HopOutcome::with_text(self.0.clone()))
    }
}
