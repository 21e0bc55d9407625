//! Console Transport
//!
//! The executor and transition functions talk to a device only through the
//! [`Console`] capability trait. Transports implement three primitives
//! (send bytes, receive the next chunk before a deadline, expose the text
//! buffer) and inherit expect-style helpers built on top of them.
//!
//! - [`buffer`] - plain-text console buffer with escape stripping
//! - [`prompt`] - ordered prompt patterns resolving text to a mode
//! - [`pty`] - console client running in a local pseudoterminal

pub mod buffer;
pub mod prompt;
pub mod pty;

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::Instant;

use crate::error::{Error, Result};

pub use buffer::ConsoleBuffer;
pub use prompt::{PromptMatcher, Resolution};
pub use pty::PtyConsole;

/// Operations a console transport provides to the mode manager
///
/// Implementations own their I/O; the provided methods never block past the
/// deadline or timeout they are given.
#[async_trait]
pub trait Console: Send {
    /// Send raw bytes to the device
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive the next chunk of output, waiting at most until `deadline`
    ///
    /// # Returns
    /// `Ok(Some(bytes))` when data arrived, `Ok(None)` when the deadline passed
    ///
    /// # Errors
    /// `ConsoleClosed` once the transport can never produce more data
    async fn receive(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>>;

    /// Text received so far
    fn buffer(&self) -> &ConsoleBuffer;

    fn buffer_mut(&mut self) -> &mut ConsoleBuffer;

    /// Line terminator appended by [`Console::send_line`]
    fn line_ending(&self) -> &str {
        "\r"
    }

    /// Send a command followed by the line terminator
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending().as_bytes());
        debug!("console <- {:?}", line);
        self.send(&data).await
    }

    /// Wait until unconsumed output matches `pattern`
    ///
    /// Consumes output up to the end of the match and returns it.
    ///
    /// # Errors
    /// `ConsoleTimeout` if nothing matched within `timeout`, `ConsoleClosed`
    /// if the transport closed first
    async fn wait_for(&mut self, pattern: &Regex, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = pattern.find(self.buffer().unconsumed()) {
                let end = found.end();
                let matched = self.buffer().unconsumed()[..end].to_string();
                self.buffer_mut().consume(end);
                return Ok(matched);
            }

            match self.receive(deadline).await? {
                Some(bytes) => self.buffer_mut().push_bytes(&bytes),
                None => {
                    return Err(Error::ConsoleTimeout {
                        pattern: pattern.as_str().to_string(),
                        duration: timeout,
                    })
                }
            }
        }
    }

    /// Collect whatever arrives within `duration` and return the unconsumed text
    async fn read_for(&mut self, duration: Duration) -> Result<String> {
        let deadline = Instant::now() + duration;
        while let Some(bytes) = self.receive(deadline).await? {
            self.buffer_mut().push_bytes(&bytes);
        }
        Ok(self.buffer().unconsumed().to_string())
    }

    /// Nudge the device into printing a fresh prompt
    ///
    /// Drops stale output, sends an empty line and collects output for `settle`.
    async fn wake(&mut self, settle: Duration) -> Result<String> {
        self.buffer_mut().clear();
        self.send_line("").await?;
        self.read_for(settle).await
    }
}
