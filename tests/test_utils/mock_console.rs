//! Mock Console Implementation for Testing
//!
//! `MockConsole` feeds queued output to the manager and never waits: a
//! `receive` with nothing queued behaves like an expired deadline. When a
//! `SimulatedDevice` is attached, every line sent is echoed and answered
//! with the prompt of whatever mode the command leads to.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use modepilot::console::{Console, ConsoleBuffer};
use modepilot::error::{Error, Result};
use modepilot::Mode;
use tokio::time::Instant;

/// A device that changes mode in response to console commands
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub mode: Mode,
    prompts: HashMap<Mode, String>,
    commands: HashMap<(Mode, String), Mode>,
    /// Commands accepted without printing anything afterwards
    muted: HashSet<String>,
}

impl SimulatedDevice {
    pub fn new(initial: impl Into<Mode>) -> Self {
        Self {
            mode: initial.into(),
            prompts: HashMap::new(),
            commands: HashMap::new(),
            muted: HashSet::new(),
        }
    }

    /// Prompt text printed while in `mode`
    pub fn prompt(mut self, mode: impl Into<Mode>, text: &str) -> Self {
        self.prompts.insert(mode.into(), text.to_string());
        self
    }

    /// Sending `command` while in `from` moves the device to `to`
    pub fn command(mut self, from: impl Into<Mode>, command: &str, to: impl Into<Mode>) -> Self {
        self.commands
            .insert((from.into(), command.to_string()), to.into());
        self
    }

    pub fn mute(mut self, command: &str) -> Self {
        self.muted.insert(command.to_string());
        self
    }

    fn current_prompt(&self) -> String {
        self.prompts.get(&self.mode).cloned().unwrap_or_default()
    }

    /// Process one input line and return the console output it produces
    fn respond(&mut self, line: &str) -> String {
        if line.is_empty() {
            return format!("\r\n{}", self.current_prompt());
        }
        let known = self.commands.get(&(self.mode.clone(), line.to_string())).cloned();
        let muted = self.muted.contains(line);
        match known {
            Some(next) => self.mode = next,
            None if muted => {}
            None => {
                return format!(
                    "{}\r\n{}: command not found\r\n{}",
                    line,
                    line,
                    self.current_prompt()
                )
            }
        }
        if muted {
            format!("{}\r\n", line)
        } else {
            format!("{}\r\n{}", line, self.current_prompt())
        }
    }
}

/// Console double backed by a queue and an optional simulated device
#[derive(Debug, Default)]
pub struct MockConsole {
    pending: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    buffer: ConsoleBuffer,
    device: Option<SimulatedDevice>,
    closed: bool,
}

impl MockConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: SimulatedDevice) -> Self {
        Self {
            device: Some(device),
            ..Self::default()
        }
    }

    /// Queue output as if the device had printed it
    pub fn queue_text(&mut self, text: &str) {
        self.pending.push_back(text.as_bytes().to_vec());
    }

    /// Lines sent so far, without line endings
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn device(&self) -> Option<&SimulatedDevice> {
        self.device.as_ref()
    }

    pub fn device_mode(&self) -> Option<&Mode> {
        self.device.as_ref().map(|d| &d.mode)
    }

    /// Make every further receive fail as a closed transport
    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[async_trait]
impl Console for MockConsole {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ConsoleSendFailed {
                reason: "console closed".to_string(),
            });
        }
        let text = String::from_utf8_lossy(data);
        let line = text.trim_end_matches(&['\r', '\n'][..]).to_string();
        if let Some(device) = self.device.as_mut() {
            let output = device.respond(&line);
            self.pending.push_back(output.into_bytes());
        }
        self.sent.push(line);
        Ok(())
    }

    async fn receive(&mut self, _deadline: Instant) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(Error::ConsoleClosed);
        }
        Ok(self.pending.pop_front())
    }

    fn buffer(&self) -> &ConsoleBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut ConsoleBuffer {
        &mut self.buffer
    }
}
