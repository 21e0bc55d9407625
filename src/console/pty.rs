//! Pseudoterminal Console
//!
//! Runs a console client (`telnet`, `ssh`, `picocom`, an emulator with its
//! serial port on stdio) inside a pseudoterminal using `portable-pty`.
//! Blocking PTY I/O is bridged to async code with one reader thread feeding
//! a tokio channel and one writer thread draining a std channel.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Sender};
use std::thread;

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::Instant;

use super::buffer::ConsoleBuffer;
use super::Console;
use crate::error::{Error, Result};

/// How a console client is spawned
#[derive(Debug, Clone)]
pub struct PtySpawnConfig {
    pub rows: u16,
    pub cols: u16,
    /// Extra environment variables for the client
    pub env: HashMap<String, String>,
    pub working_directory: Option<PathBuf>,
    /// Appended to every line sent
    pub line_ending: String,
    /// Bytes of console history kept in the buffer
    pub buffer_capacity: usize,
}

impl Default for PtySpawnConfig {
    fn default() -> Self {
        Self {
            rows: 24,
            cols: 200,
            env: HashMap::new(),
            working_directory: None,
            line_ending: "\r".to_string(),
            buffer_capacity: super::buffer::DEFAULT_CAPACITY,
        }
    }
}

/// A [`Console`] backed by a process in a pseudoterminal
pub struct PtyConsole {
    command: String,
    output: UnboundedReceiver<Vec<u8>>,
    input: Sender<Vec<u8>>,
    buffer: ConsoleBuffer,
    line_ending: String,
    child: Box<dyn Child + Send + Sync>,
    // Dropping the master hangs up the client
    _master: Box<dyn MasterPty + Send>,
    closed: bool,
}

impl std::fmt::Debug for PtyConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyConsole")
            .field("command", &self.command)
            .field("pid", &self.child.process_id())
            .field("closed", &self.closed)
            .finish()
    }
}

impl PtyConsole {
    /// Spawn `command` with default settings
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        Self::spawn_with(command, args, &PtySpawnConfig::default())
    }

    pub fn spawn_with(command: &str, args: &[String], config: &PtySpawnConfig) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::ConsoleSpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let mut cmd_builder = CommandBuilder::new(command);
        cmd_builder.args(args);
        for (key, value) in &config.env {
            cmd_builder.env(key, value);
        }
        if let Some(dir) = &config.working_directory {
            cmd_builder.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd_builder)
            .map_err(|e| Error::ConsoleSpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })?;
        // Only the child keeps the slave side open, so EOF follows its exit
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::ConsoleReaderCloneFailed {
                reason: e.to_string(),
            })?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::ConsoleWriterTakeFailed {
                reason: e.to_string(),
            })?;

        let (tx_output, rx_output) = unbounded_channel::<Vec<u8>>();
        let (tx_input, rx_input) = channel::<Vec<u8>>();
        spawn_reader(reader, tx_output);
        spawn_writer(writer, rx_input);

        info!(
            "Console client spawned: {} (pid {:?})",
            command,
            child.process_id()
        );

        Ok(Self {
            command: command.to_string(),
            output: rx_output,
            input: tx_input,
            buffer: ConsoleBuffer::with_capacity(config.buffer_capacity),
            line_ending: config.line_ending.clone(),
            child,
            _master: pair.master,
            closed: false,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Whether the client process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Terminate the client process
    pub fn kill(&mut self) -> Result<()> {
        self.child.kill()?;
        Ok(())
    }
}

impl Drop for PtyConsole {
    fn drop(&mut self) {
        if self.is_alive() {
            if let Err(e) = self.child.kill() {
                debug!("Failed to kill console client {}: {}", self.command, e);
            }
        }
    }
}

#[async_trait]
impl Console for PtyConsole {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.input
            .send(data.to_vec())
            .map_err(|e| Error::ConsoleSendFailed {
                reason: e.to_string(),
            })
    }

    async fn receive(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(Error::ConsoleClosed);
        }
        match tokio::time::timeout_at(deadline, self.output.recv()).await {
            Ok(Some(bytes)) => Ok(Some(bytes)),
            Ok(None) => {
                debug!("Console client {} closed its output", self.command);
                self.closed = true;
                Err(Error::ConsoleClosed)
            }
            Err(_) => Ok(None),
        }
    }

    fn buffer(&self) -> &ConsoleBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut ConsoleBuffer {
        &mut self.buffer
    }

    fn line_ending(&self) -> &str {
        &self.line_ending
    }
}

fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("Console read EOF");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    if tx.send(buf[..n].to_vec()).is_err() {
                        debug!("Console receiver dropped, stopping reader thread");
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(10));
                }
                Err(e) => {
                    consecutive_errors += 1;
                    // EIO is how Linux reports a hung-up slave
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS
                        || e.raw_os_error() == Some(5)
                    {
                        debug!("Console read stopped: {}", e);
                        break;
                    }
                    warn!(
                        "Console read error: {} (attempt {}/{})",
                        e, consecutive_errors, MAX_CONSECUTIVE_ERRORS
                    );
                    thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }
        debug!("Console reader thread exiting");
    });
}

fn spawn_writer(mut writer: Box<dyn Write + Send>, rx: std::sync::mpsc::Receiver<Vec<u8>>) {
    thread::spawn(move || {
        while let Ok(data) = rx.recv() {
            let result = writer.write_all(&data).and_then(|_| writer.flush());
            if let Err(e) = result {
                error!("Console write failed: {}", e);
                break;
            }
        }
        debug!("Console writer thread exiting");
    });
}
