//! Error types and Result aliases for modepilot

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Mode;

/// Result type alias for modepilot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modepilot
#[derive(Debug)]
pub enum Error {
    // === Planning errors (raised before any console I/O) ===
    /// A query referenced a mode that was never declared
    UnknownMode {
        mode: Mode,
    },

    /// No route exists between two modes under the requested strategy
    NoPathFound {
        from: Mode,
        to: Mode,
    },

    /// A planned hop has no transition function registered for it
    MissingTransition {
        from: Mode,
        to: Mode,
    },

    // === Hop errors (raised while driving the device) ===
    /// The transition function kept failing until the retry bound was hit
    HopExecutionFailed {
        from: Mode,
        to: Mode,
        attempts: u32,
        hops_completed: usize,
        last_confirmed: Mode,
        reason: String,
    },

    /// The device did not arrive at the expected mode
    VerificationMismatch {
        from: Mode,
        to: Mode,
        actual: Option<Mode>,
        attempts: u32,
        hops_completed: usize,
        last_confirmed: Mode,
    },

    /// The caller cancelled the goto between hops, or the transport honoured a
    /// cancellation mid-hop
    Cancelled {
        from: Mode,
        to: Mode,
        hops_completed: usize,
        last_confirmed: Mode,
    },

    // === Prompt resolution errors ===
    /// Console text matched a prompt shared by several modes
    AmbiguousPrompt {
        candidates: Vec<Mode>,
    },

    /// Console text matched no known prompt
    NoMatch {
        tail: String,
    },

    // === Console errors ===
    /// Failed to spawn the console client
    ConsoleSpawnFailed {
        command: String,
        reason: String,
    },

    /// Failed to clone the console reader
    ConsoleReaderCloneFailed {
        reason: String,
    },

    /// Failed to take the console writer
    ConsoleWriterTakeFailed {
        reason: String,
    },

    /// Failed to send data to the console
    ConsoleSendFailed {
        reason: String,
    },

    /// Waiting for console text timed out
    ConsoleTimeout {
        pattern: String,
        duration: Duration,
    },

    /// The console closed while data was expected
    ConsoleClosed,

    // === Configuration errors ===
    /// Failed to load a product definition file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// No product definition found in any search path
    ConfigNotFound,

    /// Product definition validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to serialize a product definition
    ConfigSerializationFailed {
        format: String,
        reason: String,
    },

    /// Failed to parse a product definition
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    /// Static mode/prompt definitions are inconsistent
    Definition(DefinitionError),

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors (for cases not yet categorized)
    Other(String),
}

/// Problems found while building a graph or prompt map from static definitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Mode name cannot be empty")]
    EmptyModeName,

    #[error("Invalid mode key '{0}'")]
    InvalidModeKey(String),

    #[error("Mode '{0}' declared more than once")]
    DuplicateMode(Mode),

    #[error("Edge {from} -> {to} points at an undeclared mode")]
    UndeclaredEdgeTarget { from: Mode, to: Mode },

    #[error("Prompt declared for undeclared mode '{0}'")]
    UndeclaredPromptMode(Mode),

    #[error("Invalid prompt pattern for '{mode}': {reason}")]
    InvalidPromptPattern { mode: Mode, reason: String },

    #[error("Transition declared for undeclared edge {from} -> {to}")]
    UndeclaredTransitionEdge { from: Mode, to: Mode },
}

impl Error {
    /// True when the error was raised before any console interaction
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownMode { .. } | Error::NoPathFound { .. } | Error::MissingTransition { .. }
        )
    }

    /// The most recent mode the executor confirmed, for hop-level failures
    pub fn last_confirmed(&self) -> Option<&Mode> {
        match self {
            Error::HopExecutionFailed { last_confirmed, .. }
            | Error::VerificationMismatch { last_confirmed, .. }
            | Error::Cancelled { last_confirmed, .. } => Some(last_confirmed),
            _ => None,
        }
    }

    /// The (from, to) edge a hop-level failure happened on
    pub fn failed_edge(&self) -> Option<(&Mode, &Mode)> {
        match self {
            Error::HopExecutionFailed { from, to, .. }
            | Error::VerificationMismatch { from, to, .. }
            | Error::Cancelled { from, to, .. } => Some((from, to)),
            _ => None,
        }
    }

    /// True for a cancellation, whether caller-initiated or reported by a transport
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Planning errors
            Error::UnknownMode { mode } => {
                write!(f, "Unknown mode '{}'", mode)
            }
            Error::NoPathFound { from, to } => {
                write!(f, "No path found from '{}' to '{}'", from, to)
            }
            Error::MissingTransition { from, to } => {
                write!(f, "No transition registered for '{}' -> '{}'", from, to)
            }

            // Hop errors
            Error::HopExecutionFailed {
                from,
                to,
                attempts,
                hops_completed,
                last_confirmed,
                reason,
            } => write!(
                f,
                "Hop '{}' -> '{}' failed after {} attempt(s) ({} hop(s) completed, last confirmed '{}'): {}",
                from, to, attempts, hops_completed, last_confirmed, reason
            ),
            Error::VerificationMismatch {
                from,
                to,
                actual,
                attempts,
                hops_completed,
                last_confirmed,
            } => {
                let actual = actual
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "<unresolved>".to_string());
                write!(
                    f,
                    "Hop '{}' -> '{}' arrived at '{}' after {} attempt(s) ({} hop(s) completed, last confirmed '{}')",
                    from, to, actual, attempts, hops_completed, last_confirmed
                )
            }
            Error::Cancelled {
                from,
                to,
                hops_completed,
                last_confirmed,
            } => write!(
                f,
                "Cancelled before completing hop '{}' -> '{}' ({} hop(s) completed, last confirmed '{}')",
                from, to, hops_completed, last_confirmed
            ),

            // Prompt errors
            Error::AmbiguousPrompt { candidates } => {
                let names: Vec<String> = candidates.iter().map(|m| m.to_string()).collect();
                write!(f, "Ambiguous prompt, candidates: {}", names.join(", "))
            }
            Error::NoMatch { tail } => {
                write!(f, "No prompt matched console text {:?}", tail)
            }

            // Console errors
            Error::ConsoleSpawnFailed { command, reason } => {
                write!(f, "Failed to spawn console '{}': {}", command, reason)
            }
            Error::ConsoleReaderCloneFailed { reason } => {
                write!(f, "Failed to clone console reader: {}", reason)
            }
            Error::ConsoleWriterTakeFailed { reason } => {
                write!(f, "Failed to take console writer: {}", reason)
            }
            Error::ConsoleSendFailed { reason } => {
                write!(f, "Failed to send to console: {}", reason)
            }
            Error::ConsoleTimeout { pattern, duration } => {
                write!(f, "Timed out after {:?} waiting for '{}'", duration, pattern)
            }
            Error::ConsoleClosed => {
                write!(f, "Console closed")
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load definition from '{}': {}", path.display(), reason)
            }
            Error::ConfigNotFound => {
                write!(f, "Product definition not found")
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Definition validation failed for '{}': {}", field, reason)
            }
            Error::ConfigSerializationFailed { format, reason } => {
                write!(f, "Failed to serialize definition as {}: {}", format, reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} definition: {}", format, reason)
            }
            Error::Definition(err) => write!(f, "Definition error: {}", err),

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            // Generic fallback
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<DefinitionError> for Error {
    fn from(err: DefinitionError) -> Self {
        Error::Definition(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
