//! Prompt Matching
//!
//! Resolves console text to the mode whose prompt is currently showing.
//! Patterns are evaluated in declaration order against the tail of the
//! buffer and the first match wins, so more specific prompts (an enabled CLI
//! `switch#` before the unprivileged `switch>`) must be declared first.

use std::fmt;

use regex::Regex;

use super::buffer::{strip_escapes, tail_chars};
use crate::error::{DefinitionError, Error, Result};
use crate::graph::ModeGraph;
use crate::models::Mode;

/// Default number of trailing characters a prompt is searched in
pub const DEFAULT_TAIL_CHARS: usize = 512;

/// Outcome of resolving console text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one mode owns the first matching prompt
    Matched(Mode),
    /// The first matching prompt is declared for several modes
    Ambiguous(Vec<Mode>),
    /// No declared prompt matches
    NoMatch,
}

impl Resolution {
    /// The resolved mode, if unambiguous
    pub fn mode(&self) -> Option<&Mode> {
        match self {
            Resolution::Matched(mode) => Some(mode),
            _ => None,
        }
    }

    /// Whether `mode` is the match or one of the ambiguous candidates
    pub fn admits(&self, mode: &Mode) -> bool {
        match self {
            Resolution::Matched(m) => m == mode,
            Resolution::Ambiguous(candidates) => candidates.contains(mode),
            Resolution::NoMatch => false,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Matched(mode) => write!(f, "{}", mode),
            Resolution::Ambiguous(candidates) => {
                let names: Vec<String> = candidates.iter().map(|m| m.to_string()).collect();
                write!(f, "ambiguous ({})", names.join(", "))
            }
            Resolution::NoMatch => write!(f, "no match"),
        }
    }
}

/// A declared prompt
#[derive(Debug, Clone)]
pub struct PromptPattern {
    mode: Mode,
    source: String,
    /// Compiled with an end-of-text anchor
    anchored: Regex,
}

impl PromptPattern {
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Pattern as declared
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Regex matching the prompt at the end of text (trailing whitespace allowed)
    pub fn regex(&self) -> &Regex {
        &self.anchored
    }
}

/// Ordered prompt table
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    patterns: Vec<PromptPattern>,
    tail_chars: usize,
}

impl Default for PromptMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptMatcher {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            tail_chars: DEFAULT_TAIL_CHARS,
        }
    }

    /// Build from ordered `(mode, pattern)` pairs
    pub fn from_pairs<M, P, I>(pairs: I) -> std::result::Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = (M, P)>,
        M: Into<Mode>,
        P: AsRef<str>,
    {
        let mut matcher = Self::new();
        for (mode, pattern) in pairs {
            matcher.add(mode, pattern.as_ref())?;
        }
        Ok(matcher)
    }

    /// Limit matching to the last `tail_chars` characters of console text
    pub fn with_tail_chars(mut self, tail_chars: usize) -> Self {
        self.tail_chars = tail_chars.max(1);
        self
    }

    pub fn tail_chars(&self) -> usize {
        self.tail_chars
    }

    /// Declare a prompt for `mode`
    ///
    /// A second declaration for the same mode replaces the first one in place,
    /// keeping its position in the evaluation order.
    pub fn add(
        &mut self,
        mode: impl Into<Mode>,
        pattern: &str,
    ) -> std::result::Result<&mut Self, DefinitionError> {
        let mode = mode.into();
        let anchored = compile_anchored(pattern).map_err(|e| DefinitionError::InvalidPromptPattern {
            mode: mode.clone(),
            reason: e.to_string(),
        })?;
        let entry = PromptPattern {
            mode,
            source: pattern.to_string(),
            anchored,
        };

        match self.patterns.iter_mut().find(|p| p.mode == entry.mode) {
            Some(existing) => {
                debug!("Prompt for {} overridden: {:?}", entry.mode, pattern);
                *existing = entry;
            }
            None => self.patterns.push(entry),
        }
        Ok(self)
    }

    /// Resolve console text to a mode
    pub fn resolve(&self, console_text: &str) -> Resolution {
        let plain = strip_escapes(console_text);
        let tail = tail_chars(&plain, self.tail_chars);

        let Some(winner) = self.patterns.iter().find(|p| p.anchored.is_match(tail)) else {
            trace!("No prompt matched tail {:?}", tail);
            return Resolution::NoMatch;
        };

        let owners: Vec<Mode> = self
            .patterns
            .iter()
            .filter(|p| p.source == winner.source)
            .map(|p| p.mode.clone())
            .collect();

        if owners.len() > 1 {
            debug!("Prompt {:?} shared by {} modes", winner.source, owners.len());
            Resolution::Ambiguous(owners)
        } else {
            Resolution::Matched(winner.mode.clone())
        }
    }

    /// Resolve, turning anything but a single match into an error
    pub fn resolve_mode(&self, console_text: &str) -> Result<Mode> {
        match self.resolve(console_text) {
            Resolution::Matched(mode) => Ok(mode),
            Resolution::Ambiguous(candidates) => Err(Error::AmbiguousPrompt { candidates }),
            Resolution::NoMatch => {
                let plain = strip_escapes(console_text);
                Err(Error::NoMatch {
                    tail: tail_chars(&plain, 80).to_string(),
                })
            }
        }
    }

    /// Prompt declared for exactly this mode
    pub fn pattern_for(&self, mode: &Mode) -> Option<&PromptPattern> {
        self.patterns.iter().find(|p| &p.mode == mode)
    }

    /// Prompt to expect when arriving in `mode`
    ///
    /// Falls back to a prompt declared for another mode with the same name, so
    /// variants inherit the prompt of their base mode.
    pub fn expected_prompt(&self, mode: &Mode) -> Option<&Regex> {
        self.pattern_for(mode)
            .or_else(|| self.patterns.iter().find(|p| p.mode.same_name(mode)))
            .map(|p| &p.anchored)
    }

    pub fn patterns(&self) -> &[PromptPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every prompt must belong to a declared mode
    pub fn validate_against(&self, graph: &ModeGraph) -> std::result::Result<(), DefinitionError> {
        for pattern in &self.patterns {
            if !graph.contains(&pattern.mode) {
                return Err(DefinitionError::UndeclaredPromptMode(pattern.mode.clone()));
            }
        }
        Ok(())
    }
}

fn compile_anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(pattern)?;
    Regex::new(&format!(r"(?m)(?:{})[ \t\r\n]*\z", pattern))
}
