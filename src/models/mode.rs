//! Mode Identity
//!
//! A mode is a named device execution context (bootloader, Linux shell,
//! diagnostic shell, OS CLI). Two logically different situations that share a
//! prompt name are told apart by an optional variant, so the key is the pair
//! `(name, variant)` rather than the name alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

/// Separator used in the textual form `name#variant`
pub const VARIANT_SEPARATOR: char = '#';

/// Composite key identifying a device mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode {
    name: String,
    variant: Option<String>,
}

impl Mode {
    /// Create a mode with no variant
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: None,
        }
    }

    /// Create a mode carrying a variant discriminator
    pub fn with_variant(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: Some(variant.into()),
        }
    }

    /// The textual mode name as seen on the console
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variant discriminator, if any
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// True when both modes share the textual name, regardless of variant
    pub fn same_name(&self, other: &Mode) -> bool {
        self.name == other.name
    }

    /// Parse and validate a `name` or `name#variant` key
    pub fn parse(key: &str) -> Result<Self, DefinitionError> {
        let key = key.trim();
        let (name, variant) = match key.split_once(VARIANT_SEPARATOR) {
            Some((name, variant)) => (name.trim(), Some(variant.trim())),
            None => (key, None),
        };

        if name.is_empty() {
            return Err(DefinitionError::EmptyModeName);
        }

        match variant {
            Some(v) if v.is_empty() || v.contains(VARIANT_SEPARATOR) => {
                Err(DefinitionError::InvalidModeKey(key.to_string()))
            }
            Some(v) => Ok(Mode::with_variant(name, v)),
            None => Ok(Mode::new(name)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}{}{}", self.name, VARIANT_SEPARATOR, variant),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Mode {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::parse(s)
    }
}

impl TryFrom<String> for Mode {
    type Error = DefinitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Mode::parse(&value)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

/// Unvalidated conversion for literals; splits on the first `#`
impl From<&str> for Mode {
    fn from(key: &str) -> Self {
        match key.split_once(VARIANT_SEPARATOR) {
            Some((name, variant)) => Mode::with_variant(name, variant),
            None => Mode::new(key),
        }
    }
}
