//! Product Definition Loading
//!
//! Finds, parses and saves product definitions. The format follows the file
//! extension (TOML unless the file ends in `.json`).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::ProductConfig;
use crate::error::{Error, Result};

/// Environment variable naming a product definition file
pub const CONFIG_ENV_VAR: &str = "MODEPILOT_CONFIG";

/// Product definition loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base paths searched, without extension
    search_paths: Vec<PathBuf>,
    supported_formats: Vec<ConfigFormat>,
    /// Path of the last definition loaded
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format implied by a file extension, TOML by default
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            supported_formats: vec![ConfigFormat::Toml, ConfigFormat::Json],
            current_path: None,
        }
    }

    /// Load and validate the first definition found in the search paths
    pub fn load(&mut self) -> Result<ProductConfig> {
        match self.find_and_load_config()? {
            Some((path, config)) => {
                self.validate_config(&config)?;
                info!("Loaded product definition from {}", path.display());
                self.current_path = Some(path);
                Ok(config)
            }
            None => Err(Error::ConfigNotFound),
        }
    }

    /// Load and validate a specific file
    pub fn load_from_path(&mut self, path: &Path) -> Result<ProductConfig> {
        let format = ConfigFormat::from_path(path);
        let config = self.load_config_file(path, format)?;
        self.validate_config(&config)?;
        self.current_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save a definition, picking the format from the extension
    pub fn save_to_path(&self, config: &ProductConfig, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let format = ConfigFormat::from_path(path);
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                Error::ConfigSerializationFailed {
                    format: format.label().to_string(),
                    reason: e.to_string(),
                }
            })?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| Error::ConfigSerializationFailed {
                    format: format.label().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// Find and load a definition from the search paths
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, ProductConfig)>> {
        for path in &self.search_paths {
            for format in &self.supported_formats {
                let config_path = path.with_extension(format.extension());
                if !config_path.exists() {
                    continue;
                }
                match self.load_config_file(&config_path, *format) {
                    Ok(config) => return Ok(Some((config_path, config))),
                    Err(e) => {
                        warn!(
                            "Failed to load product definition from {}: {}",
                            config_path.display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(None)
    }

    fn load_config_file(&self, path: &Path, format: ConfigFormat) -> Result<ProductConfig> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                format: format.label().to_string(),
                reason: e.to_string(),
            }),
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                    format: format.label().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Default search paths, most specific first
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(explicit) = env::var(CONFIG_ENV_VAR) {
            if !explicit.trim().is_empty() {
                paths.push(PathBuf::from(explicit));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("modepilot").join("product"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".modepilot").join("product"));
        }

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join(".modepilot").join("product"));
        }

        paths
    }

    fn validate_config(&self, config: &ProductConfig) -> Result<()> {
        config.validate()?;
        // Cross references are only checkable once the graph exists
        let graph = config.build_graph()?;
        config.build_prompts()?.validate_against(&graph)?;
        config.build_transitions()?.validate_against(&graph)?;
        Ok(())
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
