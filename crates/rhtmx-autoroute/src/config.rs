// File: src/config.rs
// Purpose: Configuration parsing from autoroute.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Route engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Directory scanned for handler files (default: "./src")
    #[serde(default = "default_source_directory", alias = "sourceDirectory")]
    pub source_directory: PathBuf,

    /// Prefix all discovered routes are grouped under (default: "/")
    #[serde(default = "default_base_path", alias = "basePath")]
    pub base_path: String,

    /// Informational only
    #[serde(default = "default_false")]
    pub cacheable: bool,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Extensions of handler and middleware files (default: ["rs"])
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Whether to watch the source directory for changes
    #[serde(default = "default_true")]
    pub watch: bool,

    /// Capacity of the pending filesystem event queue
    #[serde(default = "default_event_buffer", alias = "eventBuffer")]
    pub event_buffer: usize,
}

// Default values
fn default_source_directory() -> PathBuf {
    PathBuf::from("./src")
}

fn default_base_path() -> String {
    "/".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["rs".to_string()]
}

fn default_event_buffer() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            source_directory: default_source_directory(),
            base_path: default_base_path(),
            cacheable: false,
            port: default_port(),
            host: default_host(),
            extensions: default_extensions(),
            watch: true,
            event_buffer: default_event_buffer(),
        }
    }
}

impl RouteConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing or empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load configuration from default path (./autoroute.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("autoroute.toml")
    }

    pub fn with_source_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_directory = dir.into();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
