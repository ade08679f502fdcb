//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded by the binary
//! through `dotenvy`); CLI flags override them.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::registry::DEFAULT_TEMPLATES_DIR;
use crate::transform::encoder::PREVIEW_ROWS;

pub const ENV_PORT: &str = "CATALOG_BUDDY_PORT";
pub const ENV_TEMPLATES_DIR: &str = "CATALOG_BUDDY_TEMPLATES_DIR";
pub const ENV_MAX_UPLOAD_MB: &str = "CATALOG_BUDDY_MAX_UPLOAD_MB";
pub const ENV_PREVIEW_ROWS: &str = "CATALOG_BUDDY_PREVIEW_ROWS";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Server and CLI settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub templates_dir: PathBuf,
    pub max_upload_mb: usize,
    pub preview_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            templates_dir: PathBuf::from(DEFAULT_TEMPLATES_DIR),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            preview_rows: PREVIEW_ROWS,
        }
    }
}

impl AppConfig {
    /// Read the process environment; unset or unparsable values keep defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            port: env_parse(&lookup, ENV_PORT).unwrap_or(defaults.port),
            templates_dir: lookup(ENV_TEMPLATES_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.templates_dir),
            max_upload_mb: env_parse(&lookup, ENV_MAX_UPLOAD_MB).unwrap_or(defaults.max_upload_mb),
            preview_rows: env_parse(&lookup, ENV_PREVIEW_ROWS).unwrap_or(defaults.preview_rows),
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_templates_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.templates_dir = dir;
        }
        self
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Parse one variable; unset or unparsable gives `None`.
fn env_parse<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
