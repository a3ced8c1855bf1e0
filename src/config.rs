//! Engine configuration
//!
//! Loaded from YAML with every field optional, then adjusted from the
//! environment:
//!
//! ```yaml
//! layout:
//!   unit_width: 200
//!   level_spacing: 140
//! fetch_depth: 6
//! search:
//!   default_mode: code_exact
//! ```
//!
//! | Variable                | Field                  |
//! |-------------------------|------------------------|
//! | `REFTREE_UNIT_WIDTH`    | `layout.unit_width`    |
//! | `REFTREE_LEVEL_SPACING` | `layout.level_spacing` |
//! | `REFTREE_FETCH_DEPTH`   | `fetch_depth`          |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::NetworkError;
use crate::layout::LayoutConfig;
use crate::search::MatchMode;

pub const ENV_UNIT_WIDTH: &str = "REFTREE_UNIT_WIDTH";
pub const ENV_LEVEL_SPACING: &str = "REFTREE_LEVEL_SPACING";
pub const ENV_FETCH_DEPTH: &str = "REFTREE_FETCH_DEPTH";

/// Default number of levels requested from the hierarchy source
pub const DEFAULT_FETCH_DEPTH: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_mode: MatchMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub fetch_depth: u32,
    pub search: SearchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            fetch_depth: DEFAULT_FETCH_DEPTH,
            search: SearchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, NetworkError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| NetworkError::invalid_config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            NetworkError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `REFTREE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, NetworkError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, NetworkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var::<f32, _>(&lookup, ENV_UNIT_WIDTH)? {
            self.layout.unit_width = v;
        }
        if let Some(v) = parse_var::<f32, _>(&lookup, ENV_LEVEL_SPACING)? {
            self.layout.level_spacing = v;
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, ENV_FETCH_DEPTH)? {
            self.fetch_depth = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), NetworkError> {
        let unit = self.layout.unit_width;
        if !unit.is_finite() || unit <= 0.0 {
            return Err(NetworkError::invalid_config(format!(
                "layout.unit_width must be a positive number, got {}",
                unit
            )));
        }
        let spacing = self.layout.level_spacing;
        if !spacing.is_finite() || spacing < 0.0 {
            return Err(NetworkError::invalid_config(format!(
                "layout.level_spacing must be zero or positive, got {}",
                spacing
            )));
        }
        if self.fetch_depth == 0 {
            return Err(NetworkError::invalid_config("fetch_depth must be at least 1"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, NetworkError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            NetworkError::invalid_config(format!("{} has an invalid value: '{}'", key, raw))
        }),
    }
}
