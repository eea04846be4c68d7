//! Configuration trait and JSON load/save helpers.
//!
//! Every configurable type in the workspace (dialect defaults, remote
//! translator endpoints, …) implements [`Config`] so it can be round-tripped
//! through JSON and validated before use.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration trait that all configuration types should implement.
pub trait Config: for<'de> Deserialize<'de> + Serialize + fmt::Debug {
    /// Validate the configuration. The default accepts anything.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Load a JSON configuration file and validate it.
pub fn load_config_from_file<T: Config>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let config: T = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Validate and save a configuration as pretty-printed JSON.
pub fn save_config_to_file<T: Config>(config: &T, path: &str) -> Result<()> {
    config.validate()?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
