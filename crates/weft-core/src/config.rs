use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine behavior toggles, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allow direct relations between nodes of different projects.
    #[serde(default)]
    pub cross_project_relations: bool,
    /// Propagate dates along `precedes` edges after a relation is created.
    #[serde(default = "default_true")]
    pub propagate_dates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cross_project_relations: false,
            propagate_dates: default_true(),
        }
    }
}

/// Load the engine config from `path`. A missing file is not an error; it
/// yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_true() -> bool {
    true
}
