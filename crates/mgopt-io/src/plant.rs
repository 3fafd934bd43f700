//! Plant descriptor (JSON) and run configuration (TOML).

use anyhow::{Context, Result};
use mgopt_core::{DispatchConfig, Plant};
use std::fs;
use std::path::Path;

pub fn parse_plant(text: &str) -> Result<Plant> {
    let plant: Plant = serde_json::from_str(text).context("parsing plant descriptor")?;
    plant.validate().context("validating plant descriptor")?;
    Ok(plant)
}

/// Reads and validates a plant descriptor.
pub fn load_plant(path: &Path) -> Result<Plant> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading plant file '{}'", path.display()))?;
    let plant = parse_plant(&text).with_context(|| format!("in '{}'", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        components = plant.components.len(),
        nodes = plant.nodes.len(),
        lines = plant.lines.len(),
        "plant loaded"
    );
    Ok(plant)
}

pub fn parse_config(text: &str) -> Result<DispatchConfig> {
    let config: DispatchConfig = toml::from_str(text).context("parsing dispatch config")?;
    config.validate().context("validating dispatch config")?;
    Ok(config)
}

/// Reads a TOML config, or the defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<DispatchConfig> {
    let Some(path) = path else {
        return Ok(DispatchConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file '{}'", path.display()))?;
    parse_config(&text).with_context(|| format!("in '{}'", path.display()))
}
