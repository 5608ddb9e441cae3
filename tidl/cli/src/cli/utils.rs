use anyhow::{Context, Result};
use std::path::Path;

use config::TidlConfig;

use crate::loader::SchemaDocument;

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn read_config(path: Option<&Path>) -> Result<TidlConfig> {
    let Some(path) = path else {
        return Ok(TidlConfig::default());
    };
    let config_contents = std::fs::read_to_string(path).with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let config = if is_json(path) {
        TidlConfig::from_json(&config_contents).with_context(|| format!("failed to parse config file '{}'", path.display()))?
    } else {
        TidlConfig::from_yaml(&config_contents).with_context(|| format!("failed to parse config file '{}'", path.display()))?
    };
    Ok(config)
}

/// Reads a schema document. Anything that is not `.json` is read as YAML.
pub fn read_schema(path: &Path) -> Result<SchemaDocument> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read schema '{}'", path.display()))?;
    let doc = if is_json(path) {
        serde_json::from_str(&contents).with_context(|| format!("failed to parse schema '{}'", path.display()))?
    } else {
        serde_yaml::from_str(&contents).with_context(|| format!("failed to parse schema '{}'", path.display()))?
    };
    Ok(doc)
}
