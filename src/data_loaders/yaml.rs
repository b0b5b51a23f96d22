// ~/src/data_loaders/yaml.rs

use std::{fs, path::Path};

use serde_yaml::Value;

use crate::warn;

/// Reads and parses a YAML document. A missing file is `None` without noise;
/// a file that exists but does not parse is logged and also `None`.
pub fn load_yaml(path: &Path) -> Option<Value> {
    let txt = fs::read_to_string(path).ok()?;
    parse_yaml(&txt).or_else(|| {
        warn!("[CONFIG] Failed to parse {}; using defaults", path.display());
        None
    })
}

pub fn parse_yaml(txt: &str) -> Option<Value> {
    serde_yaml::from_str::<Value>(txt).ok()
}
