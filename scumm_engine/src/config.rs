use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How variable indices past the end of their array are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingPolicy {
    /// Out-of-range accesses fail with `VmError::VariableOutOfRange`.
    #[default]
    Strict,
    /// Indices wrap around the array and a warning is logged.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub num_variables: usize,
    pub num_bit_variables: usize,
    pub num_script_slots: usize,
    /// Script numbers below this are global; the rest are room-local.
    pub num_global_scripts: u16,
    pub num_actors: usize,
    pub addressing: AddressingPolicy,
    /// Lowest box index considered when snapping points into walk boxes.
    pub first_walk_box: u8,
    pub walk_speed_x: i32,
    pub walk_speed_y: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            num_variables: 800,
            num_bit_variables: 4096,
            num_script_slots: 80,
            num_global_scripts: 200,
            num_actors: 13,
            addressing: AddressingPolicy::Strict,
            first_walk_box: 0,
            walk_speed_x: 8,
            walk_speed_y: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }

    pub fn legacy_addressing(mut self) -> Self {
        self.addressing = AddressingPolicy::Legacy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "num_script_slots": 10, "addressing": "legacy" }}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.num_script_slots, 10);
        assert_eq!(config.addressing, AddressingPolicy::Legacy);
        assert_eq!(config.num_variables, 800);
        assert_eq!(config.walk_speed_x, 8);
    }

    #[test]
    fn malformed_json_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = EngineConfig::from_json_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing engine config"));
    }
}
