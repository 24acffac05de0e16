//! Configuration for the preparation run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Column names carrying each semantic field of an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub region: String,
    pub parameter: String,
    pub stimulus_type: String,
    pub subject_id: String,
    pub correlation_by_condition: String,
    pub correlation_overall: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            region: "region".to_string(),
            parameter: "parameter".to_string(),
            stimulus_type: "stimulus_type".to_string(),
            subject_id: "subject_id".to_string(),
            correlation_by_condition: "correlation_by_condition".to_string(),
            correlation_overall: "correlation_overall".to_string(),
        }
    }
}

/// Which slice of the dataset to summarise, and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Region of interest to keep
    #[serde(default = "default_region")]
    pub region: String,

    /// Parameter (signal/model type) to keep
    #[serde(default = "default_parameter")]
    pub parameter: String,

    /// Stimulus type that forms the target condition group
    #[serde(default = "default_target_stimulus")]
    pub target_stimulus: String,

    #[serde(default)]
    pub columns: ColumnNames,
}

fn default_region() -> String {
    "SC".to_string()
}

fn default_parameter() -> String {
    "flynet".to_string()
}

fn default_target_stimulus() -> String {
    "ring_expand".to_string()
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            parameter: default_parameter(),
            target_stimulus: default_target_stimulus(),
            columns: ColumnNames::default(),
        }
    }
}

impl PrepareConfig {
    /// Load configuration from a JSON file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
