use std::path::Path;

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum accepted size of a POST body (in bytes)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Fail the request when mkdir/remove fails instead of ignoring it
    #[serde(default)]
    pub surface_mutation_errors: bool,

    /// List entries whose name starts with a dot
    #[serde(default)]
    pub show_hidden: bool,
}

fn default_max_upload_bytes() -> u64 {
    1 << 30 // 1 GiB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            surface_mutation_errors: false,
            show_hidden: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
