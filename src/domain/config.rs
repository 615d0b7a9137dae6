use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutMetrics;

/// Configuration for a family tree data directory.
///
/// Controls where the tree is persisted and the pixel metrics used when
/// laying out the diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The storage key the tree blob is saved under.
    ///
    /// With the file backend this becomes `<key>.json` in the data directory.
    storage_key: String,

    /// Pixel metrics for the diagram layout.
    pub layout: LayoutMetrics,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            layout: LayoutMetrics::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the key the tree is persisted under.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Sets the key the tree is persisted under.
    ///
    /// Blank keys are ignored.
    pub fn set_storage_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !key.trim().is_empty() {
            self.storage_key = key;
        }
    }
}

fn default_storage_key() -> String {
    "family-tree".to_string()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_storage_key")]
        storage_key: String,

        /// Layout metrics; any field left out keeps its default.
        #[serde(default)]
        layout: LayoutMetrics,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                storage_key,
                layout,
            } => {
                let mut config = Self {
                    storage_key: default_storage_key(),
                    layout,
                };
                config.set_storage_key(storage_key);
                config
            }
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            storage_key: config.storage_key,
            layout: config.layout,
        }
    }
}
