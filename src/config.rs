use crate::emitter::{BindingProfile, DEFAULT_NAMESPACE};
use crate::error::ConfigError;
use crate::sanitize::invalid_namespace_segment;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings of one generation run, matching the JSON config file format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratorConfig {
    /// C++ namespace and FPP module of the emitted code.
    pub namespace: String,
    pub binding: BindingProfile,
    /// Whether the `.fpp` component model is emitted alongside the C++ pair.
    pub emit_component_model: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            binding: BindingProfile::Production,
            emit_component_model: true,
        }
    }
}

impl GeneratorConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings that serde cannot: every namespace segment must be a C++
    /// identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match invalid_namespace_segment(&self.namespace) {
            Some(segment) => Err(ConfigError::InvalidNamespace {
                namespace: self.namespace.clone(),
                segment: segment.to_string(),
            }),
            None => Ok(()),
        }
    }
}
