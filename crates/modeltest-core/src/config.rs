//! Harness configuration
//!
//! The legacy versions a harness checks, and how to obtain their
//! controllers, are passed in explicitly through a [`HarnessConfig`].
//! Configurations load from TOML or YAML:
//!
//! ```toml
//! max_correction_rounds = 8
//!
//! [legacy_versions."1.2.0"]
//! artifact = "in-memory:logging-1.2.0"
//! kind = "in-process"
//! ```

use std::path::Path;

use indexmap::IndexMap;
use modeltest_model::ModelVersion;
use serde::{Deserialize, Serialize};

/// Default bound on correction rounds per operation
pub const DEFAULT_MAX_CORRECTION_ROUNDS: usize = 16;

/// How a legacy controller is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerKind {
    /// Second executor in the same process
    #[default]
    InProcess,
    /// Separate process speaking the model wire form
    OutOfProcess,
}

impl ControllerKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProcess => "in-process",
            Self::OutOfProcess => "out-of-process",
        }
    }
}

/// Where to find the controller of one legacy version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyControllerEntry {
    /// Artifact locator of the legacy controller
    pub artifact: String,
    #[serde(default)]
    pub kind: ControllerKind,
}

impl LegacyControllerEntry {
    #[inline]
    #[must_use]
    pub fn new(artifact: impl Into<String>, kind: ControllerKind) -> Self {
        Self {
            artifact: artifact.into(),
            kind,
        }
    }

    #[inline]
    #[must_use]
    pub fn in_process(artifact: impl Into<String>) -> Self {
        Self::new(artifact, ControllerKind::InProcess)
    }
}

/// Legacy versions in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyVersionTable(IndexMap<ModelVersion, LegacyControllerEntry>);

impl LegacyVersionTable {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_version(mut self, version: ModelVersion, entry: LegacyControllerEntry) -> Self {
        self.0.insert(version, entry);
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, version: ModelVersion) -> Option<&LegacyControllerEntry> {
        self.0.get(&version)
    }

    #[inline]
    pub fn versions(&self) -> impl Iterator<Item = ModelVersion> + '_ {
        self.0.keys().copied()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (ModelVersion, &LegacyControllerEntry)> {
        self.0.iter().map(|(version, entry)| (*version, entry))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Replay engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Correction rounds allowed per operation before giving up
    #[serde(default = "default_max_correction_rounds")]
    pub max_correction_rounds: usize,
    /// Legacy versions to check
    #[serde(default)]
    pub legacy_versions: LegacyVersionTable,
}

fn default_max_correction_rounds() -> usize {
    DEFAULT_MAX_CORRECTION_ROUNDS
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_correction_rounds: DEFAULT_MAX_CORRECTION_ROUNDS,
            legacy_versions: LegacyVersionTable::default(),
        }
    }
}

impl HarnessConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_correction_rounds(mut self, rounds: usize) -> Self {
        self.max_correction_rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_legacy_version(mut self, version: ModelVersion, entry: LegacyControllerEntry) -> Self {
        self.legacy_versions = self.legacy_versions.with_version(version, entry);
        self
    }

    /// Parse and validate a TOML configuration
    ///
    /// # Errors
    /// Returns error if the TOML is invalid or fails validation
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML configuration
    ///
    /// # Errors
    /// Returns error if the YAML is invalid or fails validation
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, choosing the format by extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read, has an unknown extension,
    /// or does not parse
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&source),
            Some("yaml" | "yml") => Self::from_yaml(&source),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_correction_rounds == 0 {
            return Err(ConfigError::Invalid(
                "max_correction_rounds must be positive".to_string(),
            ));
        }
        for (version, entry) in self.legacy_versions.iter() {
            if entry.artifact.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "legacy version {version} has an empty artifact locator"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LEGACY: ModelVersion = ModelVersion::new(1, 2, 0);

    #[test]
    fn toml_round_trip() {
        let config = HarnessConfig::new()
            .with_max_correction_rounds(4)
            .with_legacy_version(LEGACY, LegacyControllerEntry::in_process("in-memory:logging-1.2.0"));
        let parsed = HarnessConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn yaml_defaults() {
        let config = HarnessConfig::from_yaml(
            "legacy_versions:\n  \"1.2.0\":\n    artifact: in-memory:logging-1.2.0\n",
        )
        .unwrap();
        assert_eq!(config.max_correction_rounds, DEFAULT_MAX_CORRECTION_ROUNDS);
        assert_eq!(
            config.legacy_versions.get(LEGACY).map(|entry| entry.kind),
            Some(ControllerKind::InProcess)
        );
    }

    #[test]
    fn versions_keep_declaration_order() {
        let config = HarnessConfig::from_toml(
            r#"
            [legacy_versions."2.0.0"]
            artifact = "a"
            [legacy_versions."1.2.0"]
            artifact = "b"
            kind = "out-of-process"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.legacy_versions.versions().collect::<Vec<_>>(),
            vec![ModelVersion::new(2, 0, 0), LEGACY]
        );
        assert_eq!(
            config.legacy_versions.get(LEGACY).unwrap().kind,
            ControllerKind::OutOfProcess
        );
    }

    #[test]
    fn validation() {
        assert!(matches!(
            HarnessConfig::from_toml("max_correction_rounds = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HarnessConfig::from_toml("[legacy_versions.\"1.2.0\"]\nartifact = \" \""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HarnessConfig::from_toml("[legacy_versions.\"one\"]\nartifact = \"x\""),
            Err(ConfigError::InvalidToml(_))
        ));
    }
}
