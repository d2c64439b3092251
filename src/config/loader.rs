//! Configuration Loader
//!
//! Environment-aware YAML loading. A configuration directory holds a base
//! `publisher.yaml` and optional `publisher.{environment}.yaml` overlays; the
//! overlay is deep-merged over the base, then `PUBLISHER_*` environment
//! variables are applied and the result is validated.

use super::error::{ConfigResult, ConfigurationError};
use super::PublisherConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BASE_FILE: &str = "publisher.yaml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Detect the deployment environment from the environment variables
    pub fn detect_environment() -> String {
        env::var("PUBLISHER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    /// Parse a YAML document; missing sections take their defaults
    pub fn load_from_str(yaml: &str) -> ConfigResult<PublisherConfig> {
        let config: PublisherConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single YAML file with environment overrides applied
    pub fn load_from_file(path: &Path) -> ConfigResult<PublisherConfig> {
        let value = Self::read_yaml(path)?;
        Self::finish(value)
    }

    /// Load `publisher.yaml` from `directory`, merged with the overlay for
    /// `environment` when one exists
    pub fn load_from_directory(
        directory: &Path,
        environment: &str,
    ) -> ConfigResult<PublisherConfig> {
        let base_path = directory.join(BASE_FILE);
        let mut value = Self::read_yaml(&base_path)?;

        let overlay_path = Self::overlay_path(directory, environment);
        if overlay_path.exists() {
            let overlay = Self::read_yaml(&overlay_path)?;
            deep_merge(&mut value, overlay);
            debug!(
                environment = %environment,
                overlay = %overlay_path.display(),
                "Merged environment configuration overlay"
            );
        }

        let config = Self::finish(value)?;
        info!(
            environment = %environment,
            directory = %directory.display(),
            "🔧 Configuration loaded"
        );
        Ok(config)
    }

    fn overlay_path(directory: &Path, environment: &str) -> PathBuf {
        directory.join(format!("publisher.{environment}.yaml"))
    }

    fn read_yaml(path: &Path) -> ConfigResult<YamlValue> {
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigurationError::parse(format!("{}: {e}", path.display())))
    }

    fn finish(value: YamlValue) -> ConfigResult<PublisherConfig> {
        let value = match value {
            // An empty file parses as null
            YamlValue::Null => YamlValue::Mapping(Default::default()),
            other => other,
        };
        let mut config: PublisherConfig =
            serde_yaml::from_value(value).map_err(|e| ConfigurationError::parse(e.to_string()))?;
        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }
}

/// Recursively merge `overlay` into `base`; mappings merge key by key,
/// everything else is replaced
fn deep_merge(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
