//! Wizard configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Soft expectation for the finalize sequence, used only for progress display.
pub const DEFAULT_FINALIZE_EXPECTATION: Duration = Duration::from_secs(600);

const STORE_FILE: &str = "client-store.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No data directory available; set SAGA_DATA_DIR")]
    NoDataDir,

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Configuration for a wizard client.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardConfig {
    /// Backend base URL.
    pub api_base: String,

    /// Model requested from the backend, if any.
    pub model: Option<String>,

    /// Directory for the client store and logs.
    pub data_dir: PathBuf,

    /// Open the trait selector when assistant prose asks for traits.
    pub legacy_trait_heuristic: bool,

    pub finalize_expectation: Duration,
}

impl WizardConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: None,
            data_dir: data_dir.into(),
            legacy_trait_heuristic: false,
            finalize_expectation: DEFAULT_FINALIZE_EXPECTATION,
        }
    }

    /// Build from `SAGA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = match lookup("SAGA_DATA_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir().ok_or(ConfigError::NoDataDir)?.join("saga"),
        };

        let mut config = Self::new(data_dir);

        if let Some(url) = lookup("SAGA_API_URL").filter(|v| !v.is_empty()) {
            config.api_base = url;
        }
        if let Some(model) = lookup("SAGA_MODEL").filter(|v| !v.is_empty()) {
            config.model = Some(model);
        }
        if let Some(flag) = lookup("SAGA_TRAIT_HEURISTIC") {
            config.legacy_trait_heuristic = parse_flag("SAGA_TRAIT_HEURISTIC", &flag)?;
        }

        Ok(config)
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_legacy_trait_heuristic(mut self, enabled: bool) -> Self {
        self.legacy_trait_heuristic = enabled;
        self
    }

    pub fn with_finalize_expectation(mut self, expectation: Duration) -> Self {
        self.finalize_expectation = expectation;
        self
    }

    /// Path of the client store file.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = WizardConfig::from_lookup(lookup(&[
            ("SAGA_DATA_DIR", "/tmp/saga-test"),
            ("SAGA_API_URL", "http://story.local:9000"),
            ("SAGA_MODEL", "narrator-large"),
            ("SAGA_TRAIT_HEURISTIC", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.api_base, "http://story.local:9000");
        assert_eq!(config.model.as_deref(), Some("narrator-large"));
        assert!(config.legacy_trait_heuristic);
        assert_eq!(
            config.store_path(),
            PathBuf::from("/tmp/saga-test/client-store.json")
        );
    }

    #[test]
    fn test_defaults() {
        let config =
            WizardConfig::from_lookup(lookup(&[("SAGA_DATA_DIR", "/tmp/saga-test")])).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.model.is_none());
        assert!(!config.legacy_trait_heuristic);
        assert_eq!(config.finalize_expectation, DEFAULT_FINALIZE_EXPECTATION);
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let result = WizardConfig::from_lookup(lookup(&[
            ("SAGA_DATA_DIR", "/tmp/saga-test"),
            ("SAGA_TRAIT_HEURISTIC", "sometimes"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                var: "SAGA_TRAIT_HEURISTIC",
                ..
            })
        ));
    }

    #[test]
    fn test_builder() {
        let config = WizardConfig::new("/data")
            .with_api_base("http://x")
            .with_model("m")
            .with_legacy_trait_heuristic(true)
            .with_finalize_expectation(Duration::from_secs(60));
        assert_eq!(config.api_base, "http://x");
        assert_eq!(config.log_dir(), PathBuf::from("/data/logs"));
        assert_eq!(config.finalize_expectation.as_secs(), 60);
    }
}
