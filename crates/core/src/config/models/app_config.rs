use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    orchestrator::OrchestratorConfig,
    publisher::PublisherConfig,
    runtime::{MemoryConfig, ObservabilityConfig, TimeoutConfig},
    vitals::VitalsConfig,
};
use crate::config::validation::ConfigValidator;
use crate::logging::LogConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub orchestrator: OrchestratorConfig,
    pub publisher: PublisherConfig,
    pub vitals: VitalsConfig,
    pub memory: MemoryConfig,
    pub timeout: TimeoutConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load from an optional TOML file, then apply `SENTINEL__SECTION__KEY`
    /// environment overrides, then validate.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("config file does not exist: {path}"));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            let default_paths = ["config/sentinel.toml", "sentinel.toml", "/etc/sentinel/config.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SENTINEL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::SchedulerResult<()> {
        self.orchestrator.validate()?;
        self.publisher.validate()?;
        self.vitals.validate()?;
        self.memory.validate()?;
        self.timeout.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    use crate::logging::{LogLevel, OutputFormat};

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.circuit_breaker.failure_threshold, 3);
        assert_eq!(
            config.orchestrator.circuit_breaker.recovery_timeout,
            Duration::from_secs(300)
        );
        assert!(config.orchestrator.load_gate.enabled);
        assert_eq!(config.orchestrator.load_gate.cpu_threshold_percent, 70.0);
        assert_eq!(config.publisher.flush_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [publisher]
            max_batch_size = 25

            [vitals]
            node_id = "edge-3"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, OutputFormat::Json);
        assert_eq!(config.publisher.max_batch_size, 25);
        assert_eq!(config.publisher.flush_interval_ms, 100);
        assert_eq!(config.vitals.node_id, "edge-3");
        assert_eq!(config.vitals.ttl_secs, 30);
    }

    #[test]
    fn test_invalid_toml_is_rejected_by_validation() {
        let result = AppConfig::from_toml(
            r#"
            [vitals]
            publish_interval_secs = 60
            ttl_secs = 30
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [orchestrator.circuit_breaker]
            failure_threshold = 5
            recovery_timeout = 60

            [orchestrator.load_gate]
            enabled = false
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.orchestrator.circuit_breaker.failure_threshold, 5);
        assert_eq!(
            config.orchestrator.circuit_breaker.recovery_timeout,
            Duration::from_secs(60)
        );
        assert!(!config.orchestrator.load_gate.enabled);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/sentinel.toml")).is_err());
    }

    #[test]
    fn test_toml_roundtrip_preserves_sections() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[publisher]"));
        let parsed = AppConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.publisher, config.publisher);
    }
}
