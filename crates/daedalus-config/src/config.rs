//! Main configuration types.
//!
//! This module provides the top-level [`BootstrapConfig`] struct and its builder.

use std::collections::{BTreeMap, HashSet};

use daedalus_files::FileServiceConfig;
use daedalus_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

use crate::{AppConfig, ConfigError, RegistryConfig, ServiceConfig};

/// Complete bootstrap document.
///
/// This is the root configuration type that contains all configuration sections.
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use daedalus_config::BootstrapConfig;
///
/// let config = BootstrapConfig::default();
/// assert_eq!(config.app.name, "daedalus");
/// assert_eq!(config.files.embed_threshold, 64 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Application identity.
    #[serde(default)]
    pub app: AppConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,

    /// File service tuning.
    #[serde(default)]
    pub files: FileServiceConfig,

    /// Registrar and discovery backends keyed by name.
    #[serde(default)]
    pub registries: BTreeMap<String, RegistryConfig>,

    /// Declared services with their middleware lists.
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl BootstrapConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_config::{AppConfig, BootstrapConfig, ServiceConfig};
    ///
    /// let config = BootstrapConfig::builder()
    ///     .app(AppConfig {
    ///         name: "greeter".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .service(ServiceConfig::new("greeter"))
    ///     .build();
    ///
    /// assert_eq!(config.services.len(), 1);
    /// ```
    #[must_use]
    pub fn builder() -> BootstrapConfigBuilder {
        BootstrapConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` or `ConfigError::ValidationError` if:
    /// - The application name is empty
    /// - The log filter directive does not parse
    /// - The file service chunk size is zero
    /// - A registry entry has no type
    /// - A service has an empty or duplicate name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.trim().is_empty() {
            return Err(ConfigError::invalid_value("app.name", "must not be empty"));
        }

        self.logging
            .validate()
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;

        self.files
            .validate()
            .map_err(|e| ConfigError::invalid_value("files.chunk_size", e.to_string()))?;

        for (name, registry) in &self.registries {
            if registry.kind.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("registries.{name}.type"),
                    "must not be empty",
                ));
            }
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(ConfigError::invalid_value("services.name", "must not be empty"));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::validation_error(format!(
                    "service '{}' is declared more than once",
                    service.name
                )));
            }
        }

        Ok(())
    }

    /// Returns the service declared under `name`.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Create a development configuration preset.
    ///
    /// Pretty, debug-level logging with file and line info.
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_config::BootstrapConfig;
    ///
    /// let config = BootstrapConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging = LogConfig::development();
        config.app.environment = "development".to_string();
        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON, info-level logging.
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_config::{BootstrapConfig, LogFormat};
    ///
    /// let config = BootstrapConfig::production();
    /// assert_eq!(config.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging = LogConfig::production();
        config.app.environment = "production".to_string();
        config
    }
}

/// Builder for [`BootstrapConfig`].
#[derive(Debug, Default)]
pub struct BootstrapConfigBuilder {
    app: Option<AppConfig>,
    logging: Option<LogConfig>,
    files: Option<FileServiceConfig>,
    registries: BTreeMap<String, RegistryConfig>,
    services: Vec<ServiceConfig>,
}

impl BootstrapConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application section.
    #[must_use]
    pub fn app(mut self, app: AppConfig) -> Self {
        self.app = Some(app);
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the file service section.
    #[must_use]
    pub fn files(mut self, files: FileServiceConfig) -> Self {
        self.files = Some(files);
        self
    }

    /// Add a registry entry.
    #[must_use]
    pub fn registry(mut self, name: impl Into<String>, registry: RegistryConfig) -> Self {
        self.registries.insert(name.into(), registry);
        self
    }

    /// Append a service.
    #[must_use]
    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.services.push(service);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> BootstrapConfig {
        BootstrapConfig {
            app: self.app.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
            files: self.files.unwrap_or_default(),
            registries: self.registries,
            services: self.services,
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<BootstrapConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_middleware::MiddlewareDecl;
    use daedalus_telemetry::LogFormat;

    #[test]
    fn test_default_config_is_valid() {
        let config = BootstrapConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.services.is_empty());
        assert!(config.registries.is_empty());
    }

    #[test]
    fn test_builder_all_sections() {
        let mut service = ServiceConfig::new("greeter");
        service.middlewares.server.push(MiddlewareDecl::new("logging"));

        let config = BootstrapConfig::builder()
            .app(AppConfig {
                name: "greeter".to_string(),
                ..Default::default()
            })
            .logging(LogConfig::development())
            .files(FileServiceConfig {
                embed_threshold: 16,
                chunk_size: 8,
            })
            .registry(
                "default",
                RegistryConfig {
                    kind: "consul".to_string(),
                    endpoint: "127.0.0.1:8500".to_string(),
                    ..Default::default()
                },
            )
            .service(service)
            .build_validated()
            .unwrap();

        assert_eq!(config.app.name, "greeter");
        assert_eq!(config.files.chunk_size, 8);
        assert_eq!(config.registries["default"].kind, "consul");
        assert_eq!(config.service("greeter").unwrap().middlewares.server.len(), 1);
        assert!(config.service("billing").is_none());
    }

    #[test]
    fn test_validate_empty_app_name() {
        let mut config = BootstrapConfig::default();
        config.app.name = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "app.name"
        ));
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let config = BootstrapConfig::builder()
            .files(FileServiceConfig {
                embed_threshold: 0,
                chunk_size: 0,
            })
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "files.chunk_size"
        ));
    }

    #[test]
    fn test_validate_bad_log_level() {
        let mut config = BootstrapConfig::default();
        config.logging.level = "daedalus=loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "logging.level"
        ));
    }

    #[test]
    fn test_validate_registry_without_type() {
        let config = BootstrapConfig::builder()
            .registry("default", RegistryConfig::default())
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_service() {
        let config = BootstrapConfig::builder()
            .service(ServiceConfig::new("greeter"))
            .service(ServiceConfig::new("greeter"))
            .build();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("greeter"));
    }

    #[test]
    fn test_development_preset() {
        let config = BootstrapConfig::development();
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.file_line_info);
        assert_eq!(config.app.environment, "development");
    }

    #[test]
    fn test_production_preset() {
        let config = BootstrapConfig::production();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.app.environment, "production");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BootstrapConfig::builder()
            .service(ServiceConfig::new("greeter"))
            .build();
        let text = toml::to_string(&config).unwrap();
        let parsed: BootstrapConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<BootstrapConfig, _> = toml::from_str("[server]\nport = 1\n");
        assert!(result.is_err());

        let result: Result<BootstrapConfig, _> = toml::from_str("[app]\ncolour = \"red\"\n");
        assert!(result.is_err());
    }
}
