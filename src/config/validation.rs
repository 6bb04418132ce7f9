//! Configuration validation rules.
//!
//! Runs after [`GatewayConfig`] has been loaded from defaults, file, and environment.

use thiserror::Error;
use url::Url;

use crate::config::GatewayConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

impl GatewayConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - the origin is not `http`/`https`
    /// - `cache_prefix` or `version` is empty
    /// - a path prefix, manifest path, or the offline page is not root-relative
    /// - an external resource is not an absolute URL
    /// - `timeout_ms` is below 100ms or above 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "scheme must be http or https"));
        }

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.version.is_empty() {
            return Err(invalid("version", "must not be empty"));
        }

        for (field, value) in [
            ("api_prefix", &self.api_prefix),
            ("static_prefix", &self.static_prefix),
            ("offline_page", &self.offline_page),
            ("control_prefix", &self.control_prefix),
        ] {
            if !value.starts_with('/') {
                return Err(invalid(field, format!("{value:?} must start with '/'")));
            }
        }

        for (field, paths) in [
            ("static_assets", &self.static_assets),
            ("dynamic_routes", &self.dynamic_routes),
        ] {
            if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
                return Err(invalid(field, format!("{bad:?} is not root-relative")));
            }
        }

        for resource in &self.external_resources {
            Url::parse(resource).map_err(|e| {
                invalid("external_resources", format!("{resource:?}: {e}"))
            })?;
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid(
                "timeout_ms",
                "must not exceed 5 minutes (300000ms)",
            ));
        }

        if !self.static_assets.contains(&self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline page is not in static_assets; HTML fallbacks will synthesize a 503"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = GatewayConfig {
            origin: Url::parse("ftp://example.com/").unwrap(),
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_empty_version() {
        let config = GatewayConfig {
            version: String::new(),
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "version"));
    }

    #[test]
    fn test_validate_relative_manifest_path() {
        let config = GatewayConfig {
            dynamic_routes: vec!["about".into()],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "dynamic_routes"));
    }

    #[test]
    fn test_validate_external_resource_must_be_absolute() {
        let config = GatewayConfig {
            external_resources: vec!["/npm/bootstrap.css".into()],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "external_resources"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = GatewayConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = GatewayConfig { timeout_ms: 300_001, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = GatewayConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
