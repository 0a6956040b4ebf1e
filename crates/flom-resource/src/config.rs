//! Registry configuration.

use serde::Deserialize;

use flom_core::error::{FlomError, FlomResult};

/// Default separator of hierarchical resource names.
pub const DEFAULT_PATH_SEPARATOR: &str = "/";

/// Settings shared by every resource a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Separator of hierarchical resource names; a name starting with it is
    /// hierarchical.
    pub path_separator: String,
    /// Destroy a resource as soon as it has neither holders nor waiters.
    pub reclaim_idle: bool,
    /// Format timestamps in UTC instead of local time.
    pub timestamp_utc: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path_separator: DEFAULT_PATH_SEPARATOR.to_string(),
            reclaim_idle: true,
            timestamp_utc: false,
        }
    }
}

impl RegistryConfig {
    /// Returns a new builder starting from the defaults.
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::new()
    }

    /// Parses a TOML fragment; missing keys take their default value.
    ///
    /// ```toml
    /// path_separator = "/"
    /// reclaim_idle = true
    /// timestamp_utc = false
    /// ```
    pub fn from_toml_str(source: &str) -> FlomResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| FlomError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that cannot be expressed by the type alone.
    pub fn validate(&self) -> FlomResult<()> {
        if self.path_separator.is_empty() {
            return Err(FlomError::Config(
                "path_separator cannot be empty".to_string(),
            ));
        }
        if self
            .path_separator
            .chars()
            .any(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            return Err(FlomError::Config(format!(
                "path_separator '{}' clashes with resource name characters",
                self.path_separator
            )));
        }
        Ok(())
    }
}

/// Builder for [`RegistryConfig`].
pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
        }
    }

    /// Sets the hierarchical path separator.
    pub fn path_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.path_separator = separator.into();
        self
    }

    /// Sets whether idle resources are destroyed eagerly.
    pub fn reclaim_idle(mut self, reclaim: bool) -> Self {
        self.config.reclaim_idle = reclaim;
        self
    }

    /// Sets whether timestamps are formatted in UTC.
    pub fn timestamp_utc(mut self, utc: bool) -> Self {
        self.config.timestamp_utc = utc;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FlomError::Config`] if the separator is empty or made of
    /// characters that can appear inside resource names.
    pub fn build(self) -> FlomResult<RegistryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = RegistryConfig::from_toml_str("").unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = RegistryConfig::from_toml_str(
            "path_separator = \":\"\nreclaim_idle = false\ntimestamp_utc = true\n",
        )
        .unwrap();
        assert_eq!(config.path_separator, ":");
        assert!(!config.reclaim_idle);
        assert!(config.timestamp_utc);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            RegistryConfig::from_toml_str("path_separator = \"\""),
            Err(FlomError::Config(_))
        ));
        assert!(RegistryConfig::from_toml_str("bogus = 1").is_err());
        assert!(RegistryConfig::builder().path_separator("x").build().is_err());
    }
}
