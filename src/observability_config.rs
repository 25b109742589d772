//! # Logging Configuration
//!
//! Environment-specific settings for the tracing subscriber.

/// Observability configuration for different environments
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for the crate's own targets
    pub log_level: String,
    /// Output format, `pretty` or `json`
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        // Development logs are for people, everything else for collectors
        let default_format = if environment == "development" { "pretty" } else { "json" };

        Self {
            log_level: lookup("MOONEY_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| default_format.to_string()),
            environment,
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Whether logs are emitted as JSON lines
    pub fn is_json(&self) -> bool {
        self.log_format == "json"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }

        if self.log_format != "pretty" && self.log_format != "json" {
            return Err(format!(
                "Invalid log format: {} (expected 'pretty' or 'json')",
                self.log_format
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_level, "info");
        assert!(!config.is_json());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars_uses_json_outside_development() {
        let vars: HashMap<&str, &str> =
            [("ENVIRONMENT", "production"), ("MOONEY_LOG_LEVEL", "warn")].into();
        let config = ObservabilityConfig::from_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert!(config.is_production());
        assert!(config.is_json());
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_explicit_format_wins() {
        let vars: HashMap<&str, &str> =
            [("ENVIRONMENT", "staging"), ("LOG_FORMAT", "pretty")].into();
        let config = ObservabilityConfig::from_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert!(!config.is_json());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "DEBUG".to_string();
        assert!(config.validate().is_ok());

        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
