//! Application settings and configuration
//!
//! This module provides configuration management for the provisioner,
//! loading settings from environment variables with defaults that target a
//! local DynamoDB on port 8000.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

use crate::provisioner::WaiterConfig;

/// Longest accepted table wait (one day)
pub const MAX_WAIT_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format: {}. Expected: text or json", s),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,
    pub log_format: LogFormat,

    // Table settings
    pub table_name: String,
    pub wait_timeout_secs: u64,
    pub poll_interval_secs: u64,

    // AWS settings
    pub aws_region: String,
    pub dynamodb_endpoint_url: Option<String>,
    /// Use the static credentials below instead of the SDK provider chain
    pub use_static_credentials: bool,
    #[serde(skip_serializing)]
    pub aws_access_key_id: String,
    #[serde(skip_serializing)]
    pub aws_secret_access_key: String,
    #[serde(skip_serializing)]
    pub aws_session_token: Option<String>,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in `load`).
    ///
    /// Values are parsed but not validated; call [`validate`](Self::validate)
    /// once all overrides are applied.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            // App settings
            app_name: get("APP_NAME", "dynamo-provisioner"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: get("LOG_LEVEL", "warn"),
            log_format: get("LOG_FORMAT", "text")
                .parse()
                .context("Invalid LOG_FORMAT value")?,

            // Table settings
            table_name: get("DYNAMODB_TABLE_NAME", "my-table4"),
            wait_timeout_secs: get("TABLE_WAIT_TIMEOUT_SECS", "120")
                .parse()
                .context("Invalid TABLE_WAIT_TIMEOUT_SECS value")?,
            poll_interval_secs: get("TABLE_POLL_INTERVAL_SECS", "5")
                .parse()
                .context("Invalid TABLE_POLL_INTERVAL_SECS value")?,

            // AWS settings
            aws_region: get("AWS_REGION", "us-east-1"),
            // An empty value turns the override off
            dynamodb_endpoint_url: non_empty(get("DYNAMODB_ENDPOINT_URL", "http://localhost:8000")),
            use_static_credentials: parse_flag(&get("USE_STATIC_CREDENTIALS", "true"))
                .context("Invalid USE_STATIC_CREDENTIALS value")?,
            aws_access_key_id: get("AWS_ACCESS_KEY_ID", "dummy"),
            aws_secret_access_key: get("AWS_SECRET_ACCESS_KEY", "dummy"),
            aws_session_token: non_empty(get("AWS_SESSION_TOKEN", "dummy")),
        })
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            anyhow::bail!("Table name cannot be empty");
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("Poll interval must be > 0");
        }

        if self.wait_timeout_secs > MAX_WAIT_TIMEOUT_SECS {
            anyhow::bail!(
                "Wait timeout ({}s) must not exceed {}s",
                self.wait_timeout_secs,
                MAX_WAIT_TIMEOUT_SECS
            );
        }

        if self.wait_timeout_secs < self.poll_interval_secs {
            anyhow::bail!(
                "Wait timeout ({}s) must be at least the poll interval ({}s)",
                self.wait_timeout_secs,
                self.poll_interval_secs
            );
        }

        if self.use_static_credentials && self.dynamodb_endpoint_url.is_none() {
            tracing::warn!("Using static placeholder credentials without an endpoint override");
        }

        Ok(())
    }

    /// Waiter settings for the table activation wait
    pub fn waiter_config(&self) -> WaiterConfig {
        WaiterConfig::new()
            .with_timeout(Duration::from_secs(self.wait_timeout_secs))
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "dynamo-provisioner".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            table_name: "my-table4".to_string(),
            wait_timeout_secs: 120,
            poll_interval_secs: 5,
            aws_region: "us-east-1".to_string(),
            dynamodb_endpoint_url: Some("http://localhost:8000".to_string()),
            use_static_credentials: true,
            aws_access_key_id: "dummy".to_string(),
            aws_secret_access_key: "dummy".to_string(),
            aws_session_token: Some("dummy".to_string()),
        }
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true/false, 1/0, yes/no or on/off, got '{}'", other),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.table_name, "my-table4");
        assert_eq!(settings.aws_region, "us-east-1");
        assert_eq!(
            settings.dynamodb_endpoint_url.as_deref(),
            Some("http://localhost:8000")
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_lookup_defaults_match_default() {
        let settings = from_pairs(&[]).unwrap();
        let defaults = Settings::default();

        assert_eq!(settings.table_name, defaults.table_name);
        assert_eq!(settings.dynamodb_endpoint_url, defaults.dynamodb_endpoint_url);
        assert_eq!(settings.aws_session_token, defaults.aws_session_token);
        assert_eq!(settings.waiter_config(), WaiterConfig::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let settings = from_pairs(&[
            ("DYNAMODB_TABLE_NAME", "contacts"),
            ("DYNAMODB_ENDPOINT_URL", ""),
            ("TABLE_WAIT_TIMEOUT_SECS", "30"),
            ("TABLE_POLL_INTERVAL_SECS", "2"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(settings.table_name, "contacts");
        assert_eq!(settings.dynamodb_endpoint_url, None);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.waiter_config().timeout, Duration::from_secs(30));
        assert_eq!(settings.waiter_config().poll_interval, Duration::from_secs(2));
    }

    fn validated(pairs: &[(&str, &str)]) -> Result<Settings> {
        let settings = from_pairs(pairs)?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(validated(&[("TABLE_POLL_INTERVAL_SECS", "0")]).is_err());
        assert!(validated(&[("TABLE_WAIT_TIMEOUT_SECS", "soon")]).is_err());
        assert!(validated(&[("TABLE_WAIT_TIMEOUT_SECS", "1")]).is_err());
        assert!(validated(&[("TABLE_WAIT_TIMEOUT_SECS", "18446744073709551615")]).is_err());
        assert!(validated(&[("DYNAMODB_TABLE_NAME", " ")]).is_err());
        assert!(validated(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(validated(&[("USE_STATIC_CREDENTIALS", "maybe")]).is_err());
        assert!(validated(&[("USE_STATIC_CREDENTIALS", "")]).is_err());
    }

    #[test]
    fn test_static_credentials_flag() {
        for value in ["false", "FALSE", "0", "no", " Off "] {
            let settings = validated(&[("USE_STATIC_CREDENTIALS", value)]).unwrap();
            assert!(!settings.use_static_credentials, "{value}");
        }
        for value in ["true", "True", "1", "yes", "on"] {
            let settings = validated(&[("USE_STATIC_CREDENTIALS", value)]).unwrap();
            assert!(settings.use_static_credentials, "{value}");
        }
    }

    #[test]
    fn test_wait_timeout_upper_bound() {
        let mut settings = Settings::default();
        settings.wait_timeout_secs = MAX_WAIT_TIMEOUT_SECS;
        assert!(settings.validate().is_ok());

        settings.wait_timeout_secs = u64::MAX;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_lookup_values_can_be_overridden() {
        let mut settings = from_pairs(&[("TABLE_POLL_INTERVAL_SECS", "0")]).unwrap();
        assert!(settings.validate().is_err());

        settings.poll_interval_secs = 2;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
