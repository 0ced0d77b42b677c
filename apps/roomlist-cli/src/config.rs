//! Environment-backed configuration for the `roomlist` CLI.

use std::{env, path::PathBuf};

use roomlist_core::{DEFAULT_MAX_TIMELINE_EVENTS, PermalinkConfig, SortAlgorithm};
use roomlist_runtime::{DEFAULT_ACTION_BUFFER, RuntimeConfig};
use thiserror::Error;

const DEFAULT_APP_LOCATION: &str = "localhost/";

/// Runtime configuration used by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Prefix of a hosted web app; unset means `matrix.to` links.
    pub permalink_prefix: Option<String>,
    /// Host and path the app is served from.
    pub app_location: String,
    /// Initial value of the order-by-importance setting.
    pub order_by_importance: bool,
    /// Initial value of the custom-tags setting.
    pub custom_tags: bool,
    /// JSON file for drafts and composer history; in-memory when unset.
    pub state_file: Option<PathBuf>,
    /// Per-room timeline retention.
    pub timeline_max_events: usize,
    /// Capacity of the action queue.
    pub action_buffer: usize,
}

impl CliConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let permalink_prefix = optional_trimmed_env("ROOMLIST_PERMALINK_PREFIX", &mut lookup);
        let app_location = optional_trimmed_env("ROOMLIST_APP_LOCATION", &mut lookup)
            .unwrap_or_else(|| DEFAULT_APP_LOCATION.to_owned());
        let order_by_importance = parse_bool("ROOMLIST_ORDER_BY_IMPORTANCE", true, &mut lookup)?;
        let custom_tags = parse_bool("ROOMLIST_CUSTOM_TAGS", false, &mut lookup)?;
        let state_file = optional_trimmed_env("ROOMLIST_STATE_FILE", &mut lookup).map(PathBuf::from);
        let timeline_max_events = parse_positive_usize(
            "ROOMLIST_TIMELINE_MAX_EVENTS",
            DEFAULT_MAX_TIMELINE_EVENTS,
            &mut lookup,
        )?;
        let action_buffer =
            parse_positive_usize("ROOMLIST_ACTION_BUFFER", DEFAULT_ACTION_BUFFER, &mut lookup)?;

        if let Some(prefix) = &permalink_prefix
            && !(prefix.starts_with("http://") || prefix.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                key: "ROOMLIST_PERMALINK_PREFIX",
                value: prefix.clone(),
                reason: "must be an http(s) URL".to_owned(),
            });
        }

        Ok(Self {
            permalink_prefix,
            app_location,
            order_by_importance,
            custom_tags,
            state_file,
            timeline_max_events,
            action_buffer,
        })
    }

    pub fn permalink_config(&self) -> PermalinkConfig {
        PermalinkConfig {
            permalink_prefix: self.permalink_prefix.clone(),
            app_location: self.app_location.clone(),
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            action_buffer: self.action_buffer,
            algorithm: SortAlgorithm::from_order_by_importance(self.order_by_importance),
            tags_enabled: self.custom_tags,
            ..RuntimeConfig::default()
        }
    }
}

/// Errors produced while parsing CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_bool<F>(key: &'static str, default: bool, lookup: &mut F) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected true/false".to_owned(),
        }),
    }
}

fn parse_positive_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be at least 1".to_owned(),
        }),
        Ok(parsed) => Ok(parsed),
        Err(err) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        CliConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn uses_defaults_when_env_is_empty() {
        let cfg = config_from_pairs(&[]).expect("config should parse");
        assert_eq!(cfg.permalink_prefix, None);
        assert_eq!(cfg.app_location, "localhost/");
        assert!(cfg.order_by_importance);
        assert!(!cfg.custom_tags);
        assert_eq!(cfg.state_file, None);
        assert_eq!(cfg.timeline_max_events, DEFAULT_MAX_TIMELINE_EVENTS);
        assert_eq!(cfg.action_buffer, DEFAULT_ACTION_BUFFER);
    }

    #[test]
    fn maps_settings_into_runtime_config() {
        let cfg = config_from_pairs(&[
            ("ROOMLIST_ORDER_BY_IMPORTANCE", "off"),
            ("ROOMLIST_CUSTOM_TAGS", "TRUE"),
            ("ROOMLIST_ACTION_BUFFER", "16"),
        ])
        .expect("config should parse");

        let runtime = cfg.runtime_config();
        assert_eq!(runtime.algorithm, SortAlgorithm::Recent);
        assert!(runtime.tags_enabled);
        assert_eq!(runtime.action_buffer, 16);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config_from_pairs(&[
            ("ROOMLIST_PERMALINK_PREFIX", "   "),
            ("ROOMLIST_STATE_FILE", ""),
        ])
        .expect("config should parse");
        assert_eq!(cfg.permalink_config(), PermalinkConfig::default());
        assert_eq!(cfg.state_file, None);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = config_from_pairs(&[("ROOMLIST_TIMELINE_MAX_EVENTS", "0")])
            .expect_err("zero retention should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "ROOMLIST_TIMELINE_MAX_EVENTS",
                ..
            }
        ));

        let err = config_from_pairs(&[("ROOMLIST_CUSTOM_TAGS", "maybe")])
            .expect_err("bad bool should fail");
        assert_eq!(
            err.to_string(),
            "invalid ROOMLIST_CUSTOM_TAGS='maybe': expected true/false"
        );

        let err = config_from_pairs(&[("ROOMLIST_PERMALINK_PREFIX", "chat.example.org")])
            .expect_err("prefix without scheme should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "ROOMLIST_PERMALINK_PREFIX",
                ..
            }
        ));
    }
}
