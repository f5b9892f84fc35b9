// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::{env, path::PathBuf, time::Duration};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use regex::Regex;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use url::Url;

const ENV_PREFIX: &str = "NOTIFICATIONS_";

/// Polling faster than this hammers the portal for little gain.
const RECOMMENDED_MIN_BASE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub polling: PollingConfig,
    pub features: FeaturesConfig,
}

// Newtype wrapping Config to be able use serde_ignored with Figment
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ConfigWrapper(pub Config);

// Custom Deserializer for ConfigWrapper
// This is needed to warn about unknown fields
impl<'de> Deserialize<'de> for ConfigWrapper {
    fn deserialize<D>(deserializer: D) -> Result<ConfigWrapper, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let config: Config = serde_ignored::deserialize(deserializer, |path| {
            tracing::warn!("Ignoring unknown configuration field: {}", path);
        })?;

        Ok(ConfigWrapper(config))
    }
}

impl Config {
    pub fn parse(filename: Option<&PathBuf>) -> Result<Self, String> {
        let config_defaults = include_str!("../default_values.toml");

        let mut figment_config = Figment::new().merge(Toml::string(config_defaults));

        if let Some(path) = filename {
            let mut config_content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config file: {e}"))?;
            config_content = Self::substitute_env_vars(config_content)?;
            figment_config = figment_config.merge(Toml::string(&config_content));
        }

        let config: ConfigWrapper = figment_config
            .merge(Self::from_env_ignore_empty(ENV_PREFIX))
            .extract()
            .map_err(|e| e.to_string())?;

        config.0.validate()?;
        Ok(config.0)
    }

    fn from_env_ignore_empty(prefix: &str) -> Env {
        let prefixed_env = Env::prefixed(prefix).split("__");
        let ignore_prefixed: Vec<_> = prefixed_env
            .iter()
            .filter_map(|(key, value)| {
                if value.is_empty() {
                    Some(key.into_string())
                } else {
                    None
                }
            })
            .collect();
        let ref_ignore = ignore_prefixed
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>();
        prefixed_env.ignore(&ref_ignore)
    }

    fn substitute_env_vars(content: String) -> Result<String, String> {
        let reg = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;
        let mut missing_vars = Vec::new();
        let mut result = String::new();

        for line in content.lines() {
            if !line.trim_start().starts_with('#') {
                let processed_line = reg.replace_all(line, |caps: &regex::Captures| {
                    let var_name = &caps[1];
                    match env::var(var_name) {
                        Ok(value) => value,
                        Err(_) => {
                            missing_vars.push(var_name.to_string());
                            format!("${{{var_name}}}")
                        }
                    }
                });
                result.push_str(&processed_line);
                result.push('\n');
            }
        }

        if !missing_vars.is_empty() {
            return Err(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            ));
        }

        Ok(result.trim_end().to_string())
    }

    // custom validation of the values
    fn validate(&self) -> Result<(), String> {
        if self.polling.base_interval_secs == Duration::ZERO {
            return Err("polling.base_interval_secs must be greater than 0".to_string());
        }

        if self.polling.max_interval_secs < self.polling.base_interval_secs {
            return Err(
                "polling.max_interval_secs must be greater than or equal to \
                polling.base_interval_secs"
                    .to_string(),
            );
        }

        if self.endpoint.request_timeout_secs == Duration::ZERO {
            return Err("endpoint.request_timeout_secs must be greater than 0".to_string());
        }

        if self.polling.base_interval_secs < RECOMMENDED_MIN_BASE_INTERVAL {
            tracing::warn!(
                "Your `polling.base_interval_secs` value is too low. \
                Every open portal tab polls at this rate, \
                a recommended value is about 30 seconds."
            );
        }

        Self::warn_if_token_over_http(
            &self.endpoint.base_url,
            self.endpoint.auth_token.as_ref(),
            "endpoint",
        );

        Ok(())
    }

    /// Warns if an authentication token is configured with a non-HTTPS URL.
    ///
    /// The session token travels with every poll, so a cleartext endpoint leaks
    /// it to anyone on the path.
    fn warn_if_token_over_http(url: &Url, token: Option<&String>, config_path: &str) {
        if let Some(token) = token {
            if !token.is_empty() && url.scheme() != "https" {
                // Allow localhost/127.0.0.1 for development without warning
                let is_localhost = url
                    .host_str()
                    .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "::1");

                if !is_localhost {
                    tracing::warn!(
                        config_path,
                        url = %url,
                        "Authentication token configured with non-HTTPS URL. \
                        This may expose credentials to interception. \
                        Use HTTPS for production deployments."
                    );
                }
            }
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct EndpointConfig {
    /// Base URL of the portal API. The notification paths are joined onto it,
    /// so it should end with a slash.
    pub base_url: Url,
    /// Session token sent as a bearer token with every request.
    pub auth_token: Option<String>,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub request_timeout_secs: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct PollingConfig {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub base_interval_secs: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub max_interval_secs: Duration,
}

#[derive(Debug, Deserialize, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct FeaturesConfig {
    /// When false, the notification engine stays inert.
    pub can_show_notifications: bool,
    /// Gates verbose per-cycle diagnostics only.
    #[serde(default)]
    pub debug_mode: bool,
}
