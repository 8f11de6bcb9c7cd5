//! Configuration loading.
//!
//! Settings are merged with the priority CLI > environment > TOML file >
//! built-in defaults. The session cookie is never read here; only its
//! [`CredentialSource`] is chosen, and the task resolves it per attempt.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::scheduler::DEFAULT_INTERVAL;
use crate::{headers, CredentialSource, KeepAliveError, RefreshOptions, Result};

pub const DEFAULT_URL: &str =
    "https://f096f070e9864942bb68eec91f95a7c8.ap-shanghai.cloudstudio.club/?mode=edit";
pub const DEFAULT_LOG_FILTER: &str = "session_keepalive=info";

pub const ENV_URL: &str = "KEEPALIVE_URL";
pub const ENV_COOKIE: &str = "KEEPALIVE_COOKIE";
pub const ENV_COOKIE_FILE: &str = "KEEPALIVE_COOKIE_FILE";
pub const ENV_EXPECTED_URL: &str = "KEEPALIVE_EXPECTED_URL";
pub const ENV_ORIGIN: &str = "KEEPALIVE_ORIGIN";
pub const ENV_INTERVAL_SECS: &str = "KEEPALIVE_INTERVAL_SECS";
pub const ENV_TIMEOUT_MS: &str = "KEEPALIVE_TIMEOUT_MS";
pub const ENV_RETRY_DELAY_MS: &str = "KEEPALIVE_RETRY_DELAY_MS";
pub const ENV_MAX_ATTEMPTS: &str = "KEEPALIVE_MAX_ATTEMPTS";
pub const ENV_RETRY_ON_CLIENT_ERROR: &str = "KEEPALIVE_RETRY_ON_CLIENT_ERROR";

/// Contents of the optional TOML config file. Every key is optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub cookie: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub expected_url: Option<String>,
    pub origin: Option<String>,
    pub interval_secs: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_attempts: Option<usize>,
    pub retry_on_client_error: Option<bool>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            KeepAliveError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|err| KeepAliveError::Config(format!("invalid {}: {err}", path.display())))
    }
}

/// Values given on the command line.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub cookie: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub expected_url: Option<String>,
    pub interval_secs: Option<u64>,
}

/// Fully resolved settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeepAliveConfig {
    pub url: String,
    pub origin: String,
    pub credential: CredentialSource,
    pub expected_url: Option<String>,
    pub interval: Duration,
    pub options: RefreshOptions,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            origin: headers::DEFAULT_ORIGIN.to_owned(),
            credential: CredentialSource::default(),
            expected_url: None,
            interval: DEFAULT_INTERVAL,
            options: RefreshOptions::default(),
        }
    }
}

impl KeepAliveConfig {
    /// Loads the optional file, then applies the process environment and `overrides`.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides, |key| std::env::var(key).ok())
    }

    /// Merges the layers. `env` looks up an environment variable by name.
    pub fn resolve<E>(file: FileConfig, overrides: Overrides, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let url = overrides
            .url
            .or_else(|| env(ENV_URL))
            .or(file.url)
            .unwrap_or(defaults.url);
        let origin = env(ENV_ORIGIN).or(file.origin).unwrap_or(defaults.origin);
        let expected_url = overrides
            .expected_url
            .or_else(|| env(ENV_EXPECTED_URL))
            .or(file.expected_url);

        let cookie_file = overrides
            .cookie_file
            .or_else(|| env(ENV_COOKIE_FILE).map(PathBuf::from))
            .or(file.cookie_file);
        let credential = if let Some(path) = cookie_file {
            CredentialSource::File(path)
        } else if let Some(cookie) = overrides.cookie {
            CredentialSource::Inline(cookie)
        } else if env(ENV_COOKIE).is_some() {
            CredentialSource::Env(ENV_COOKIE.to_owned())
        } else if let Some(cookie) = file.cookie {
            CredentialSource::Inline(cookie)
        } else {
            defaults.credential
        };

        let interval_secs = match overrides.interval_secs {
            Some(secs) => Some(secs),
            None => parse_env(&env, ENV_INTERVAL_SECS)?,
        }
        .or(file.interval_secs);
        let interval = interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval);

        let base = defaults.options;
        let options = RefreshOptions {
            timeout_ms: parse_env(&env, ENV_TIMEOUT_MS)?
                .or(file.timeout_ms)
                .unwrap_or(base.timeout_ms),
            retry_delay_ms: parse_env(&env, ENV_RETRY_DELAY_MS)?
                .or(file.retry_delay_ms)
                .unwrap_or(base.retry_delay_ms),
            max_attempts: parse_env(&env, ENV_MAX_ATTEMPTS)?.or(file.max_attempts),
            retry_on_client_error: parse_bool_env(&env, ENV_RETRY_ON_CLIENT_ERROR)?
                .or(file.retry_on_client_error)
                .unwrap_or(base.retry_on_client_error),
        };

        let config = Self {
            url,
            origin,
            credential,
            expected_url,
            interval,
            options,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_http_url("url", &self.url)?;
        validate_http_url("origin", &self.origin)?;
        if self.interval.is_zero() {
            return Err(KeepAliveError::Config(
                "interval must be at least one second".to_owned(),
            ));
        }
        if self.options.timeout_ms == 0 {
            return Err(KeepAliveError::Config(
                "timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.options.max_attempts == Some(0) {
            return Err(KeepAliveError::Config(
                "max_attempts must be at least 1 when set".to_owned(),
            ));
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(KeepAliveError::Config(format!("{field} is empty")));
    }
    let parsed = Url::parse(value)
        .map_err(|err| KeepAliveError::Config(format!("{field} '{value}' is invalid: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(KeepAliveError::Config(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}

fn parse_env<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    E: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| KeepAliveError::Config(format!("{key}='{raw}': {err}")))
        })
        .transpose()
}

fn parse_bool_env<E>(env: &E, key: &str) -> Result<Option<bool>>
where
    E: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(KeepAliveError::Config(format!(
                "{key}='{raw}' is not a boolean"
            ))),
        })
        .transpose()
}
