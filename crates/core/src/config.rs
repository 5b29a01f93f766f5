use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOCALE, ENV_CACHE_ENABLED, ENV_DEFAULT_LOCALE, ENV_SLUG_MAX_LENGTH, ENV_STRICT_SLUGS,
    MAX_SLUG_LENGTH,
};
use crate::errors::{Error, Result};

/// Runtime options shared by the category and categorization services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorizableConfig {
    pub default_locale: String,
    /// Unknown slugs fail with `NotFound` instead of being dropped.
    pub strict_slug_resolution: bool,
    pub slug_max_length: usize,
    pub cache_enabled: bool,
}

impl Default for CategorizableConfig {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
            strict_slug_resolution: false,
            slug_max_length: MAX_SLUG_LENGTH,
            cache_enabled: true,
        }
    }
}

impl CategorizableConfig {
    /// Defaults overlaid with the `CATEGORIZABLE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(locale) = lookup(ENV_DEFAULT_LOCALE) {
            let locale = locale.trim();
            if locale.is_empty() {
                return Err(invalid(ENV_DEFAULT_LOCALE, "must not be empty"));
            }
            config.default_locale = locale.to_string();
        }
        if let Some(raw) = lookup(ENV_STRICT_SLUGS) {
            config.strict_slug_resolution = parse_bool(ENV_STRICT_SLUGS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SLUG_MAX_LENGTH) {
            let length: usize = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_SLUG_MAX_LENGTH, &raw))?;
            if length == 0 || length > MAX_SLUG_LENGTH {
                return Err(invalid(ENV_SLUG_MAX_LENGTH, &raw));
            }
            config.slug_max_length = length;
        }
        if let Some(raw) = lookup(ENV_CACHE_ENABLED) {
            config.cache_enabled = parse_bool(ENV_CACHE_ENABLED, &raw)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidConfigValue(format!("{}={}", key, value))
}
