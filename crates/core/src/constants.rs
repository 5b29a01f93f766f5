/// Locale used when neither the caller nor the configuration names one.
pub const DEFAULT_LOCALE: &str = "en";

/// Maximum characters of a category name, per locale.
pub const MAX_NAME_LENGTH: usize = 150;

/// Maximum characters of a category description, per locale.
pub const MAX_DESCRIPTION_LENGTH: usize = 32_768;

/// Maximum characters of a slug.
pub const MAX_SLUG_LENGTH: usize = 150;

// Environment variables read by `CategorizableConfig::from_env`
pub const ENV_DEFAULT_LOCALE: &str = "CATEGORIZABLE_DEFAULT_LOCALE";
pub const ENV_STRICT_SLUGS: &str = "CATEGORIZABLE_STRICT_SLUGS";
pub const ENV_SLUG_MAX_LENGTH: &str = "CATEGORIZABLE_SLUG_MAX_LENGTH";
pub const ENV_CACHE_ENABLED: &str = "CATEGORIZABLE_CACHE_ENABLED";
