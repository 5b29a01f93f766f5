use crate::constants::DEFAULT_LOCALE;

/// Supplies the locale used when a caller does not name one.
pub trait LocaleProvider: Send + Sync {
    fn current_locale(&self) -> String;

    /// Locale consulted when a translation is missing.
    fn fallback_locale(&self) -> String {
        DEFAULT_LOCALE.to_string()
    }
}

/// Always answers with the same locale.
#[derive(Debug, Clone)]
pub struct FixedLocale(String);

impl FixedLocale {
    pub fn new(locale: impl Into<String>) -> Self {
        Self(locale.into())
    }
}

impl Default for FixedLocale {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

impl LocaleProvider for FixedLocale {
    fn current_locale(&self) -> String {
        self.0.clone()
    }
}
