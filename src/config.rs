use serde::Deserialize;

use crate::classify::ClassifierConfig;
use crate::error::SqlAdapterError;
use crate::placeholders::PlaceholderStyle;

/// How column names are keyed in materialized rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierCase {
    /// Lowercase every column name.
    #[default]
    Lower,
    /// Keep names as the driver reports them.
    Preserve,
}

impl IdentifierCase {
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        match self {
            IdentifierCase::Lower => name.to_lowercase(),
            IdentifierCase::Preserve => name.to_string(),
        }
    }
}

/// Pool sizing handed to `r2d2`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    pub connection_timeout_ms: u64,
    pub test_on_check_out: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 4,
            min_idle: Some(0),
            connection_timeout_ms: 30_000,
            test_on_check_out: true,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_connection_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connection_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Probe each connection's liveness when it is checked out.
    #[must_use]
    pub fn with_test_on_check_out(mut self, test_on_check_out: bool) -> Self {
        self.test_on_check_out = test_on_check_out;
        self
    }

    /// Reject values `r2d2` would panic on.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConfigError` describing the bad setting.
    pub fn validate(&self) -> Result<(), SqlAdapterError> {
        if self.max_size == 0 {
            return Err(SqlAdapterError::ConfigError(
                "pool max_size must be at least 1".to_string(),
            ));
        }
        if self.min_idle.is_some_and(|idle| idle > self.max_size) {
            return Err(SqlAdapterError::ConfigError(
                "pool min_idle cannot exceed max_size".to_string(),
            ));
        }
        if self.connection_timeout_ms == 0 {
            return Err(SqlAdapterError::ConfigError(
                "pool connection_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for a [`Database`](crate::database::Database).
///
/// Loadable from JSON; omitted fields take their defaults:
/// ```rust
/// use sql_adapter::prelude::*;
///
/// let opts = DatabaseOptions::from_json(r#"{ "placeholder_style": "sqlite", "pool": { "max_size": 2 } }"#)?;
/// assert_eq!(opts.placeholder_style, PlaceholderStyle::Sqlite);
/// assert_eq!(opts.pool.max_size, 2);
/// assert_eq!(opts.identifier_case, IdentifierCase::Lower);
/// # Ok::<(), SqlAdapterError>(())
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    pub placeholder_style: PlaceholderStyle,
    pub identifier_case: IdentifierCase,
    /// Translate `$N`/`?N` in plain `execute` SQL to `placeholder_style`.
    pub translate_placeholders: bool,
    pub pool: PoolOptions,
    pub classifier: ClassifierConfig,
}

impl DatabaseOptions {
    /// Parse options from a JSON document.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConfigError` for malformed JSON or invalid pool settings.
    pub fn from_json(json: &str) -> Result<Self, SqlAdapterError> {
        let options: DatabaseOptions = serde_json::from_str(json)?;
        options.pool.validate()?;
        Ok(options)
    }

    #[must_use]
    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    #[must_use]
    pub fn with_identifier_case(mut self, case: IdentifierCase) -> Self {
        self.identifier_case = case;
        self
    }

    #[must_use]
    pub fn with_translation(mut self, translate_placeholders: bool) -> Self {
        self.translate_placeholders = translate_placeholders;
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }
}
