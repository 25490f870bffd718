//! Driver error classification.
//!
//! Every driver failure that crosses the execution facade is run through an
//! [`ErrorClassifier`], which decides whether the session is gone, whether the
//! failure is worth a retry by the caller, or whether it is a plain SQL error.

use regex::{Regex, RegexSet};
use serde::Deserialize;

use crate::error::{DatabaseError, DriverError, SqlAdapterError};

/// Outcome of classifying a driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The physical session is unusable; the pool must evict it.
    Disconnect,
    /// Serialization failures, deadlocks, busy locks. The caller may retry the whole operation.
    TransientRetryable,
    /// Bad SQL, constraint violations and everything else.
    Fatal,
}

/// Tables driving [`ErrorClassifier`].
///
/// Codes ending in `*` match by prefix, so `08*` covers the whole SQLSTATE
/// connection-exception class.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub disconnect_patterns: Vec<String>,
    pub disconnect_codes: Vec<String>,
    pub transient_codes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            disconnect_patterns: vec![
                r"(?i)terminating connection due to administrator command".to_string(),
                r"(?i)server closed the connection unexpectedly".to_string(),
                r"(?i)no connection to the server".to_string(),
                r"(?i)could not receive data from server".to_string(),
                r"(?i)connection (is )?(closed|reset|not open)".to_string(),
            ],
            disconnect_codes: vec![
                "08*".to_string(),
                "57P01".to_string(),
                "57P02".to_string(),
                "57P03".to_string(),
            ],
            transient_codes: vec![
                "40001".to_string(),
                "40P01".to_string(),
                "55P03".to_string(),
                "SQLITE_BUSY".to_string(),
                "SQLITE_LOCKED".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: RegexSet,
    disconnect_codes: Vec<String>,
    transient_codes: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        let config = ClassifierConfig::default();
        // built-in patterns are constant and compile
        let patterns = RegexSet::new(&config.disconnect_patterns).ok();
        Self::from_parts(patterns, config)
    }
}

impl ErrorClassifier {
    /// Build a classifier from configuration.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConfigError` if a disconnect pattern is not a valid regex.
    pub fn new(config: ClassifierConfig) -> Result<Self, SqlAdapterError> {
        for pattern in &config.disconnect_patterns {
            Regex::new(pattern).map_err(|e| {
                SqlAdapterError::ConfigError(format!("invalid disconnect pattern {pattern:?}: {e}"))
            })?;
        }
        let set = RegexSet::new(&config.disconnect_patterns)
            .map_err(|e| SqlAdapterError::ConfigError(e.to_string()))?;
        Ok(Self::from_parts(Some(set), config))
    }

    fn from_parts(patterns: Option<RegexSet>, config: ClassifierConfig) -> Self {
        Self {
            patterns: patterns.unwrap_or_else(RegexSet::empty),
            disconnect_codes: config.disconnect_codes,
            transient_codes: config.transient_codes,
        }
    }

    #[must_use]
    pub fn classify(&self, err: &DriverError) -> ErrorClass {
        if err.connection_lost || self.patterns.is_match(&err.message) {
            return ErrorClass::Disconnect;
        }
        let Some(code) = err.code.as_deref() else {
            return ErrorClass::Fatal;
        };
        if code_matches(&self.disconnect_codes, code) {
            ErrorClass::Disconnect
        } else if code_matches(&self.transient_codes, code) {
            ErrorClass::TransientRetryable
        } else {
            ErrorClass::Fatal
        }
    }

    /// Classify and wrap into the canonical error type.
    #[must_use]
    pub fn canonicalize(&self, err: DriverError) -> SqlAdapterError {
        let class = self.classify(&err);
        SqlAdapterError::Database(DatabaseError::new(err, class))
    }
}

fn code_matches(table: &[String], code: &str) -> bool {
    table.iter().any(|entry| match entry.strip_suffix('*') {
        Some(prefix) => code.starts_with(prefix),
        None => entry == code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_shutdown_message_is_disconnect() {
        let classifier = ErrorClassifier::default();
        let err = DriverError::new(
            "FATAL: terminating connection due to administrator command",
        );
        assert_eq!(classifier.classify(&err), ErrorClass::Disconnect);
    }

    #[test]
    fn connection_exception_class_is_disconnect() {
        let classifier = ErrorClassifier::default();
        let err = DriverError::new("could not send").with_code("08006");
        assert_eq!(classifier.classify(&err), ErrorClass::Disconnect);
        let lost = DriverError::new("whatever").connection_lost();
        assert_eq!(classifier.classify(&lost), ErrorClass::Disconnect);
    }

    #[test]
    fn busy_and_serialization_are_transient() {
        let classifier = ErrorClassifier::default();
        for code in ["40001", "40P01", "SQLITE_BUSY"] {
            let err = DriverError::new("try again").with_code(code);
            assert_eq!(classifier.classify(&err), ErrorClass::TransientRetryable);
        }
    }

    #[test]
    fn syntax_error_is_fatal_and_keeps_message() {
        let classifier = ErrorClassifier::default();
        let err = DriverError::new("syntax error at or near \"SELEC\"").with_code("42601");
        let canonical = classifier.canonicalize(err);
        let db = canonical.as_database().expect("database error");
        assert_eq!(db.class, ErrorClass::Fatal);
        assert_eq!(db.message, "syntax error at or near \"SELEC\"");
        assert!(!canonical.is_disconnect());
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let config = ClassifierConfig {
            disconnect_patterns: vec!["(unclosed".to_string()],
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            ErrorClassifier::new(config),
            Err(SqlAdapterError::ConfigError(_))
        ));
    }
}
