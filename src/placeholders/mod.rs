//! Placeholder handling: named-argument binding and `$N`/`?N` translation.
//!
//! Both walk SQL with the same scanner, which leaves quoted strings, quoted
//! identifiers, comments and dollar-quoted bodies alone.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Deserialize;

use crate::error::SqlAdapterError;
use crate::types::{Params, RowValues};

mod parsers;
mod scanner;

use parsers::split_type_suffix;
use scanner::{Token, placeholders};

/// Target placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`, casts as `$1::numeric`.
    #[default]
    Postgres,
    /// SQLite-style placeholders like `?1`, casts as `CAST(?1 AS numeric)`.
    Sqlite,
}

impl PlaceholderStyle {
    fn write_positional(self, out: &mut String, position: usize, cast: Option<&str>) {
        match (self, cast) {
            (PlaceholderStyle::Postgres, None) => {
                out.push('$');
                out.push_str(&position.to_string());
            }
            (PlaceholderStyle::Postgres, Some(ty)) => {
                out.push('$');
                out.push_str(&position.to_string());
                out.push_str("::");
                out.push_str(ty);
            }
            (PlaceholderStyle::Sqlite, None) => {
                out.push('?');
                out.push_str(&position.to_string());
            }
            (PlaceholderStyle::Sqlite, Some(ty)) => {
                out.push_str("CAST(?");
                out.push_str(&position.to_string());
                out.push_str(" AS ");
                out.push_str(ty);
                out.push(')');
            }
        }
    }
}

/// How to resolve translation for a call relative to the pool default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationMode {
    /// Follow the pool's default setting.
    #[default]
    PoolDefault,
    /// Force translation on, regardless of pool default.
    ForceOn,
    /// Force translation off, regardless of pool default.
    ForceOff,
}

impl TranslationMode {
    #[must_use]
    pub fn resolve(self, pool_default: bool) -> bool {
        match self {
            TranslationMode::PoolDefault => pool_default,
            TranslationMode::ForceOn => true,
            TranslationMode::ForceOff => false,
        }
    }
}

/// Translate numbered placeholders between Postgres-style `$N` and SQLite-style `?N`.
///
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle, enabled: bool) -> Cow<'_, str> {
    if !enabled {
        return Cow::Borrowed(sql);
    }
    let wanted = match target {
        PlaceholderStyle::Postgres => b'$',
        PlaceholderStyle::Sqlite => b'?',
    };

    let mut out: Option<String> = None;
    let mut copied = 0;
    for token in placeholders(sql) {
        if let Token::Numbered {
            start,
            end,
            sigil,
            digits,
        } = token
            && sigil != wanted
        {
            let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
            buf.push_str(&sql[copied..start]);
            buf.push(wanted as char);
            buf.push_str(digits);
            copied = end;
        }
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

/// One distinct placeholder key of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderKey {
    /// Lookup key, without any `__type` suffix.
    pub name: String,
    /// Type from the first occurrence's `__type` suffix.
    pub cast: Option<String>,
}

/// A named-placeholder template rewritten to positional placeholders.
///
/// Keys get positions in order of first appearance, and a key that appears
/// again reuses its position:
/// ```rust
/// use sql_adapter::prelude::*;
///
/// let plan = BindPlan::parse(
///     "SELECT * FROM t WHERE b = $b AND a = $a OR b = $b AND c > $c__numeric",
///     PlaceholderStyle::Postgres,
/// );
/// assert_eq!(plan.sql(), "SELECT * FROM t WHERE b = $1 AND a = $2 OR b = $1 AND c > $3::numeric");
/// assert_eq!(plan.position_of("c"), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindPlan {
    sql: String,
    keys: Vec<PlaceholderKey>,
    positions: HashMap<String, usize>,
}

impl BindPlan {
    #[must_use]
    pub fn parse(template: &str, style: PlaceholderStyle) -> Self {
        let mut plan = BindPlan {
            sql: String::with_capacity(template.len()),
            keys: Vec::new(),
            positions: HashMap::new(),
        };
        let mut copied = 0;
        for token in placeholders(template) {
            let Token::Named { start, end, ident } = token else {
                continue;
            };
            let (name, cast) = split_type_suffix(ident);
            let position = plan.assign(name, cast);
            plan.sql.push_str(&template[copied..start]);
            style.write_positional(&mut plan.sql, position + 1, cast);
            copied = end;
        }
        plan.sql.push_str(&template[copied..]);
        plan
    }

    fn assign(&mut self, name: &str, cast: Option<&str>) -> usize {
        if let Some(&position) = self.positions.get(name) {
            return position;
        }
        let position = self.keys.len();
        self.keys.push(PlaceholderKey {
            name: name.to_string(),
            cast: cast.map(str::to_string),
        });
        self.positions.insert(name.to_string(), position);
        position
    }

    /// The positional SQL sent to the driver.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn keys(&self) -> &[PlaceholderKey] {
        &self.keys
    }

    /// Zero-based position of `name` in the bound argument array.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Lay `values` out positionally. Keys the statement does not reference are ignored.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ParameterError` naming the first referenced key with no value.
    pub fn bind(&self, values: &Params) -> Result<Vec<RowValues>, SqlAdapterError> {
        self.keys
            .iter()
            .map(|key| {
                values.get(&key.name).cloned().ok_or_else(|| {
                    SqlAdapterError::ParameterError(format!(
                        "no value supplied for placeholder ${}",
                        key.name
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn translates_sqlite_to_postgres() {
        let sql = "select * from t where a = ?1 and b = ?2";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres, true);
        assert_eq!(res, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn translates_postgres_to_sqlite() {
        let sql = "insert into t values($1, $2)";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite, true);
        assert_eq!(res, "insert into t values(?1, ?2)");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?1', $1 -- $2\n/* ?3 */ from t where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite, true);
        assert_eq!(res, "select '?1', ?1 -- $2\n/* ?3 */ from t where a = ?1");
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select $1 from t $foo$ where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite, true);
        assert_eq!(res, "$foo$ select $1 from t $foo$ where a = ?1");
    }

    #[test]
    fn respects_disabled_flag() {
        let sql = "select * from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres, false);
        assert!(matches!(res, Cow::Borrowed(_)));
        assert_eq!(res, sql);
    }

    #[test]
    fn translation_mode_resolution() {
        assert!(TranslationMode::ForceOn.resolve(false));
        assert!(!TranslationMode::ForceOff.resolve(true));
        assert!(TranslationMode::PoolDefault.resolve(true));
        assert!(!TranslationMode::PoolDefault.resolve(false));
    }

    #[test]
    fn first_occurrence_order_assigns_positions() {
        let plan = BindPlan::parse(
            "select $b, $a, $b, $c",
            PlaceholderStyle::Postgres,
        );
        assert_eq!(plan.sql(), "select $1, $2, $1, $3");
        assert_eq!(plan.position_of("b"), Some(0));
        assert_eq!(plan.position_of("a"), Some(1));
        assert_eq!(plan.position_of("c"), Some(2));
        let names: Vec<&str> = plan.keys().iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn missing_key_is_a_parameter_error() {
        let plan = BindPlan::parse("select $b, $a, $b, $c", PlaceholderStyle::Postgres);
        let err = plan
            .bind(&params! { "a" => 1, "b" => 2 })
            .expect_err("c is missing");
        assert!(matches!(err, SqlAdapterError::ParameterError(msg) if msg.contains("$c")));
    }

    #[test]
    fn unused_keys_are_dropped() {
        let plan = BindPlan::parse("select $a", PlaceholderStyle::Sqlite);
        let args = plan
            .bind(&params! { "a" => "x", "extra" => 9 })
            .expect("bound");
        assert_eq!(args, vec![RowValues::Text("x".into())]);
    }

    #[test]
    fn type_suffix_becomes_cast() {
        let template = "update acct set bal = $amount__numeric where id = $id";
        let pg = BindPlan::parse(template, PlaceholderStyle::Postgres);
        assert_eq!(pg.sql(), "update acct set bal = $1::numeric where id = $2");
        assert_eq!(pg.keys()[0].cast.as_deref(), Some("numeric"));

        let lite = BindPlan::parse(template, PlaceholderStyle::Sqlite);
        assert_eq!(
            lite.sql(),
            "update acct set bal = CAST(?1 AS numeric) where id = ?2"
        );
        let args = lite
            .bind(&params! { "amount" => 10, "id" => 3 })
            .expect("bound");
        assert_eq!(args, vec![RowValues::Int(10), RowValues::Int(3)]);
    }

    #[test]
    fn named_placeholders_in_literals_are_left_alone() {
        let plan = BindPlan::parse(
            "select '$a', \"$b\", $c -- $d\n",
            PlaceholderStyle::Postgres,
        );
        assert_eq!(plan.sql(), "select '$a', \"$b\", $1 -- $d\n");
        assert_eq!(plan.keys().len(), 1);
    }

    #[test]
    fn keeps_non_ascii_text_intact() {
        let plan = BindPlan::parse("select 'héllo' || $name, 'ß'", PlaceholderStyle::Postgres);
        assert_eq!(plan.sql(), "select 'héllo' || $1, 'ß'");
    }
}
