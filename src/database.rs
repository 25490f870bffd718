use std::ops::ControlFlow;
use std::sync::Arc;

use crate::classify::ErrorClassifier;
use crate::config::DatabaseOptions;
use crate::connection::Connection;
use crate::dataset::{Dataset, Materializer};
use crate::decode::TypeDecoderTable;
use crate::error::{DriverError, SqlAdapterError};
use crate::placeholders::{BindPlan, TranslationMode, translate_placeholders};
use crate::pool::{ConnectionPool, MiddlewarePool};
use crate::results::{CustomDbRow, ResultSet};
use crate::statement::{PreparedStatement, StatementKind, StatementTable};
use crate::types::{Params, RowValues};

/// Per-call options for bound and prepared executions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Return the inserted row's id instead of the statement's own result.
    pub insert: bool,
    /// Server tag selecting a pool other than the default.
    pub server: Option<String>,
    /// Placeholder translation for plain SQL.
    pub translation: TranslationMode,
}

impl ExecuteOptions {
    #[must_use]
    pub fn insert() -> Self {
        Self {
            insert: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_server(mut self, tag: impl Into<String>) -> Self {
        self.server = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_translation(mut self, translation: TranslationMode) -> Self {
        self.translation = translation;
        self
    }
}

/// Result of a bound or prepared execution.
#[derive(Debug, Clone)]
pub enum ExecOutcome {
    /// Rows of a select.
    Rows(ResultSet),
    /// Rows changed by an update or delete.
    Affected(u64),
    /// Primary key of the inserted row, `Null` if the backend reported none.
    InsertId(RowValues),
}

impl ExecOutcome {
    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            ExecOutcome::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    #[must_use]
    pub fn affected(&self) -> Option<u64> {
        match self {
            ExecOutcome::Affected(count) => Some(*count),
            _ => None,
        }
    }

    #[must_use]
    pub fn insert_id(&self) -> Option<&RowValues> {
        match self {
            ExecOutcome::InsertId(id) => Some(id),
            _ => None,
        }
    }
}

/// The execution facade.
///
/// Each call checks out one connection for its duration and releases it
/// before returning. Driver failures are classified, logged once and
/// surfaced as [`SqlAdapterError::Database`]; a disconnect marks the
/// connection broken so the pool drops it instead of reusing it.
pub struct Database<P: ConnectionPool = MiddlewarePool> {
    pool: P,
    options: DatabaseOptions,
    decoders: Arc<TypeDecoderTable>,
    classifier: Arc<ErrorClassifier>,
    statements: Arc<StatementTable>,
}

impl<P: ConnectionPool> std::fmt::Debug for Database<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("options", &self.options)
            .field("statements", &self.statements.names())
            .finish_non_exhaustive()
    }
}

impl<P: ConnectionPool> Database<P> {
    /// Facade with the standard decoder table, a classifier built from
    /// `options.classifier` and an empty statement table.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConfigError` for an invalid classifier pattern.
    pub fn new(pool: P, options: DatabaseOptions) -> Result<Self, SqlAdapterError> {
        let classifier = ErrorClassifier::new(options.classifier.clone())?;
        Ok(Self::with_parts(
            pool,
            options,
            Arc::new(TypeDecoderTable::standard()),
            Arc::new(classifier),
            Arc::new(StatementTable::new()),
        ))
    }

    /// Facade over explicitly supplied tables, which may be shared between facades.
    #[must_use]
    pub fn with_parts(
        pool: P,
        options: DatabaseOptions,
        decoders: Arc<TypeDecoderTable>,
        classifier: Arc<ErrorClassifier>,
        statements: Arc<StatementTable>,
    ) -> Self {
        Self {
            pool,
            options,
            decoders,
            classifier,
            statements,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &P {
        &self.pool
    }

    #[must_use]
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    #[must_use]
    pub fn decoders(&self) -> &TypeDecoderTable {
        &self.decoders
    }

    #[must_use]
    pub fn statements(&self) -> &StatementTable {
        &self.statements
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer {
            decoders: &self.decoders,
            case: self.options.identifier_case,
        }
    }

    /// Run plain SQL with positional arguments and return the affected row count.
    ///
    /// # Errors
    /// Returns the canonical database error or a pool error.
    pub fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, SqlAdapterError> {
        self.execute_with(sql, params, &ExecuteOptions::default())
    }

    /// [`Database::execute`] with per-call options.
    ///
    /// # Errors
    /// Returns the canonical database error or a pool error.
    pub fn execute_with(
        &self,
        sql: &str,
        params: &[RowValues],
        opts: &ExecuteOptions,
    ) -> Result<u64, SqlAdapterError> {
        let sql = self.translate(sql, opts.translation);
        tracing::info!(sql = %sql, args = ?params, "execute");
        self.with_connection(opts.server.as_deref(), &sql, params, |conn| {
            conn.execute(&sql, params)
        })
    }

    /// Run plain SQL and materialize every row.
    ///
    /// # Errors
    /// Returns the canonical database error or a pool error.
    pub fn fetch(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlAdapterError> {
        let sql = self.translate(sql, TranslationMode::PoolDefault);
        tracing::info!(sql = %sql, args = ?params, "fetch");
        let materializer = self.materializer();
        self.with_connection(None, &sql, params, |conn| {
            conn.query(&sql, params, |result| materializer.result_set(result))
        })
    }

    /// A lazily fetched query.
    #[must_use]
    pub fn dataset(&self, sql: impl Into<String>) -> Dataset<'_, P> {
        Dataset::new(self, sql)
    }

    pub(crate) fn stream_rows(
        &self,
        sql: &str,
        params: &[RowValues],
        server: Option<&str>,
        on_columns: impl FnOnce(Arc<Vec<String>>),
        each: impl FnMut(CustomDbRow) -> Result<ControlFlow<()>, SqlAdapterError>,
    ) -> Result<(), SqlAdapterError> {
        let sql = self.translate(sql, TranslationMode::PoolDefault);
        tracing::info!(sql = %sql, args = ?params, "fetch rows");
        let materializer = self.materializer();
        self.with_connection(server, &sql, params, |conn| {
            conn.query(&sql, params, |result| {
                let columns = materializer.columns(result);
                // published only once a row exists
                if result.row_count() == 0 {
                    on_columns(Arc::new(Vec::new()));
                } else {
                    on_columns(Arc::clone(&columns));
                }
                materializer.for_each_row(result, &columns, each)
            })
        })?
    }

    /// Register `template` under `name` for later [`Database::execute_prepared`] calls.
    ///
    /// Connections prepare it server-side on first use. Redefining a name
    /// makes each connection deallocate and prepare again at its next use.
    pub fn prepare(
        &self,
        kind: StatementKind,
        name: &str,
        template: &str,
    ) -> Arc<PreparedStatement> {
        let statement = Arc::new(PreparedStatement::new(
            name,
            kind,
            template,
            self.options.placeholder_style,
        ));
        tracing::info!(statement = name, sql = statement.sql(), ?kind, "prepare");
        if let Some(previous) = self.statements.define(Arc::clone(&statement))
            && previous.template() != template
        {
            tracing::debug!(statement = name, "statement redefined");
        }
        statement
    }

    /// Run a statement registered with [`Database::prepare`].
    ///
    /// # Errors
    /// Returns `UnknownStatement` or `ParameterError` before touching the pool,
    /// otherwise the canonical database error or a pool error.
    pub fn execute_prepared(
        &self,
        name: &str,
        values: &Params,
        opts: &ExecuteOptions,
    ) -> Result<ExecOutcome, SqlAdapterError> {
        let statement = self
            .statements
            .get(name)
            .ok_or_else(|| SqlAdapterError::UnknownStatement(name.to_string()))?;
        let args = statement.plan().bind(values)?;
        let label = format!("EXECUTE {name}: {}", statement.sql());
        tracing::info!(statement = name, sql = statement.sql(), args = ?args, "execute prepared");

        let insert = opts.insert || statement.kind() == StatementKind::Insert;
        let materializer = self.materializer();
        self.with_connection(opts.server.as_deref(), &label, &args, |conn| {
            if insert {
                conn.query_prepared(name, statement.sql(), &args, |_| ())?;
                return fetch_insert_id(conn, materializer);
            }
            conn.query_prepared(name, statement.sql(), &args, |result| {
                outcome_for(statement.kind(), materializer, result)
            })
        })
    }

    /// Bind `values` into `template` and run it once without naming a statement.
    ///
    /// # Errors
    /// Returns `ParameterError` before touching the pool, otherwise the
    /// canonical database error or a pool error.
    pub fn call(
        &self,
        kind: StatementKind,
        template: &str,
        values: &Params,
        opts: &ExecuteOptions,
    ) -> Result<ExecOutcome, SqlAdapterError> {
        let plan = BindPlan::parse(template, self.options.placeholder_style);
        let args = plan.bind(values)?;
        tracing::info!(sql = plan.sql(), args = ?args, ?kind, "call");

        let insert = opts.insert || kind == StatementKind::Insert;
        let materializer = self.materializer();
        self.with_connection(opts.server.as_deref(), plan.sql(), &args, |conn| {
            if insert {
                conn.execute(plan.sql(), &args)?;
                return fetch_insert_id(conn, materializer);
            }
            conn.query(plan.sql(), &args, |result| {
                outcome_for(kind, materializer, result)
            })
        })
    }

    fn translate<'s>(&self, sql: &'s str, mode: TranslationMode) -> std::borrow::Cow<'s, str> {
        translate_placeholders(
            sql,
            self.options.placeholder_style,
            mode.resolve(self.options.translate_placeholders),
        )
    }

    fn with_connection<T>(
        &self,
        server: Option<&str>,
        label: &str,
        args: &[RowValues],
        op: impl FnOnce(&mut Connection) -> Result<T, DriverError>,
    ) -> Result<T, SqlAdapterError> {
        let mut guard = self.pool.acquire(server).inspect_err(|err| {
            tracing::error!(sql = label, args = ?args, error = %err, "could not acquire connection");
        })?;
        let conn: &mut Connection = &mut guard;
        op(conn).map_err(|err| self.fail(conn, label, args, err))
    }

    fn fail(
        &self,
        conn: &mut Connection,
        label: &str,
        args: &[RowValues],
        err: DriverError,
    ) -> SqlAdapterError {
        let err = self.classifier.canonicalize(err);
        if let SqlAdapterError::Database(db) = &err {
            tracing::error!(
                sql = label,
                args = ?args,
                connection = conn.id(),
                class = ?db.class,
                code = ?db.code,
                error = %db.message,
                "statement failed"
            );
            if db.is_disconnect() {
                conn.mark_broken();
            }
        }
        err
    }
}

fn outcome_for(
    kind: StatementKind,
    materializer: Materializer<'_>,
    result: &dyn crate::driver::DriverResult,
) -> ExecOutcome {
    match kind {
        StatementKind::Select => ExecOutcome::Rows(materializer.result_set(result)),
        StatementKind::Insert | StatementKind::Update | StatementKind::Delete => {
            ExecOutcome::Affected(result.affected_rows())
        }
    }
}

fn fetch_insert_id(
    conn: &mut Connection,
    materializer: Materializer<'_>,
) -> Result<ExecOutcome, DriverError> {
    let sql = conn.insert_id_sql().to_string();
    conn.query(&sql, &[], |result| {
        ExecOutcome::InsertId(materializer.first_value(result))
    })
}
