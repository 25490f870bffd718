use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::placeholders::{BindPlan, PlaceholderStyle};

/// What a bound or prepared statement does, which decides the shape of its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// A named statement definition shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    name: String,
    kind: StatementKind,
    template: String,
    plan: BindPlan,
}

impl PreparedStatement {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: StatementKind,
        template: impl Into<String>,
        style: PlaceholderStyle,
    ) -> Self {
        let template = template.into();
        let plan = BindPlan::parse(&template, style);
        Self {
            name: name.into(),
            kind,
            template,
            plan,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// SQL as registered, with named placeholders.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Positional SQL prepared on connections.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.plan.sql()
    }

    #[must_use]
    pub fn plan(&self) -> &BindPlan {
        &self.plan
    }
}

/// Process-wide name → definition table.
///
/// Redefining a name replaces the definition here only; each connection
/// notices at its next reconciliation.
#[derive(Debug, Default)]
pub struct StatementTable {
    statements: RwLock<HashMap<String, Arc<PreparedStatement>>>,
}

impl StatementTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<PreparedStatement>>> {
        match self.statements.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<PreparedStatement>>> {
        match self.statements.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register or replace a definition, returning the previous one.
    pub fn define(
        &self,
        statement: impl Into<Arc<PreparedStatement>>,
    ) -> Option<Arc<PreparedStatement>> {
        let statement = statement.into();
        self.write().insert(statement.name.clone(), statement)
    }

    /// Snapshot of the current definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<PreparedStatement>> {
        self.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<PreparedStatement>> {
        self.write().remove(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefinition_replaces_snapshot() {
        let table = StatementTable::new();
        table.define(PreparedStatement::new(
            "q",
            StatementKind::Select,
            "select $a",
            PlaceholderStyle::Postgres,
        ));
        let before = table.get("q").expect("defined");

        let previous = table.define(PreparedStatement::new(
            "q",
            StatementKind::Select,
            "select $a, $b",
            PlaceholderStyle::Postgres,
        ));
        assert_eq!(previous.as_deref(), Some(before.as_ref()));
        assert_eq!(before.sql(), "select $1");
        assert_eq!(table.get("q").expect("defined").sql(), "select $1, $2");
        assert_eq!(table.names(), vec!["q".to_string()]);
    }
}
