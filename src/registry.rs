use std::collections::HashMap;

use crate::driver::Driver;
use crate::error::DriverError;

/// What [`StatementRegistry::ensure`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Already prepared with identical SQL.
    Reused,
    /// Was not prepared on this connection.
    Prepared,
    /// Prepared with different SQL; deallocated and prepared again.
    Reprepared,
}

/// Statements currently prepared on one physical connection, name → SQL.
///
/// Owned by a [`Connection`](crate::connection::Connection), so only one caller
/// touches it at a time.
#[derive(Debug, Default, Clone)]
pub struct StatementRegistry {
    prepared: HashMap<String, String>,
}

impl StatementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `name` is prepared on `driver` with exactly `sql`.
    ///
    /// A stale entry is deallocated first. A failed DEALLOCATE is logged and the
    /// PREPARE is still issued; a failed PREPARE leaves the name unprepared.
    ///
    /// # Errors
    /// Returns the driver error from PREPARE.
    pub fn ensure(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        sql: &str,
    ) -> Result<Reconcile, DriverError> {
        let outcome = match self.prepared.get(name) {
            Some(existing) if existing == sql => return Ok(Reconcile::Reused),
            Some(_) => {
                if let Err(err) = driver.deallocate_named(name) {
                    tracing::warn!(statement = name, error = %err, "deallocate before reprepare failed");
                }
                self.prepared.remove(name);
                Reconcile::Reprepared
            }
            None => Reconcile::Prepared,
        };

        driver.prepare_named(name, sql)?;
        tracing::debug!(statement = name, ?outcome, "statement prepared");
        self.prepared.insert(name.to_string(), sql.to_string());
        Ok(outcome)
    }

    /// Drop `name` from the connection if it is prepared there.
    ///
    /// # Errors
    /// Returns the driver error from DEALLOCATE; the entry is forgotten either way.
    pub fn deallocate(&mut self, driver: &mut dyn Driver, name: &str) -> Result<bool, DriverError> {
        if self.prepared.remove(name).is_none() {
            return Ok(false);
        }
        driver.deallocate_named(name)?;
        Ok(true)
    }

    /// Forget everything, for when the session behind the registry was replaced.
    pub fn forget_all(&mut self) {
        self.prepared.clear();
    }

    #[must_use]
    pub fn sql_for(&self, name: &str) -> Option<&str> {
        self.prepared.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prepared.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prepared.is_empty()
    }
}
