use tracing::debug;

use crate::adapter::Adapter;
use crate::driver::Driver;
use crate::error::AdapterError;

/// Outcome of asking the backend to begin a transaction.
///
/// Non-transactional storage engines reject BEGIN; the adapter treats that
/// as a designed state rather than an error, and the caller proceeds as
/// if no transaction exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The backend opened a transaction.
    Started,
    /// The storage engine does not support transactions.
    UnsupportedByBackend,
}

impl BeginOutcome {
    #[must_use]
    pub fn is_started(self) -> bool {
        matches!(self, BeginOutcome::Started)
    }
}

impl<D: Driver> Adapter<D> {
    /// Issue BEGIN through the non-prepared execution path.
    ///
    /// Tolerance is narrowed to driver errors whose code identifies
    /// missing transaction support; commit/rollback orchestration stays
    /// with the caller.
    ///
    /// # Errors
    ///
    /// Propagates any BEGIN failure other than the unsupported-feature
    /// class.
    pub fn begin_transaction(&mut self) -> Result<BeginOutcome, AdapterError> {
        match self.execute_direct("BEGIN") {
            Ok(_) => Ok(BeginOutcome::Started),
            Err(AdapterError::Execution(err)) if err.is_unsupported() => {
                debug!(%err, "backend rejected BEGIN; continuing without a transaction");
                Ok(BeginOutcome::UnsupportedByBackend)
            }
            Err(err) => Err(err),
        }
    }
}
