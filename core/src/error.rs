use thiserror::Error;

/// Everything the ledger can fail with, split so callers can tell bad input
/// apart from "try again later".
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied data violates a structural rule. Raised before any
    /// write, so a validation failure never leaves partial state behind.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (player identity tuple, team name,
    /// kart course label).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The stored data contradicts a ledger invariant, e.g. a history chain
    /// shorter than the match ledger implies.
    #[error("corrupt ledger: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Fold a unique-constraint failure into a domain-level [`Conflict`],
    /// leaving every other database error as [`Storage`].
    ///
    /// [`Conflict`]: Error::Conflict
    /// [`Storage`]: Error::Storage
    pub(crate) fn or_conflict(err: sqlx::Error, conflict: impl Into<String>) -> Self {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::Conflict(conflict.into())
            }
            err => Self::Storage(err),
        }
    }
}
