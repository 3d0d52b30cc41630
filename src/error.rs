//! Error types shared across the crate.

use uuid::Uuid;

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence failures surfaced by any `Database` backend.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DatabaseError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Query(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Self::Pool(e.to_string())
    }
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for DatabaseError {
    fn from(e: libsql::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// A bill payload that cannot be turned into installment records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("description cannot be empty")]
    EmptyDescription,

    #[error("amount must be greater than 0")]
    NonPositiveAmount,

    #[error("amount {0} has more than 2 decimal places")]
    AmountTooPrecise(rust_decimal::Decimal),

    #[error("amount {0} exceeds the maximum of 999999999999.99")]
    AmountTooLarge(rust_decimal::Decimal),

    #[error("due_day must be between 1 and 31, got {0}")]
    DueDayOutOfRange(i32),

    #[error("installment_count must be greater than 0, got {0}")]
    NonPositiveInstallmentCount(i32),

    #[error("due_date is required for non-recurring bills")]
    MissingDueDate,

    #[error(
        "recurring bills require installment_count with due_date or due_day, \
         or both period_start and period_end"
    )]
    MissingRecurrence,

    #[error("bill would expand into {requested} records, the limit is {max}")]
    TooManyInstallments { requested: u32, max: u32 },

    #[error("installment_count requires due_date or due_day")]
    MissingAnchorDate,

    #[error("an anchor day is required: provide due_day or due_date")]
    MissingAnchorDay,

    #[error("period_start and period_end must be provided together")]
    IncompletePeriod,

    #[error("period_start {start} is after period_end {end}")]
    InvertedPeriod {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("invalid date for {field}: '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("computed date is outside the supported calendar range")]
    DateOutOfRange,
}

/// Failures of the bill service layer.
#[derive(Debug, thiserror::Error)]
pub enum BillError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("bill {0} not found")]
    NotFound(Uuid),
}

/// HTTP server startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("server startup failed: {0}")]
    StartupFailed(String),
}
