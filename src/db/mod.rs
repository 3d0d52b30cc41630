//! Database abstraction layer.
//!
//! Provides a backend-agnostic `Database` trait that unifies all persistence
//! operations. Two implementations exist behind feature flags:
//!
//! - `postgres` (default): Uses `deadpool-postgres` + `tokio-postgres`
//! - `libsql`: Uses libSQL (Turso's SQLite fork) for embedded deployment
//!
//! The handle is built once at startup and passed to request handlers as
//! `Arc<dyn Database>`.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "libsql")]
pub mod libsql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bills::{BillStatus, NewBill};
use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

/// Default page size for bill listings.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
/// Hard cap on a single bill listing.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// A persisted bill (one installment for recurring groups).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRecord {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub due_day: Option<i32>,
    pub is_recurring: bool,
    pub installment_number: Option<i32>,
    pub installment_total: Option<i32>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing filter; date bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillFilter {
    pub status: Option<BillStatus>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub limit: i64,
}

impl Default for BillFilter {
    fn default() -> Self {
        Self {
            status: None,
            due_from: None,
            due_to: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl BillFilter {
    pub(crate) fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIST_LIMIT)
    }
}

/// Field edits for a single record. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBillParams {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub due_day: Option<i32>,
    pub status: Option<BillStatus>,
}

impl UpdateBillParams {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[async_trait]
pub trait BillStore: Send + Sync {
    /// Insert every bill in one transaction, returning them in input order.
    /// Nothing is stored if any insert fails.
    async fn create_bills(&self, bills: &[NewBill]) -> Result<Vec<BillRecord>, DatabaseError>;
    /// One page of matching bills, at most `filter.effective_limit()` rows.
    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<BillRecord>, DatabaseError>;
    /// Every matching bill; `filter.limit` is ignored.
    async fn list_all_bills(&self, filter: &BillFilter) -> Result<Vec<BillRecord>, DatabaseError>;
    async fn get_bill(&self, id: Uuid) -> Result<Option<BillRecord>, DatabaseError>;
    async fn update_bill(
        &self,
        id: Uuid,
        input: &UpdateBillParams,
    ) -> Result<Option<BillRecord>, DatabaseError>;
    async fn delete_bill(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database: BillStore + Send + Sync {
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}

/// Create a database backend from configuration, run migrations, and return it.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        crate::config::DatabaseBackend::LibSql => {
            let backend = libsql::LibSqlBackend::new_local(&config.libsql_path).await?;
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "postgres")]
        crate::config::DatabaseBackend::Postgres => {
            let pg = postgres::PgBackend::new(config).await?;
            pg.run_migrations().await?;
            Ok(Arc::new(pg))
        }
        #[allow(unreachable_patterns)]
        other => Err(DatabaseError::Pool(format!(
            "database backend '{}' is not compiled in; enable the matching cargo feature",
            other.as_str()
        ))),
    }
}

/// `connect_from_config`, retried while the database is still coming up.
pub async fn connect_with_retry(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    let attempts = config.connect_retries.max(1);
    let mut attempt = 1;
    loop {
        match connect_from_config(config).await {
            Ok(db) => {
                tracing::info!(
                    backend = config.backend.as_str(),
                    attempt,
                    "database ready"
                );
                return Ok(db);
            }
            Err(err) if attempt < attempts => {
                tracing::warn!(
                    backend = config.backend.as_str(),
                    attempt,
                    max_attempts = attempts,
                    "database not ready, retrying in {:?}: {}",
                    config.connect_retry_delay,
                    err
                );
                tokio::time::sleep(config.connect_retry_delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(
                    backend = config.backend.as_str(),
                    attempts,
                    "giving up on database connection: {}",
                    err
                );
                return Err(err);
            }
        }
    }
}
