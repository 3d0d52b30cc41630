//! PostgreSQL backend for the Database trait.
//!
//! Connections come from a `deadpool-postgres` pool; the schema lives in
//! `migrations/` and is embedded at compile time by refinery.

use async_trait::async_trait;
use deadpool_postgres::{Pool, PoolConfig, Runtime};
use secrecy::ExposeSecret;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use crate::bills::{BillStatus, NewBill};
use crate::config::DatabaseConfig;
use crate::db::{BillFilter, BillRecord, BillStore, Database, UpdateBillParams};
use crate::error::DatabaseError;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const BILL_COLUMNS: &str = "id, description, amount, due_date, due_day, is_recurring, \
     installment_number, installment_total, period_start, period_end, status, \
     created_at, updated_at";

/// PostgreSQL database backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create the pool and make sure a connection can be checked out.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some(config.url.expose_secret().to_string());
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        // Fail fast so connect_with_retry sees an unreachable server.
        let _conn = pool.get().await?;
        tracing::info!(pool_size = config.pool_size, "connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Matching bills in listing order, optionally capped at `limit` rows.
    async fn select_bills(
        &self,
        filter: &BillFilter,
        limit: Option<i64>,
    ) -> Result<Vec<BillRecord>, DatabaseError> {
        let status = filter.status.map(BillStatus::as_str);

        let mut clauses = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(status) = status.as_ref() {
            params.push(status);
            clauses.push(format!("status = ${}", params.len()));
        }
        if let Some(from) = filter.due_from.as_ref() {
            params.push(from);
            clauses.push(format!("due_date >= ${}", params.len()));
        }
        if let Some(to) = filter.due_to.as_ref() {
            params.push(to);
            clauses.push(format!("due_date <= ${}", params.len()));
        }
        let limit_sql = match limit.as_ref() {
            Some(limit) => {
                params.push(limit);
                format!("LIMIT ${}", params.len())
            }
            None => String::new(),
        };

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {BILL_COLUMNS} FROM bills {where_sql} \
             ORDER BY due_date ASC, installment_number ASC NULLS FIRST, created_at ASC, id ASC \
             {limit_sql}"
        );

        let conn = self.pool.get().await?;
        let rows = conn.query(&sql, &params).await?;
        rows.iter().map(row_to_bill_record).collect()
    }
}

fn row_to_bill_record(row: &tokio_postgres::Row) -> Result<BillRecord, DatabaseError> {
    let status_raw: String = row.get("status");
    let status = BillStatus::from_db_value(&status_raw).ok_or_else(|| {
        DatabaseError::Serialization(format!("invalid bill status '{}'", status_raw))
    })?;
    Ok(BillRecord {
        id: row.get("id"),
        description: row.get("description"),
        amount: row.get("amount"),
        due_date: row.get("due_date"),
        due_day: row.get("due_day"),
        is_recurring: row.get("is_recurring"),
        installment_number: row.get("installment_number"),
        installment_total: row.get("installment_total"),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl Database for PgBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let mut client = self.pool.get().await?;
        let report = embedded::migrations::runner()
            .run_async(&mut **client)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "applied migration"
            );
        }
        Ok(())
    }
}

// ==================== BillStore ====================

#[async_trait]
impl BillStore for PgBackend {
    async fn create_bills(&self, bills: &[NewBill]) -> Result<Vec<BillRecord>, DatabaseError> {
        if bills.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        let insert_sql = format!(
            "INSERT INTO bills \
             (id, description, amount, due_date, due_day, is_recurring, installment_number, \
              installment_total, period_start, period_end, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {BILL_COLUMNS}"
        );
        let mut out = Vec::with_capacity(bills.len());
        for bill in bills {
            let row = tx
                .query_one(
                    &insert_sql,
                    &[
                        &Uuid::new_v4(),
                        &bill.description,
                        &bill.amount,
                        &bill.due_date,
                        &bill.due_day,
                        &bill.is_recurring,
                        &bill.installment_number,
                        &bill.installment_total,
                        &bill.period_start,
                        &bill.period_end,
                        &bill.status.as_str(),
                    ],
                )
                .await?;
            out.push(row_to_bill_record(&row)?);
        }

        // Dropping `tx` without commit rolls the whole batch back.
        tx.commit().await?;
        Ok(out)
    }

    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<BillRecord>, DatabaseError> {
        self.select_bills(filter, Some(filter.effective_limit())).await
    }

    async fn list_all_bills(&self, filter: &BillFilter) -> Result<Vec<BillRecord>, DatabaseError> {
        self.select_bills(filter, None).await
    }

    async fn get_bill(&self, id: Uuid) -> Result<Option<BillRecord>, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"),
                &[&id],
            )
            .await?;
        row.as_ref().map(row_to_bill_record).transpose()
    }

    async fn update_bill(
        &self,
        id: Uuid,
        input: &UpdateBillParams,
    ) -> Result<Option<BillRecord>, DatabaseError> {
        if input.is_empty() {
            return self.get_bill(id).await;
        }

        let description = input.description.as_deref().map(str::trim);
        let status = input.status.map(BillStatus::as_str);
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE bills SET \
                       description = COALESCE($2, description), \
                       amount = COALESCE($3, amount), \
                       due_date = COALESCE($4, due_date), \
                       due_day = COALESCE($5, due_day), \
                       status = COALESCE($6, status), \
                       updated_at = NOW() \
                     WHERE id = $1 \
                     RETURNING {BILL_COLUMNS}"
                ),
                &[
                    &id,
                    &description,
                    &input.amount,
                    &input.due_date,
                    &input.due_day,
                    &status,
                ],
            )
            .await?;
        row.as_ref().map(row_to_bill_record).transpose()
    }

    async fn delete_bill(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.pool.get().await?;
        let deleted = conn
            .execute("DELETE FROM bills WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}
