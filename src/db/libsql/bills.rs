use libsql::params;
use uuid::Uuid;

use crate::bills::{BillStatus, NewBill};
use crate::db::{BillFilter, BillRecord, BillStore, UpdateBillParams};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, fmt_date, get_i64, get_opt_i64, get_opt_text, get_text, opt_i64, opt_text,
    parse_date, parse_decimal, parse_timestamp,
};

const BILL_COLUMNS: &str = "id, description, amount, due_date, due_day, is_recurring, \
     installment_number, installment_total, period_start, period_end, status, \
     created_at, updated_at";

fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("invalid bills.id uuid: {}", e)))
}

fn parse_status(raw: &str) -> Result<BillStatus, DatabaseError> {
    BillStatus::from_db_value(raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid bill status '{}'", raw)))
}

fn opt_i32(value: Option<i64>, field: &str) -> Result<Option<i32>, DatabaseError> {
    value
        .map(|v| {
            i32::try_from(v)
                .map_err(|_| DatabaseError::Serialization(format!("{} out of range: {}", field, v)))
        })
        .transpose()
}

fn row_to_bill_record(row: &libsql::Row) -> Result<BillRecord, DatabaseError> {
    Ok(BillRecord {
        id: parse_uuid(&get_text(row, 0))?,
        description: get_text(row, 1),
        amount: parse_decimal(&get_text(row, 2))?,
        due_date: parse_date(&get_text(row, 3))?,
        due_day: opt_i32(get_opt_i64(row, 4), "due_day")?,
        is_recurring: get_i64(row, 5) != 0,
        installment_number: opt_i32(get_opt_i64(row, 6), "installment_number")?,
        installment_total: opt_i32(get_opt_i64(row, 7), "installment_total")?,
        period_start: get_opt_text(row, 8)
            .map(|raw| parse_date(&raw))
            .transpose()?,
        period_end: get_opt_text(row, 9)
            .map(|raw| parse_date(&raw))
            .transpose()?,
        status: parse_status(&get_text(row, 10))?,
        created_at: parse_timestamp(&get_text(row, 11))?,
        updated_at: parse_timestamp(&get_text(row, 12))?,
    })
}

impl LibSqlBackend {
    /// Matching bills in listing order, optionally capped at `limit` rows.
    async fn select_bills(
        &self,
        filter: &BillFilter,
        limit: Option<i64>,
    ) -> Result<Vec<BillRecord>, DatabaseError> {
        let mut clauses = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();
        if let Some(status) = filter.status {
            values.push(libsql::Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(from) = filter.due_from {
            values.push(libsql::Value::Text(fmt_date(from)));
            clauses.push(format!("due_date >= ?{}", values.len()));
        }
        if let Some(to) = filter.due_to {
            values.push(libsql::Value::Text(fmt_date(to)));
            clauses.push(format!("due_date <= ?{}", values.len()));
        }
        let limit_sql = match limit {
            Some(limit) => {
                values.push(libsql::Value::Integer(limit));
                format!("LIMIT ?{}", values.len())
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
             ORDER BY due_date ASC, COALESCE(installment_number, 0) ASC, \
             created_at ASC, rowid ASC {limit_sql}"
        );

        let conn = self.connect().await?;
        let mut rows = conn
            .query(&sql, libsql::params::Params::Positional(values))
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_bill_record(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl BillStore for LibSqlBackend {
    async fn create_bills(&self, bills: &[NewBill]) -> Result<Vec<BillRecord>, DatabaseError> {
        if bills.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connect().await?;
        conn.execute("BEGIN", ()).await?;
        let insert_result = async {
            let mut out = Vec::with_capacity(bills.len());
            for bill in bills {
                let id = Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO bills \
                     (id, description, amount, due_date, due_day, is_recurring, \
                      installment_number, installment_total, period_start, period_end, status, \
                      created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, \
                      datetime('now'), datetime('now'))",
                    params![
                        id.as_str(),
                        bill.description.as_str(),
                        bill.amount.to_string(),
                        fmt_date(bill.due_date),
                        opt_i64(bill.due_day.map(i64::from)),
                        i64::from(bill.is_recurring),
                        opt_i64(bill.installment_number.map(i64::from)),
                        opt_i64(bill.installment_total.map(i64::from)),
                        opt_text(bill.period_start.map(fmt_date).as_deref()),
                        opt_text(bill.period_end.map(fmt_date).as_deref()),
                        bill.status.as_str(),
                    ],
                )
                .await?;

                let row = conn
                    .query(
                        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1 LIMIT 1"),
                        params![id.as_str()],
                    )
                    .await?
                    .next()
                    .await?
                    .ok_or_else(|| {
                        DatabaseError::Query("failed to load created bill".to_string())
                    })?;
                out.push(row_to_bill_record(&row)?);
            }
            Ok::<_, DatabaseError>(out)
        }
        .await;

        match insert_result {
            Ok(records) => {
                conn.execute("COMMIT", ()).await?;
                Ok(records)
            }
            Err(err) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(err)
            }
        }
    }

    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<BillRecord>, DatabaseError> {
        self.select_bills(filter, Some(filter.effective_limit())).await
    }

    async fn list_all_bills(&self, filter: &BillFilter) -> Result<Vec<BillRecord>, DatabaseError> {
        self.select_bills(filter, None).await
    }

    async fn get_bill(&self, id: Uuid) -> Result<Option<BillRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?;

        row.map(|row| row_to_bill_record(&row)).transpose()
    }

    async fn update_bill(
        &self,
        id: Uuid,
        input: &UpdateBillParams,
    ) -> Result<Option<BillRecord>, DatabaseError> {
        let Some(existing) = self.get_bill(id).await? else {
            return Ok(None);
        };
        if input.is_empty() {
            return Ok(Some(existing));
        }

        let merged_description = input
            .description
            .as_deref()
            .unwrap_or(existing.description.as_str())
            .trim()
            .to_string();
        let merged_amount = input.amount.unwrap_or(existing.amount);
        let merged_due_date = input.due_date.unwrap_or(existing.due_date);
        let merged_due_day = input.due_day.or(existing.due_day);
        let merged_status = input.status.unwrap_or(existing.status);

        let conn = self.connect().await?;
        conn.execute(
            "UPDATE bills SET \
               description = ?2, \
               amount = ?3, \
               due_date = ?4, \
               due_day = ?5, \
               status = ?6, \
               updated_at = datetime('now') \
             WHERE id = ?1",
            params![
                id.to_string(),
                merged_description,
                merged_amount.to_string(),
                fmt_date(merged_due_date),
                opt_i64(merged_due_day.map(i64::from)),
                merged_status.as_str(),
            ],
        )
        .await?;

        self.get_bill(id).await
    }

    async fn delete_bill(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM bills WHERE id = ?1", params![id.to_string()])
            .await?;
        Ok(deleted > 0)
    }
}
