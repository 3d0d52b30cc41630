//! Bill operations shared by the HTTP layer and anything else holding a
//! `Database` handle.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::bills::report::{BillSummary, summarize};
use crate::bills::{BillSpecification, generate, validate_amount};
use crate::db::{BillFilter, BillRecord, Database, UpdateBillParams};
use crate::error::{BillError, ValidationError};

/// Expand `spec` into records and persist them atomically.
///
/// `today` anchors recurring bills that only carry a `due_day`.
pub async fn create_bills(
    db: &dyn Database,
    spec: &BillSpecification,
    today: NaiveDate,
) -> Result<Vec<BillRecord>, BillError> {
    let bills = generate(spec, today)?;
    let records = db.create_bills(&bills).await?;
    tracing::info!(
        description = %spec.description.trim(),
        recurring = spec.is_recurring,
        created = records.len(),
        "created bills"
    );
    Ok(records)
}

pub async fn get_bill(db: &dyn Database, id: Uuid) -> Result<BillRecord, BillError> {
    db.get_bill(id).await?.ok_or(BillError::NotFound(id))
}

pub async fn list_bills(
    db: &dyn Database,
    filter: &BillFilter,
) -> Result<Vec<BillRecord>, BillError> {
    Ok(db.list_bills(filter).await?)
}

/// Aggregate every bill matching `filter`. The listing limit does not apply.
pub async fn summarize_bills(
    db: &dyn Database,
    filter: &BillFilter,
) -> Result<BillSummary, BillError> {
    let records = db.list_all_bills(filter).await?;
    Ok(summarize(&records))
}

/// Check a partial edit against the same rules creation enforces.
pub fn validate_update(mut params: UpdateBillParams) -> Result<UpdateBillParams, ValidationError> {
    if let Some(description) = params.description.take() {
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        params.description = Some(trimmed.to_string());
    }
    if let Some(amount) = params.amount {
        validate_amount(amount)?;
    }
    if let Some(day) = params.due_day
        && !(1..=31).contains(&day)
    {
        return Err(ValidationError::DueDayOutOfRange(day));
    }
    Ok(params)
}

pub async fn update_bill(
    db: &dyn Database,
    id: Uuid,
    params: UpdateBillParams,
) -> Result<BillRecord, BillError> {
    let params = validate_update(params)?;
    let updated = db
        .update_bill(id, &params)
        .await?
        .ok_or(BillError::NotFound(id))?;
    tracing::debug!(%id, "updated bill");
    Ok(updated)
}

/// Flip a bill between paid and pending. Overdue bills become paid.
pub async fn toggle_paid(db: &dyn Database, id: Uuid) -> Result<BillRecord, BillError> {
    let current = get_bill(db, id).await?;
    let next = current.status.toggled_paid();
    let updated = db
        .update_bill(
            id,
            &UpdateBillParams {
                status: Some(next),
                ..UpdateBillParams::default()
            },
        )
        .await?
        .ok_or(BillError::NotFound(id))?;
    tracing::info!(
        %id,
        from = current.status.as_str(),
        to = next.as_str(),
        "toggled bill payment"
    );
    Ok(updated)
}

pub async fn delete_bill(db: &dyn Database, id: Uuid) -> Result<(), BillError> {
    if !db.delete_bill(id).await? {
        return Err(BillError::NotFound(id));
    }
    tracing::info!(%id, "deleted bill");
    Ok(())
}
