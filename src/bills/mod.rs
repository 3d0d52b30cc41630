//! Bill domain: typed specifications, installment expansion, service
//! operations and reporting.

pub mod installments;
pub mod report;
pub mod service;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use installments::{Schedule, generate};

/// Payment state of a single bill record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    #[default]
    #[serde(alias = "pendente")]
    Pending,
    #[serde(alias = "paga", alias = "pago")]
    Paid,
    #[serde(alias = "vencida")]
    Overdue,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    /// The status after a "pay" action: paid bills reopen, anything else is settled.
    pub fn toggled_paid(self) -> Self {
        match self {
            Self::Paid => Self::Pending,
            Self::Pending | Self::Overdue => Self::Paid,
        }
    }
}

/// Validated-at-the-boundary input for creating one bill or a recurring group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillSpecification {
    pub description: String,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub due_day: Option<i32>,
    pub is_recurring: bool,
    pub installment_count: Option<i32>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub status: BillStatus,
}

/// A bill record ready for insertion; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
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
}

/// Parse an ISO `YYYY-MM-DD` date field.
pub fn parse_date_field(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: trimmed.to_string(),
    })
}

/// Parse a period bound given either as `YYYY-MM-DD` or as a bare `YYYY-MM`
/// month (resolved to its first day).
pub fn parse_period_field(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidDate {
            field,
            value: trimmed.to_string(),
        }
    })
}

/// Decimal places a stored amount keeps.
pub const AMOUNT_SCALE: u32 = 2;

/// Largest amount the `NUMERIC(14, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, AMOUNT_SCALE);

/// Amounts must be positive cents that fit the storage column exactly.
pub fn validate_amount(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(ValidationError::AmountTooPrecise(amount));
    }
    if amount > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge(amount));
    }
    Ok(())
}

/// Treat blank strings the same as an absent field.
pub(crate) fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}
