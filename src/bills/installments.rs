//! Expansion of a bill specification into concrete dated records.
//!
//! A non-recurring bill becomes exactly one record. A recurring bill is
//! expanded either from an installment count (anchored on a date or a day
//! of month) or from a period range walked month by month. Due days that
//! do not exist in a target month are clamped to that month's last day.

use chrono::{Datelike, Days, NaiveDate};

use crate::bills::{BillSpecification, NewBill, validate_amount};
use crate::error::ValidationError;

/// Upper bound on the records a single specification may expand into.
pub const MAX_INSTALLMENTS: u32 = 600;

/// How a specification expands into due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Single {
        due_date: NaiveDate,
    },
    Count {
        anchor: NaiveDate,
        count: u32,
        due_day: Option<u32>,
    },
    Range {
        start: NaiveDate,
        end: NaiveDate,
        due_day: u32,
    },
}

impl Schedule {
    /// Resolve the schedule selected by the populated optional fields.
    ///
    /// `today` is only consulted when a count-based bill is anchored on a
    /// bare day of month.
    pub fn resolve(spec: &BillSpecification, today: NaiveDate) -> Result<Self, ValidationError> {
        let due_day = spec.due_day.map(checked_due_day).transpose()?;

        if !spec.is_recurring {
            let due_date = spec.due_date.ok_or(ValidationError::MissingDueDate)?;
            return Ok(Self::Single { due_date });
        }

        if let Some(raw_count) = spec.installment_count {
            let count = u32::try_from(raw_count)
                .ok()
                .filter(|count| *count > 0)
                .ok_or(ValidationError::NonPositiveInstallmentCount(raw_count))?;
            if count > MAX_INSTALLMENTS {
                return Err(ValidationError::TooManyInstallments {
                    requested: count,
                    max: MAX_INSTALLMENTS,
                });
            }
            let anchor = match (spec.due_date, due_day) {
                (Some(date), _) => date,
                (None, Some(day)) => resolve_anchor(day, today)?,
                (None, None) => return Err(ValidationError::MissingAnchorDate),
            };
            return Ok(Self::Count {
                anchor,
                count,
                due_day,
            });
        }

        match (spec.period_start, spec.period_end) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(ValidationError::InvertedPeriod { start, end });
                }
                let due_day = due_day
                    .or_else(|| spec.due_date.map(|date| date.day()))
                    .ok_or(ValidationError::MissingAnchorDay)?;
                Ok(Self::Range {
                    start,
                    end,
                    due_day,
                })
            }
            (None, None) => Err(ValidationError::MissingRecurrence),
            _ => Err(ValidationError::IncompletePeriod),
        }
    }
}

fn checked_due_day(raw: i32) -> Result<u32, ValidationError> {
    u32::try_from(raw)
        .ok()
        .filter(|day| (1..=31).contains(day))
        .ok_or(ValidationError::DueDayOutOfRange(raw))
}

/// Expand `spec` into the ordered records it describes.
///
/// Pure: the same `spec` and `today` always produce the same sequence.
/// Either the whole sequence is returned or an error; never a prefix.
pub fn generate(
    spec: &BillSpecification,
    today: NaiveDate,
) -> Result<Vec<NewBill>, ValidationError> {
    let description = spec.description.trim();
    if description.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    validate_amount(spec.amount)?;

    let base = NewBill {
        description: description.to_string(),
        amount: spec.amount,
        due_date: today,
        due_day: spec.due_day,
        is_recurring: spec.is_recurring,
        installment_number: None,
        installment_total: None,
        period_start: spec.period_start,
        period_end: spec.period_end,
        status: spec.status,
    };

    let bills = match Schedule::resolve(spec, today)? {
        Schedule::Single { due_date } => vec![NewBill { due_date, ..base }],
        Schedule::Count {
            anchor,
            count,
            due_day,
        } => {
            let day = due_day.unwrap_or_else(|| anchor.day());
            let total = i32::try_from(count).map_err(|_| ValidationError::DateOutOfRange)?;
            let mut out = Vec::with_capacity(count as usize);
            for i in 0..count {
                let (year, month) = shift_month(anchor.year(), anchor.month(), i)?;
                out.push(NewBill {
                    due_date: clamped_date(year, month, day)?,
                    installment_number: Some(
                        i32::try_from(i + 1).map_err(|_| ValidationError::DateOutOfRange)?,
                    ),
                    installment_total: Some(total),
                    ..base.clone()
                });
            }
            out
        }
        Schedule::Range {
            start,
            end,
            due_day,
        } => {
            let mut out = Vec::new();
            let mut cursor = first_of_month(start)?;
            while cursor <= end {
                if out.len() >= MAX_INSTALLMENTS as usize {
                    return Err(ValidationError::TooManyInstallments {
                        requested: months_spanned(start, end),
                        max: MAX_INSTALLMENTS,
                    });
                }
                out.push(NewBill {
                    due_date: clamped_date(cursor.year(), cursor.month(), due_day)?,
                    ..base.clone()
                });
                let (year, month) = shift_month(cursor.year(), cursor.month(), 1)?;
                cursor = NaiveDate::from_ymd_opt(year, month, 1)
                    .ok_or(ValidationError::DateOutOfRange)?;
            }
            out
        }
    };

    tracing::debug!(
        description = %description,
        records = bills.len(),
        "expanded bill specification"
    );
    Ok(bills)
}

/// `(year, month)` advanced by `offset` months, rolling the year over.
fn shift_month(year: i32, month: u32, offset: u32) -> Result<(i32, u32), ValidationError> {
    let index = i64::from(month) - 1 + i64::from(offset);
    let year = i64::from(year) + index / 12;
    let month = (index % 12 + 1) as u32;
    let year = i32::try_from(year).map_err(|_| ValidationError::DateOutOfRange)?;
    Ok((year, month))
}

fn months_spanned(start: NaiveDate, end: NaiveDate) -> u32 {
    let months = (i64::from(end.year()) - i64::from(start.year())) * 12
        + i64::from(end.month())
        - i64::from(start.month())
        + 1;
    u32::try_from(months).unwrap_or(u32::MAX)
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, ValidationError> {
    date.with_day(1).ok_or(ValidationError::DateOutOfRange)
}

/// Last calendar day of `(year, month)`.
///
/// Day 28 exists in every month; four days later is always in the next
/// month, and stepping back by that date's day lands on the last day of
/// the original month.
pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate, ValidationError> {
    let probe = NaiveDate::from_ymd_opt(year, month, 28)
        .and_then(|date| date.checked_add_days(Days::new(4)))
        .ok_or(ValidationError::DateOutOfRange)?;
    probe
        .checked_sub_days(Days::new(u64::from(probe.day())))
        .ok_or(ValidationError::DateOutOfRange)
}

/// `(year, month, day)`, or the month's last day when `day` overflows it.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, ValidationError> {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Ok(date),
        None => last_day_of_month(year, month),
    }
}

/// Earliest date on or after `today` that falls on `due_day`, clamped to
/// the month's length.
pub fn resolve_anchor(due_day: u32, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let this_month = clamped_date(today.year(), today.month(), due_day)?;
    if this_month >= today {
        return Ok(this_month);
    }
    let (year, month) = shift_month(today.year(), today.month(), 1)?;
    clamped_date(year, month, due_day)
}
