use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::BillRecord;

/// Aggregated totals over a set of bill records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillSummary {
    pub count: usize,
    pub total: Decimal,
    pub by_status: BTreeMap<String, Decimal>,
    pub by_description: BTreeMap<String, Decimal>,
    /// Keyed by the due date's `YYYY-MM`.
    pub by_month: BTreeMap<String, Decimal>,
}

pub fn summarize(records: &[BillRecord]) -> BillSummary {
    let mut summary = BillSummary::default();
    for record in records {
        summary.count += 1;
        summary.total += record.amount;
        *summary
            .by_status
            .entry(record.status.as_str().to_string())
            .or_insert(Decimal::ZERO) += record.amount;
        *summary
            .by_description
            .entry(record.description.clone())
            .or_insert(Decimal::ZERO) += record.amount;
        *summary
            .by_month
            .entry(record.due_date.format("%Y-%m").to_string())
            .or_insert(Decimal::ZERO) += record.amount;
    }
    summary
}
