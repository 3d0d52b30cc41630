//! Request and response DTOs for the bills API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bills::{
    BillSpecification, BillStatus, non_blank, parse_date_field, parse_period_field,
};
use crate::db::{BillFilter, BillRecord, DEFAULT_LIST_LIMIT, UpdateBillParams};
use crate::error::ValidationError;

// --- Bills ---

/// Request body for `POST /api/v1/contas`.
///
/// Field names also accept the Portuguese labels older clients send.
#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    #[serde(alias = "descricao")]
    pub description: String,
    #[serde(alias = "valor")]
    pub amount: Decimal,
    #[serde(default, alias = "vencimento")]
    pub due_date: Option<String>,
    #[serde(default, alias = "dia_vencimento")]
    pub due_day: Option<i32>,
    #[serde(default, alias = "recorrente")]
    pub is_recurring: bool,
    #[serde(default, alias = "quantidade_parcelas")]
    pub installment_count: Option<i32>,
    #[serde(default, alias = "inicio_periodo")]
    pub period_start: Option<String>,
    #[serde(default, alias = "fim_periodo")]
    pub period_end: Option<String>,
    #[serde(default)]
    pub status: BillStatus,
}

impl CreateBillRequest {
    pub fn into_specification(self) -> Result<BillSpecification, ValidationError> {
        let due_date = non_blank(self.due_date.as_deref())
            .map(|raw| parse_date_field("due_date", raw))
            .transpose()?;
        let period_start = non_blank(self.period_start.as_deref())
            .map(|raw| parse_period_field("period_start", raw))
            .transpose()?;
        let period_end = non_blank(self.period_end.as_deref())
            .map(|raw| parse_period_field("period_end", raw))
            .transpose()?;

        Ok(BillSpecification {
            description: self.description,
            amount: self.amount,
            due_date,
            due_day: self.due_day,
            is_recurring: self.is_recurring,
            installment_count: self.installment_count,
            period_start,
            period_end,
            status: self.status,
        })
    }
}

/// Request body for `PUT /api/v1/contas/{id}`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBillRequest {
    #[serde(default, alias = "descricao")]
    pub description: Option<String>,
    #[serde(default, alias = "valor")]
    pub amount: Option<Decimal>,
    #[serde(default, alias = "vencimento")]
    pub due_date: Option<String>,
    #[serde(default, alias = "dia_vencimento")]
    pub due_day: Option<i32>,
    #[serde(default)]
    pub status: Option<BillStatus>,
}

impl UpdateBillRequest {
    pub fn into_params(self) -> Result<UpdateBillParams, ValidationError> {
        let due_date = non_blank(self.due_date.as_deref())
            .map(|raw| parse_date_field("due_date", raw))
            .transpose()?;
        Ok(UpdateBillParams {
            description: self.description,
            amount: self.amount,
            due_date,
            due_day: self.due_day,
            status: self.status,
        })
    }
}

/// Query string for the list and summary endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListBillsQuery {
    pub status: Option<BillStatus>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
}

impl ListBillsQuery {
    pub fn into_filter(self) -> Result<BillFilter, ValidationError> {
        let due_from = non_blank(self.from.as_deref())
            .map(|raw| parse_date_field("from", raw))
            .transpose()?;
        let due_to = non_blank(self.to.as_deref())
            .map(|raw| parse_date_field("to", raw))
            .transpose()?;
        Ok(BillFilter {
            status: self.status,
            due_from,
            due_to,
            limit: self.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        })
    }
}

/// Response body for `POST /api/v1/contas`: one record for a plain bill,
/// every installment for a recurring one.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreateBillResponse {
    Single(BillRecord),
    Many(Vec<BillRecord>),
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::{CreateBillRequest, ListBillsQuery, UpdateBillRequest};
    use crate::bills::BillStatus;
    use crate::error::ValidationError;

    #[test]
    fn create_request_accepts_portuguese_fields() {
        let req: CreateBillRequest = serde_json::from_str(
            r#"{
                "descricao": "Aluguel",
                "valor": "1200.50",
                "recorrente": true,
                "dia_vencimento": 5,
                "inicio_periodo": "2025-01",
                "fim_periodo": "2025-06",
                "status": "pendente"
            }"#,
        )
        .expect("legacy payload should parse");
        let spec = req.into_specification().expect("valid spec");
        assert_eq!(spec.description, "Aluguel");
        assert_eq!(spec.amount, dec!(1200.50));
        assert!(spec.is_recurring);
        assert_eq!(spec.due_day, Some(5));
        assert_eq!(spec.period_start, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(spec.period_end, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(spec.status, BillStatus::Pending);
    }

    #[test]
    fn create_request_takes_numeric_amounts_and_blank_dates() {
        let req: CreateBillRequest = serde_json::from_str(
            r#"{"description": "Power", "amount": 89.9,
                "due_date": "2025-02-10", "period_start": ""}"#,
        )
        .unwrap();
        let spec = req.into_specification().unwrap();
        assert_eq!(spec.amount, dec!(89.9));
        assert_eq!(spec.due_date, NaiveDate::from_ymd_opt(2025, 2, 10));
        assert_eq!(spec.period_start, None);
        assert!(!spec.is_recurring);
    }

    #[test]
    fn bad_dates_name_the_field() {
        let req: CreateBillRequest =
            serde_json::from_str(r#"{"description": "x", "amount": 1, "due_date": "10/02/2025"}"#)
                .unwrap();
        assert_eq!(
            req.into_specification().unwrap_err(),
            ValidationError::InvalidDate {
                field: "due_date",
                value: "10/02/2025".to_string(),
            }
        );
    }

    #[test]
    fn update_request_only_carries_given_fields() {
        let req: UpdateBillRequest =
            serde_json::from_str(r#"{"status": "paga", "vencimento": "2025-04-01"}"#).unwrap();
        let params = req.into_params().unwrap();
        assert_eq!(params.status, Some(BillStatus::Paid));
        assert_eq!(params.due_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert!(params.description.is_none());
        assert!(params.amount.is_none());
    }

    #[test]
    fn list_query_defaults_limit() {
        let filter = ListBillsQuery {
            from: Some("2025-01-01".to_string()),
            ..ListBillsQuery::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.due_from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(filter.due_to.is_none());
    }
}
