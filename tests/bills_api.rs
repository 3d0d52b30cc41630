//! End-to-end tests for the bills HTTP API.
//!
//! Each test starts the real Axum server on a random port against a fresh
//! libSQL file and drives it over HTTP with reqwest.
#![cfg(feature = "libsql")]

use std::net::SocketAddr;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

use contas::config::{CorsOrigins, DatabaseConfig};
use contas::db::connect_from_config;
use contas::web::{AppState, start_server};

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn start_test_server() -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = connect_from_config(&DatabaseConfig::libsql(dir.path().join("api.db")))
        .await
        .expect("open database");
    let state = AppState::new(db, CorsOrigins::Any);
    let addr = start_server("127.0.0.1:0".parse().unwrap(), Arc::clone(&state))
        .await
        .expect("start server");
    TestServer {
        addr,
        state,
        _dir: dir,
    }
}

fn due_dates(records: &Value) -> Vec<String> {
    records
        .as_array()
        .expect("array of bills")
        .iter()
        .map(|r| r["due_date"].as_str().expect("due_date").to_string())
        .collect()
}

#[tokio::test]
async fn health_reports_uptime() {
    let server = start_test_server().await;
    let resp = reqwest::get(server.url("/api/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn recurring_bill_lifecycle() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/api/v1/contas"))
        .json(&json!({
            "descricao": "Seguro",
            "valor": "120.00",
            "recorrente": true,
            "vencimento": "2024-01-31",
            "quantidade_parcelas": 3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(
        due_dates(&created),
        vec!["2024-01-31", "2024-02-29", "2024-03-31"]
    );
    assert_eq!(created[1]["installment_number"], 2);
    assert_eq!(created[1]["installment_total"], 3);
    assert_eq!(created[1]["amount"], "120.00");

    let listed: Value = client
        .get(server.url("/api/v1/contas?from=2024-02-01"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(due_dates(&listed), vec!["2024-02-29", "2024-03-31"]);

    let second = created[1]["id"].as_str().unwrap().to_string();
    let paid: Value = client
        .post(server.url(&format!("/api/v1/contas/{second}/pay")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(paid["status"], "paid");

    let summary: Value = client
        .get(server.url("/api/v1/contas/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["count"], 3);
    assert_eq!(summary["total"], "360.00");
    assert_eq!(summary["by_status"]["paid"], "120.00");
    assert_eq!(summary["by_status"]["pending"], "240.00");
    assert_eq!(summary["by_month"]["2024-02"], "120.00");

    let resp = client
        .delete(server.url(&format!("/api/v1/contas/{second}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("deleted"));

    let resp = client
        .get(server.url(&format!("/api/v1/contas/{second}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    server.state.shutdown().await;
}

#[tokio::test]
async fn single_bill_update_round_trip() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(server.url("/api/v1/contas"))
        .json(&json!({
            "description": "Dentist",
            "amount": 250,
            "due_date": "2025-06-05"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(created.is_object(), "single bill comes back as one object");
    assert_eq!(created["is_recurring"], false);
    let id = created["id"].as_str().unwrap().to_string();

    let resp = client
        .put(server.url(&format!("/api/v1/contas/{id}")))
        .json(&json!({ "amount": "275.50", "due_date": "2025-06-12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["amount"], "275.50");
    assert_eq!(updated["due_date"], "2025-06-12");
    assert_eq!(updated["description"], "Dentist");

    let resp = client
        .put(server.url(&format!("/api/v1/contas/{id}")))
        .json(&json!({ "description": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/api/v1/contas"))
        .json(&json!({
            "description": "Gym",
            "amount": 80,
            "is_recurring": true,
            "due_day": 40,
            "installment_count": 2
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = client
        .post(server.url("/api/v1/contas"))
        .json(&json!({ "description": "No date", "amount": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    for amount in ["0.001", "99.999", "1000000000000.00"] {
        let resp = client
            .post(server.url("/api/v1/contas"))
            .json(&json!({
                "description": "Fine print",
                "amount": amount,
                "due_date": "2025-03-10"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{amount}");
    }

    let resp = client
        .get(server.url("/api/v1/contas/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(server.url("/api/v1/contas?to=31-12-2025"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let listed: Value = client
        .get(server.url("/api/v1/contas"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, json!([]));
}
