//! Axum HTTP server for the bills API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    routing::{get, post},
};
use chrono::Utc;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::bills::report::BillSummary;
use crate::bills::service;
use crate::config::CorsOrigins;
use crate::db::{BillRecord, Database};
use crate::error::{BillError, ServerError};
use crate::web::types::*;

/// Shared state for all handlers.
pub struct AppState {
    /// Bill persistence.
    pub store: Arc<dyn Database>,
    /// Allowed cross-origin callers.
    pub cors: CorsOrigins,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
    /// Server startup time for uptime calculation.
    pub startup_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn Database>, cors: CorsOrigins) -> Arc<Self> {
        Arc::new(Self {
            store,
            cors,
            shutdown_tx: tokio::sync::RwLock::new(None),
            startup_time: std::time::Instant::now(),
        })
    }

    /// Ask a running server to stop accepting connections.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsOrigins::List(list) => {
            let allowed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(origin = %origin, "ignoring CORS origin: {}", e);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(AllowHeaders::list([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                ]))
                .allow_credentials(true)
        }
    }
}

/// Build the application router with every route and layer attached.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new().route("/api/health", get(health_handler));

    let bills = Router::new()
        .route(
            "/api/v1/contas",
            get(bills_list_handler).post(bills_create_handler),
        )
        .route("/api/v1/contas/summary", get(bills_summary_handler))
        .route(
            "/api/v1/contas/{id}",
            get(bills_detail_handler)
                .put(bills_update_handler)
                .delete(bills_delete_handler),
        )
        .route("/api/v1/contas/{id}/pay", post(bills_pay_handler));

    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.cors))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(DefaultBodyLimit::max(1024 * 1024)); // 1 MB max request body

    Router::new()
        .merge(public)
        .merge(bills)
        .layer(layers)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<SocketAddr, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ServerError::StartupFailed(format!("Failed to get local addr: {}", e)))?;

    let app = router(Arc::clone(&state));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("HTTP server shutting down");
            })
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "HTTP server listening");
    Ok(bound_addr)
}

// --- Error mapping ---

fn bill_error_response(err: BillError) -> (StatusCode, String) {
    match err {
        BillError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        BillError::NotFound(id) => (StatusCode::NOT_FOUND, format!("Bill {} not found", id)),
        BillError::Database(e) => {
            tracing::error!("bill storage failure: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal database error".to_string(),
            )
        }
    }
}

fn parse_bill_id(raw: &str) -> Result<Uuid, (StatusCode, String)> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid bill ID".to_string()))
}

// --- Health ---

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.startup_time.elapsed().as_secs(),
    })
}

// --- Bills ---

async fn bills_list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBillsQuery>,
) -> Result<Json<Vec<BillRecord>>, (StatusCode, String)> {
    let filter = query
        .into_filter()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let records = service::list_bills(state.store.as_ref(), &filter)
        .await
        .map_err(bill_error_response)?;
    Ok(Json(records))
}

async fn bills_create_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<CreateBillResponse>), (StatusCode, String)> {
    let spec = req
        .into_specification()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let today = Utc::now().date_naive();
    let mut records = service::create_bills(state.store.as_ref(), &spec, today)
        .await
        .map_err(bill_error_response)?;

    let body = if spec.is_recurring {
        CreateBillResponse::Many(records)
    } else {
        match records.pop() {
            Some(record) => CreateBillResponse::Single(record),
            None => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Bill was not created".to_string(),
                ));
            }
        }
    };
    Ok((StatusCode::CREATED, Json(body)))
}

async fn bills_summary_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBillsQuery>,
) -> Result<Json<BillSummary>, (StatusCode, String)> {
    let filter = query
        .into_filter()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let summary = service::summarize_bills(state.store.as_ref(), &filter)
        .await
        .map_err(bill_error_response)?;
    Ok(Json(summary))
}

async fn bills_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BillRecord>, (StatusCode, String)> {
    let id = parse_bill_id(&id)?;
    let record = service::get_bill(state.store.as_ref(), id)
        .await
        .map_err(bill_error_response)?;
    Ok(Json(record))
}

async fn bills_update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateBillRequest>,
) -> Result<Json<BillRecord>, (StatusCode, String)> {
    let id = parse_bill_id(&id)?;
    let params = req
        .into_params()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let record = service::update_bill(state.store.as_ref(), id, params)
        .await
        .map_err(bill_error_response)?;
    Ok(Json(record))
}

async fn bills_pay_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BillRecord>, (StatusCode, String)> {
    let id = parse_bill_id(&id)?;
    let record = service::toggle_paid(state.store.as_ref(), id)
        .await
        .map_err(bill_error_response)?;
    Ok(Json(record))
}

async fn bills_delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let id = parse_bill_id(&id)?;
    service::delete_bill(state.store.as_ref(), id)
        .await
        .map_err(bill_error_response)?;
    Ok(Json(MessageResponse {
        message: format!("Bill {} deleted", id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::Datelike;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    use crate::bills::BillStatus;

    fn create_request(json: &str) -> CreateBillRequest {
        serde_json::from_str(json).expect("request json")
    }

    #[test]
    fn bill_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(
            bill_error_response(BillError::NotFound(id)).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            bill_error_response(BillError::Validation(
                crate::error::ValidationError::EmptyDescription
            ))
            .0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let (status, body) = bill_error_response(BillError::Database(
            crate::error::DatabaseError::Query("connection reset".to_string()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("connection reset"));
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_bill_id("not-a-uuid").expect_err("invalid id");
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn create_single_returns_one_record() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(db, CorsOrigins::Any);

        let (status, Json(body)) = bills_create_handler(
            State(state),
            Json(create_request(
                r#"{"description": " Internet ", "amount": "99.90", "due_date": "2025-05-10"}"#,
            )),
        )
        .await
        .expect("create should succeed");

        assert_eq!(status, StatusCode::CREATED);
        match body {
            CreateBillResponse::Single(record) => {
                assert_eq!(record.description, "Internet");
                assert_eq!(record.amount, dec!(99.90));
                assert_eq!(record.installment_number, None);
                assert_eq!(record.status, BillStatus::Pending);
            }
            CreateBillResponse::Many(_) => panic!("non-recurring bill should return one record"),
        }
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn create_recurring_returns_every_installment() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(db, CorsOrigins::Any);

        let (_, Json(body)) = bills_create_handler(
            State(state),
            Json(create_request(
                r#"{"description": "Rent", "amount": 1000, "is_recurring": true,
                    "due_day": 15, "period_start": "2025-01-01", "period_end": "2025-12-31"}"#,
            )),
        )
        .await
        .expect("create should succeed");

        let CreateBillResponse::Many(records) = body else {
            panic!("recurring bill should return every installment");
        };
        assert_eq!(records.len(), 12);
        assert!(records.iter().all(|r| r.due_date.day() == 15));
        assert!(records.iter().all(|r| r.installment_number.is_none()));
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn create_rejects_invalid_specification() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(Arc::clone(&db), CorsOrigins::Any);

        let err = bills_create_handler(
            State(state),
            Json(create_request(
                r#"{"description": "Rent", "amount": 1000, "is_recurring": true,
                    "due_day": 15, "period_start": "2025-12-01", "period_end": "2025-01-01"}"#,
            )),
        )
        .await
        .expect_err("inverted period should be rejected");
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(
            db.list_bills(&crate::db::BillFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn pay_and_delete_report_missing_bills() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(db, CorsOrigins::Any);
        let missing = Uuid::new_v4().to_string();

        let err = bills_pay_handler(State(Arc::clone(&state)), Path(missing.clone()))
            .await
            .expect_err("missing bill");
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = bills_delete_handler(State(state), Path(missing))
            .await
            .expect_err("missing bill");
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn list_rejects_malformed_dates() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(db, CorsOrigins::Any);

        let err = bills_list_handler(
            State(state),
            Query(ListBillsQuery {
                to: Some("next week".to_string()),
                ..ListBillsQuery::default()
            }),
        )
        .await
        .expect_err("bad date");
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn router_serves_summary_ahead_of_id_route() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(db, CorsOrigins::Any);
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/contas/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS),
            Some(&HeaderValue::from_static("nosniff"))
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary["count"], 0);
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn explicit_origins_get_credentialed_cors() {
        let (db, _tmp) = crate::testing::test_db().await;
        let state = AppState::new(
            db,
            CorsOrigins::List(vec!["http://localhost:5173".to_string()]),
        );

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );
    }
}
