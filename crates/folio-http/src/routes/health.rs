//! Health, monitoring and connectivity endpoints

use crate::error::{HttpError, HttpResult};
use crate::extract::JsonBody;
use crate::monitor::StressTestReport;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use folio_orm::PoolStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

const RECENT_ALERTS: usize = 5;
const MAX_STRESS_REQUESTS: u32 = 1000;
const MAX_STRESS_CONCURRENCY: u32 = 50;

/// `/health` routes, mounted at the root
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/database", get(database_health))
        .route("/health/monitoring", get(monitoring))
        .route("/health/stress-test", get(stress_test_get).post(stress_test_post))
}

/// Connectivity probes, mounted under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/test-connectivity", get(test_connectivity))
        .route("/test-post", post(test_post))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.pool_monitor {
        Some(monitor) => {
            let health = monitor.health_status();
            json!({
                "backend": state.db.backend_name(),
                "healthy": health.healthy,
                "lastCheck": health.last_check,
                "pool": monitor.stats(),
            })
        }
        None => {
            let ping = state.db.ping().await;
            json!({
                "backend": state.db.backend_name(),
                "healthy": ping.is_ok(),
                "responseTimeMs": ping.ok().map(|elapsed| elapsed.as_millis() as u64),
            })
        }
    };

    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "environment": state.app.environment.as_str(),
        "database": database,
    }))
}

async fn database_health(State(state): State<AppState>) -> HttpResult<ApiResponse<PoolStatus>> {
    let monitor = state
        .pool_monitor
        .as_ref()
        .ok_or_else(|| HttpError::unavailable("Database pool monitoring is not running"))?;

    monitor.check_health().await;
    Ok(ApiResponse::ok(monitor.status()))
}

async fn monitoring(State(state): State<AppState>) -> ApiResponse<Value> {
    let database = state
        .pool_monitor
        .as_ref()
        .map(|monitor| json!(monitor.status()));

    ApiResponse::ok(json!({
        "timestamp": Utc::now(),
        "database": database,
        "service": state.service_monitor.status(),
        "uploads": state.gate.stats(),
        "recentAlerts": state.alerts.recent(RECENT_ALERTS),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StressTestParams {
    pub requests: Option<u32>,
    pub concurrency: Option<u32>,
    pub endpoint: Option<String>,
}

/// Defaults applied per HTTP method
#[derive(Debug, Clone, Copy)]
struct StressDefaults {
    requests: u32,
    concurrency: u32,
    endpoint: &'static str,
}

const GET_DEFAULTS: StressDefaults = StressDefaults {
    requests: 50,
    concurrency: 5,
    endpoint: "/api/test-connectivity",
};

const POST_DEFAULTS: StressDefaults = StressDefaults {
    requests: 10,
    concurrency: 2,
    endpoint: "/health",
};

async fn stress_test_get(
    State(state): State<AppState>,
    Query(params): Query<StressTestParams>,
) -> HttpResult<ApiResponse<StressTestReport>> {
    run_stress_test(&state, params, GET_DEFAULTS).await
}

async fn stress_test_post(
    State(state): State<AppState>,
    body: Option<JsonBody<StressTestParams>>,
) -> HttpResult<ApiResponse<StressTestReport>> {
    let params = body.map(|JsonBody(params)| params).unwrap_or_default();
    run_stress_test(&state, params, POST_DEFAULTS).await
}

async fn run_stress_test(
    state: &AppState,
    params: StressTestParams,
    defaults: StressDefaults,
) -> HttpResult<ApiResponse<StressTestReport>> {
    if state.app.is_production() {
        return Err(HttpError::not_found("The requested resource does not exist"));
    }

    let requests = params.requests.unwrap_or(defaults.requests);
    let concurrency = params.concurrency.unwrap_or(defaults.concurrency);
    let endpoint = params.endpoint.unwrap_or_else(|| defaults.endpoint.to_string());
    validate_stress_params(requests, concurrency, &endpoint)?;

    let report = state.service_monitor.stress_test(&endpoint, requests, concurrency).await;
    info!(
        endpoint = %report.endpoint,
        success_rate = report.success_rate,
        total_time_ms = report.total_time_ms,
        "Stress test finished"
    );
    Ok(ApiResponse::with_message("Stress test completed", report))
}

fn validate_stress_params(requests: u32, concurrency: u32, endpoint: &str) -> HttpResult<()> {
    if !(1..=MAX_STRESS_REQUESTS).contains(&requests) {
        return Err(HttpError::bad_request(format!(
            "requests must be between 1 and {}",
            MAX_STRESS_REQUESTS
        )));
    }
    if !(1..=MAX_STRESS_CONCURRENCY).contains(&concurrency) {
        return Err(HttpError::bad_request(format!(
            "concurrency must be between 1 and {}",
            MAX_STRESS_CONCURRENCY
        )));
    }
    if !endpoint.starts_with('/') {
        return Err(HttpError::bad_request("endpoint must be a path starting with '/'"));
    }
    Ok(())
}

async fn test_connectivity(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::with_message(
        "API connectivity OK",
        json!({
            "timestamp": Utc::now(),
            "environment": state.app.environment.as_str(),
        }),
    )
}

async fn test_post(body: Option<JsonBody<Value>>) -> ApiResponse<Value> {
    let received = body.map(|JsonBody(value)| value).unwrap_or(Value::Null);
    ApiResponse::with_message(
        "POST request received",
        json!({
            "timestamp": Utc::now(),
            "received": received,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stress_params_bounds() {
        assert!(validate_stress_params(50, 5, "/health").is_ok());
        assert!(validate_stress_params(0, 5, "/health").is_err());
        assert!(validate_stress_params(1001, 5, "/health").is_err());
        assert!(validate_stress_params(10, 51, "/health").is_err());
        assert!(validate_stress_params(10, 2, "health").is_err());
    }
}
