// REST API with Axum - JSON transport over RevenueEngine
//
// Engine calls are blocking (SQLite), so each request runs on tokio's blocking
// pool under a deadline derived from the configured query timeout.

use crate::aggregation::AggregateStat;
use crate::deadline::Deadline;
use crate::engine::RevenueEngine;
use crate::error::{QueryError, QueryResult};
use crate::filter::QueryFilter;
use crate::health::{HealthReport, DATABASE_ERROR, STATUS_DEGRADED};
use crate::pagination::{parse_limit, Page};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    engine: RevenueEngine,
    query_timeout: Duration,
}

impl AppState {
    pub fn new(engine: RevenueEngine, query_timeout: Duration) -> Self {
        AppState {
            engine,
            query_timeout,
        }
    }
}

// ============================================================================
// Request / Response types
// ============================================================================

/// Raw query-string parameters. Everything is text so a malformed value
/// becomes a `success:false` body instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    region: Option<String>,
    category: Option<String>,
    year_month: Option<String>,
    hospital_name: Option<String>,
    code: Option<String>,
    limit: Option<String>,
}

/// Blank values count as absent
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FilterParams {
    fn filter(&self) -> QueryFilter {
        QueryFilter {
            region: present(&self.region),
            category: present(&self.category),
            year_month: present(&self.year_month),
            hospital_name: present(&self.hospital_name),
            hospital_code: None,
            limit: None,
        }
    }
}

/// List response wrapper. `count` always equals `data.len()`.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    success: bool,
    count: usize,
    data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ListResponse<T> {
    fn ok(page: Page<T>) -> Self {
        Self {
            success: true,
            count: page.count(),
            data: page.into_data(),
            error: None,
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            success: false,
            count: 0,
            data: Vec::new(),
            error: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    success: bool,
    stats: AggregateStat,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// Store-level failures become non-2xx responses with an error body.
pub struct ApiError(QueryError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            QueryError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            QueryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self.0, status = status.as_u16(), "query failed");

        let body = ErrorBody {
            success: false,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn list_response<T: Serialize>(result: QueryResult<Page<T>>) -> Response {
    match result {
        Ok(page) => Json(ListResponse::ok(page)).into_response(),
        Err(QueryError::InvalidFilter(message)) => {
            tracing::debug!(%message, "rejected filter");
            Json(ListResponse::<T>::rejected(message)).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

fn stats_response(result: QueryResult<AggregateStat>) -> Response {
    match result {
        Ok(stats) => Json(StatsResponse {
            success: true,
            stats,
            error: None,
        })
        .into_response(),
        Err(QueryError::InvalidFilter(message)) => {
            tracing::debug!(%message, "rejected filter");
            Json(StatsResponse {
                success: false,
                stats: crate::aggregation::aggregate(std::iter::empty()),
                error: Some(message),
            })
            .into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// An undecodable query string (duplicate keys, bad escapes) is an invalid filter.
fn filter_params(params: Result<Query<FilterParams>, QueryRejection>) -> QueryResult<FilterParams> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| QueryError::invalid(rejection.body_text()))
}

/// Run a blocking engine call with the request deadline.
async fn run_query<T, F>(state: &AppState, query: F) -> QueryResult<T>
where
    T: Send + 'static,
    F: FnOnce(&RevenueEngine, &Deadline) -> QueryResult<T> + Send + 'static,
{
    let engine = state.engine.clone();
    let deadline = Deadline::after(state.query_timeout);

    let task = tokio::task::spawn_blocking(move || query(&engine, &deadline));
    match tokio::time::timeout(state.query_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(QueryError::Internal(format!("query task failed: {}", join_error))),
        Err(_) => Err(QueryError::Timeout),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/hospitals/revenue - Filtered records, newest first
async fn get_revenue(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Response {
    let params = match filter_params(params) {
        Ok(params) => params,
        Err(e) => return list_response::<crate::record::RevenueRecord>(Err(e)),
    };
    let limit = match parse_limit(params.limit.as_deref()) {
        Ok(limit) => limit,
        Err(e) => return list_response::<crate::record::RevenueRecord>(Err(e)),
    };

    let mut filter = params.filter();
    filter.limit = limit;

    list_response(run_query(&state, move |engine, deadline| engine.records(&filter, deadline)).await)
}

/// GET /api/hospitals/stats - Aggregated statistics
async fn get_stats(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Response {
    let params = match filter_params(params) {
        Ok(params) => params,
        Err(e) => return stats_response(Err(e)),
    };
    let mut filter = params.filter();
    filter.hospital_name = None;

    stats_response(run_query(&state, move |engine, deadline| engine.stats(&filter, deadline)).await)
}

/// GET /api/hospitals/stats/monthly - Per-month statistics, ascending
async fn get_monthly_stats(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Response {
    let params = match filter_params(params) {
        Ok(params) => params,
        Err(e) => return list_response::<crate::trend::TrendPoint>(Err(e)),
    };
    let mut filter = params.filter();
    filter.year_month = None;
    filter.hospital_name = None;

    list_response(run_query(&state, move |engine, deadline| engine.monthly_stats(&filter, deadline)).await)
}

/// GET /api/hospitals/trend - Monthly trend for one hospital
async fn get_trend(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Response {
    let params = match filter_params(params) {
        Ok(params) => params,
        Err(e) => return list_response::<crate::trend::TrendPoint>(Err(e)),
    };
    let limit = match parse_limit(params.limit.as_deref()) {
        Ok(limit) => limit,
        Err(e) => return list_response::<crate::trend::TrendPoint>(Err(e)),
    };
    let code = present(&params.code).unwrap_or_default();

    list_response(
        run_query(&state, move |engine, deadline| engine.hospital_trend(&code, limit, deadline)).await,
    )
}

/// GET /health - Database connectivity and record count
async fn health_check(State(state): State<AppState>) -> Response {
    let report = match run_query(&state, |engine, deadline| Ok(engine.health(deadline))).await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "health probe did not complete");
            HealthReport {
                status: STATUS_DEGRADED.to_string(),
                database: DATABASE_ERROR.to_string(),
                total_records: 0,
            }
        }
    };

    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/hospitals/revenue", get(get_revenue))
        .route("/api/hospitals/stats", get(get_stats))
        .route("/api/hospitals/stats/monthly", get(get_monthly_stats))
        .route("/api/hospitals/trend", get(get_trend))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
