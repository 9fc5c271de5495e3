//! # KBO Server
//!
//! Thin HTTP surface over the query crate's search coordinator. Routing and
//! request/response mapping only -- all predicate, cache, and hydration
//! logic lives in `kbo-query`.
//!
//! ## Routes
//!
//! - `GET /health` -- pings Postgres and the cache, 200 if both respond.
//! - `GET /companies/nace/:code`
//! - `GET /companies/denomination/:query`
//! - `GET /companies/zipcode/:zip`
//! - `GET /companies/intersection?nace=...&zipcode=...&denomination=...`
//! - `GET /search/:table/:column?q=...`
//! - `GET /search/:table/:column/count?q=...`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use kbo_core::config::KboConfig;
use kbo_core::error::KboError;
use kbo_query::cache::CompressingCache;
use kbo_query::column_search::ColumnSearchCoordinator;
use kbo_query::search::{Criterion, SearchCoordinator};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct AppState {
    pg_pool: deadpool_postgres::Pool,
    cache: CompressingCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = KboConfig::from_env()?;

    let mut pg_config = deadpool_postgres::Config::new();
    pg_config.host = Some(config.db_host.clone());
    pg_config.port = Some(config.db_port);
    pg_config.user = Some(config.postgres_user.clone());
    pg_config.password = Some(config.postgres_password.clone());
    pg_config.dbname = Some(config.postgres_db.clone());
    pg_config.manager = Some(deadpool_postgres::ManagerConfig {
        recycling_method: deadpool_postgres::RecyclingMethod::Fast,
    });
    let pg_pool =
        pg_config.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)?;

    let cache = CompressingCache::connect(&config.redis_url).await?;

    let state = Arc::new(AppState { pg_pool, cache });

    let app = Router::new()
        .route("/health", get(health))
        .route("/companies/nace/:code", get(by_nace))
        .route("/companies/denomination/:query", get(by_denomination))
        .route("/companies/zipcode/:zip", get(by_zipcode))
        .route("/companies/intersection", get(by_intersection))
        .route("/search/:table/:column", get(search_in_column))
        .route("/search/:table/:column/count", get(count_matches))
        .with_state(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    tracing::info!(%addr, "kbo-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let db_ok = match state.pg_pool.get().await {
        Ok(client) => client.query_one("SELECT 1", &[]).await.is_ok(),
        Err(_) => false,
    };
    let cache_ok = state.cache.ping().await.is_ok();

    if db_ok && cache_ok {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "degraded", "db": db_ok, "cache": cache_ok })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

async fn by_nace(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Response {
    let client = match state.pg_pool.get().await {
        Ok(c) => c,
        Err(e) => return error_response(&KboError::BackendUnavailable(e.to_string())),
    };
    let coordinator = SearchCoordinator::new(&state.cache, &client);
    match coordinator.by_nace(&code, q.limit).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn by_denomination(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Response {
    let client = match state.pg_pool.get().await {
        Ok(c) => c,
        Err(e) => return error_response(&KboError::BackendUnavailable(e.to_string())),
    };
    let coordinator = SearchCoordinator::new(&state.cache, &client);
    match coordinator.by_denomination(&query, q.limit).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn by_zipcode(
    State(state): State<Arc<AppState>>,
    Path(zip): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Response {
    let client = match state.pg_pool.get().await {
        Ok(c) => c,
        Err(e) => return error_response(&KboError::BackendUnavailable(e.to_string())),
    };
    let coordinator = SearchCoordinator::new(&state.cache, &client);
    match coordinator.by_zipcode(&zip, q.limit).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct IntersectionQuery {
    nace: Option<String>,
    denomination: Option<String>,
    zipcode: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

async fn by_intersection(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IntersectionQuery>,
) -> Response {
    let mut criteria = Vec::new();
    if let Some(v) = q.nace {
        criteria.push(Criterion::Nace(v));
    }
    if let Some(v) = q.denomination {
        criteria.push(Criterion::Denomination(v));
    }
    if let Some(v) = q.zipcode {
        criteria.push(Criterion::Zipcode(v));
    }

    let client = match state.pg_pool.get().await {
        Ok(c) => c,
        Err(e) => return error_response(&KboError::BackendUnavailable(e.to_string())),
    };
    let coordinator = SearchCoordinator::new(&state.cache, &client);
    match coordinator.by_intersection(criteria, q.limit).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct ColumnQuery {
    q: String,
    #[serde(default = "default_column_search_limit")]
    limit: i64,
}

fn default_column_search_limit() -> i64 {
    100
}

async fn search_in_column(
    State(state): State<Arc<AppState>>,
    Path((table, column)): Path<(String, String)>,
    Query(q): Query<ColumnQuery>,
) -> Response {
    let client = match state.pg_pool.get().await {
        Ok(c) => c,
        Err(e) => return error_response(&KboError::BackendUnavailable(e.to_string())),
    };
    let coordinator = ColumnSearchCoordinator::new(&client);
    match coordinator
        .search_in_column(&table, &column, &q.q, q.limit)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn count_matches(
    State(state): State<Arc<AppState>>,
    Path((table, column)): Path<(String, String)>,
    Query(q): Query<ColumnQuery>,
) -> Response {
    let client = match state.pg_pool.get().await {
        Ok(c) => c,
        Err(e) => return error_response(&KboError::BackendUnavailable(e.to_string())),
    };
    let coordinator = ColumnSearchCoordinator::new(&client);
    match coordinator.count_matches(&table, &column, &q.q).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &KboError) -> Response {
    let status = match err {
        KboError::InvalidIdentifier(_) | KboError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        KboError::NotFound | KboError::CacheMiss(_) => StatusCode::NOT_FOUND,
        KboError::DatasetTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        KboError::BackendUnavailable(_) | KboError::TransientQuery(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        KboError::CopyCountMismatch { .. } | KboError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    tracing::warn!(error = %err, status = %status, "request failed");
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}
