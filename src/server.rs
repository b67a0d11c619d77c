//! HTTP server with the redirect middleware.
//!
//! [`redirect_middleware`] resolves every request against the redirect
//! table before the wrapped router sees it. [`with_redirects`] installs it
//! on any axum [`Router`], so applications can put their own routes behind
//! it; [`run_server`] serves a minimal router of its own.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | any    | anything else | `404` JSON error unless a redirect matches |
//!
//! # Responses
//!
//! | Outcome | Response |
//! |---------|----------|
//! | redirect, 3xx | stored status, `Location`, no-cache headers |
//! | redirect, other status | stored status, `Location` |
//! | terminal (400–599) | stored status, JSON error body |
//! | no match, storage error | passed to the wrapped router |
//!
//! Error bodies use the schema
//!
//! ```json
//! { "error": { "code": "gone", "message": "410 Gone" } }
//! ```

use axum::{
    extract::{Request, State},
    http::{
        header::{CACHE_CONTROL, EXPIRES, HOST, LOCATION},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use url::Url;

use redirect_handler_core::{Outcome, ResolutionService};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

const NO_CACHE: &str = "no-store, no-cache, must-revalidate";
const EXPIRED: &str = "Sat, 26 Jul 1997 05:00:00 GMT";

/// State of [`redirect_middleware`].
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<ResolutionService>,
    /// Scheme used when the request carries no `X-Forwarded-Proto`.
    default_scheme: Arc<str>,
}

impl AppState {
    pub fn new(resolver: Arc<ResolutionService>, default_scheme: &str) -> Self {
        Self {
            resolver,
            default_scheme: Arc::from(default_scheme),
        }
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::connect(config).await?);
    let resolver = Arc::new(ResolutionService::new(store, config.resolve_options()));
    let state = AppState::new(resolver, &config.server.scheme);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = with_redirects(base_router(), state).layer(cors);

    let bind_addr = config.server.bind.clone();
    info!("redirect server listening on http://{}", bind_addr);
    println!("Redirect server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The router served by [`run_server`]: `/health` and a JSON 404 fallback.
pub fn base_router() -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
}

/// Puts [`redirect_middleware`] in front of every route of `router`,
/// including its fallback.
pub fn with_redirects(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, redirect_middleware))
}

/// Answers matching requests with a redirect or an error; passes all
/// others on unchanged.
pub async fn redirect_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(url) = request_url(&request, &state.default_scheme) else {
        return next.run(request).await;
    };

    match state.resolver.resolve(&url, Utc::now()).await {
        Outcome::RedirectTo { location, status } => match StatusCode::from_u16(status) {
            Ok(status) => {
                debug!("{} -> {} ({})", url, location, status.as_u16());
                redirect_response(status, &location)
            }
            Err(_) => next.run(request).await,
        },
        Outcome::Terminal { status } => match StatusCode::from_u16(status) {
            Ok(status) => terminal_response(status),
            Err(_) => next.run(request).await,
        },
        Outcome::NoMatch | Outcome::StorageError(_) => next.run(request).await,
    }
}

/// Rebuilds the absolute request URL from the scheme, `Host` header and
/// request target.
fn request_url(request: &Request, default_scheme: &str) -> Option<Url> {
    let headers = request.headers();
    let host = header_str(headers, HOST.as_str())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))?;
    let scheme = header_str(headers, "x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| *s == "http" || *s == "https")
        .unwrap_or(default_scheme);
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Url::parse(&format!("{}://{}{}", scheme, host, path_and_query)).ok()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn redirect_response(status: StatusCode, location: &Url) -> Response {
    let mut response = status.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(location.as_str()) {
        headers.insert(LOCATION, value);
    }
    if status.is_redirection() {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        headers.insert(EXPIRES, HeaderValue::from_static(EXPIRED));
    }
    response
}

fn terminal_response(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    AppError {
        status,
        code: reason.to_lowercase().replace(' ', "_"),
        message: format!("{} {}", status.as_u16(), reason),
    }
    .into_response()
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g. `"not_found"`, `"gone"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: "no route or redirect matches this request".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
