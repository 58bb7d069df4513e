//! Request-scoped middleware: the `X-Auth-Token` bearer check and a
//! per-request tracing span mirroring the original Echo logger's
//! parameter dump.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

use crate::auth;
use crate::error::Result;
use crate::web::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let token = request
        .headers()
        .get("x-auth-token")
        .or_else(|| request.headers().get(AUTHORIZATION))
        .and_then(|value| value.to_str().ok());

    auth::check_bearer(&state.config, token)?;
    Ok(next.run(request).await)
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let span = tracing::info_span!("request", %method, %path);
    let _guard = span.enter();
    tracing::debug!("handling request");
    drop(_guard);

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}
