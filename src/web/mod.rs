//! The HTTP adaptor: translates Swift v1 verbs/paths/headers into service
//! calls and shapes Swift-compatible responses.

mod container;
mod middleware;
mod object;
mod serializer;

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post, MethodFilter, MethodRouter};
use axum::{Json, Router};
use http::Method;

use crate::auth::{self, TokenRequest, VersionBody};
use crate::blob::Blob;
use crate::config::Config;
use crate::error::Result;
use crate::metadata::Store;

/// Shared handles every handler needs: the metadata store, the blob
/// backend, and the configuration used to validate auth requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub blob: Blob,
    pub config: Arc<Config>,
}

/// Assembles the full router: the unauthenticated auth/version routes plus
/// the `X-Auth-Token`-guarded `/v1/AUTH_<username>` surface.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/AUTH_:username", get(container::list_containers))
        .route("/v1/AUTH_:username/:container", container_routes())
        .route("/v1/AUTH_:username/:container/*object", object_routes())
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/v3/auth/tokens", post(issue_token))
        .route("/version", get(version))
        .merge(protected)
        .layer(axum::middleware::from_fn(middleware::log_request))
        .with_state(state)
}

fn container_routes() -> MethodRouter<AppState> {
    get(container::show_or_list)
        .head(container::show_or_list)
        .put(container::create)
        .post(container::update_meta)
        .delete(container::destroy)
}

fn object_routes() -> MethodRouter<AppState> {
    get(object::download)
        .head(object::show)
        .put(object::upload)
        .post(object::update_meta)
        .delete(object::destroy)
        .on(MethodFilter::try_from(Method::from_bytes(b"COPY").expect("COPY is a valid method")).expect("COPY maps to a MethodFilter"), object::copy)
}

async fn version() -> impl IntoResponse {
    Json(VersionBody { version: env!("CARGO_PKG_VERSION") })
}

async fn issue_token(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<TokenRequest>,
) -> Result<impl IntoResponse> {
    let host = headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok()).unwrap_or("localhost:5000");
    let base_url = format!("http://{host}");
    let (token, catalog) = auth::issue(&state.config, &body, &base_url)?;

    let mut response = Json(catalog).into_response();
    response.headers_mut().insert(
        "x-subject-token",
        token.parse().expect("token is always a valid header value"),
    );
    Ok(response)
}

/// Logs the assembled router's method/path pairs, mirroring the original
/// implementation's startup route-table dump.
pub fn print_routes() {
    for (method, path) in [
        ("POST", "/v3/auth/tokens"),
        ("GET", "/version"),
        ("GET", "/v1/AUTH_{username}"),
        ("GET|HEAD|PUT|POST|DELETE", "/v1/AUTH_{username}/{container}"),
        ("GET|HEAD|PUT|POST|DELETE|COPY", "/v1/AUTH_{username}/{container}/{object...}"),
    ] {
        tracing::info!(method, path, "route");
    }
}
