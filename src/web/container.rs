//! Container-level handlers: `/v1/AUTH_<username>` and
//! `/v1/AUTH_<username>/<container>`.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::metadata::{self, Store};
use crate::model::Container;
use crate::web::serializer;
use crate::web::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ListObjectsQuery {
    #[serde(default)]
    prefix: String,
    limit: Option<i64>,
}

#[instrument(skip(state))]
pub async fn list_containers(
    State(state): State<AppState>,
    Path(_username): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let containers = metadata::blocking(move || -> Result<Vec<Container>> { Ok(state.store.list_containers()?) }).await?;
    Ok(render_list(&headers, serializer::containers_json(&containers), serializer::containers_text(&containers)))
}

#[instrument(skip(state))]
pub async fn show_or_list(
    State(state): State<AppState>,
    Path((_username, container_name)): Path<(String, String)>,
    Query(query): Query<ListObjectsQuery>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response> {
    let container = find_by_name(&state.store, &container_name).await?;

    let store = state.store.clone();
    let container_id = container.id.clone();
    let count = metadata::blocking(move || -> Result<usize> { Ok(store.find_objects_by_container(&container_id, 0, "")?.len()) }).await?;

    tracing::debug!(container = %container_name, limit = ?query.limit, prefix = %query.prefix, "container show");

    let mut response_headers = HeaderMap::new();
    response_headers.insert("x-container-object-count", HeaderValue::from_str(&count.to_string()).expect("digits are a valid header value"));
    response_headers.insert("x-container-bytes-used", HeaderValue::from_static("0"));
    append_metas(&state.store, &container.id, "", &mut response_headers).await?;

    if method == Method::HEAD {
        let mut response = StatusCode::OK.into_response();
        for (name, value) in response_headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        return Ok(response);
    }

    let store = state.store.clone();
    let container_id = container.id.clone();
    let limit = query.limit.unwrap_or(0);
    let prefix = query.prefix.clone();
    let objects = metadata::blocking(move || -> Result<Vec<crate::model::Object>> {
        Ok(store.find_objects_by_container(&container_id, limit, &prefix)?)
    })
    .await?;

    let mut response =
        render_list(&headers, serializer::objects_json(&objects), serializer::objects_text(&objects));
    for (name, value) in response_headers.iter() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    Ok(response)
}

#[instrument(skip(state))]
pub async fn create(
    State(state): State<AppState>,
    Path((_username, container_name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let store = state.store.clone();
    let name = container_name.clone();
    let existing = metadata::blocking(move || -> Result<Option<Container>> { Ok(store.find_container_by_name(&name)?) }).await?;

    if existing.is_some() {
        return Ok(StatusCode::ACCEPTED);
    }

    metadata::blocking(move || -> Result<()> {
        let mut container = Container { name: container_name, ..Default::default() };
        state.store.save_container(&mut container)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::CREATED)
}

#[instrument(skip(state, headers))]
pub async fn update_meta(
    State(state): State<AppState>,
    Path((_username, container_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let container = find_by_name(&state.store, &container_name).await?;

    let entries = meta_entries(&headers, "x-container-meta-");
    metadata::blocking(move || -> Result<()> {
        for (key, value) in entries {
            state.store.add_meta(&container.id, "", &key, &value)?;
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    Path((_username, container_name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let container = find_by_name(&state.store, &container_name).await?;

    let store = state.store.clone();
    let container_id = container.id.clone();
    let has_contents = metadata::blocking(move || -> Result<bool> {
        let has_objects = !store.find_objects_by_container(&container_id, 1, "")?.is_empty();
        let has_manifests = !store.find_manifests_by_container(&container_id)?.is_empty();
        Ok(has_objects || has_manifests)
    })
    .await?;
    if has_contents {
        return Err(Error::container_not_empty());
    }

    metadata::blocking(move || -> Result<()> {
        state.store.delete_metas_for(&container.id, "")?;
        state.store.delete_container(&container.id)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Shared `find by name or 404` used by every handler below the top-level
/// container listing.
pub(super) async fn find_by_name(store: &Store, name: &str) -> Result<Container> {
    let store = store.clone();
    let name = name.to_string();
    metadata::blocking(move || -> Result<Container> {
        store.find_container_by_name(&name)?.ok_or_else(Error::not_found_container)
    })
    .await
}

fn render_list<T: serde::Serialize>(headers: &HeaderMap, json_body: Vec<T>, text_body: String) -> Response {
    let accept = headers.get(axum::http::header::ACCEPT).and_then(|v| v.to_str().ok());
    if serializer::wants_text(accept) {
        (StatusCode::OK, text_body).into_response()
    } else {
        (StatusCode::OK, Json(json_body)).into_response()
    }
}

fn meta_entries(headers: &HeaderMap, prefix: &str) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str();
            if !name.starts_with(prefix) {
                return None;
            }
            let value = value.to_str().ok()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

pub(super) async fn append_metas(store: &Store, container_id: &str, object_key: &str, headers: &mut HeaderMap) -> Result<()> {
    let store = store.clone();
    let container_id = container_id.to_string();
    let object_key = object_key.to_string();
    let metas = metadata::blocking(move || -> Result<Vec<crate::model::Meta>> {
        Ok(store.find_meta_for(&container_id, &object_key)?)
    })
    .await?;

    for meta in metas {
        if let (Ok(name), Ok(value)) =
            (axum::http::HeaderName::try_from(meta.key.as_str()), HeaderValue::try_from(meta.value.as_str()))
        {
            headers.insert(name, value);
        }
    }
    Ok(())
}
