//! Object-level handlers: `/v1/AUTH_<username>/<container>/<object>`.

use std::io::Read;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::metadata::{self, Store};
use crate::model::Object;
use crate::path::Entities;
use crate::service::{copier, destroyer, downloader, manifest, resolve, uploader};
use crate::service::resolve::Target;
use crate::web::container::{append_metas, find_by_name};
use crate::web::AppState;

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((_username, container_name, object_key)): Path<(String, String, String)>,
) -> Result<Response> {
    let store = state.store.clone();
    let (container, target) =
        metadata::blocking(move || -> Result<_> { Ok(resolve::resolve(&store, &container_name, &object_key)?) }).await?;

    let mut headers = entity_headers(&target);
    append_metas_for_target(&state.store, &container.id, &target, &mut headers).await?;

    let mut response = StatusCode::OK.into_response();
    *response.headers_mut() = headers;
    Ok(response)
}

#[instrument(skip(state))]
pub async fn download(
    State(state): State<AppState>,
    Path((_username, container_name, object_key)): Path<(String, String, String)>,
) -> Result<Response> {
    let store = state.store.clone();
    let blob = state.blob.clone();
    let (container, target, bytes, response_headers) = metadata::blocking(move || -> Result<_> {
        let (container, target) = resolve::resolve(&store, &container_name, &object_key)?;
        let mut download = match &target {
            Target::Object(object) => downloader::download_object(&blob, &container, object)?,
            Target::Manifest(manifest) => downloader::download_manifest(&store, &blob, manifest)?,
        };

        let mut bytes = Vec::with_capacity(download.size as usize);
        download.reader.read_to_end(&mut bytes)?;

        let headers = entity_headers(&target);
        Ok((container, target, bytes, headers))
    })
    .await?;

    let mut headers = response_headers;
    append_metas_for_target(&state.store, &container.id, &target, &mut headers).await?;

    let mut response = (StatusCode::OK, bytes).into_response();
    for (name, value) in headers.iter() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    Ok(response)
}

#[instrument(skip(state, headers, body))]
pub async fn upload(
    State(state): State<AppState>,
    Path((_username, container_name, object_key)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let container = find_by_name(&state.store, &container_name).await?;

    if let Some(copy_from) = headers.get("x-copy-from").and_then(|v| v.to_str().ok()) {
        let entities = Entities::parse(copy_from);
        let object = copy_to(&state, &entities.container, &entities.object, &container_name, &object_key).await?;
        return Ok(finish_write(StatusCode::CREATED, &object.checksum));
    }

    if let Some(manifest_spec) = headers.get("x-object-manifest").and_then(|v| v.to_str().ok()).map(str::to_string) {
        let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
        let store = state.store.clone();
        let blob = state.blob.clone();
        let key = object_key.clone();
        let manifest_record = metadata::blocking(move || {
            manifest::create(&store, &blob, &container, &key, &manifest_spec, content_type)
        })
        .await?;
        return Ok(finish_write(StatusCode::CREATED, &manifest_record.checksum));
    }

    let ttl = uploader::setup_ttl(&headers)?;
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let blob = state.blob.clone();
    let store = state.store.clone();
    let container_name_owned = container.name.clone();
    let key = object_key.clone();
    let uploaded = metadata::blocking(move || -> Result<_> {
        Ok(uploader::upload(&blob, &container_name_owned, &key, &body)?)
    })
    .await?;

    let checksum = uploaded.checksum.clone();
    let store = state.store.clone();
    let container_id = container.id.clone();
    let key = object_key.clone();
    metadata::blocking(move || -> Result<()> {
        let mut object = store.find_object_by_key(&container_id, &key)?.unwrap_or_default();
        object.container_id = container_id;
        object.key = key;
        object.manifest_id = None;
        object.size = uploaded.size;
        object.content_type = content_type;
        object.checksum = uploaded.checksum;
        object.ttl = ttl;
        store.save_object(&mut object)?;
        Ok(())
    })
    .await?;

    Ok(finish_write(StatusCode::CREATED, &checksum))
}

#[instrument(skip(state))]
pub async fn copy(
    State(state): State<AppState>,
    Path((_username, container_name, object_key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let destination = headers
        .get("destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::bad_request("Destination header is required"))?;
    let entities = Entities::parse(destination);

    let object = copy_to(&state, &container_name, &object_key, &entities.container, &entities.object).await?;
    Ok(finish_write(StatusCode::CREATED, &object.checksum))
}

#[instrument(skip(state, headers))]
pub async fn update_meta(
    State(state): State<AppState>,
    Path((_username, container_name, object_key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let container = find_by_name(&state.store, &container_name).await?;

    let entries: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str();
            if !name.starts_with("x-object-meta-") {
                return None;
            }
            Some((name.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();

    let store = state.store.clone();
    let key = object_key.clone();
    metadata::blocking(move || -> Result<()> {
        for (meta_key, value) in entries {
            store.add_meta(&container.id, &key, &meta_key, &value)?;
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    Path((_username, container_name, object_key)): Path<(String, String, String)>,
) -> Result<StatusCode> {
    let store = state.store.clone();
    let blob = state.blob.clone();
    metadata::blocking(move || -> Result<()> {
        let (container, target) = resolve::resolve(&store, &container_name, &object_key)?;
        match target {
            Target::Object(object) => destroyer::destroy_object(&store, &blob, &container, &object)?,
            Target::Manifest(manifest) => destroyer::destroy_manifest(&store, &blob, &manifest)?,
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn copy_to(
    state: &AppState,
    source_container_name: &str,
    source_key: &str,
    dest_container_name: &str,
    dest_key: &str,
) -> Result<Object> {
    let store = state.store.clone();
    let blob = state.blob.clone();
    let source_container_name = source_container_name.to_string();
    let source_key = source_key.to_string();
    let dest_container_name = dest_container_name.to_string();
    let dest_key = dest_key.to_string();

    metadata::blocking(move || -> Result<Object> {
        let (source_container, target) = resolve::resolve(&store, &source_container_name, &source_key)?;
        let dest_container = store
            .find_container_by_name(&dest_container_name)?
            .ok_or_else(Error::not_found_container)?;

        let (size, checksum, content_type) = match &target {
            Target::Object(object) => {
                let (size, checksum) = copier::copy_object(&blob, &source_container, object, &dest_container, &dest_key)?;
                (size, checksum, object.content_type.clone())
            }
            Target::Manifest(manifest) => {
                let (size, checksum) = copier::copy_manifest(
                    &store,
                    &blob,
                    &source_container,
                    &manifest.id,
                    manifest.size,
                    &dest_container,
                    &dest_key,
                )?;
                (size, checksum, manifest.content_type.clone())
            }
        };

        let mut object = store.find_object_by_key(&dest_container.id, &dest_key)?.unwrap_or_default();
        object.container_id = dest_container.id;
        object.key = dest_key;
        object.manifest_id = None;
        object.size = size;
        object.checksum = checksum;
        object.content_type = content_type;
        object.ttl = None;
        store.save_object(&mut object)?;
        Ok(object)
    })
    .await
}

fn entity_headers(target: &Target) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::DATE, HeaderValue::from_str(&httpdate::fmt_http_date(std::time::SystemTime::now())).unwrap());

    let (created_at, content_type, size, checksum, ttl) = match target {
        Target::Object(object) => (object.created_at, object.content_type.clone(), object.size, object.checksum.clone(), object.ttl),
        Target::Manifest(manifest) => (manifest.created_at, manifest.content_type.clone(), manifest.size, manifest.checksum.clone(), None),
    };

    headers.insert("x-timestamp", HeaderValue::from_str(&created_at.timestamp().to_string()).unwrap());
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(axum::http::header::CONTENT_LENGTH, HeaderValue::from_str(&size.to_string()).unwrap());
    headers.insert(axum::http::header::ETAG, HeaderValue::from_str(&checksum).unwrap_or_else(|_| HeaderValue::from_static("")));

    if let Some(ttl) = ttl {
        headers.insert("x-delete-at", HeaderValue::from_str(&ttl.timestamp().to_string()).unwrap());
    }

    headers
}

async fn append_metas_for_target(store: &Store, container_id: &str, target: &Target, headers: &mut HeaderMap) -> Result<()> {
    let object_key = match target {
        Target::Object(object) => object.key.as_str(),
        Target::Manifest(manifest) => manifest.key.as_str(),
    };
    append_metas(store, container_id, object_key, headers).await
}

fn finish_write(status: StatusCode, checksum: &str) -> Response {
    let mut response = status.into_response();
    response
        .headers_mut()
        .insert(axum::http::header::ETAG, HeaderValue::from_str(checksum).unwrap_or_else(|_| HeaderValue::from_static("")));
    response
}

