//! Method dispatch for a single WebDAV request (spec §6).
//!
//! Grounded on the teacher's `webdav_handler.rs::handle_propfind` /
//! `handle_get` shape (state + path extraction, Depth header, building a
//! multistatus response), generalized to the provider/handle model instead
//! of OxiCloud's file/folder services, and to a single dynamic dispatch
//! function since axum's `MethodFilter` has no WebDAV verbs to route on.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{PartFailure, ProxyError};
use crate::models::ResourceMeta;
use crate::path_util;
use crate::provider::{CollectionHandle, NonCollectionHandle, Resource};
use crate::webdav::server::AppState;
use crate::webdav::xml_response;

/// Entry point wired into the router's catch-all route (spec §6 lists the
/// full inbound verb set; LOCK/UNLOCK are reported as unsupported).
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request_path(&state, &request);
    let headers = request.headers().clone();

    let result = match method.as_str() {
        "OPTIONS" => Ok(handle_options()),
        "PROPFIND" => handle_propfind(&state, &path, &headers).await,
        "GET" => handle_get(&state, &path, &headers, false).await,
        "HEAD" => handle_get(&state, &path, &headers, true).await,
        "PUT" => handle_put(&state, &path, &headers, request).await,
        "MKCOL" => handle_mkcol(&state, &path).await,
        "DELETE" => handle_delete(&state, &path).await,
        "COPY" => handle_copy_or_move(&state, &path, &headers, false).await,
        "MOVE" => handle_copy_or_move(&state, &path, &headers, true).await,
        "LOCK" | "UNLOCK" => Ok(locking_unsupported()),
        _ => Ok(StatusCode::METHOD_NOT_ALLOWED.into_response()),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

/// Strips the configured mount path off the inbound URI, producing the
/// canonical path used everywhere else in the proxy.
fn request_path(state: &AppState, request: &Request) -> String {
    let raw = request.uri().path();
    let decoded = path_util::percent_decode(raw);
    let mount = state.config.mount_path.trim_end_matches('/');
    let stripped = decoded.strip_prefix(mount).unwrap_or(&decoded);
    if stripped.is_empty() {
        "/".to_string()
    } else if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

fn handle_options() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::HeaderName::from_static("dav"), "1, 2")
        .header(
            header::ALLOW,
            "OPTIONS, GET, HEAD, PUT, DELETE, PROPFIND, MKCOL, COPY, MOVE",
        )
        .body(Body::empty())
        .unwrap()
}

/// LOCK/UNLOCK are advertised as unsupported (spec §6): `501 Not
/// Implemented` rather than silently pretending to grant a lock.
fn locking_unsupported() -> Response {
    (StatusCode::NOT_IMPLEMENTED, "locking is not supported").into_response()
}

async fn handle_propfind(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
) -> Result<Response, ProxyError> {
    let depth = headers
        .get("Depth")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("infinity");

    let resource = state
        .provider
        .resolve(path)
        .await
        .ok_or_else(|| ProxyError::NotFound(path.to_string()))?;

    let mut entries: Vec<(String, ResourceMeta)> = Vec::new();
    match &resource {
        Resource::Collection(handle) => {
            entries.push((path.to_string(), collection_meta(handle).await));
            if depth != "0" {
                for name in handle.get_member_names(false).await? {
                    let child_path = path_util::join_member(path, &name);
                    if let Some(meta) = state.provider.get_meta(&child_path).await {
                        entries.push((child_path, meta));
                    }
                }
            }
        }
        Resource::NonCollection(handle) => {
            entries.push((path.to_string(), non_collection_meta(handle).await));
        }
    }

    let xml = xml_response::render_multistatus(&entries, &state.config.mount_path)?;
    Ok(Response::builder()
        .status(StatusCode::MULTI_STATUS)
        .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
        .body(Body::from(xml))
        .unwrap())
}

async fn collection_meta(handle: &CollectionHandle) -> ResourceMeta {
    ResourceMeta {
        is_collection: true,
        content_length: 0,
        content_type: None,
        display_name: handle.get_display_name().await,
        etag: handle.get_etag().await,
        creation_date: handle.get_creation_date().await,
        last_modified: handle.get_last_modified().await,
        split_info: None,
    }
}

async fn non_collection_meta(handle: &NonCollectionHandle) -> ResourceMeta {
    ResourceMeta {
        is_collection: false,
        content_length: handle.get_content_length().await,
        content_type: Some(handle.get_content_type().await),
        display_name: handle.get_display_name().await,
        etag: handle.get_etag().await,
        creation_date: handle.get_creation_date().await,
        last_modified: handle.get_last_modified().await,
        split_info: None,
    }
}

/// Serves `GET`/`HEAD`, honoring a `Range: bytes=<n>-` request by seeking
/// the download proxy before streaming (spec §4.8).
async fn handle_get(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    head_only: bool,
) -> Result<Response, ProxyError> {
    let resource = state
        .provider
        .resolve(path)
        .await
        .ok_or_else(|| ProxyError::NotFound(path.to_string()))?;

    let Resource::NonCollection(handle) = resource else {
        return Ok((StatusCode::METHOD_NOT_ALLOWED, "cannot GET a collection").into_response());
    };

    let content_length = handle.get_content_length().await;
    let content_type = handle.get_content_type().await;
    let etag = handle.get_etag().await;

    let range_start = parse_range_start(headers);
    let status = if range_start.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(etag) = etag {
        builder = builder.header(header::ETAG, format!("\"{etag}\""));
    }

    if head_only {
        return Ok(builder
            .header(header::CONTENT_LENGTH, content_length.to_string())
            .body(Body::empty())
            .unwrap());
    }

    let mut proxy = handle.get_content().await;
    if let Some(from) = range_start {
        proxy.seek(from as i64);
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {from}-{}/{content_length}", content_length.saturating_sub(1)),
        );
    }

    let stream = crate::stream::download::into_chunk_stream(proxy);
    Ok(builder.body(Body::from_stream(stream)).unwrap())
}

/// Turns a `Destination` header (an absolute or path-only URL naming a
/// resource under this proxy's own mount) into a canonical path, by
/// discarding scheme/host and stripping the mount prefix.
fn destination_path(mount_path: &str, destination: &str) -> String {
    let raw_path = reqwest::Url::parse(destination)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| destination.to_string());
    let decoded = path_util::percent_decode(&raw_path);
    let mount = mount_path.trim_end_matches('/');
    let stripped = decoded.strip_prefix(mount).unwrap_or(&decoded);
    if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

fn parse_range_start(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?;
    let start = spec.split('-').next()?;
    start.parse().ok()
}

/// Handles `PUT`: resolves (or creates) the member, opens an upload proxy
/// immediately, and streams the request body into it (spec §4.7/§4.9).
async fn handle_put(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    request: Request,
) -> Result<Response, ProxyError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let parent_path = path_util::parent(path);
    let name = path_util::basename(path).to_string();
    let parent = state
        .provider
        .resolve(&parent_path)
        .await
        .ok_or_else(|| ProxyError::NotFound(parent_path.clone()))?;
    let Resource::Collection(parent_handle) = parent else {
        return Ok((StatusCode::CONFLICT, "parent is not a collection").into_response());
    };

    let handle = parent_handle.create_empty_resource(&name);
    let mut upload = handle.begin_write(content_type);

    let mut body_stream = request.into_body().into_data_stream();
    let mut io_error = None;
    loop {
        use futures::StreamExt;
        match body_stream.next().await {
            Some(Ok(chunk)) => {
                if let Err(e) = upload.write(chunk).await {
                    io_error = Some(e.to_string());
                    break;
                }
            }
            Some(Err(e)) => {
                io_error = Some(e.to_string());
                break;
            }
            None => break,
        }
    }

    let status = upload.close().await;
    let failed = io_error.is_some() || status.error.is_some();
    handle.end_write(failed);

    if let Some(err) = io_error.or(status.error) {
        tracing::warn!(%path, error = %err, "PUT upload failed");
        return Ok((StatusCode::BAD_GATEWAY, err).into_response());
    }
    Ok(StatusCode::CREATED.into_response())
}

async fn handle_mkcol(state: &AppState, path: &str) -> Result<Response, ProxyError> {
    let parent_path = path_util::parent(path);
    let name = path_util::basename(path);
    let parent = state
        .provider
        .resolve(&parent_path)
        .await
        .ok_or_else(|| ProxyError::NotFound(parent_path.clone()))?;
    let Resource::Collection(handle) = parent else {
        return Ok((StatusCode::CONFLICT, "parent is not a collection").into_response());
    };
    handle.create_collection(name).await?;
    Ok(StatusCode::CREATED.into_response())
}

async fn handle_delete(state: &AppState, path: &str) -> Result<Response, ProxyError> {
    let resource = state
        .provider
        .resolve(path)
        .await
        .ok_or_else(|| ProxyError::NotFound(path.to_string()))?;

    let failures = match resource {
        Resource::Collection(mut handle) => handle.delete().await,
        Resource::NonCollection(mut handle) => handle.delete().await,
    };
    Ok(multi_part_response(failures, StatusCode::NO_CONTENT))
}

async fn handle_copy_or_move(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    is_move: bool,
) -> Result<Response, ProxyError> {
    let destination = headers
        .get("Destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ProxyError::Config("Destination header is required".to_string()))?;
    let dest_path = destination_path(&state.config.mount_path, destination);
    let overwrite = headers.get("Overwrite").and_then(|v| v.to_str().ok());

    let resource = state
        .provider
        .resolve(path)
        .await
        .ok_or_else(|| ProxyError::NotFound(path.to_string()))?;

    let failures = match resource {
        Resource::Collection(mut handle) => {
            handle.copy_move_single(&dest_path, is_move, overwrite).await
        }
        Resource::NonCollection(mut handle) => {
            handle.copy_move_single(&dest_path, is_move, overwrite).await
        }
    };
    Ok(multi_part_response(failures, StatusCode::CREATED))
}

/// Builds the client response for a multi-part operation: success status
/// when every physical part succeeded, `207 Multi-Status` listing each
/// failure otherwise (spec §7 item 6 — never a rollback).
fn multi_part_response(failures: Vec<PartFailure>, success_status: StatusCode) -> Response {
    if failures.is_empty() {
        return success_status.into_response();
    }
    let body = failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    tracing::warn!(failures = %body, "partial failure on multi-part operation");
    (StatusCode::MULTI_STATUS, body).into_response()
}
