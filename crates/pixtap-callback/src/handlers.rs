//! Request handlers.
//!
//! Every path doubles as an asset (GET) and a helper program (POST). Helper
//! and asset failures are reported to the renderer as error responses; they
//! never take the server down.

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use pixtap_process::ProcessRequest;

use crate::cache::Claim;
use crate::state::ServerState;

/// Deadline-exceeded body returned to a concurrent duplicate helper call.
const IN_FLIGHT_BODY: &str = r#"{"error": "context deadline exceeded"}"#;

/// Handle `GET /{path}`: serve a file from the applet directory.
pub(crate) async fn get_asset(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<String>,
) -> Response {
    let Some(relative) = sanitize(&path) else {
        tracing::warn!(path = %path, "Rejected asset path outside applet directory");
        return StatusCode::FORBIDDEN.into_response();
    };

    let file_path = state.asset_dir.join(relative);
    match tokio::fs::read(&file_path).await {
        Ok(content) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], content).into_response()
        }
        Err(err) => {
            tracing::debug!(path = %file_path.display(), error = %err, "Asset not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Handle `POST /{path}`: run the helper program named by the path with the
/// request body as its single argument payload.
///
/// Responses are cached by `(path, body)`; a duplicate request that arrives
/// while the first is still executing gets a deadline-exceeded error rather
/// than a second execution or an open-ended wait.
pub(crate) async fn call_helper(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let Some(relative) = sanitize(&path) else {
        tracing::warn!(path = %path, "Rejected helper path outside applet directory");
        return StatusCode::FORBIDDEN.into_response();
    };

    let key = (path.clone(), body.to_vec());
    match state.cache.claim(&key) {
        Claim::Ready { status, body } => respond(status, body),
        Claim::InFlight => {
            tracing::warn!(path = %path, "Duplicate helper call while first is in flight");
            respond(504, IN_FLIGHT_BODY.as_bytes().to_vec())
        }
        Claim::Started => {
            let (status, response_body) = run_helper(&state, &path, &relative, &body).await;
            state.cache.complete(&key, status, response_body.clone());
            respond(status, response_body)
        }
    }
}

/// Execute the helper subprocess and map its outcome to a response.
async fn run_helper(
    state: &ServerState,
    path: &str,
    relative: &FsPath,
    payload: &[u8],
) -> (u16, Vec<u8>) {
    // Packaged library helpers live in the materialized pixlib directory,
    // everything else resolves against the applet directory.
    let helper_path = match path.strip_prefix("pixlib/") {
        Some(rest) => state.pixlib_dir.join(rest),
        None => state.asset_dir.join(relative),
    };

    let request = ProcessRequest::new(&state.python)
        .arg_path(&helper_path)
        .arg(String::from_utf8_lossy(payload).into_owned())
        .env("PIXLIB_DIR", state.pixlib_dir.display().to_string());

    tracing::info!(path = %path, "Running helper program");
    match state.runner.run(request).await {
        Ok(output) if output.success() => (200, output.stdout),
        Ok(output) => {
            let stderr = output.stderr_text();
            tracing::warn!(path = %path, code = ?output.code, "Helper program failed");
            (500, error_body(&stderr))
        }
        Err(err) => {
            tracing::error!(path = %path, error = %err, "Failed to run helper program");
            (500, error_body(&err.to_string()))
        }
    }
}

/// JSON error body for a failed helper call.
fn error_body(message: &str) -> Vec<u8> {
    serde_json::json!({ "error": message }).to_string().into_bytes()
}

/// Build a response. The content type is JSON exactly when the body starts
/// with `{`, matching what the renderer's HTTP client sniffs for.
fn respond(status: u16, body: Vec<u8>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    if body.starts_with(b"{") {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Normalize a request path to a relative path with no traversal components.
fn sanitize(path: &str) -> Option<PathBuf> {
    let candidate = FsPath::new(path);
    let mut relative = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}
