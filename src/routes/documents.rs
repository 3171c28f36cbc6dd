//! Document API endpoints
//!
//! - `POST /documents` stores a raw text body, or the `data` field of a
//!   multipart form, and answers `{"key": ...}`
//! - `GET /documents/:id` answers `{"data": ..., "key": ...}`
//! - `GET /raw/:id` answers the stored text as `text/plain`
//!
//! Identifiers may carry an extension (`/raw/abc.md`), which is ignored.
//! `HEAD` requests are served by the `GET` handlers with the body dropped.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http_body_util::{LengthLimitError, Limited};
use serde::Serialize;

use crate::document::{Document, DocumentError};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Longest UTF-8 encoding of a single character
const MAX_BYTES_PER_CHAR: usize = 4;

/// Field holding the document in multipart uploads
const MULTIPART_FIELD: &str = "data";

/// Room for boundaries, headers and small extra fields in a multipart form
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create response
#[derive(Serialize)]
pub struct CreateResponse {
    pub key: String,
}

/// Create the documents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents", post(create_document))
        .route("/documents/:id", get(get_document))
        .route("/raw/:id", get(get_raw_document))
        // Uploads are capped against the configured maximum while reading
        .layer(DefaultBodyLimit::disable())
}

/// Store a new document
async fn create_document(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<CreateResponse>> {
    let document_url_base = base_url(request.headers());
    let content = read_content(&state, request).await?;

    let key = state.documents().create_document(&content).await?;

    if state.notifier().is_enabled() {
        state.notifier().notify_in_background(format!(
            ":white_check_mark: A new document was created: {}/{}",
            document_url_base, key
        ));
    }

    Ok(Json(CreateResponse { key }))
}

/// Get a document wrapped in JSON
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    let document = state.documents().retrieve_document(&id).await?;
    Ok(Json(document))
}

/// Get the exact stored text
async fn get_raw_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let document = state.documents().retrieve_document(&id).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        document.data,
    )
        .into_response())
}

/// Buffer the upload. A body that fails mid-stream is treated as an
/// aborted connection and never reaches key selection.
async fn read_content(state: &AppState, request: Request) -> Result<String> {
    let max_length = state.config().documents.max_length;
    let limit = max_length.map(|max| max.saturating_mul(MAX_BYTES_PER_CHAR));

    if is_multipart(request.headers()) {
        return read_multipart(state, request, max_length, limit).await;
    }

    let bytes = axum::body::to_bytes(request.into_body(), limit.unwrap_or(usize::MAX))
        .await
        .map_err(|e| {
            let e = e.into_inner();
            match max_length {
                Some(max) if e.is::<LengthLimitError>() => {
                    AppError::from(DocumentError::TooLarge { max })
                }
                _ => AppError::ConnectionAborted(e.to_string()),
            }
        })?;

    String::from_utf8(bytes.to_vec())
        .map_err(|_| AppError::BadRequest("Document must be valid UTF-8 text.".to_string()))
}

/// Read the `data` field of a multipart form. The whole form is capped at the
/// document limit plus [`MULTIPART_OVERHEAD`], and the `data` field alone at
/// the document limit.
async fn read_multipart(
    state: &AppState,
    request: Request,
    max_length: Option<usize>,
    limit: Option<usize>,
) -> Result<String> {
    let too_large = |max: usize| AppError::from(DocumentError::TooLarge { max });

    let request = match limit {
        Some(limit) => {
            let (parts, body) = request.into_parts();
            let body = Body::new(Limited::new(body, limit.saturating_add(MULTIPART_OVERHEAD)));
            Request::from_parts(parts, body)
        }
        None => request,
    };

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut content = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(match max_length {
                    Some(max) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => too_large(max),
                    _ => AppError::BadRequest(format!("Failed to read upload: {}", e)),
                })
            }
        };

        if field.name() != Some(MULTIPART_FIELD) {
            continue;
        }

        let mut field = field;
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| match max_length {
            Some(max) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => too_large(max),
            _ => AppError::ConnectionAborted(e.to_string()),
        })? {
            bytes.extend_from_slice(&chunk);
            if let (Some(limit), Some(max)) = (limit, max_length) {
                if bytes.len() > limit {
                    return Err(too_large(max));
                }
            }
        }

        content = Some(bytes);
    }

    String::from_utf8(content.unwrap_or_default())
        .map_err(|_| AppError::BadRequest("Document must be valid UTF-8 text.".to_string()))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("multipart/form-data"))
}

/// `proto://host` of the incoming request, honouring `X-Forwarded-Proto`
fn base_url(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", proto, host)
}
