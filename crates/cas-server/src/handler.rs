use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use cas_ingest::SessionStatus;
use cas_service::{
    reason, Code, ContentService, ServiceError, WriteRequest, WriteResponse,
};
use cas_store::{BlobInfo, BlobUpdate, FieldMask};
use cas_types::Digest;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// HTTP status for a service error code.
pub fn status_for(code: Code) -> StatusCode {
    match code {
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::OutOfRange => StatusCode::RANGE_NOT_SATISFIABLE,
        Code::Unavailable => StatusCode::LOCKED,
        // Client closed request.
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A [`ServiceError`] rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.code);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(self.0)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

fn parse_digest(text: &str) -> ApiResult<Digest> {
    Digest::parse(text).map_err(|e| ApiError(e.into()))
}

/// Values of every repeated `filter=` query parameter.
fn filters(params: Vec<(String, String)>) -> Vec<String> {
    params
        .into_iter()
        .filter(|(key, _)| key == "filter")
        .map(|(_, value)| value)
        .collect()
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "cas-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---- blobs ----

/// Matching blobs as newline-delimited JSON, streamed as the store is walked.
pub async fn list_blobs(
    State(service): State<ContentService>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let batches = service.list(filters(params))?;
    let lines = batches.map(|batch| {
        let mut buf = Vec::new();
        for info in batch? {
            serde_json::to_writer(&mut buf, &info)
                .map_err(|e| ServiceError::internal(info.digest.to_string(), e.to_string()))?;
            buf.push(b'\n');
        }
        Ok::<_, ServiceError>(Bytes::from(buf))
    });
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

pub async fn get_blob(
    State(service): State<ContentService>,
    Path(digest): Path<String>,
) -> ApiResult<Json<BlobInfo>> {
    let digest = parse_digest(&digest)?;
    Ok(Json(service.info(digest).await?))
}

/// Body of a blob update: the new field values plus the paths to apply.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateBody {
    pub info: BlobUpdate,
    pub mask: FieldMask,
}

pub async fn update_blob(
    State(service): State<ContentService>,
    Path(digest): Path<String>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<BlobInfo>> {
    let digest = parse_digest(&digest)?;
    Ok(Json(service.update(digest, body.info, body.mask).await?))
}

pub async fn delete_blob(
    State(service): State<ContentService>,
    Path(digest): Path<String>,
) -> ApiResult<StatusCode> {
    let digest = parse_digest(&digest)?;
    service.delete(digest).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReadParams {
    pub offset: u64,
    /// 0 reads to the end.
    pub length: u64,
}

pub async fn read_content(
    State(service): State<ContentService>,
    Path(digest): Path<String>,
    Query(params): Query<ReadParams>,
) -> ApiResult<Response> {
    let digest = parse_digest(&digest)?;
    let chunks = service.read(digest, params.offset, params.length).await?;
    let body = Body::from_stream(chunks.map(|chunk| chunk.map(|c| c.data)));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::ETAG, format!("\"{digest}\"")),
        ],
        body,
    )
        .into_response())
}

// ---- sessions ----

pub async fn list_sessions(
    State(service): State<ContentService>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<SessionStatus>>> {
    Ok(Json(service.list_statuses(filters(params)).await?))
}

pub async fn get_session(
    State(service): State<ContentService>,
    Path(reference): Path<String>,
) -> ApiResult<Json<SessionStatus>> {
    Ok(Json(service.status(&reference).await?))
}

pub async fn abort_session(
    State(service): State<ContentService>,
    Path(reference): Path<String>,
) -> ApiResult<StatusCode> {
    service.abort(&reference).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run a JSON array of write messages as one write stream on the path's ref.
///
/// Messages may omit `ref`. Responds with one entry per message, or with the
/// first error.
pub async fn write_session(
    State(service): State<ContentService>,
    Path(reference): Path<String>,
    Json(mut requests): Json<Vec<WriteRequest>>,
) -> ApiResult<Json<Vec<WriteResponse>>> {
    for request in &mut requests {
        if request.reference.is_empty() {
            request.reference.clone_from(&reference);
        } else if request.reference != reference {
            return Err(ApiError(ServiceError::invalid_argument(
                reference.clone(),
                reason::REF_MISMATCH,
                format!("message names ref {:?}", request.reference),
            )));
        }
    }
    if requests.is_empty() {
        requests.push(WriteRequest::stat(reference));
    }

    let mut responses = service.write(futures::stream::iter(requests));
    let mut out = Vec::new();
    while let Some(response) = responses.next().await {
        out.push(response?);
    }
    Ok(Json(out))
}
