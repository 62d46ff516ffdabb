//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the document endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every write goes through the `DocumentGateway`, which evaluates the access
//! policy before committing. Committed writes are then published to the
//! trigger loop.

use crate::web::{
    middleware::CurrentCaller,
    reservation::{self, ReservationResponse},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use threadboard_core::{DocPath, Fields, GatewayError, PortError};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_document_handler,
        create_document_handler,
        update_document_handler,
        delete_document_handler,
        reservation::reserve_category_name_handler,
    ),
    components(
        schemas(DocumentResponse, ReservationResponse)
    ),
    tags(
        (name = "Threadboard API", description = "Document access and category name reservation for the forum backend.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// A document and the full path it lives at.
#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    path: String,
    #[schema(value_type = Object)]
    data: Fields,
}

type RestResult<T> = Result<T, (StatusCode, String)>;

//=========================================================================================
// Helpers
//=========================================================================================

/// Maps a gateway failure onto the HTTP status the client sees.
pub(crate) fn gateway_rejection(e: GatewayError) -> (StatusCode, String) {
    match e {
        GatewayError::Denied(reason) => (StatusCode::FORBIDDEN, reason.to_string()),
        GatewayError::AlreadyExists(path) => {
            (StatusCode::CONFLICT, format!("Document {} already exists", path))
        }
        GatewayError::NotFound(path) => (StatusCode::NOT_FOUND, format!("Document {} not found", path)),
        GatewayError::Port(PortError::InvalidPath(path)) => {
            (StatusCode::BAD_REQUEST, format!("Invalid document path: {}", path))
        }
        GatewayError::Port(PortError::Unauthorized) => {
            (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
        }
        GatewayError::Port(e) => {
            error!("Document store failure: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    }
}

fn parse_path(raw: &str) -> RestResult<DocPath> {
    DocPath::parse(raw).map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid document path: {}", raw)))
}

fn document_path(raw: &str) -> RestResult<DocPath> {
    let path = parse_path(raw)?;
    if !path.is_document() {
        return Err((StatusCode::BAD_REQUEST, format!("{} is not a document path", raw)));
    }
    Ok(path)
}

fn object_body(body: Value) -> RestResult<Fields> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err((StatusCode::BAD_REQUEST, "Request body must be a JSON object".to_string())),
    }
}

/// A collection path gets a freshly generated document id appended.
fn target_for_create(path: DocPath) -> DocPath {
    if path.is_document() {
        path
    } else {
        let id = Uuid::new_v4().simple().to_string();
        DocPath::from_segments(path.segments().iter().cloned().chain([id]))
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Read a single document.
#[utoipa::path(
    get,
    path = "/documents/{path}",
    responses(
        (status = 200, description = "The document", body = DocumentResponse),
        (status = 400, description = "Malformed path"),
        (status = 403, description = "Read denied by the access policy"),
        (status = 404, description = "No document at this path")
    ),
    params(("path" = String, Path, description = "Slash-separated document path"))
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentCaller(caller)): Extension<CurrentCaller>,
    Path(raw): Path<String>,
) -> RestResult<Json<DocumentResponse>> {
    let path = document_path(&raw)?;
    let data = app_state
        .gateway
        .read(&path, caller)
        .await
        .map_err(gateway_rejection)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Document {} not found", path)))?;
    Ok(Json(DocumentResponse {
        path: path.to_string(),
        data,
    }))
}

/// Create a document.
///
/// Posting to a collection path generates the document id.
#[utoipa::path(
    post,
    path = "/documents/{path}",
    request_body(content = Object, description = "The new document's fields."),
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Malformed path or body"),
        (status = 401, description = "Invalid bearer token"),
        (status = 403, description = "Write denied by the access policy"),
        (status = 409, description = "A document already exists at this path")
    ),
    params(("path" = String, Path, description = "Document or collection path"))
)]
pub async fn create_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentCaller(caller)): Extension<CurrentCaller>,
    Path(raw): Path<String>,
    Json(body): Json<Value>,
) -> RestResult<impl IntoResponse> {
    let path = target_for_create(parse_path(&raw)?);
    let doc = object_body(body)?;

    let event = app_state
        .gateway
        .create(&path, caller, doc)
        .await
        .map_err(gateway_rejection)?;
    info!(path = %path, "Document created");

    let data = event.after.clone().unwrap_or_default();
    app_state.triggers.publish(event);
    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            path: path.to_string(),
            data,
        }),
    ))
}

/// Update a document.
///
/// The body is merged onto the stored document to form the proposed version.
#[utoipa::path(
    patch,
    path = "/documents/{path}",
    request_body(content = Object, description = "The fields to change."),
    responses(
        (status = 200, description = "Document updated", body = DocumentResponse),
        (status = 400, description = "Malformed path or body"),
        (status = 403, description = "Write denied by the access policy"),
        (status = 404, description = "No document at this path")
    ),
    params(("path" = String, Path, description = "Slash-separated document path"))
)]
pub async fn update_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentCaller(caller)): Extension<CurrentCaller>,
    Path(raw): Path<String>,
    Json(body): Json<Value>,
) -> RestResult<Json<DocumentResponse>> {
    let path = document_path(&raw)?;
    let changes = object_body(body)?;

    let event = app_state
        .gateway
        .update(&path, caller, changes)
        .await
        .map_err(gateway_rejection)?;

    let data = event.after.clone().unwrap_or_default();
    app_state.triggers.publish(event);
    Ok(Json(DocumentResponse {
        path: path.to_string(),
        data,
    }))
}

/// Delete a document.
#[utoipa::path(
    delete,
    path = "/documents/{path}",
    responses(
        (status = 204, description = "Document deleted"),
        (status = 400, description = "Malformed path"),
        (status = 403, description = "Delete denied by the access policy"),
        (status = 404, description = "No document at this path")
    ),
    params(("path" = String, Path, description = "Slash-separated document path"))
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentCaller(caller)): Extension<CurrentCaller>,
    Path(raw): Path<String>,
) -> RestResult<StatusCode> {
    let path = document_path(&raw)?;
    let event = app_state
        .gateway
        .delete(&path, caller)
        .await
        .map_err(gateway_rejection)?;
    info!(path = %path, "Document deleted");

    app_state.triggers.publish(event);
    Ok(StatusCode::NO_CONTENT)
}
