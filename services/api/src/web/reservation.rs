//! services/api/src/web/reservation.rs
//!
//! Claims a category name for the calling user. The check-and-set is the
//! store's insert-if-absent, so two callers racing for one name cannot both win.

use crate::web::{middleware::CurrentCaller, rest::gateway_rejection, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use threadboard_core::domain::{collections, fields};
use threadboard_core::{DenyReason, DocPath, GatewayError};
use tracing::info;
use utoipa::ToSchema;

/// Names of this length or shorter are refused.
const MIN_NAME_LEN: usize = 2;

/// The response payload sent after a name has been reserved.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    category_name: String,
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReservationError {
    Unauthenticated,
    Unverified,
    TooShort,
    Invalid,
    Exists,
    Rejected(StatusCode, String),
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ReservationError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED".to_string()),
            ReservationError::Unverified => (StatusCode::FORBIDDEN, "EMAIL_NOT_VERIFIED".to_string()),
            ReservationError::TooShort => (StatusCode::BAD_REQUEST, "CATEGORY_TOO_SHORT".to_string()),
            ReservationError::Invalid => (StatusCode::BAD_REQUEST, "CATEGORY_INVALID".to_string()),
            ReservationError::Exists => (StatusCode::BAD_REQUEST, "CATEGORY_EXISTS".to_string()),
            ReservationError::Rejected(status, message) => (status, message),
        };
        (status, Json(json!({ "error": code }))).into_response()
    }
}

/// Lowercases `raw` and checks it can name a category document.
fn normalize(raw: &str) -> Result<String, ReservationError> {
    let name = raw.trim().to_lowercase();
    if name.chars().count() <= MIN_NAME_LEN {
        return Err(ReservationError::TooShort);
    }
    if name.contains('/') {
        return Err(ReservationError::Invalid);
    }
    Ok(name)
}

/// Reserve a category name.
///
/// Creates `categories/{name}` owned by the caller. The name is lowercased first.
#[utoipa::path(
    post,
    path = "/category-names/{category_name}",
    responses(
        (status = 200, description = "Name reserved", body = ReservationResponse),
        (status = 400, description = "CATEGORY_TOO_SHORT, CATEGORY_INVALID or CATEGORY_EXISTS"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Email address not verified")
    ),
    params(("category_name" = String, Path, description = "The requested category name"))
)]
pub async fn reserve_category_name_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentCaller(caller)): Extension<CurrentCaller>,
    Path(raw): Path<String>,
) -> Result<Json<ReservationResponse>, ReservationError> {
    let caller = caller.ok_or(ReservationError::Unauthenticated)?;
    if !caller.email_verified {
        return Err(ReservationError::Unverified);
    }
    let name = normalize(&raw)?;

    let path = DocPath::doc(collections::CATEGORIES, &name);
    let mut doc = Map::new();
    doc.insert(fields::OWNER_ID.to_string(), Value::from(caller.uid.clone()));

    let event = app_state
        .gateway
        .create(&path, Some(caller), doc)
        .await
        .map_err(|e| match e {
            GatewayError::AlreadyExists(_) => ReservationError::Exists,
            GatewayError::Denied(DenyReason::Invalid(_)) => ReservationError::Invalid,
            other => {
                let (status, message) = gateway_rejection(other);
                ReservationError::Rejected(status, message)
            }
        })?;
    info!(category = %name, "Category name reserved");

    app_state.triggers.publish(event);
    Ok(Json(ReservationResponse {
        category_name: name,
        message: "SUCCESS".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased() {
        assert_eq!(normalize("Meditation").unwrap(), "meditation");
        assert_eq!(normalize("  RustLang ").unwrap(), "rustlang");
    }

    #[test]
    fn two_characters_is_too_short() {
        assert_eq!(normalize("ab"), Err(ReservationError::TooShort));
        assert_eq!(normalize(" a "), Err(ReservationError::TooShort));
        assert!(normalize("abc").is_ok());
    }

    #[test]
    fn names_cannot_span_path_segments() {
        assert_eq!(normalize("abc/def"), Err(ReservationError::Invalid));
    }

    #[test]
    fn conflicts_report_category_exists() {
        let response = ReservationError::Exists.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = ReservationError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
