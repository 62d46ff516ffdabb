//! services/api/src/web/middleware.rs
//!
//! Resolves the caller behind each request.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use threadboard_core::Caller;
use tracing::debug;

use crate::web::state::AppState;

/// The caller resolved for the current request, `None` when no token was sent.
#[derive(Clone, Debug)]
pub struct CurrentCaller(pub Option<Caller>);

/// Middleware that validates an optional `Authorization: Bearer` token.
///
/// Requests without a token continue as anonymous so the access policy can
/// decide what they may do. A token that is present but invalid is a 401.
pub async fn resolve_caller(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the bearer token, if any
    let token = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => {
            let raw = value.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
            let token = raw
                .strip_prefix("Bearer ")
                .ok_or(StatusCode::UNAUTHORIZED)?
                .trim();
            Some(token.to_string())
        }
    };

    // 2. Verify it against the identity service
    let caller = match token {
        None => None,
        Some(token) => {
            let caller = state.identity.verify_token(&token).await.map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                StatusCode::UNAUTHORIZED
            })?;
            Some(caller)
        }
    };

    // 3. Insert the caller into request extensions and continue
    req.extensions_mut().insert(CurrentCaller(caller));
    Ok(next.run(req).await)
}
