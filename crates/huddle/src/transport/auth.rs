// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ChatError;
use crate::state::ChatState;

/// Extract the token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())?.strip_prefix("Bearer ")
}

/// Plain 401 used for rejected WebSocket upgrades. Carries no detail about
/// why the token was refused.
pub fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

/// Axum middleware that resolves the bearer token to a user and stores the
/// [`crate::model::UserIdentity`] in request extensions.
///
/// Exempt: `/api/v1/health`, WebSocket upgrades (`/ws/`), which
/// authenticate through their query string, and `/api/v1/internal/`, which
/// checks the service token itself.
pub async fn auth_layer(
    State(state): State<Arc<ChatState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if path == "/api/v1/health" || path.starts_with("/ws/") || path.starts_with("/api/v1/internal/") {
        return next.run(req).await;
    }

    let Some(user) = state.authenticate(bearer_token(req.headers())).await else {
        return ChatError::Unauthorized.to_http_response("unauthorized").into_response();
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}
