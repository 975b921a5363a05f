// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::events::ServerFrame;

/// Failure codes shared by REST responses and WebSocket error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatError {
    Unauthorized,
    BadRequest,
    UserNotFound,
    RoomNotFound,
    /// A chat message could not be persisted, so it was never broadcast.
    DeliveryFailed,
    Internal,
}

impl ChatError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::UserNotFound | Self::RoomNotFound => StatusCode::NOT_FOUND,
            Self::DeliveryFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::Internal => "INTERNAL",
        }
    }

    fn body(self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    /// `{"error":{"code","message"}}` with the matching status.
    pub fn to_http_response(self, message: impl Into<String>) -> Response {
        (self.status(), Json(ErrorResponse { error: self.body(message) })).into_response()
    }

    /// Error frame for the socket that caused the failure.
    pub fn to_frame(self, message: impl Into<String>) -> ServerFrame {
        let ErrorBody { code, message } = self.body(message);
        ServerFrame::Error { code, message }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
