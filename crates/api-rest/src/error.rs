//! Conversion of core faults into HTTP responses.
//!
//! Every fault is turned into exactly one JSON response here; handlers only propagate.

use api_shared::wire::{ErrorRes, InvalidImageRes};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use vdd_core::{AnalysisError, StoreError};

#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    Store(StoreError),
    BadRequest(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::Analysis(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::BadRequest(e.body_text())
        }
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorRes {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(msg) => error_body(StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
            ApiError::Analysis(e) => match e {
                AnalysisError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
                AnalysisError::ImageRejected { .. } => (
                    StatusCode::BAD_REQUEST,
                    Json(InvalidImageRes {
                        error: "invalid_image".into(),
                        message: e.to_string(),
                    }),
                )
                    .into_response(),
                AnalysisError::RateLimited => {
                    error_body(StatusCode::TOO_MANY_REQUESTS, e.to_string())
                }
                AnalysisError::PaymentRequired => {
                    error_body(StatusCode::PAYMENT_REQUIRED, e.to_string())
                }
                AnalysisError::Gateway { .. }
                | AnalysisError::Validation { .. }
                | AnalysisError::MalformedResponse(_)
                | AnalysisError::Transport(_)
                | AnalysisError::Parse(_)
                | AnalysisError::MissingCredential(_) => {
                    tracing::error!("Analysis error: {}", e);
                    error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            },
            ApiError::Store(StoreError::InvalidInput(msg)) => {
                error_body(StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}
