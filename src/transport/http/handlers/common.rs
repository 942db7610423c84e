use crate::error::Error;
use crate::transport::http::types::{BuyAnimalResponse, ErrorResponse};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) | Error::MalformedIdentity(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Text shown to API clients: the bare message for the kinds that carry one.
pub fn public_message(err: &Error) -> String {
    match err {
        Error::Validation(m) | Error::NotFound(m) | Error::Persistence(m) => m.clone(),
        other => other.to_string(),
    }
}

fn log_server_error(err: &Error) {
    if status_for(err).is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
}

/// `{"error": ...}` with the status matching the error kind.
pub fn error_response(err: Error) -> Response {
    log_server_error(&err);
    (
        status_for(&err),
        Json(ErrorResponse {
            error: public_message(&err),
        }),
    )
        .into_response()
}

/// Server failures on buy-animal keep the `success` flag in the body.
pub fn buy_error_response(err: Error) -> Response {
    if !status_for(&err).is_server_error() {
        return error_response(err);
    }
    log_server_error(&err);
    (
        status_for(&err),
        Json(BuyAnimalResponse {
            success: false,
            message: None,
            error: Some(public_message(&err)),
        }),
    )
        .into_response()
}

pub fn invalid_json(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Invalid JSON body: {}", rejection.body_text()),
        }),
    )
        .into_response()
}
