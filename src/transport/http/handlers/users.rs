use crate::app::ledger_service::MSG_IDENTITY_REQUIRED;
use crate::error::Error;
use crate::transport::http::handlers::common::{error_response, invalid_json};
use crate::transport::http::types::{AppState, RegisterUserRequest, UserUpdatedResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Record created or login refreshed", body = UserUpdatedResponse),
        (status = 400, description = "nostrName or npub missing, or invalid JSON", body = crate::transport::http::types::ErrorResponse),
        (status = 500, description = "Ledger failure", body = crate::transport::http::types::ErrorResponse),
        (status = 504, description = "Ledger timed out", body = crate::transport::http::types::ErrorResponse)
    )
)]
pub async fn register_user_handler(
    State(state): State<AppState>,
    request: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return invalid_json(e),
    };
    let (Some(name), Some(npub)) = (request.nostr_name, request.npub) else {
        return error_response(Error::Validation(MSG_IDENTITY_REQUIRED.to_string()));
    };

    match state.ledger.upsert_identity(&npub, &name).await {
        Ok(result) => (
            StatusCode::OK,
            Json(UserUpdatedResponse {
                message: "User data updated".to_string(),
                result,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/users/{npub}",
    params(
        ("npub" = String, Path, description = "Display-encoded identity")
    ),
    responses(
        (status = 200, description = "Ledger record", body = crate::storage::ledger::OwnershipRecord),
        (status = 404, description = "User not found", body = crate::transport::http::types::ErrorResponse),
        (status = 500, description = "Ledger failure", body = crate::transport::http::types::ErrorResponse)
    )
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(npub): Path<String>,
) -> impl IntoResponse {
    match state.ledger.get_record(&npub).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}
