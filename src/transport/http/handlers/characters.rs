use crate::app::ledger_service::MSG_ITEM_REQUIRED;
use crate::error::Error;
use crate::transport::http::handlers::common::{buy_error_response, error_response, invalid_json};
use crate::transport::http::types::{
    AnimalRequest, AppState, BuyAnimalResponse, CharacterAddedResponse, CharactersResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

fn animal_from(request: Result<Json<AnimalRequest>, JsonRejection>) -> Result<String, Response> {
    let Json(request) = request.map_err(invalid_json)?;
    request
        .animal
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| error_response(Error::Validation(MSG_ITEM_REQUIRED.to_string())))
}

#[utoipa::path(
    get,
    path = "/users/{npub}/characters",
    params(
        ("npub" = String, Path, description = "Display-encoded identity")
    ),
    responses(
        (status = 200, description = "Owned animals", body = CharactersResponse),
        (status = 404, description = "User not found", body = crate::transport::http::types::ErrorResponse),
        (status = 500, description = "Ledger failure", body = crate::transport::http::types::ErrorResponse)
    )
)]
pub async fn get_characters_handler(
    State(state): State<AppState>,
    Path(npub): Path<String>,
) -> impl IntoResponse {
    match state.ledger.get_record(&npub).await {
        Ok(record) => (
            StatusCode::OK,
            Json(CharactersResponse {
                characters: record.characters,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/users/{npub}/characters",
    params(
        ("npub" = String, Path, description = "Display-encoded identity")
    ),
    request_body = AnimalRequest,
    responses(
        (status = 200, description = "Set-insert applied; `result.added` tells whether it was new", body = CharacterAddedResponse),
        (status = 400, description = "Animal name is required", body = crate::transport::http::types::ErrorResponse),
        (status = 500, description = "Ledger failure", body = crate::transport::http::types::ErrorResponse)
    )
)]
pub async fn add_character_handler(
    State(state): State<AppState>,
    Path(npub): Path<String>,
    request: Result<Json<AnimalRequest>, JsonRejection>,
) -> impl IntoResponse {
    let animal = match animal_from(request) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match state.ledger.add_owned_item(&npub, &animal).await {
        Ok(result) => (
            StatusCode::OK,
            Json(CharacterAddedResponse {
                message: "Character added".to_string(),
                result,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/users/{npub}/buy-animal",
    params(
        ("npub" = String, Path, description = "Display-encoded identity")
    ),
    request_body = AnimalRequest,
    responses(
        (status = 200, description = "Animal bought", body = BuyAnimalResponse),
        (status = 400, description = "Already owned (`success: false`) or animal missing", body = BuyAnimalResponse),
        (status = 500, description = "Ledger failure", body = BuyAnimalResponse)
    )
)]
pub async fn buy_animal_handler(
    State(state): State<AppState>,
    Path(npub): Path<String>,
    request: Result<Json<AnimalRequest>, JsonRejection>,
) -> impl IntoResponse {
    let animal = match animal_from(request) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match state.ledger.add_owned_item(&npub, &animal).await {
        Ok(outcome) if outcome.added => (
            StatusCode::OK,
            Json(BuyAnimalResponse {
                success: true,
                message: Some("Animal bought successfully".to_string()),
                error: None,
            }),
        )
            .into_response(),
        Ok(_) => (
            StatusCode::BAD_REQUEST,
            Json(BuyAnimalResponse {
                success: false,
                message: Some("Animal already owned or user not found".to_string()),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => buy_error_response(e),
    }
}
