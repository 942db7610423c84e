use crate::domain::profile::Profile;
use crate::storage::ledger::{AddOutcome, OwnershipRecord, UpsertOutcome};
use crate::transport::http::handlers::{characters, health, users};
use crate::transport::http::types::{
    AnimalRequest, AppState, BuyAnimalResponse, CharacterAddedResponse, CharactersResponse,
    ErrorResponse, HealthResponse, RegisterUserRequest, UserUpdatedResponse,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        users::register_user_handler,
        users::get_user_handler,
        characters::get_characters_handler,
        characters::add_character_handler,
        characters::buy_animal_handler
    ),
    components(schemas(
        RegisterUserRequest,
        AnimalRequest,
        UserUpdatedResponse,
        CharacterAddedResponse,
        CharactersResponse,
        BuyAnimalResponse,
        ErrorResponse,
        HealthResponse,
        OwnershipRecord,
        UpsertOutcome,
        AddOutcome,
        Profile
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/users", post(users::register_user_handler))
        .route("/users/:npub", get(users::get_user_handler))
        .route(
            "/users/:npub/characters",
            get(characters::get_characters_handler).post(characters::add_character_handler),
        )
        .route("/users/:npub/buy-animal", post(characters::buy_animal_handler))
        .with_state(app_state)
}
