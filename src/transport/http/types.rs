use crate::app::ledger_service::OwnershipLedger;
use crate::storage::ledger::{AddOutcome, UpsertOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<OwnershipLedger>,
}

/// Body of `POST /users`. Missing and empty fields are rejected by the handler
/// with a 400, not by the JSON extractor.
#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub nostr_name: Option<String>,
    #[serde(default)]
    pub npub: Option<String>,
}

/// Body of the character and buy-animal endpoints.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct AnimalRequest {
    #[serde(default)]
    pub animal: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct UserUpdatedResponse {
    pub message: String,
    pub result: UpsertOutcome,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CharacterAddedResponse {
    pub message: String,
    pub result: AddOutcome,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CharactersResponse {
    pub characters: Vec<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BuyAnimalResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
