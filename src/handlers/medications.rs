use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    auth::require_auth,
    db::{
        models::{Medication, MedicationInput},
        Entity,
    },
    error::AppError,
    handlers::{deleted, parse_id},
    state::AppState,
    validation::{at_least, date, optional_text, required, required_text, Schema, Validated},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MedicationRequest {
    catalog_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    quantity: Option<i32>,
    expiration_date: Option<String>,
}

impl Schema for MedicationRequest {
    type Output = MedicationInput;

    fn validate(self) -> Result<MedicationInput, AppError> {
        Ok(MedicationInput {
            catalog_id: required_text(self.catalog_id, "catalogId")?,
            name: required_text(self.name, "name")?,
            description: optional_text(self.description, "description")?,
            quantity: at_least(required(self.quantity, "quantity")?, 0, "quantity")?,
            expiration_date: self
                .expiration_date
                .map(|v| date(v, "expirationDate"))
                .transpose()?,
        })
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_medications).post(create_medication))
        .route(
            "/{id}",
            get(get_medication)
                .put(update_medication)
                .delete(delete_medication),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

pub async fn create_medication(
    State(state): State<AppState>,
    Validated(input): Validated<MedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), AppError> {
    let medication = state.store.create_medication(input).await?;
    log::info!(
        "Added medication {} ({} units)",
        medication.name,
        medication.quantity
    );
    Ok((StatusCode::CREATED, Json(medication)))
}

pub async fn list_medications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Medication>>, AppError> {
    Ok(Json(state.store.list_medications().await?))
}

pub async fn get_medication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Medication>, AppError> {
    let id = parse_id(&id, Entity::Medication)?;
    Ok(Json(state.store.get_medication(id).await?))
}

pub async fn update_medication(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Validated(input): Validated<MedicationRequest>,
) -> Result<Json<Medication>, AppError> {
    let id = parse_id(&id, Entity::Medication)?;
    Ok(Json(state.store.update_medication(id, input).await?))
}

pub async fn delete_medication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, Entity::Medication)?;
    state.store.delete_medication(id).await?;
    Ok(deleted(Entity::Medication))
}
