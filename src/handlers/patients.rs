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
        models::{Patient, PatientInput},
        Entity,
    },
    error::AppError,
    handlers::{deleted, parse_id},
    state::AppState,
    validation::{date, optional_text, required, required_text, Schema, Validated},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatientRequest {
    name: Option<String>,
    birth_date: Option<String>,
    medical_record_number: Option<String>,
    notes: Option<String>,
}

impl Schema for PatientRequest {
    type Output = PatientInput;

    fn validate(self) -> Result<PatientInput, AppError> {
        Ok(PatientInput {
            name: required_text(self.name, "name")?,
            birth_date: date(required(self.birth_date, "birthDate")?, "birthDate")?,
            medical_record_number: required_text(
                self.medical_record_number,
                "medicalRecordNumber",
            )?,
            notes: optional_text(self.notes, "notes")?,
        })
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route(
            "/{id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

pub async fn create_patient(
    State(state): State<AppState>,
    Validated(input): Validated<PatientRequest>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    let patient = state.store.create_patient(input).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn list_patients(State(state): State<AppState>) -> Result<Json<Vec<Patient>>, AppError> {
    Ok(Json(state.store.list_patients().await?))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, AppError> {
    let id = parse_id(&id, Entity::Patient)?;
    Ok(Json(state.store.get_patient(id).await?))
}

pub async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Validated(input): Validated<PatientRequest>,
) -> Result<Json<Patient>, AppError> {
    let id = parse_id(&id, Entity::Patient)?;
    Ok(Json(state.store.update_patient(id, input).await?))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, Entity::Patient)?;
    state.store.delete_patient(id).await?;
    Ok(deleted(Entity::Patient))
}
