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
        models::{Doctor, DoctorInput},
        Entity,
    },
    error::AppError,
    handlers::{deleted, parse_id},
    state::AppState,
    validation::{optional_text, required_text, Schema, Validated},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DoctorRequest {
    name: Option<String>,
    department: Option<String>,
    specialization: Option<String>,
    contact_info: Option<String>,
}

impl Schema for DoctorRequest {
    type Output = DoctorInput;

    fn validate(self) -> Result<DoctorInput, AppError> {
        Ok(DoctorInput {
            name: required_text(self.name, "name")?,
            department: optional_text(self.department, "department")?,
            specialization: optional_text(self.specialization, "specialization")?,
            contact_info: optional_text(self.contact_info, "contactInfo")?,
        })
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors).post(create_doctor))
        .route(
            "/{id}",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

pub async fn create_doctor(
    State(state): State<AppState>,
    Validated(input): Validated<DoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), AppError> {
    let doctor = state.store.create_doctor(input).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn list_doctors(State(state): State<AppState>) -> Result<Json<Vec<Doctor>>, AppError> {
    Ok(Json(state.store.list_doctors().await?))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, AppError> {
    let id = parse_id(&id, Entity::Doctor)?;
    Ok(Json(state.store.get_doctor(id).await?))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Validated(input): Validated<DoctorRequest>,
) -> Result<Json<Doctor>, AppError> {
    let id = parse_id(&id, Entity::Doctor)?;
    Ok(Json(state.store.update_doctor(id, input).await?))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, Entity::Doctor)?;
    state.store.delete_doctor(id).await?;
    Ok(deleted(Entity::Doctor))
}
