use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::require_auth,
    db::{
        models::{WithdrawalInput, WithdrawalView},
        Entity,
    },
    error::AppError,
    handlers::{deleted, parse_id},
    state::AppState,
    validation::{at_least, date_time, required, required_text, Schema, Validated},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StockRequest {
    medication: Option<String>,
    quantity: Option<i32>,
    taken_by: Option<String>,
    patient_name: Option<String>,
    doctor_name: Option<String>,
    withdrawal_date: Option<String>,
}

impl Schema for StockRequest {
    type Output = WithdrawalInput;

    fn validate(self) -> Result<WithdrawalInput, AppError> {
        let medication = required_text(self.medication, "medication")?;
        let medication_id = Uuid::parse_str(&medication).map_err(|_| {
            AppError::Validation("\"medication\" must be a valid id".to_string())
        })?;

        Ok(WithdrawalInput {
            medication_id,
            quantity: at_least(required(self.quantity, "quantity")?, 1, "quantity")?,
            taken_by: required_text(self.taken_by, "takenBy")?,
            patient_name: required_text(self.patient_name, "patientName")?,
            doctor_name: required_text(self.doctor_name, "doctorName")?,
            withdrawal_date: self
                .withdrawal_date
                .map(|v| date_time(v, "withdrawalDate"))
                .transpose()?,
        })
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_withdrawals).post(create_withdrawal))
        .route(
            "/{id}",
            get(get_withdrawal)
                .put(update_withdrawal)
                .delete(delete_withdrawal),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Takes units out of stock and records who took them.
///
/// The sufficiency check, the decrement and the record insert happen as one
/// unit in the store, so concurrent withdrawals cannot overdraw a medication.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Validated(input): Validated<StockRequest>,
) -> Result<(StatusCode, Json<WithdrawalView>), AppError> {
    log::info!(
        "Withdrawing {} units of medication {}",
        input.quantity,
        input.medication_id
    );

    let withdrawal = state.store.record_withdrawal(input).await?;

    if let Some(medication) = &withdrawal.medication {
        log::info!(
            "Recorded withdrawal {}, {} now has {} units",
            withdrawal.record.id,
            medication.name,
            medication.quantity
        );
    }
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
) -> Result<Json<Vec<WithdrawalView>>, AppError> {
    Ok(Json(state.store.list_withdrawals().await?))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WithdrawalView>, AppError> {
    let id = parse_id(&id, Entity::Withdrawal)?;
    Ok(Json(state.store.get_withdrawal(id).await?))
}

/// Rewrites a withdrawal record. Stock levels are left as they are.
pub async fn update_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Validated(input): Validated<StockRequest>,
) -> Result<Json<WithdrawalView>, AppError> {
    let id = parse_id(&id, Entity::Withdrawal)?;
    Ok(Json(state.store.update_withdrawal(id, input).await?))
}

pub async fn delete_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, Entity::Withdrawal)?;
    state.store.delete_withdrawal(id).await?;
    Ok(deleted(Entity::Withdrawal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(body: &str) -> Result<WithdrawalInput, AppError> {
        serde_json::from_str::<StockRequest>(body).unwrap().validate()
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let body = format!(
            r#"{{"medication":"{}","quantity":0,"takenBy":"n","patientName":"p","doctorName":"d"}}"#,
            Uuid::new_v4()
        );
        assert_eq!(
            validate(&body).unwrap_err().to_string(),
            "\"quantity\" must be greater than or equal to 1"
        );
    }

    #[test]
    fn medication_reference_must_be_an_id() {
        let body = r#"{"medication":"aspirin","quantity":1,"takenBy":"n","patientName":"p","doctorName":"d"}"#;
        assert_eq!(
            validate(body).unwrap_err().to_string(),
            "\"medication\" must be a valid id"
        );
    }

    #[test]
    fn withdrawal_date_is_optional() {
        let body = format!(
            r#"{{"medication":"{}","quantity":2,"takenBy":"n","patientName":"p","doctorName":"d"}}"#,
            Uuid::new_v4()
        );
        let input = validate(&body).unwrap();
        assert_eq!(input.quantity, 2);
        assert!(input.withdrawal_date.is_none());
    }
}
