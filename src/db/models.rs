use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password::PasswordHash;

#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub catalog_id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub birth_date: NaiveDate,
    pub medical_record_number: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub contact_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockWithdrawal {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub quantity: i32,
    pub taken_by: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub withdrawal_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A withdrawal with its medication resolved for display.
///
/// `medication` is `None` when the medication has been deleted since the
/// withdrawal was recorded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WithdrawalView {
    #[serde(flatten)]
    pub record: StockWithdrawal,
    pub medication: Option<Medication>,
}

pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: PasswordHash,
}

/// Fields left as `None` keep their stored value.
#[derive(Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<PasswordHash>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MedicationInput {
    pub catalog_id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientInput {
    pub name: String,
    pub birth_date: NaiveDate,
    pub medical_record_number: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoctorInput {
    pub name: String,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalInput {
    pub medication_id: Uuid,
    pub quantity: i32,
    pub taken_by: String,
    pub patient_name: String,
    pub doctor_name: String,
    /// Defaults to the time of recording on create; kept as-is on update.
    pub withdrawal_date: Option<DateTime<Utc>>,
}
