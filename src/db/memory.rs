use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    models::{
        Doctor, DoctorInput, Medication, MedicationInput, NewUser, Patient, PatientInput,
        StockWithdrawal, User, UserChanges, WithdrawalInput, WithdrawalView,
    },
    Entity, Store, StoreError, CATALOG_ID_EXISTS, RECORD_NUMBER_EXISTS, USER_EXISTS,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    medications: Vec<Medication>,
    patients: Vec<Patient>,
    doctors: Vec<Doctor>,
    withdrawals: Vec<StockWithdrawal>,
}

impl Tables {
    fn medication(&self, id: Uuid) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == id)
    }

    fn view(&self, record: StockWithdrawal) -> WithdrawalView {
        WithdrawalView {
            medication: self.medication(record.medication_id).cloned(),
            record,
        }
    }
}

/// In-process [`Store`] for tests and local runs.
///
/// All tables sit behind one mutex, so every operation, the withdrawal
/// included, observes and mutates a consistent snapshot. Rows are kept in
/// insertion order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn position<T>(rows: &[T], entity: Entity, matches: impl Fn(&T) -> bool) -> Result<usize, StoreError> {
    rows.iter()
        .position(matches)
        .ok_or(StoreError::NotFound(entity))
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(USER_EXISTS.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.lock().await.users.clone())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        let tables = self.tables.lock().await;
        let index = position(&tables.users, Entity::User, |u| u.id == id)?;
        Ok(tables.users[index].clone())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.users, Entity::User, |u| u.id == id)?;

        if let Some(email) = &changes.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict(USER_EXISTS.to_string()));
            }
        }

        let user = &mut tables.users[index];
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(password) = changes.password {
            user.password_hash = password;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.users, Entity::User, |u| u.id == id)?;
        Ok(tables.users.remove(index))
    }

    async fn create_medication(&self, input: MedicationInput) -> Result<Medication, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .medications
            .iter()
            .any(|m| m.catalog_id == input.catalog_id)
        {
            return Err(StoreError::Conflict(CATALOG_ID_EXISTS.to_string()));
        }

        let now = Utc::now();
        let medication = Medication {
            id: Uuid::new_v4(),
            catalog_id: input.catalog_id,
            name: input.name,
            description: input.description,
            quantity: input.quantity,
            expiration_date: input.expiration_date,
            created_at: now,
            updated_at: now,
        };
        tables.medications.push(medication.clone());
        Ok(medication)
    }

    async fn list_medications(&self) -> Result<Vec<Medication>, StoreError> {
        Ok(self.tables.lock().await.medications.clone())
    }

    async fn get_medication(&self, id: Uuid) -> Result<Medication, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .medication(id)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::Medication))
    }

    async fn update_medication(
        &self,
        id: Uuid,
        input: MedicationInput,
    ) -> Result<Medication, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.medications, Entity::Medication, |m| m.id == id)?;
        if tables
            .medications
            .iter()
            .any(|m| m.id != id && m.catalog_id == input.catalog_id)
        {
            return Err(StoreError::Conflict(CATALOG_ID_EXISTS.to_string()));
        }

        let medication = &mut tables.medications[index];
        medication.catalog_id = input.catalog_id;
        medication.name = input.name;
        medication.description = input.description;
        medication.quantity = input.quantity;
        medication.expiration_date = input.expiration_date;
        medication.updated_at = Utc::now();
        Ok(medication.clone())
    }

    async fn delete_medication(&self, id: Uuid) -> Result<Medication, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.medications, Entity::Medication, |m| m.id == id)?;
        Ok(tables.medications.remove(index))
    }

    async fn expiring_medications(&self, cutoff: NaiveDate) -> Result<Vec<Medication>, StoreError> {
        let tables = self.tables.lock().await;
        let mut expiring: Vec<Medication> = tables
            .medications
            .iter()
            .filter(|m| m.expiration_date.is_some_and(|date| date <= cutoff))
            .cloned()
            .collect();
        expiring.sort_by_key(|m| m.expiration_date);
        Ok(expiring)
    }

    async fn create_patient(&self, input: PatientInput) -> Result<Patient, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .patients
            .iter()
            .any(|p| p.medical_record_number == input.medical_record_number)
        {
            return Err(StoreError::Conflict(RECORD_NUMBER_EXISTS.to_string()));
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            name: input.name,
            birth_date: input.birth_date,
            medical_record_number: input.medical_record_number,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        tables.patients.push(patient.clone());
        Ok(patient)
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Ok(self.tables.lock().await.patients.clone())
    }

    async fn get_patient(&self, id: Uuid) -> Result<Patient, StoreError> {
        let tables = self.tables.lock().await;
        let index = position(&tables.patients, Entity::Patient, |p| p.id == id)?;
        Ok(tables.patients[index].clone())
    }

    async fn update_patient(&self, id: Uuid, input: PatientInput) -> Result<Patient, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.patients, Entity::Patient, |p| p.id == id)?;
        if tables
            .patients
            .iter()
            .any(|p| p.id != id && p.medical_record_number == input.medical_record_number)
        {
            return Err(StoreError::Conflict(RECORD_NUMBER_EXISTS.to_string()));
        }

        let patient = &mut tables.patients[index];
        patient.name = input.name;
        patient.birth_date = input.birth_date;
        patient.medical_record_number = input.medical_record_number;
        patient.notes = input.notes;
        patient.updated_at = Utc::now();
        Ok(patient.clone())
    }

    async fn delete_patient(&self, id: Uuid) -> Result<Patient, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.patients, Entity::Patient, |p| p.id == id)?;
        Ok(tables.patients.remove(index))
    }

    async fn create_doctor(&self, input: DoctorInput) -> Result<Doctor, StoreError> {
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: input.name,
            department: input.department,
            specialization: input.specialization,
            contact_info: input.contact_info,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        Ok(self.tables.lock().await.doctors.clone())
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Doctor, StoreError> {
        let tables = self.tables.lock().await;
        let index = position(&tables.doctors, Entity::Doctor, |d| d.id == id)?;
        Ok(tables.doctors[index].clone())
    }

    async fn update_doctor(&self, id: Uuid, input: DoctorInput) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.doctors, Entity::Doctor, |d| d.id == id)?;

        let doctor = &mut tables.doctors[index];
        doctor.name = input.name;
        doctor.department = input.department;
        doctor.specialization = input.specialization;
        doctor.contact_info = input.contact_info;
        doctor.updated_at = Utc::now();
        Ok(doctor.clone())
    }

    async fn delete_doctor(&self, id: Uuid) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.doctors, Entity::Doctor, |d| d.id == id)?;
        Ok(tables.doctors.remove(index))
    }

    async fn record_withdrawal(
        &self,
        input: WithdrawalInput,
    ) -> Result<WithdrawalView, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.medications, Entity::Medication, |m| {
            m.id == input.medication_id
        })?;

        let now = Utc::now();
        let medication = &mut tables.medications[index];
        if medication.quantity < input.quantity {
            return Err(StoreError::InsufficientStock {
                requested: input.quantity,
                available: medication.quantity,
            });
        }
        medication.quantity -= input.quantity;
        medication.updated_at = now;
        let medication = medication.clone();

        let record = StockWithdrawal {
            id: Uuid::new_v4(),
            medication_id: input.medication_id,
            quantity: input.quantity,
            taken_by: input.taken_by,
            patient_name: input.patient_name,
            doctor_name: input.doctor_name,
            withdrawal_date: input.withdrawal_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        tables.withdrawals.push(record.clone());

        Ok(WithdrawalView {
            record,
            medication: Some(medication),
        })
    }

    async fn list_withdrawals(&self) -> Result<Vec<WithdrawalView>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .withdrawals
            .iter()
            .cloned()
            .map(|record| tables.view(record))
            .collect())
    }

    async fn get_withdrawal(&self, id: Uuid) -> Result<WithdrawalView, StoreError> {
        let tables = self.tables.lock().await;
        let index = position(&tables.withdrawals, Entity::Withdrawal, |w| w.id == id)?;
        Ok(tables.view(tables.withdrawals[index].clone()))
    }

    async fn update_withdrawal(
        &self,
        id: Uuid,
        input: WithdrawalInput,
    ) -> Result<WithdrawalView, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.withdrawals, Entity::Withdrawal, |w| w.id == id)?;
        if tables.medication(input.medication_id).is_none() {
            return Err(StoreError::NotFound(Entity::Medication));
        }

        let record = &mut tables.withdrawals[index];
        record.medication_id = input.medication_id;
        record.quantity = input.quantity;
        record.taken_by = input.taken_by;
        record.patient_name = input.patient_name;
        record.doctor_name = input.doctor_name;
        if let Some(date) = input.withdrawal_date {
            record.withdrawal_date = date;
        }
        record.updated_at = Utc::now();
        let record = record.clone();

        Ok(tables.view(record))
    }

    async fn delete_withdrawal(&self, id: Uuid) -> Result<StockWithdrawal, StoreError> {
        let mut tables = self.tables.lock().await;
        let index = position(&tables.withdrawals, Entity::Withdrawal, |w| w.id == id)?;
        Ok(tables.withdrawals.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medication(catalog_id: &str, quantity: i32) -> MedicationInput {
        MedicationInput {
            catalog_id: catalog_id.to_string(),
            name: "Amoxicillin".to_string(),
            description: None,
            quantity,
            expiration_date: None,
        }
    }

    fn withdrawal(medication_id: Uuid, quantity: i32) -> WithdrawalInput {
        WithdrawalInput {
            medication_id,
            quantity,
            taken_by: "nurse on duty".to_string(),
            patient_name: "Maria Silva".to_string(),
            doctor_name: "Dr. House".to_string(),
            withdrawal_date: None,
        }
    }

    #[tokio::test]
    async fn withdrawal_decrements_stock_and_records_once() {
        let store = MemoryStore::new();
        let med = store.create_medication(medication("CAT-1", 10)).await.unwrap();

        let view = store.record_withdrawal(withdrawal(med.id, 4)).await.unwrap();

        assert_eq!(view.record.quantity, 4);
        assert_eq!(view.medication.as_ref().map(|m| m.quantity), Some(6));
        assert_eq!(store.get_medication(med.id).await.unwrap().quantity, 6);
        assert_eq!(store.list_withdrawals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_everything_untouched() {
        let store = MemoryStore::new();
        let med = store.create_medication(medication("CAT-1", 6)).await.unwrap();

        let err = store
            .record_withdrawal(withdrawal(med.id, 10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 10,
                available: 6
            }
        ));
        assert_eq!(store.get_medication(med.id).await.unwrap(), med);
        assert!(store.list_withdrawals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdrawal_from_unknown_medication_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .record_withdrawal(withdrawal(Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Medication)));
    }

    #[tokio::test]
    async fn withdrawal_can_drain_stock_to_zero() {
        let store = MemoryStore::new();
        let med = store.create_medication(medication("CAT-1", 3)).await.unwrap();

        store.record_withdrawal(withdrawal(med.id, 3)).await.unwrap();

        assert_eq!(store.get_medication(med.id).await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn updating_or_deleting_withdrawal_keeps_quantity() {
        let store = MemoryStore::new();
        let med = store.create_medication(medication("CAT-1", 10)).await.unwrap();
        let view = store.record_withdrawal(withdrawal(med.id, 4)).await.unwrap();

        let updated = store
            .update_withdrawal(view.record.id, withdrawal(med.id, 1))
            .await
            .unwrap();
        assert_eq!(updated.record.quantity, 1);
        assert_eq!(updated.record.withdrawal_date, view.record.withdrawal_date);
        assert_eq!(store.get_medication(med.id).await.unwrap().quantity, 6);

        store.delete_withdrawal(view.record.id).await.unwrap();
        assert_eq!(store.get_medication(med.id).await.unwrap().quantity, 6);
    }

    #[tokio::test]
    async fn withdrawal_view_survives_medication_deletion() {
        let store = MemoryStore::new();
        let med = store.create_medication(medication("CAT-1", 10)).await.unwrap();
        let view = store.record_withdrawal(withdrawal(med.id, 2)).await.unwrap();

        store.delete_medication(med.id).await.unwrap();

        let fetched = store.get_withdrawal(view.record.id).await.unwrap();
        assert_eq!(fetched.record.medication_id, med.id);
        assert!(fetched.medication.is_none());
    }

    #[tokio::test]
    async fn unique_fields_conflict() {
        let store = MemoryStore::new();
        store.create_medication(medication("CAT-1", 1)).await.unwrap();
        let err = store
            .create_medication(medication("CAT-1", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let patient = PatientInput {
            name: "Ana".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 2).unwrap(),
            medical_record_number: "MRN-1".to_string(),
            notes: None,
        };
        store.create_patient(patient.clone()).await.unwrap();
        assert!(matches!(
            store.create_patient(patient).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn doctor_get_update_delete() {
        let store = MemoryStore::new();
        let input = DoctorInput {
            name: "Dr. Rafael Moura".to_string(),
            department: Some("Emergency".to_string()),
            specialization: None,
            contact_info: None,
        };
        let doctor = store.create_doctor(input.clone()).await.unwrap();
        assert_eq!(store.get_doctor(doctor.id).await.unwrap(), doctor);

        let replaced = store
            .update_doctor(
                doctor.id,
                DoctorInput {
                    department: None,
                    specialization: Some("Trauma".to_string()),
                    ..input.clone()
                },
            )
            .await
            .unwrap();
        assert_eq!(replaced.id, doctor.id);
        assert_eq!(replaced.created_at, doctor.created_at);
        assert_eq!(replaced.department, None);
        assert_eq!(replaced.specialization.as_deref(), Some("Trauma"));

        assert_eq!(store.delete_doctor(doctor.id).await.unwrap(), replaced);
        assert!(matches!(
            store.get_doctor(doctor.id).await,
            Err(StoreError::NotFound(Entity::Doctor))
        ));
        assert!(matches!(
            store.update_doctor(doctor.id, input).await,
            Err(StoreError::NotFound(Entity::Doctor))
        ));
    }

    #[tokio::test]
    async fn withdrawal_update_needs_an_existing_medication() {
        let store = MemoryStore::new();
        let med = store.create_medication(medication("CAT-1", 10)).await.unwrap();
        let view = store.record_withdrawal(withdrawal(med.id, 4)).await.unwrap();

        let err = store
            .update_withdrawal(view.record.id, withdrawal(Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Medication)));
        assert_eq!(store.get_withdrawal(view.record.id).await.unwrap(), view);
    }

    #[tokio::test]
    async fn expiring_medications_are_sorted_by_date() {
        let store = MemoryStore::new();
        let later = NaiveDate::from_ymd_opt(2030, 6, 1);
        let sooner = NaiveDate::from_ymd_opt(2030, 1, 1);
        for (catalog_id, date) in [("A", later), ("B", sooner), ("C", None)] {
            let mut input = medication(catalog_id, 1);
            input.expiration_date = date;
            store.create_medication(input).await.unwrap();
        }

        let cutoff = NaiveDate::from_ymd_opt(2030, 12, 31).unwrap();
        let expiring = store.expiring_medications(cutoff).await.unwrap();
        let ids: Vec<&str> = expiring.iter().map(|m| m.catalog_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }
}
