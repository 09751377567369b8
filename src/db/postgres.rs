use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    models::{
        Doctor, DoctorInput, Medication, MedicationInput, NewUser, Patient, PatientInput,
        StockWithdrawal, User, UserChanges, WithdrawalInput, WithdrawalView,
    },
    Entity, Store, StoreError, CATALOG_ID_EXISTS, RECORD_NUMBER_EXISTS, USER_EXISTS,
};

/// [`Store`] backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn resolve(&self, records: Vec<StockWithdrawal>) -> Result<Vec<WithdrawalView>, StoreError> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.medication_id).collect();
        let medications: HashMap<Uuid, Medication> =
            sqlx::query_as::<_, Medication>("SELECT * FROM medications WHERE id = ANY($1)")
                .bind(&ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();

        Ok(records
            .into_iter()
            .map(|record| WithdrawalView {
                medication: medications.get(&record.medication_id).cloned(),
                record,
            })
            .collect())
    }

    async fn resolve_one(&self, record: StockWithdrawal) -> Result<WithdrawalView, StoreError> {
        let medication = sqlx::query_as::<_, Medication>("SELECT * FROM medications WHERE id = $1")
            .bind(record.medication_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(WithdrawalView { record, medication })
    }
}

/// Maps a unique-constraint violation to a conflict, passing other errors through.
fn unique_violation(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Sqlx(err),
    }
}

fn found<T>(row: Option<T>, entity: Entity) -> Result<T, StoreError> {
    row.ok_or(StoreError::NotFound(entity))
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, USER_EXISTS))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(user, Entity::User)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                name = COALESCE($3, name), \
                password_hash = COALESCE($4, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.name)
        .bind(changes.password)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, USER_EXISTS))?;
        found(user, Entity::User)
    }

    async fn delete_user(&self, id: Uuid) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(user, Entity::User)
    }

    async fn create_medication(&self, input: MedicationInput) -> Result<Medication, StoreError> {
        sqlx::query_as::<_, Medication>(
            "INSERT INTO medications (id, catalog_id, name, description, quantity, expiration_date) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&input.catalog_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.quantity)
        .bind(input.expiration_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, CATALOG_ID_EXISTS))
    }

    async fn list_medications(&self) -> Result<Vec<Medication>, StoreError> {
        Ok(
            sqlx::query_as::<_, Medication>("SELECT * FROM medications ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_medication(&self, id: Uuid) -> Result<Medication, StoreError> {
        let medication = sqlx::query_as::<_, Medication>("SELECT * FROM medications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(medication, Entity::Medication)
    }

    async fn update_medication(
        &self,
        id: Uuid,
        input: MedicationInput,
    ) -> Result<Medication, StoreError> {
        let medication = sqlx::query_as::<_, Medication>(
            "UPDATE medications SET catalog_id = $2, name = $3, description = $4, \
                quantity = $5, expiration_date = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.catalog_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.quantity)
        .bind(input.expiration_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, CATALOG_ID_EXISTS))?;
        found(medication, Entity::Medication)
    }

    async fn delete_medication(&self, id: Uuid) -> Result<Medication, StoreError> {
        let medication =
            sqlx::query_as::<_, Medication>("DELETE FROM medications WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        found(medication, Entity::Medication)
    }

    async fn expiring_medications(&self, cutoff: NaiveDate) -> Result<Vec<Medication>, StoreError> {
        Ok(sqlx::query_as::<_, Medication>(
            "SELECT * FROM medications WHERE expiration_date <= $1 ORDER BY expiration_date",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_patient(&self, input: PatientInput) -> Result<Patient, StoreError> {
        sqlx::query_as::<_, Patient>(
            "INSERT INTO patients (id, name, birth_date, medical_record_number, notes) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.birth_date)
        .bind(&input.medical_record_number)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, RECORD_NUMBER_EXISTS))
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Ok(
            sqlx::query_as::<_, Patient>("SELECT * FROM patients ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_patient(&self, id: Uuid) -> Result<Patient, StoreError> {
        let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(patient, Entity::Patient)
    }

    async fn update_patient(&self, id: Uuid, input: PatientInput) -> Result<Patient, StoreError> {
        let patient = sqlx::query_as::<_, Patient>(
            "UPDATE patients SET name = $2, birth_date = $3, medical_record_number = $4, \
                notes = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.birth_date)
        .bind(&input.medical_record_number)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, RECORD_NUMBER_EXISTS))?;
        found(patient, Entity::Patient)
    }

    async fn delete_patient(&self, id: Uuid) -> Result<Patient, StoreError> {
        let patient =
            sqlx::query_as::<_, Patient>("DELETE FROM patients WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        found(patient, Entity::Patient)
    }

    async fn create_doctor(&self, input: DoctorInput) -> Result<Doctor, StoreError> {
        Ok(sqlx::query_as::<_, Doctor>(
            "INSERT INTO doctors (id, name, department, specialization, contact_info) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.department)
        .bind(&input.specialization)
        .bind(&input.contact_info)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        Ok(
            sqlx::query_as::<_, Doctor>("SELECT * FROM doctors ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Doctor, StoreError> {
        let doctor = sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(doctor, Entity::Doctor)
    }

    async fn update_doctor(&self, id: Uuid, input: DoctorInput) -> Result<Doctor, StoreError> {
        let doctor = sqlx::query_as::<_, Doctor>(
            "UPDATE doctors SET name = $2, department = $3, specialization = $4, \
                contact_info = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.department)
        .bind(&input.specialization)
        .bind(&input.contact_info)
        .fetch_optional(&self.pool)
        .await?;
        found(doctor, Entity::Doctor)
    }

    async fn delete_doctor(&self, id: Uuid) -> Result<Doctor, StoreError> {
        let doctor = sqlx::query_as::<_, Doctor>("DELETE FROM doctors WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(doctor, Entity::Doctor)
    }

    async fn record_withdrawal(
        &self,
        input: WithdrawalInput,
    ) -> Result<WithdrawalView, StoreError> {
        let mut transaction = self.pool.begin().await?;

        // Conditional decrement: no row comes back unless the stock covers the request.
        let medication = sqlx::query_as::<_, Medication>(
            "UPDATE medications SET quantity = quantity - $1, updated_at = NOW() \
             WHERE id = $2 AND quantity >= $1 RETURNING *",
        )
        .bind(input.quantity)
        .bind(input.medication_id)
        .fetch_optional(&mut *transaction)
        .await?;

        let medication = match medication {
            Some(medication) => medication,
            None => {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT quantity FROM medications WHERE id = $1")
                        .bind(input.medication_id)
                        .fetch_optional(&mut *transaction)
                        .await?;

                return Err(match available {
                    Some(available) => StoreError::InsufficientStock {
                        requested: input.quantity,
                        available,
                    },
                    None => StoreError::NotFound(Entity::Medication),
                });
            }
        };

        let record = sqlx::query_as::<_, StockWithdrawal>(
            "INSERT INTO stock_withdrawals \
                (id, medication_id, quantity, taken_by, patient_name, doctor_name, withdrawal_date) \
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW())) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(input.medication_id)
        .bind(input.quantity)
        .bind(&input.taken_by)
        .bind(&input.patient_name)
        .bind(&input.doctor_name)
        .bind(input.withdrawal_date)
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(WithdrawalView {
            record,
            medication: Some(medication),
        })
    }

    async fn list_withdrawals(&self) -> Result<Vec<WithdrawalView>, StoreError> {
        let records =
            sqlx::query_as::<_, StockWithdrawal>("SELECT * FROM stock_withdrawals ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        self.resolve(records).await
    }

    async fn get_withdrawal(&self, id: Uuid) -> Result<WithdrawalView, StoreError> {
        let record =
            sqlx::query_as::<_, StockWithdrawal>("SELECT * FROM stock_withdrawals WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        self.resolve_one(found(record, Entity::Withdrawal)?).await
    }

    async fn update_withdrawal(
        &self,
        id: Uuid,
        input: WithdrawalInput,
    ) -> Result<WithdrawalView, StoreError> {
        let medication_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM medications WHERE id = $1)")
                .bind(input.medication_id)
                .fetch_one(&self.pool)
                .await?;
        if !medication_exists {
            return Err(StoreError::NotFound(Entity::Medication));
        }

        let record = sqlx::query_as::<_, StockWithdrawal>(
            "UPDATE stock_withdrawals SET medication_id = $2, quantity = $3, taken_by = $4, \
                patient_name = $5, doctor_name = $6, \
                withdrawal_date = COALESCE($7, withdrawal_date), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(input.medication_id)
        .bind(input.quantity)
        .bind(&input.taken_by)
        .bind(&input.patient_name)
        .bind(&input.doctor_name)
        .bind(input.withdrawal_date)
        .fetch_optional(&self.pool)
        .await?;
        self.resolve_one(found(record, Entity::Withdrawal)?).await
    }

    async fn delete_withdrawal(&self, id: Uuid) -> Result<StockWithdrawal, StoreError> {
        let record = sqlx::query_as::<_, StockWithdrawal>(
            "DELETE FROM stock_withdrawals WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        found(record, Entity::Withdrawal)
    }
}
