use chrono::NaiveDate;

use pharmacy_control::{
    auth::password::PasswordHash,
    handlers::auth::MIN_PASSWORD_LENGTH,
    db::{
        self,
        models::{DoctorInput, MedicationInput, NewUser, PatientInput},
        Store, StoreError,
    },
};

type Error = Box<dyn std::error::Error + Send + Sync>;

fn seed_medications() -> Vec<MedicationInput> {
    [
        ("CAT-0001", "Aspirin", "Analgesic, 100 mg tablets", 500, (2026, 6, 30)),
        ("CAT-0002", "Amoxicillin", "Antibiotic, 500 mg capsules", 300, (2025, 12, 31)),
        ("CAT-0003", "Lisinopril", "ACE inhibitor, 10 mg tablets", 400, (2026, 3, 15)),
        ("CAT-0004", "Levothyroxine", "Thyroid hormone, 50 mcg tablets", 250, (2027, 1, 31)),
        ("CAT-0005", "Metformin", "Antidiabetic, 850 mg tablets", 350, (2026, 9, 30)),
        ("CAT-0006", "Amlodipine", "Calcium channel blocker, 5 mg tablets", 200, (2025, 11, 30)),
        ("CAT-0007", "Omeprazole", "Proton pump inhibitor, 20 mg capsules", 450, (2026, 7, 31)),
        ("CAT-0008", "Albuterol", "Bronchodilator inhaler", 150, (2027, 4, 30)),
        ("CAT-0009", "Gabapentin", "Anticonvulsant, 300 mg capsules", 300, (2026, 5, 31)),
        ("CAT-0010", "Metoprolol", "Beta blocker, 25 mg tablets", 275, (2025, 10, 31)),
    ]
    .into_iter()
    .map(
        |(catalog_id, name, description, quantity, (y, m, d))| MedicationInput {
            catalog_id: catalog_id.to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            quantity,
            expiration_date: NaiveDate::from_ymd_opt(y, m, d),
        },
    )
    .collect()
}

fn seed_doctors() -> Vec<DoctorInput> {
    [
        ("Dr. Helena Costa", "Internal Medicine", "Cardiology", "ext. 2101"),
        ("Dr. Rafael Moura", "Emergency", "Emergency Medicine", "ext. 2204"),
        ("Dr. Aline Prado", "Pediatrics", "Neonatology", "ext. 2310"),
    ]
    .into_iter()
    .map(|(name, department, specialization, contact)| DoctorInput {
        name: name.to_string(),
        department: Some(department.to_string()),
        specialization: Some(specialization.to_string()),
        contact_info: Some(contact.to_string()),
    })
    .collect()
}

fn seed_patients() -> Result<Vec<PatientInput>, Error> {
    [
        ("Maria Souza", (1958, 4, 12), "MRN-100234", Some("Penicillin allergy")),
        ("João Pereira", (1982, 11, 3), "MRN-100871", None),
        ("Lucas Almeida", (2016, 2, 27), "MRN-101120", Some("Asthma")),
    ]
    .into_iter()
    .map(|(name, (y, m, d), record_number, notes)| -> Result<PatientInput, Error> {
        let birth_date =
            NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| format!("invalid birth date for {name}"))?;
        Ok(PatientInput {
            name: name.to_string(),
            birth_date,
            medical_record_number: record_number.to_string(),
            notes: notes.map(str::to_string),
        })
    })
    .collect()
}

/// The admin account is only seeded with an explicit password that can
/// actually be used to log in.
fn admin_password(password: Option<String>) -> Result<Option<String>, Error> {
    match password {
        None => Ok(None),
        Some(password) if password.chars().count() < MIN_PASSWORD_LENGTH => Err(format!(
            "SEED_ADMIN_PASSWORD must be at least {MIN_PASSWORD_LENGTH} characters long"
        )
        .into()),
        Some(password) => Ok(Some(password)),
    }
}

/// Existing rows (matched on their unique field) are skipped, so seeding twice is harmless.
fn skip_existing<T>(result: Result<T, StoreError>, what: &str) -> Result<(), StoreError> {
    match result {
        Ok(_) => {
            log::info!("Seeded {}", what);
            Ok(())
        }
        Err(StoreError::Conflict(_)) => {
            log::info!("{} already present, skipping", what);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn seed_database(store: &dyn Store) -> Result<(), Error> {
    for medication in seed_medications() {
        let label = format!("medication {}", medication.catalog_id);
        skip_existing(store.create_medication(medication).await, &label)?;
    }

    // Doctors have no unique field, so only seed them into an empty table.
    if store.list_doctors().await?.is_empty() {
        for doctor in seed_doctors() {
            let label = format!("doctor {}", doctor.name);
            skip_existing(store.create_doctor(doctor).await, &label)?;
        }
    }

    for patient in seed_patients()? {
        let label = format!("patient {}", patient.medical_record_number);
        skip_existing(store.create_patient(patient).await, &label)?;
    }

    let email =
        std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@pharmacy.local".to_string());
    match admin_password(std::env::var("SEED_ADMIN_PASSWORD").ok())? {
        Some(password) => {
            let operator = NewUser {
                email: email.clone(),
                name: "Pharmacy Admin".to_string(),
                password: PasswordHash::from_plaintext(password).await?,
            };
            skip_existing(store.create_user(operator).await, &format!("user {email}"))?;
        }
        None => log::warn!("SEED_ADMIN_PASSWORD not set, skipping the admin account"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set")?;
    let store = db::connect(&database_url, 1).await?;
    seed_database(store.as_ref()).await?;

    log::info!("Seeding finished");
    Ok(())
}
