//! Stored credentials.
//!
//! [`PasswordHash`] is the only form in which a password reaches the store.
//! It can be produced by hashing a plaintext with Argon2id or, for accounts
//! created through social sign-in, by [`PasswordHash::none`]. Every write
//! path (registration, user update, seeding) goes through
//! [`PasswordHash::from_plaintext`].

use std::fmt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash as PhcString, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

#[derive(Clone, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes `password` on the blocking pool.
    pub async fn from_plaintext(password: String) -> Result<Self, AppError> {
        tokio::task::spawn_blocking(move || hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))?
    }

    /// The credential of an account that cannot log in with a password.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks `password` against this hash. An empty or malformed hash never matches.
    pub async fn verify(&self, password: String) -> bool {
        if self.is_none() {
            return false;
        }

        let stored = self.0.clone();
        tokio::task::spawn_blocking(move || matches(&stored, &password))
            .await
            .unwrap_or(false)
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("PasswordHash(none)")
        } else {
            f.write_str("PasswordHash(..)")
        }
    }
}

fn hash(password: &str) -> Result<PasswordHash, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))?;
    Ok(PasswordHash(hash.to_string()))
}

fn matches(stored: &str, password: &str) -> bool {
    match PhcString::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_password_verifies() {
        let hash = PasswordHash::from_plaintext("secret1".to_string())
            .await
            .unwrap();

        assert!(!hash.is_none());
        assert!(hash.verify("secret1".to_string()).await);
        assert!(!hash.verify("secret2".to_string()).await);
    }

    #[tokio::test]
    async fn same_password_gets_distinct_salts() {
        let a = PasswordHash::from_plaintext("secret1".to_string()).await.unwrap();
        let b = PasswordHash::from_plaintext("secret1".to_string()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn social_accounts_never_match() {
        let hash = PasswordHash::none();
        assert!(!hash.verify(String::new()).await);
        assert!(!hash.verify("anything".to_string()).await);
    }

    #[test]
    fn debug_output_hides_the_hash() {
        let hash = PasswordHash("$argon2id$v=19$secret".to_string());
        assert_eq!(format!("{hash:?}"), "PasswordHash(..)");
    }
}
