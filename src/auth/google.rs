//! Google sign-in.
//!
//! The browser obtains a Google ID token and posts it as `credential`. The
//! token is checked against Google's token-info endpoint, which validates the
//! signature and expiry; we additionally require that it was minted for our
//! client id by Google.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Who a verified credential belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub email: String,
    pub name: String,
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Credential rejected: {0}")]
    Rejected(String),
}

/// Turns a third-party credential into an [`Identity`].
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    iss: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
}

pub struct GoogleVerifier {
    client: reqwest::Client,
    client_id: String,
}

impl GoogleVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
        }
    }

    fn identity(&self, info: TokenInfo) -> Result<Identity, VerifyError> {
        if info.aud != self.client_id {
            return Err(VerifyError::Rejected(format!(
                "audience {} does not match",
                info.aud
            )));
        }
        if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
            return Err(VerifyError::Rejected(format!("unexpected issuer {}", info.iss)));
        }
        if info.email_verified.as_deref() == Some("false") {
            return Err(VerifyError::Rejected("email not verified".to_string()));
        }

        let email = info
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| VerifyError::Rejected("token carries no email".to_string()))?;
        let name = info
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

        Ok(Identity { email, name })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, VerifyError> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VerifyError::Rejected(format!(
                "token info returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response.json().await?;
        self.identity(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(aud: &str, iss: &str) -> TokenInfo {
        TokenInfo {
            aud: aud.to_string(),
            iss: iss.to_string(),
            email: Some("maria@example.com".to_string()),
            email_verified: Some("true".to_string()),
            name: Some("Maria".to_string()),
        }
    }

    #[test]
    fn accepts_token_for_our_client() {
        let verifier = GoogleVerifier::new("client-123".to_string());
        let identity = verifier
            .identity(info("client-123", "https://accounts.google.com"))
            .unwrap();
        assert_eq!(
            identity,
            Identity {
                email: "maria@example.com".to_string(),
                name: "Maria".to_string()
            }
        );
    }

    #[test]
    fn rejects_foreign_audience_and_issuer() {
        let verifier = GoogleVerifier::new("client-123".to_string());
        assert!(verifier
            .identity(info("someone-else", "accounts.google.com"))
            .is_err());
        assert!(verifier
            .identity(info("client-123", "https://evil.example"))
            .is_err());
    }

    #[test]
    fn falls_back_to_email_local_part_for_name() {
        let verifier = GoogleVerifier::new("client-123".to_string());
        let mut token = info("client-123", "accounts.google.com");
        token.name = None;
        assert_eq!(verifier.identity(token).unwrap().name, "maria");
    }
}
