use std::sync::Arc;

use crate::{
    auth::{
        google::{GoogleVerifier, IdentityVerifier},
        TokenKeys,
    },
    config::Config,
    db::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenKeys>,
    /// `None` when social sign-in is not configured.
    pub identity: Option<Arc<dyn IdentityVerifier>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenKeys,
        identity: Option<Arc<dyn IdentityVerifier>>,
    ) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            identity,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        let tokens = TokenKeys::new(config.jwt_secret.as_bytes(), config.token_ttl_seconds);
        let identity = match &config.google_client_id {
            Some(client_id) => {
                Some(Arc::new(GoogleVerifier::new(client_id.clone())) as Arc<dyn IdentityVerifier>)
            }
            None => {
                log::warn!("GOOGLE_CLIENT_ID not set, Google sign-in is disabled");
                None
            }
        };

        Self::new(store, tokens, identity)
    }
}
