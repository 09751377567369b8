use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::{password::PasswordHash, require_auth},
    db::{
        models::{NewUser, User, UserChanges},
        Entity, StoreError, USER_EXISTS,
    },
    error::AppError,
    handlers::parse_id,
    state::AppState,
    validation::{email, min_length, non_empty, required, required_text, Schema, Validated},
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    email: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl Schema for RegisterRequest {
    type Output = Registration;

    fn validate(self) -> Result<Registration, AppError> {
        Ok(Registration {
            email: email(required(self.email, "email")?, "email")?,
            name: required_text(self.name, "name")?,
            password: min_length(
                required(self.password, "password")?,
                MIN_PASSWORD_LENGTH,
                "password",
            )?,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

pub struct Login {
    pub email: String,
    pub password: String,
}

impl Schema for LoginRequest {
    type Output = Login;

    fn validate(self) -> Result<Login, AppError> {
        Ok(Login {
            email: email(required(self.email, "email")?, "email")?,
            password: min_length(
                required(self.password, "password")?,
                MIN_PASSWORD_LENGTH,
                "password",
            )?,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleRequest {
    credential: Option<String>,
}

impl Schema for GoogleRequest {
    type Output = String;

    fn validate(self) -> Result<String, AppError> {
        required_text(self.credential, "credential")
    }
}

/// Partial update: absent fields keep their stored value, present ones
/// follow the registration rules.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    email: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

impl Schema for UpdateUserRequest {
    type Output = UserUpdate;

    fn validate(self) -> Result<UserUpdate, AppError> {
        Ok(UserUpdate {
            email: self.email.map(|v| email(v, "email")).transpose()?,
            name: self.name.map(|v| non_empty(v, "name")).transpose()?,
            password: self
                .password
                .map(|v| min_length(v, MIN_PASSWORD_LENGTH, "password"))
                .transpose()?,
        })
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/google", post(google))
        .merge(protected)
}

fn token_body(token: String) -> Json<Value> {
    Json(json!({ "token": token }))
}

pub async fn register(
    State(state): State<AppState>,
    Validated(registration): Validated<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if state
        .store
        .find_user_by_email(&registration.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(USER_EXISTS.to_string()));
    }

    let password = PasswordHash::from_plaintext(registration.password).await?;
    let user = state
        .store
        .create_user(NewUser {
            email: registration.email,
            name: registration.name,
            password,
        })
        .await?;

    log::info!("Registered user {}", user.id);
    let token = state.tokens.issue(user.id)?;
    Ok((StatusCode::CREATED, token_body(token)))
}

pub async fn login(
    State(state): State<AppState>,
    Validated(login): Validated<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .store
        .find_user_by_email(&login.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.password_hash.verify(login.password).await {
        log::warn!("Failed login for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    Ok(token_body(state.tokens.issue(user.id)?))
}

pub async fn google(
    State(state): State<AppState>,
    Validated(credential): Validated<GoogleRequest>,
) -> Result<Json<Value>, AppError> {
    let Some(verifier) = state.identity.as_ref() else {
        log::warn!("Google sign-in attempted but no client id is configured");
        return Err(AppError::SocialAuthFailed);
    };

    let identity = verifier.verify(&credential).await.map_err(|e| {
        log::warn!("Google auth error: {}", e);
        AppError::SocialAuthFailed
    })?;

    let user = match state.store.find_user_by_email(&identity.email).await? {
        Some(user) => user,
        None => {
            let created = state
                .store
                .create_user(NewUser {
                    email: identity.email.clone(),
                    name: identity.name,
                    password: PasswordHash::none(),
                })
                .await;

            match created {
                Ok(user) => {
                    log::info!("Created user {} from Google sign-in", user.id);
                    user
                }
                // Lost a race with a concurrent sign-in for the same email.
                Err(StoreError::Conflict(_)) => state
                    .store
                    .find_user_by_email(&identity.email)
                    .await?
                    .ok_or(AppError::SocialAuthFailed)?,
                Err(e) => return Err(e.into()),
            }
        }
    };

    Ok(token_body(state.tokens.issue(user.id)?))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.store.list_users().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id, Entity::User)?;
    Ok(Json(state.store.get_user(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Validated(update): Validated<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id, Entity::User)?;

    let password = match update.password {
        Some(password) => Some(PasswordHash::from_plaintext(password).await?),
        None => None,
    };
    let changes = UserChanges {
        email: update.email,
        name: update.name,
        password,
    };

    Ok(Json(state.store.update_user(id, changes).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, Entity::User)?;
    let user = state.store.delete_user(id).await?;

    Ok(Json(json!({
        "message": "User deleted successfully",
        "user": user,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_message<S: Schema>(body: &str) -> String {
        let payload: S = serde_json::from_str(body).unwrap();
        match payload.validate() {
            Err(AppError::Validation(message)) => message,
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("payload unexpectedly passed validation"),
        }
    }

    #[test]
    fn registration_checks_fields_in_order() {
        assert_eq!(
            validation_message::<RegisterRequest>(r#"{"name":"A","password":"secret1"}"#),
            "\"email\" is required"
        );
        assert_eq!(
            validation_message::<RegisterRequest>(
                r#"{"email":"not-an-email","name":"A","password":"secret1"}"#
            ),
            "\"email\" must be a valid email"
        );
        assert_eq!(
            validation_message::<RegisterRequest>(r#"{"email":"a@x.com","name":"A","password":"12345"}"#),
            "\"password\" length must be at least 6 characters long"
        );
    }

    #[test]
    fn valid_registration_passes() {
        let payload: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@x.com","name":"A","password":"secret1"}"#).unwrap();
        let registration = payload.validate().unwrap();
        assert_eq!(registration.email, "a@x.com");
        assert_eq!(registration.name, "A");
    }

    #[test]
    fn update_allows_partial_bodies() {
        let payload: UpdateUserRequest = serde_json::from_str(r#"{"name":"B"}"#).unwrap();
        let update = payload.validate().unwrap();
        assert_eq!(update.name.as_deref(), Some("B"));
        assert!(update.email.is_none() && update.password.is_none());

        assert_eq!(
            validation_message::<UpdateUserRequest>(r#"{"password":"abc"}"#),
            "\"password\" length must be at least 6 characters long"
        );
    }

    #[test]
    fn unknown_fields_fail_to_parse() {
        assert!(serde_json::from_str::<GoogleRequest>(r#"{"credential":"x","extra":1}"#).is_err());
    }
}
