//! Request validation.
//!
//! Each request body type implements [`Schema`], which turns the loosely
//! typed payload into the input a handler works with. Handlers take
//! [`Validated<S>`] as an extractor, so a route cannot run without its
//! schema having passed.
//!
//! Payload fields are `Option`s so that a missing field is reported by name
//! rather than as a generic deserialization failure. A field of the wrong
//! JSON type or a field the schema does not know is reported by name too.
//! Only the first violation is reported.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{error::AppError, utils};

pub trait Schema: DeserializeOwned {
    type Output;

    fn validate(self) -> Result<Self::Output, AppError>;
}

/// Extractor yielding the validated output of schema `S`.
pub struct Validated<S: Schema>(pub S::Output);

impl<S, St> FromRequest<St> for Validated<S>
where
    S: Schema + Send,
    St: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        // Content-type and syntax errors keep the extractor's own text.
        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        decode::<S>(body)?.validate().map(Validated)
    }
}

/// Deserializes a parsed body into `S`, naming the offending field on failure.
pub fn decode<S: DeserializeOwned>(body: Value) -> Result<S, AppError> {
    serde_path_to_error::deserialize(body).map_err(|err| {
        let detail = err.inner().to_string();
        if let Some(field) = unknown_field(&detail) {
            return violation(field, "is not allowed");
        }

        let path = err.path().to_string();
        let field = if path == "." { "value" } else { path.as_str() };
        violation(field, &format!("must be {}", expected_kind(&detail)))
    })
}

/// Field name out of serde's "unknown field `x`, expected ..." message.
fn unknown_field(detail: &str) -> Option<&str> {
    let rest = detail.strip_prefix("unknown field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

/// Joi-style type name for serde's "..., expected <what>" message.
fn expected_kind(detail: &str) -> &'static str {
    let expected = detail
        .rsplit_once("expected ")
        .map(|(_, what)| what)
        .unwrap_or_default();

    let numeric = ["i", "u", "f"].iter().any(|prefix| {
        expected
            .strip_prefix(prefix)
            .is_some_and(|bits| !bits.is_empty() && bits.chars().all(|c| c.is_ascii_digit()))
    });

    if numeric {
        "a number"
    } else if expected.starts_with("a string") {
        "a string"
    } else if expected.starts_with("a boolean") {
        "a boolean"
    } else if expected.starts_with("struct") || expected.starts_with("a map") {
        "of type object"
    } else {
        "a valid value"
    }
}

fn violation(field: &str, rule: &str) -> AppError {
    AppError::Validation(format!("\"{field}\" {rule}"))
}

pub fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| violation(field, "is required"))
}

/// A present string must not be empty.
pub fn non_empty(value: String, field: &str) -> Result<String, AppError> {
    if value.trim().is_empty() {
        return Err(violation(field, "is not allowed to be empty"));
    }
    Ok(value)
}

pub fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    non_empty(required(value, field)?, field)
}

pub fn optional_text(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    value.map(|v| non_empty(v, field)).transpose()
}

pub fn at_least(value: i32, floor: i32, field: &str) -> Result<i32, AppError> {
    if value < floor {
        return Err(violation(
            field,
            &format!("must be greater than or equal to {floor}"),
        ));
    }
    Ok(value)
}

pub fn min_length(value: String, min: usize, field: &str) -> Result<String, AppError> {
    if value.chars().count() < min {
        return Err(violation(
            field,
            &format!("length must be at least {min} characters long"),
        ));
    }
    Ok(value)
}

pub fn email(value: String, field: &str) -> Result<String, AppError> {
    let value = non_empty(value, field)?;
    if !is_email(&value) {
        return Err(violation(field, "must be a valid email"));
    }
    Ok(value)
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

pub fn date(value: String, field: &str) -> Result<NaiveDate, AppError> {
    utils::parse_date(&value).ok_or_else(|| violation(field, "must be a valid date"))
}

pub fn date_time(value: String, field: &str) -> Result<DateTime<Utc>, AppError> {
    utils::parse_date_time(&value).ok_or_else(|| violation(field, "must be a valid date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: AppError) -> String {
        match err {
            AppError::Validation(message) => message,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_named() {
        let err = required::<String>(None, "email").unwrap_err();
        assert_eq!(message(err), "\"email\" is required");
    }

    #[test]
    fn blank_strings_are_rejected() {
        assert!(required_text(Some("  ".to_string()), "name").is_err());
        assert!(optional_text(Some(String::new()), "notes").is_err());
        assert_eq!(optional_text(None, "notes").unwrap(), None);
    }

    #[test]
    fn minimums_are_inclusive() {
        assert_eq!(at_least(0, 0, "quantity").unwrap(), 0);
        let err = at_least(0, 1, "quantity").unwrap_err();
        assert_eq!(
            message(err),
            "\"quantity\" must be greater than or equal to 1"
        );
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(min_length("secret".to_string(), 6, "password").is_ok());
        assert!(min_length("short".to_string(), 6, "password").is_err());
    }

    #[test]
    fn email_shapes() {
        for ok in ["a@x.com", "first.last@pharmacy.example.org"] {
            assert!(is_email(ok), "{ok} should be accepted");
        }
        for bad in ["a@x", "@x.com", "a@@x.com", "a x@x.com", "a@x..com", "plain"] {
            assert!(!is_email(bad), "{bad} should be rejected");
        }
    }

    #[allow(dead_code)]
    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "camelCase", deny_unknown_fields)]
    struct Sample {
        quantity: Option<i32>,
        taken_by: Option<String>,
    }

    fn decode_message(body: Value) -> String {
        message(decode::<Sample>(body).unwrap_err())
    }

    #[test]
    fn wrong_type_names_the_field() {
        assert_eq!(
            decode_message(serde_json::json!({ "quantity": "ten" })),
            "\"quantity\" must be a number"
        );
        assert_eq!(
            decode_message(serde_json::json!({ "takenBy": 7 })),
            "\"takenBy\" must be a string"
        );
    }

    #[test]
    fn unknown_field_is_not_allowed() {
        assert_eq!(
            decode_message(serde_json::json!({ "extra": 1 })),
            "\"extra\" is not allowed"
        );
    }

    #[test]
    fn body_must_be_an_object() {
        assert_eq!(
            decode_message(serde_json::json!("a string body")),
            "\"value\" must be of type object"
        );
        assert!(decode::<Sample>(serde_json::json!({ "quantity": null })).is_ok());
    }

    #[test]
    fn dates_report_their_field() {
        let err = date("31/12/2024".to_string(), "birthDate").unwrap_err();
        assert_eq!(message(err), "\"birthDate\" must be a valid date");
        assert!(date_time("2024-12-31T08:00:00Z".to_string(), "withdrawalDate").is_ok());
    }
}
