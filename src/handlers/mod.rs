use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{db::Entity, error::AppError};

pub mod auth;
pub mod doctors;
pub mod medications;
pub mod patients;
pub mod stocks;

/// Parses a path id. Anything that is not a UUID cannot name a record, so it
/// is reported as a miss on `entity`.
pub fn parse_id(raw: &str, entity: Entity) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(entity))
}

pub fn deleted(entity: Entity) -> Json<Value> {
    Json(json!({ "message": format!("{entity} deleted") }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_a_miss() {
        assert!(matches!(
            parse_id("64b7f0c2e4b0a1a2b3c4d5e6", Entity::Patient),
            Err(AppError::NotFound(Entity::Patient))
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), Entity::Patient).unwrap(), id);
    }

    #[test]
    fn deletion_message_names_the_record() {
        assert_eq!(
            deleted(Entity::Withdrawal).0,
            json!({ "message": "Stock record deleted" })
        );
    }
}
