use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Service-wide error taxonomy. Every handler returns `Result<_, ApiError>`;
/// the `IntoResponse` impl is the single place status codes are assigned.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation failed")]
    Validation(BTreeMap<String, Vec<String>>),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    /// Single-field validation failure.
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::Validation(errors)
    }

    /// Validation failure listing every missing required field.
    pub fn missing_fields(fields: &[&str]) -> Self {
        let mut errors = BTreeMap::new();
        for field in fields {
            errors.insert(
                field.to_string(),
                vec![format!("The {field} field is required")],
            );
        }
        Self::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => serde_json::json!({
                "message": "The given data was invalid",
                "errors": errors,
            }),
            other => serde_json::json!({ "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound("Record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Database(format!("connection pool: {err}"))
    }
}

/// True when the error is the storage layer reporting a duplicate key. The
/// identifier retry loops treat this as the authoritative collision signal.
pub fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Map a unique violation on a user-visible column to a field-level
/// validation error; anything else passes through unchanged.
pub fn unique_violation_to_validation(err: DieselError, field: &str, message: &str) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::invalid(field, message)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::not_found("Ticket").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unauthorized("bad credentials".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("no access".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::missing_fields(&["title"]).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Database("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_fields_lists_every_field() {
        let err = ApiError::missing_fields(&["title", "description", "priority"]);
        match err {
            ApiError::Validation(map) => {
                assert_eq!(map.len(), 3);
                assert!(map["priority"][0].contains("priority"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err: ApiError = DieselError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
