//! Error handling for the warehouse dispatch platform
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // Business logic errors
    #[error("Bagged unit {0} was already dispatched")]
    AlreadyDispatched(String),

    #[error("Bagged unit {0} already belongs to a daily report")]
    AlreadyAssociated(String),

    #[error("Insufficient stock for {item}: have {available}, need {requested}")]
    InsufficientStock {
        item: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Dispatch of {requested} {product} exceeds remaining {remaining}")]
    OverDispatch {
        product: String,
        remaining: Decimal,
        requested: Decimal,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("No free code left for prefix {0}")]
    CodeSpaceExhausted(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            field: field.into(),
            message_es: format!("Dato inválido: {}", message),
            message,
        }
    }

    /// Stable machine-readable code, also used in tests
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::AlreadyDispatched(_) => "ALREADY_DISPATCHED",
            AppError::AlreadyAssociated(_) => "ALREADY_ASSOCIATED",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::OverDispatch { .. } => "OVER_DISPATCH",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::CodeSpaceExhausted(_) => "CODE_SPACE_EXHAUSTED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidToken | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry(_)
            | AppError::AlreadyDispatched(_)
            | AppError::AlreadyAssociated(_)
            | AppError::InsufficientStock { .. }
            | AppError::OverDispatch { .. } => StatusCode::CONFLICT,
            AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CodeSpaceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        let (message_en, message_es, field) = match self {
            AppError::InvalidToken => (
                "Invalid token".to_string(),
                "Token inválido".to_string(),
                None,
            ),
            AppError::InsufficientPermissions => (
                "You do not have permission to perform this action".to_string(),
                "No tiene permiso para realizar esta acción".to_string(),
                None,
            ),
            AppError::Unauthorized(msg) => (msg.clone(), "No autorizado".to_string(), None),
            AppError::Validation { field, message, message_es } => {
                (message.clone(), message_es.clone(), Some(field.clone()))
            }
            AppError::ValidationError(msg) => {
                (msg.clone(), format!("Dato inválido: {}", msg), None)
            }
            AppError::NotFound(resource) => (
                format!("{} not found", resource),
                format!("No se encontró {}", resource),
                None,
            ),
            AppError::DuplicateEntry(field) => (
                format!("A record with this {} already exists", field),
                format!("Ya existe un registro con este {}", field),
                Some(field.clone()),
            ),
            AppError::AlreadyDispatched(code) => (
                format!("Bagged unit {} was already dispatched", code),
                format!("El bolsón {} ya fue despachado", code),
                Some("unit_code".to_string()),
            ),
            AppError::AlreadyAssociated(code) => (
                format!("Bagged unit {} already belongs to a daily report", code),
                format!("El bolsón {} ya está asociado a un parte diario", code),
                Some("unit_code".to_string()),
            ),
            AppError::InsufficientStock { item, available, requested } => (
                format!("Insufficient stock for {}: have {}, need {}", item, available, requested),
                format!("Stock insuficiente para {}: hay {}, se necesitan {}", item, available, requested),
                Some("quantity".to_string()),
            ),
            AppError::OverDispatch { product, remaining, requested } => (
                format!(
                    "Dispatching {} of {} exceeds the remaining {}",
                    requested, product, remaining
                ),
                format!(
                    "Despachar {} de {} supera lo pendiente ({})",
                    requested, product, remaining
                ),
                Some("product".to_string()),
            ),
            AppError::InvalidStateTransition(msg) => (
                msg.clone(),
                format!("No se puede cambiar el estado: {}", msg),
                None,
            ),
            AppError::CodeSpaceExhausted(prefix) => (
                format!("Could not allocate a free {} code", prefix),
                format!("No se pudo generar un código {} libre", prefix),
                None,
            ),
            AppError::Configuration(msg) => (
                format!("Configuration error: {}", msg),
                format!("Error de configuración: {}", msg),
                None,
            ),
            AppError::DatabaseError(_) => (
                "A database error occurred".to_string(),
                "Ocurrió un error en la base de datos".to_string(),
                None,
            ),
            AppError::Internal(msg) => (
                msg.clone(),
                "Error interno del servidor".to_string(),
                None,
            ),
            AppError::InternalError(_) => (
                "An internal server error occurred".to_string(),
                "Error interno del servidor".to_string(),
                None,
            ),
        };

        ErrorDetail {
            code: self.code().to_string(),
            message_en,
            message_es,
            field,
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Invalid { field, message } => AppError::validation(field, message),
            DomainError::InsufficientStock { item, available, requested } => {
                AppError::InsufficientStock { item, available, requested }
            }
            DomainError::OverDispatch { product, remaining, requested } => {
                AppError::OverDispatch { product, remaining, requested }
            }
            DomainError::MissingOrderLine(product) => {
                AppError::NotFound(format!("Order line for product {}", product))
            }
            DomainError::InvalidTransition { from, to } => {
                AppError::InvalidStateTransition(format!("{} -> {}", from, to))
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_default();
        AppError::validation(field, errors.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_conflicts() {
        let err: AppError = DomainError::InsufficientStock {
            item: "BIEN-000001".into(),
            available: Decimal::from(2),
            requested: Decimal::from(3),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let err: AppError = DomainError::MissingOrderLine("A".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_detail_carries_field() {
        let err: AppError = DomainError::invalid("seal", "seal is required").into();
        let detail = err.detail();
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert_eq!(detail.field.as_deref(), Some("seal"));
        assert!(detail.message_es.contains("seal is required"));
    }

    #[test]
    fn test_already_dispatched_is_conflict() {
        let err = AppError::AlreadyDispatched("240705140301".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.detail().message_es.contains("240705140301"));
    }
}
