//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas. Los detalles internos
//! se registran en el log; al cliente solo le llega un mensaje genérico.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::normalizer_service::NormalizeError;
use crate::services::sequence_allocator::AllocationError;
use crate::store::StoreError;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Contention: allocator gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Código estable que viaja en la respuesta JSON
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            AppError::Parse(_) => "PARSE_ERROR",
            AppError::Contention { .. } => "CONTENTION",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::UnsupportedFormat(ext) => AppError::UnsupportedFormat(ext),
            NormalizeError::Parse(msg) => AppError::Parse(msg),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Contention { attempts } => AppError::Contention { attempts },
            AllocationError::Store(e) => AppError::Persistence(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Persistence(err.to_string())
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (error, message, details) = match &self {
            AppError::Validation(e) => {
                warn!("⚠️ Validación fallida: {}", e);
                (
                    "Validation Error",
                    "The provided data is invalid",
                    // Los nombres de campo son input del propio cliente
                    Some(json!({ "fields": e.field_errors().keys().collect::<Vec<_>>() })),
                )
            }
            AppError::UnsupportedFormat(ext) => {
                warn!("⚠️ Formato no soportado: '{}'", ext);
                ("Unsupported Format", "The uploaded file format is not supported", None)
            }
            AppError::Parse(msg) => {
                warn!("⚠️ Archivo no parseable: {}", msg);
                ("Parse Error", "The uploaded file could not be parsed", None)
            }
            AppError::Contention { attempts } => {
                error!("❌ Contención en el contador tras {} intentos", attempts);
                ("Service Unavailable", "The service is busy. Please try again later", None)
            }
            AppError::Persistence(msg) => {
                error!("❌ Error de persistencia: {}", msg);
                ("Persistence Error", "An error occurred while saving the route", None)
            }
            AppError::NotFound(msg) => {
                warn!("🔍 Recurso no encontrado: {}", msg);
                ("Not Found", "The requested resource was not found", None)
            }
            AppError::Internal(msg) => {
                error!("❌ Error interno: {}", msg);
                ("Internal Server Error", "An unexpected error occurred", None)
            }
        };

        let body = ErrorResponse {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
            details,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.add_param("field".into(), &field);
    error.add_param("message".into(), &message);

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}
