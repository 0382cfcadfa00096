use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::route::{RouteId, RouteMetadata};
use crate::utils::errors::AppError;
use crate::utils::validation::{validate_integer, validate_not_empty};

// Campos del formulario tal como llegan (nombres originales en portugués)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RouteSubmission {
    #[serde(rename = "companhia")]
    #[validate(custom = "validate_not_empty")]
    pub operator: String,

    #[serde(rename = "cor")]
    #[validate(custom = "validate_not_empty")]
    pub color_code: String,

    #[serde(rename = "rota")]
    #[validate(custom = "validate_not_empty")]
    pub route_name: String,

    #[serde(rename = "nrota")]
    #[validate(custom = "validate_route_number")]
    pub route_number: String,
}

fn validate_route_number(value: &str) -> Result<(), validator::ValidationError> {
    validate_integer(value).map(|_| ())
}

impl RouteSubmission {
    /// Valida todos los campos y convierte `nrota` a entero
    pub fn into_metadata(self) -> Result<RouteMetadata, AppError> {
        self.validate()?;

        let route_number = validate_integer(&self.route_number).map_err(|e| {
            let mut errors = validator::ValidationErrors::new();
            errors.add("nrota", e);
            AppError::Validation(errors)
        })?;

        Ok(RouteMetadata {
            operator: self.operator.trim().to_string(),
            color_code: self.color_code.trim().to_string(),
            route_name: self.route_name.trim().to_string(),
            route_number,
        })
    }
}

// Response de ingesta
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: RouteId,
}

// Response genérica
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}
