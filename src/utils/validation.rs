//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! y conversión de tipos.

use validator::ValidationError;

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar y convertir texto a entero, sin coerciones silenciosas
///
/// Solo se toleran espacios alrededor; `"12abc"` o `"1.5"` fallan.
pub fn validate_integer(value: &str) -> Result<i32, ValidationError> {
    value.trim().parse::<i32>().map_err(|_| {
        let mut error = ValidationError::new("integer");
        error.add_param("value".into(), &value.to_string());
        error
    })
}

/// Validar que la extensión declarada tenga forma de extensión
pub fn validate_extension(value: &str) -> Result<(), ValidationError> {
    let ext = value.trim_start_matches('.');
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut error = ValidationError::new("extension");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("Acme").is_ok());
        assert!(validate_not_empty("").is_err());
        assert!(validate_not_empty("   ").is_err());
    }

    #[test]
    fn test_validate_integer() {
        assert_eq!(validate_integer("12").unwrap(), 12);
        assert_eq!(validate_integer(" 7 ").unwrap(), 7);
        assert_eq!(validate_integer("-3").unwrap(), -3);
        assert!(validate_integer("abc").is_err());
        assert!(validate_integer("12abc").is_err());
        assert!(validate_integer("1.5").is_err());
        assert!(validate_integer("").is_err());
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("kml").is_ok());
        assert!(validate_extension(".GeoJSON").is_ok());
        assert!(validate_extension("").is_err());
        assert!(validate_extension("tar.gz").is_err());
    }
}
