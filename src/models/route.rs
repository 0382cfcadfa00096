//! Modelo de Route
//!
//! Este módulo contiene el registro de ruta de ônibus tal como se persiste,
//! su identificador y la metadata validada del formulario.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identificador de una ruta
///
/// `Sequence` sale del contador transaccional; `Opaque` lo genera el store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteId {
    Sequence(u64),
    Opaque(String),
}

impl RouteId {
    /// Interpreta un id de la URL: los enteros se tratan como secuencia
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => RouteId::Sequence(n),
            Err(_) => RouteId::Opaque(raw.to_string()),
        }
    }

    /// Clave de documento en el store (siempre texto)
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteId::Sequence(n) => write!(f, "{}", n),
            RouteId::Opaque(s) => f.write_str(s),
        }
    }
}

/// Metadata ya validada de una ruta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMetadata {
    pub operator: String,
    pub color_code: String,
    pub route_name: String,
    pub route_number: i32,
}

/// Registro de ruta - mapea al documento de la colección `routes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub operator: String,
    pub color_code: String,
    pub route_name: String,
    pub route_number: i32,
    /// FeatureCollection canónica, en texto
    pub geometry: String,
    pub created_at: DateTime<Utc>,
}

impl RouteRecord {
    pub fn new(metadata: RouteMetadata, geometry: String) -> Self {
        Self {
            operator: metadata.operator,
            color_code: metadata.color_code,
            route_name: metadata.route_name,
            route_number: metadata.route_number,
            geometry,
            created_at: Utc::now(),
        }
    }
}

/// Registro junto a su identificador, como lo devuelve la lectura
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRoute {
    pub id: RouteId,
    #[serde(flatten)]
    pub record: RouteRecord,
}
