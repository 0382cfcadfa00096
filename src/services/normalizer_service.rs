//! Normalización de formatos geoespaciales
//!
//! Convierte los bytes subidos más la extensión declarada en el texto
//! canónico que se guarda: una FeatureCollection GeoJSON. Función pura,
//! sin acceso a disco ni al store.

use geojson::{Feature, FeatureCollection, GeoJson, JsonValue};
use std::fmt;
use thiserror::Error;

use super::kml_converter::kml_to_feature_collection;

/// Errores de normalización
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unsupported format '{0}'")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Parse(String),
}

/// Formatos reconocidos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoFormat {
    GeoJson,
    Kml,
}

impl GeoFormat {
    /// Reconoce la extensión sin distinguir mayúsculas; el punto inicial es opcional
    pub fn from_extension(extension: &str) -> Result<Self, NormalizeError> {
        let ext = extension.trim().trim_start_matches('.');
        if ext.eq_ignore_ascii_case("geojson") {
            Ok(GeoFormat::GeoJson)
        } else if ext.eq_ignore_ascii_case("kml") {
            Ok(GeoFormat::Kml)
        } else {
            Err(NormalizeError::UnsupportedFormat(ext.to_string()))
        }
    }
}

impl fmt::Display for GeoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoFormat::GeoJson => f.write_str("geojson"),
            GeoFormat::Kml => f.write_str("kml"),
        }
    }
}

fn strip_bom(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw)
}

/// Colección de un único feature
fn single_feature(feature: Feature) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    }
}

/// Valida GeoJSON; una FeatureCollection se devuelve tal como llegó (mismo
/// árbol JSON), un Feature o una geometría suelta se envuelven en una
/// colección de un elemento
fn parse_geojson(raw: &[u8]) -> Result<JsonValue, NormalizeError> {
    let value: JsonValue = serde_json::from_slice(raw)
        .map_err(|e| NormalizeError::Parse(format!("invalid JSON: {}", e)))?;
    let parsed = GeoJson::from_json_value(value.clone())
        .map_err(|e| NormalizeError::Parse(format!("invalid GeoJSON: {}", e)))?;

    let wrapped = match parsed {
        GeoJson::FeatureCollection(_) => return Ok(value),
        GeoJson::Feature(feature) => single_feature(feature),
        GeoJson::Geometry(geometry) => single_feature(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }),
    };
    to_json(&wrapped)
}

fn to_json(collection: &FeatureCollection) -> Result<JsonValue, NormalizeError> {
    serde_json::to_value(collection)
        .map_err(|e| NormalizeError::Parse(format!("cannot serialize feature collection: {}", e)))
}

/// Normaliza el archivo a una FeatureCollection GeoJSON en texto
///
/// Una extensión no reconocida falla antes de mirar el contenido.
pub fn normalize(raw: &[u8], extension: &str) -> Result<String, NormalizeError> {
    let format = GeoFormat::from_extension(extension)?;
    let raw = strip_bom(raw);

    let value = match format {
        GeoFormat::GeoJson => parse_geojson(raw)?,
        GeoFormat::Kml => to_json(&kml_to_feature_collection(raw)?)?,
    };
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r##"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[-46.63, -23.55], [-46.64, -23.56]]},
                "properties": {"name": "Linha 12", "cor": "#FF0000"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-46.63, -23.55, 760.0]},
                "properties": null
            }
        ],
        "crs": {"type": "name", "properties": {"name": "EPSG:4326"}}
    }"##;

    fn as_collection(text: &str) -> FeatureCollection {
        match text.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            other => panic!("not a collection: {other:?}"),
        }
    }

    #[test]
    fn test_extension_matching() {
        assert_eq!(GeoFormat::from_extension("geojson"), Ok(GeoFormat::GeoJson));
        assert_eq!(GeoFormat::from_extension(".GeoJSON"), Ok(GeoFormat::GeoJson));
        assert_eq!(GeoFormat::from_extension("KML"), Ok(GeoFormat::Kml));
        assert_eq!(
            GeoFormat::from_extension("txt"),
            Err(NormalizeError::UnsupportedFormat("txt".into()))
        );
        assert!(GeoFormat::from_extension("json").is_err());
        assert!(GeoFormat::from_extension("kmz").is_err());
    }

    #[test]
    fn test_geojson_identity() {
        let normalized = normalize(COLLECTION.as_bytes(), "geojson").unwrap();
        assert_eq!(as_collection(&normalized), as_collection(COLLECTION));
        // miembros ajenos al estándar se conservan
        assert!(normalized.contains("EPSG:4326"));
    }

    #[test]
    fn test_geojson_collection_keeps_integer_coordinates() {
        let input = r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":null}]}"#;
        let normalized = normalize(input.as_bytes(), "geojson").unwrap();

        let expected: serde_json::Value = serde_json::from_str(input).unwrap();
        let actual: serde_json::Value = serde_json::from_str(&normalized).unwrap();
        assert_eq!(actual, expected);
        assert!(normalized.contains("[1,2]"));
    }

    #[test]
    fn test_unsupported_extension_never_parses() {
        // Contenido inválido en cualquier formato: solo importa la extensión
        let err = normalize(b"\x00\x01 not even text", "txt").unwrap_err();
        assert_eq!(err, NormalizeError::UnsupportedFormat("txt".into()));
    }

    #[test]
    fn test_truncated_geojson() {
        let truncated = &COLLECTION[..COLLECTION.len() / 2];
        let err = normalize(truncated.as_bytes(), "geojson").unwrap_err();
        assert!(matches!(err, NormalizeError::Parse(_)));
    }

    #[test]
    fn test_non_geojson_json() {
        let err = normalize(br#"{"hello": "world"}"#, "geojson").unwrap_err();
        assert!(matches!(err, NormalizeError::Parse(_)));
    }

    #[test]
    fn test_single_feature_is_wrapped() {
        let feature = r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1.0,2.0]},"properties":{}}"#;
        let fc = as_collection(&normalize(feature.as_bytes(), "geojson").unwrap());
        assert_eq!(fc.features.len(), 1);
    }

    #[test]
    fn test_bare_geometry_is_wrapped() {
        let geometry = r#"{"type":"LineString","coordinates":[[1.0,2.0],[3.0,4.0]]}"#;
        let fc = as_collection(&normalize(geometry.as_bytes(), "geojson").unwrap());
        assert_eq!(fc.features.len(), 1);
        assert!(fc.features[0].properties.is_none());
    }

    #[test]
    fn test_kml_with_bom() {
        let kml = "\u{feff}<kml><Placemark><Point><coordinates>1,2</coordinates></Point></Placemark></kml>";
        let fc = as_collection(&normalize(kml.as_bytes(), "kml").unwrap());
        assert_eq!(fc.features.len(), 1);
    }

    #[test]
    fn test_kml_output_is_geojson_text() {
        let kml = "<kml><Placemark><name>P</name><Point><coordinates>-46.6,-23.5,0</coordinates></Point></Placemark></kml>";
        let text = normalize(kml.as_bytes(), "kml").unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["geometry"]["coordinates"][0], -46.6);
        assert_eq!(value["features"][0]["properties"]["name"], "P");
    }
}
