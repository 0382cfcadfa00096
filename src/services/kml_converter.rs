//! Conversión KML → GeoJSON
//!
//! Recorre el documento con el lector de eventos de `quick-xml` y emite un
//! `Feature` por cada `Placemark`, en orden de documento. Las coordenadas se
//! copian tal cual (`lon,lat[,alt]`), sin reordenar puntos ni anillos.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Position, Value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::normalizer_service::NormalizeError;

fn parse_error(message: impl Into<String>) -> NormalizeError {
    NormalizeError::Parse(message.into())
}

/// Geometría KML en construcción
#[derive(Debug)]
enum GeometryFrame {
    Point(Vec<Position>),
    LineString(Vec<Position>),
    LinearRing(Vec<Position>),
    Polygon {
        outer: Option<Vec<Position>>,
        inner: Vec<Vec<Position>>,
    },
    Multi(Vec<Geometry>),
}

#[derive(Debug, Default)]
struct PlacemarkBuilder {
    name: Option<String>,
    description: Option<String>,
    extended: Vec<(String, String)>,
    data_name: Option<String>,
    geometry: Option<Geometry>,
}

impl PlacemarkBuilder {
    fn into_feature(self) -> Feature {
        let mut properties = JsonObject::new();
        if let Some(name) = self.name {
            properties.insert("name".to_string(), JsonValue::String(name));
        }
        if let Some(description) = self.description {
            properties.insert("description".to_string(), JsonValue::String(description));
        }
        for (key, value) in self.extended {
            properties.entry(key).or_insert(JsonValue::String(value));
        }

        Feature {
            bbox: None,
            geometry: self.geometry,
            id: None,
            properties: if properties.is_empty() { None } else { Some(properties) },
            foreign_members: None,
        }
    }
}

#[derive(Debug, Default)]
struct KmlParser {
    path: Vec<String>,
    root_seen: bool,
    text: String,
    placemark: Option<PlacemarkBuilder>,
    geometries: Vec<GeometryFrame>,
    features: Vec<Feature>,
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, NormalizeError> {
    let attr = element
        .try_get_attribute(key)
        .map_err(|e| parse_error(format!("invalid attribute: {}", e)))?;
    match attr {
        Some(attr) => attr
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|e| parse_error(format!("invalid attribute value: {}", e))),
        None => Ok(None),
    }
}

/// Parsea el contenido de `<coordinates>`: tuplas separadas por espacios,
/// componentes separados por comas
fn parse_coordinates(text: &str) -> Result<Vec<Position>, NormalizeError> {
    text.split_whitespace()
        .map(|tuple| {
            let position = tuple
                .split(',')
                .map(|component| component.parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|_| parse_error(format!("invalid coordinate tuple '{}'", tuple)))?;
            if position.len() < 2 {
                return Err(parse_error(format!(
                    "coordinate tuple '{}' needs at least longitude and latitude",
                    tuple
                )));
            }
            Ok(position)
        })
        .collect()
}

impl KmlParser {
    fn parent(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    fn start(&mut self, element: &BytesStart<'_>) -> Result<(), NormalizeError> {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();

        if self.path.is_empty() {
            if self.root_seen {
                return Err(parse_error("content after the root element"));
            }
            if name != "kml" {
                return Err(parse_error(format!("expected <kml> root element, found <{}>", name)));
            }
            self.root_seen = true;
        }

        self.text.clear();

        if name == "Placemark" {
            if self.placemark.is_some() {
                return Err(parse_error("nested <Placemark>"));
            }
            self.placemark = Some(PlacemarkBuilder::default());
        } else if let Some(placemark) = self.placemark.as_mut() {
            match name.as_str() {
                "Point" => self.geometries.push(GeometryFrame::Point(Vec::new())),
                "LineString" => self.geometries.push(GeometryFrame::LineString(Vec::new())),
                "LinearRing" => self.geometries.push(GeometryFrame::LinearRing(Vec::new())),
                "Polygon" => self.geometries.push(GeometryFrame::Polygon {
                    outer: None,
                    inner: Vec::new(),
                }),
                "MultiGeometry" => self.geometries.push(GeometryFrame::Multi(Vec::new())),
                "Data" | "SimpleData" => placemark.data_name = attribute(element, "name")?,
                _ => {}
            }
        }

        self.path.push(name);
        Ok(())
    }

    fn text(&mut self, content: &str) {
        self.text.push_str(content);
    }

    fn end(&mut self, name: &str) -> Result<(), NormalizeError> {
        match self.path.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(parse_error(format!("expected </{}>, found </{}>", open, name)));
            }
            None => return Err(parse_error(format!("unexpected </{}>", name))),
        }

        let text = std::mem::take(&mut self.text);
        if self.placemark.is_none() {
            return Ok(());
        }

        match name {
            "Placemark" => {
                if let Some(placemark) = self.placemark.take() {
                    self.geometries.clear();
                    self.features.push(placemark.into_feature());
                }
            }
            "name" | "description" if self.parent() == Some("Placemark") => {
                if let Some(placemark) = self.placemark.as_mut() {
                    let value = Some(text.trim().to_string());
                    if name == "name" {
                        placemark.name = value;
                    } else {
                        placemark.description = value;
                    }
                }
            }
            "value" if self.parent() == Some("Data") => self.push_extended(text),
            "SimpleData" => self.push_extended(text),
            "coordinates" => {
                let positions = parse_coordinates(&text)?;
                match self.geometries.last_mut() {
                    Some(GeometryFrame::Point(coords))
                    | Some(GeometryFrame::LineString(coords))
                    | Some(GeometryFrame::LinearRing(coords)) => *coords = positions,
                    _ => {}
                }
            }
            "Point" | "LineString" | "LinearRing" | "Polygon" | "MultiGeometry" => {
                self.close_geometry(name)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn push_extended(&mut self, text: String) {
        if let Some(placemark) = self.placemark.as_mut() {
            if let Some(key) = placemark.data_name.take() {
                placemark.extended.push((key, text.trim().to_string()));
            }
        }
    }

    fn close_geometry(&mut self, name: &str) -> Result<(), NormalizeError> {
        let frame = self
            .geometries
            .pop()
            .ok_or_else(|| parse_error(format!("unbalanced <{}>", name)))?;

        let value = match frame {
            GeometryFrame::Point(mut coords) => {
                if coords.len() != 1 {
                    return Err(parse_error(format!(
                        "<Point> needs exactly one coordinate tuple, found {}",
                        coords.len()
                    )));
                }
                Value::Point(coords.remove(0))
            }
            GeometryFrame::LineString(coords) => Value::LineString(coords),
            GeometryFrame::LinearRing(coords) => {
                if let Some(GeometryFrame::Polygon { outer, inner }) = self.geometries.last_mut() {
                    match self.path.last().map(String::as_str) {
                        Some("outerBoundaryIs") => *outer = Some(coords),
                        Some("innerBoundaryIs") => inner.push(coords),
                        _ => return Err(parse_error("<LinearRing> outside a polygon boundary")),
                    }
                    return Ok(());
                }
                Value::LineString(coords)
            }
            GeometryFrame::Polygon { outer, inner } => {
                let outer = outer.ok_or_else(|| parse_error("<Polygon> without outerBoundaryIs"))?;
                let mut rings = Vec::with_capacity(inner.len() + 1);
                rings.push(outer);
                rings.extend(inner);
                Value::Polygon(rings)
            }
            GeometryFrame::Multi(geometries) => Value::GeometryCollection(geometries),
        };

        self.attach(Geometry::new(value))
    }

    /// Entrega una geometría terminada a su contenedor
    fn attach(&mut self, geometry: Geometry) -> Result<(), NormalizeError> {
        match self.geometries.last_mut() {
            Some(GeometryFrame::Multi(children)) => {
                children.push(geometry);
                Ok(())
            }
            Some(_) => Err(parse_error("geometry nested inside a non-collection geometry")),
            None => match self.placemark.as_mut() {
                Some(placemark) if placemark.geometry.is_none() => {
                    placemark.geometry = Some(geometry);
                    Ok(())
                }
                Some(_) => Err(parse_error("<Placemark> with more than one geometry")),
                None => Ok(()),
            },
        }
    }

    fn finish(self) -> Result<FeatureCollection, NormalizeError> {
        if let Some(open) = self.path.last() {
            return Err(parse_error(format!("truncated document: <{}> is never closed", open)));
        }
        if !self.root_seen {
            return Err(parse_error("document has no <kml> root element"));
        }
        Ok(FeatureCollection {
            bbox: None,
            features: self.features,
            foreign_members: None,
        })
    }
}

/// Convierte un documento KML en una FeatureCollection
pub fn kml_to_feature_collection(raw: &[u8]) -> Result<FeatureCollection, NormalizeError> {
    // Sin recorte por evento: el texto de un elemento se junta entero y se
    // recorta una sola vez al cerrarlo
    let mut reader = Reader::from_reader(raw);

    let mut parser = KmlParser::default();
    loop {
        let event = reader.read_event().map_err(|e| {
            parse_error(format!(
                "malformed KML near byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(element) => parser.start(&element)?,
            Event::Empty(element) => {
                parser.start(&element)?;
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                parser.end(&name)?;
            }
            Event::End(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                parser.end(&name)?;
            }
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| parse_error(format!("invalid text content: {}", e)))?;
                parser.text(&content);
            }
            Event::CData(data) => parser.text(&String::from_utf8_lossy(&data.into_inner())),
            Event::Eof => break,
            _ => {}
        }
    }

    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_PLACEMARK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Downtown Loop</name>
      <LineString>
        <coordinates>
          -46.6333,-23.5505,0 -46.6400,-23.5600,0
          -46.6500,-23.5700,0
        </coordinates>
      </LineString>
    </Placemark>
  </Document>
</kml>"#;

    fn convert(kml: &str) -> Result<FeatureCollection, NormalizeError> {
        kml_to_feature_collection(kml.as_bytes())
    }

    #[test]
    fn test_single_line_string() {
        let fc = convert(ONE_PLACEMARK).unwrap();
        assert_eq!(fc.features.len(), 1);

        let feature = &fc.features[0];
        assert_eq!(feature.property("name"), Some(&JsonValue::from("Downtown Loop")));
        assert!(feature.property("description").is_none());

        match &feature.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => assert_eq!(
                coords,
                &vec![
                    vec![-46.6333, -23.5505, 0.0],
                    vec![-46.6400, -23.5600, 0.0],
                    vec![-46.6500, -23.5700, 0.0],
                ]
            ),
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn test_feature_count_matches_placemarks_in_folders() {
        let kml = r#"<kml>
          <Document>
            <Folder><name>Ida</name>
              <Placemark><name>A</name><Point><coordinates>1,2</coordinates></Point></Placemark>
              <Placemark><name>B</name><Point><coordinates>3,4</coordinates></Point></Placemark>
            </Folder>
            <Folder><name>Volta</name>
              <Placemark><name>C</name><Point><coordinates>5,6,7</coordinates></Point></Placemark>
            </Folder>
          </Document>
        </kml>"#;
        let fc = convert(kml).unwrap();
        assert_eq!(fc.features.len(), 3);

        let names: Vec<_> = fc
            .features
            .iter()
            .map(|f| f.property("name").and_then(|v| v.as_str()).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        match &fc.features[2].geometry.as_ref().unwrap().value {
            Value::Point(p) => assert_eq!(p, &vec![5.0, 6.0, 7.0]),
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn test_polygon_with_hole() {
        let kml = r#"<kml><Placemark>
          <Polygon>
            <outerBoundaryIs><LinearRing><coordinates>0,0 10,0 10,10 0,10 0,0</coordinates></LinearRing></outerBoundaryIs>
            <innerBoundaryIs><LinearRing><coordinates>2,2 3,2 3,3 2,2</coordinates></LinearRing></innerBoundaryIs>
          </Polygon>
        </Placemark></kml>"#;
        let fc = convert(kml).unwrap();
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0][1], vec![10.0, 0.0]);
                assert_eq!(rings[1][0], vec![2.0, 2.0]);
            }
            other => panic!("unexpected geometry: {other:?}"),
        }
        assert!(fc.features[0].properties.is_none());
    }

    #[test]
    fn test_multi_geometry() {
        let kml = r#"<kml><Placemark>
          <MultiGeometry>
            <Point><coordinates>1,1</coordinates></Point>
            <LineString><coordinates>1,1 2,2</coordinates></LineString>
          </MultiGeometry>
        </Placemark></kml>"#;
        let fc = convert(kml).unwrap();
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::GeometryCollection(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0].value, Value::Point(_)));
                assert!(matches!(children[1].value, Value::LineString(_)));
            }
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn test_placemark_without_geometry_still_counts() {
        let kml = r#"<kml><Placemark><name>Terminal</name></Placemark><Placemark/></kml>"#;
        let fc = convert(kml).unwrap();
        assert_eq!(fc.features.len(), 2);
        assert!(fc.features[0].geometry.is_none());
        assert!(fc.features[1].properties.is_none());
    }

    #[test]
    fn test_description_cdata_and_extended_data() {
        let kml = r#"<kml><Placemark>
          <name>Linha &amp; Cia</name>
          <description><![CDATA[<b>Circular</b>]]></description>
          <ExtendedData>
            <Data name="sentido"><value>ida</value></Data>
          </ExtendedData>
          <Point><coordinates>-43.2,-22.9</coordinates></Point>
        </Placemark></kml>"#;
        let fc = convert(kml).unwrap();
        let feature = &fc.features[0];
        assert_eq!(feature.property("name"), Some(&JsonValue::from("Linha & Cia")));
        assert_eq!(feature.property("description"), Some(&JsonValue::from("<b>Circular</b>")));
        assert_eq!(feature.property("sentido"), Some(&JsonValue::from("ida")));
    }

    #[test]
    fn test_comment_inside_coordinates_keeps_tuples_apart() {
        let kml = r#"<kml><Placemark><LineString>
          <coordinates>1,2 <!-- gap --> 3,4</coordinates>
        </LineString></Placemark></kml>"#;
        let fc = convert(kml).unwrap();
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords, &vec![vec![1.0, 2.0], vec![3.0, 4.0]])
            }
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn test_mixed_text_and_cdata_keep_inner_spaces() {
        let kml = r#"<kml><Placemark>
          <description>Linha <![CDATA[<b>12</b>]]> centro</description>
        </Placemark></kml>"#;
        let fc = convert(kml).unwrap();
        assert_eq!(
            fc.features[0].property("description"),
            Some(&JsonValue::from("Linha <b>12</b> centro"))
        );
    }

    #[test]
    fn test_folder_name_is_not_a_placemark_property() {
        let kml = r#"<kml><Folder><name>Pasta</name>
          <Placemark><Point><coordinates>1,2</coordinates></Point></Placemark>
        </Folder></kml>"#;
        let fc = convert(kml).unwrap();
        assert!(fc.features[0].properties.is_none());
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let err = convert("<kml><Placemark><name>x</Placemark></kml>").unwrap_err();
        assert!(matches!(err, NormalizeError::Parse(_)));
    }

    #[test]
    fn test_truncated_document_fails() {
        let truncated = &ONE_PLACEMARK[..ONE_PLACEMARK.len() / 2];
        let err = convert(truncated).unwrap_err();
        assert!(matches!(err, NormalizeError::Parse(_)));
    }

    #[test]
    fn test_non_kml_root_fails() {
        let err = convert("<gpx><trk/></gpx>").unwrap_err();
        assert!(matches!(err, NormalizeError::Parse(_)));
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(convert("").unwrap_err(), NormalizeError::Parse(_)));
    }

    #[test]
    fn test_bad_coordinates_fail() {
        let kml = "<kml><Placemark><Point><coordinates>abc,def</coordinates></Point></Placemark></kml>";
        assert!(matches!(convert(kml).unwrap_err(), NormalizeError::Parse(_)));

        let kml = "<kml><Placemark><Point><coordinates>12</coordinates></Point></Placemark></kml>";
        assert!(matches!(convert(kml).unwrap_err(), NormalizeError::Parse(_)));
    }

    #[test]
    fn test_two_geometries_in_one_placemark_fail() {
        let kml = r#"<kml><Placemark>
          <Point><coordinates>1,2</coordinates></Point>
          <Point><coordinates>3,4</coordinates></Point>
        </Placemark></kml>"#;
        assert!(matches!(convert(kml).unwrap_err(), NormalizeError::Parse(_)));
    }

    #[test]
    fn test_prefixed_elements() {
        let kml = r#"<kml:kml xmlns:kml="http://www.opengis.net/kml/2.2">
          <kml:Placemark><kml:Point><kml:coordinates>9,8</kml:coordinates></kml:Point></kml:Placemark>
        </kml:kml>"#;
        let fc = convert(kml).unwrap();
        assert_eq!(fc.features.len(), 1);
    }
}
