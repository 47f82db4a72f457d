//! `GeoJSON` and flat point CSV reading and writing.
//!
//! ## CRS handling
//!
//! RFC 7946 documents are WGS 84 by definition, so a document without a
//! `crs` member reads as [`Crs::Wgs84`]. Older tools write a named `crs`
//! member for other systems; those names are parsed with
//! [`Crs::from_name`]. An explicit `"crs": null` means the system is
//! undefined and reads as `None`.

use std::io::Read;
use std::path::Path;

use geojson::{GeoJson, JsonObject};
use road_gap_models::FlatPoint;
use serde_json::Value;

use crate::collection::{Feature, FeatureCollection, Properties};
use crate::{Crs, GeometryError};

/// Parses a `GeoJSON` document into a [`FeatureCollection`].
///
/// A bare `Feature` or `Geometry` document becomes a one-feature
/// collection. Features with a null geometry are skipped with a warning.
///
/// # Errors
///
/// Returns [`GeometryError`] if the text is not valid `GeoJSON`, a
/// geometry cannot be converted, or the `crs` member names an unsupported
/// system.
pub fn parse_geojson(text: &str) -> Result<FeatureCollection, GeometryError> {
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => {
            let crs = crs_from_members(collection.foreign_members.as_ref())?;
            let mut features = Vec::with_capacity(collection.features.len());
            for (index, feature) in collection.features.into_iter().enumerate() {
                if let Some(feature) = convert_feature(feature, index)? {
                    features.push(feature);
                }
            }
            Ok(FeatureCollection::with_features(crs, features))
        }
        GeoJson::Feature(feature) => {
            let crs = crs_from_members(feature.foreign_members.as_ref())?;
            let features = convert_feature(feature, 0)?.into_iter().collect();
            Ok(FeatureCollection::with_features(crs, features))
        }
        GeoJson::Geometry(geometry) => {
            let crs = crs_from_members(geometry.foreign_members.as_ref())?;
            let geometry: geo::Geometry<f64> = geometry.try_into()?;
            Ok(FeatureCollection::with_features(
                crs,
                vec![Feature::from_geometry(geometry)],
            ))
        }
    }
}

/// Reads a `GeoJSON` file. See [`parse_geojson`].
///
/// # Errors
///
/// Returns [`GeometryError`] if the file cannot be read or parsed.
pub fn read_geojson(path: &Path) -> Result<FeatureCollection, GeometryError> {
    let text = std::fs::read_to_string(path)?;
    let collection = parse_geojson(&text)?;
    log::info!(
        "Read {} features from {} ({})",
        collection.len(),
        path.display(),
        collection
            .crs
            .map_or_else(|| "no CRS".to_string(), |crs| crs.to_string())
    );
    Ok(collection)
}

/// Serializes a collection as a `GeoJSON` `FeatureCollection`.
///
/// WGS 84 output is plain RFC 7946. Any other system is written as a named
/// `crs` member; an undefined system as `"crs": null`.
///
/// # Errors
///
/// Returns [`GeometryError::Json`] if serialization fails.
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String, GeometryError> {
    let features = collection
        .features
        .iter()
        .map(|feature| geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &feature.geometry,
            ))),
            id: None,
            properties: Some(feature.properties.clone()),
            foreign_members: None,
        })
        .collect();

    let output = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: crs_members(collection.crs),
    };

    Ok(serde_json::to_string(&output)?)
}

/// Writes a collection to a `GeoJSON` file. See [`to_geojson_string`].
///
/// # Errors
///
/// Returns [`GeometryError`] if serialization or writing fails.
pub fn write_geojson(collection: &FeatureCollection, path: &Path) -> Result<(), GeometryError> {
    std::fs::write(path, to_geojson_string(collection)?)?;
    log::info!("Wrote {} features to {}", collection.len(), path.display());
    Ok(())
}

/// Reads a flat point CSV, as written by the flattening stage.
///
/// Empty `x`/`y` cells read as `NaN`. Short rows are padded with empty
/// cells and extra fields are ignored, so a ragged row becomes a point
/// with missing coordinates instead of failing the file.
///
/// # Errors
///
/// Returns [`GeometryError::MissingColumn`] if there is no `segment_id`
/// column, or [`GeometryError::Csv`] if a row cannot be read.
pub fn read_flat_points<R: Read>(input: R) -> Result<Vec<FlatPoint>, GeometryError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == "segment_id") {
        return Err(GeometryError::MissingColumn {
            column: "segment_id",
        });
    }

    let mut points = Vec::new();
    for row in reader.records() {
        let row = row?;
        let row: csv::StringRecord = (0..headers.len())
            .map(|i| row.get(i).unwrap_or(""))
            .collect();
        points.push(row.deserialize::<FlatPoint>(Some(&headers))?);
    }
    Ok(points)
}

fn convert_feature(
    feature: geojson::Feature,
    index: usize,
) -> Result<Option<Feature>, GeometryError> {
    let Some(geometry) = feature.geometry else {
        log::warn!("Skipping feature {index}: no geometry");
        return Ok(None);
    };

    Ok(Some(Feature {
        properties: feature.properties.unwrap_or_default(),
        geometry: geometry.try_into()?,
    }))
}

fn crs_from_members(members: Option<&JsonObject>) -> Result<Option<Crs>, GeometryError> {
    match members.and_then(|m| m.get("crs")) {
        None => Ok(Some(Crs::Wgs84)),
        Some(Value::Null) => Ok(None),
        Some(crs) => {
            let name = crs
                .pointer("/properties/name")
                .and_then(Value::as_str)
                .ok_or_else(|| GeometryError::UnsupportedCrs {
                    name: crs.to_string(),
                })?;
            Crs::from_name(name)
                .map(Some)
                .ok_or_else(|| GeometryError::UnsupportedCrs {
                    name: name.to_string(),
                })
        }
    }
}

fn crs_members(crs: Option<Crs>) -> Option<JsonObject> {
    let value = match crs {
        Some(Crs::Wgs84) => return None,
        Some(crs) => serde_json::json!({
            "type": "name",
            "properties": { "name": crs.urn() },
        }),
        None => Value::Null,
    };

    let mut members = Properties::new();
    members.insert("crs".to_string(), value);
    Some(members)
}
