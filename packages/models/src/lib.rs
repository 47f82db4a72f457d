#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road segment record types shared across the road-gap toolchain.
//!
//! Raw uploads arrive as [`CoordinateRecord`] rows whose `road_coordinates`
//! column holds a nested list literal. The flattening stage turns each of
//! them into one [`FlatPoint`] per vertex, which the polyline stage later
//! groups back into line geometries.

pub mod config;
pub mod progress;

use serde::{Deserialize, Deserializer, Serialize};

/// Attribute columns copied verbatim from a raw record onto every point
/// and polyline derived from it, in output order.
pub const PASSTHROUGH_COLUMNS: &[&str] = &[
    "country_id",
    "id",
    "grid_id",
    "created_at",
    "report_user_id",
    "type",
    "org_code",
    "note",
];

/// A raw input row as read from an uploaded CSV.
///
/// Every passthrough column is optional; absent columns deserialize to an
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    /// Country identifier.
    #[serde(default)]
    pub country_id: String,
    /// Record identifier, used as the prefix of every derived `segment_id`.
    #[serde(default)]
    pub id: String,
    /// Grid cell key, e.g. `"G12 Jakarta 03"`. The second token is the city.
    #[serde(default)]
    pub grid_id: String,
    /// Creation timestamp, kept as text.
    #[serde(default)]
    pub created_at: String,
    /// Reporting user.
    #[serde(default)]
    pub report_user_id: String,
    /// Report type.
    #[serde(default, rename = "type")]
    pub record_type: String,
    /// Organization code.
    #[serde(default)]
    pub org_code: String,
    /// Free-form note.
    #[serde(default)]
    pub note: String,
    /// Nested list literal with one or more segments of `[x, y]` pairs.
    #[serde(default)]
    pub road_coordinates: String,
}

/// One vertex of one road segment.
///
/// Points sharing a `segment_id` keep the vertex order of the source
/// record, which is the polyline vertex order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatPoint {
    #[serde(default)]
    pub country_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub grid_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub report_user_id: String,
    #[serde(default, rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub org_code: String,
    #[serde(default)]
    pub note: String,
    /// `"{id}_{n}"` where `n` is the 1-based segment counter of the record.
    pub segment_id: String,
    /// Longitude (or easting). Empty cells read back as `NaN`.
    #[serde(deserialize_with = "nan_if_missing")]
    pub x: f64,
    /// Latitude (or northing). Empty cells read back as `NaN`.
    #[serde(deserialize_with = "nan_if_missing")]
    pub y: f64,
}

impl FlatPoint {
    /// Builds the point for the `segment_index`-th segment of `record`.
    #[must_use]
    pub fn from_record(record: &CoordinateRecord, segment_index: usize, x: f64, y: f64) -> Self {
        Self {
            country_id: record.country_id.clone(),
            id: record.id.clone(),
            grid_id: record.grid_id.clone(),
            created_at: record.created_at.clone(),
            report_user_id: record.report_user_id.clone(),
            record_type: record.record_type.clone(),
            org_code: record.org_code.clone(),
            note: record.note.clone(),
            segment_id: segment_id(&record.id, segment_index),
            x,
            y,
        }
    }

    /// Passthrough attributes paired with their column names, in
    /// [`PASSTHROUGH_COLUMNS`] order.
    #[must_use]
    pub fn attributes(&self) -> [(&'static str, &str); 8] {
        [
            ("country_id", &self.country_id),
            ("id", &self.id),
            ("grid_id", &self.grid_id),
            ("created_at", &self.created_at),
            ("report_user_id", &self.report_user_id),
            ("type", &self.record_type),
            ("org_code", &self.org_code),
            ("note", &self.note),
        ]
    }

    /// Whether both coordinates are finite numbers.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Formats the identifier of a record's `segment_index`-th (1-based) segment.
#[must_use]
pub fn segment_id(record_id: &str, segment_index: usize) -> String {
    format!("{record_id}_{segment_index}")
}

fn nan_if_missing<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
