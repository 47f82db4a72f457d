#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry collections and the line-building stages of the pipeline.
//!
//! A [`FeatureCollection`] is a list of attributed `geo` geometries tagged
//! with the [`Crs`] they are expressed in. The tag travels with the data
//! through every stage: collections are only combined after being
//! reprojected into a common system, and a collection without a defined
//! system is rejected wherever distances or merging are involved.
//!
//! * [`polyline`] rebuilds per-segment line strings from flat points.
//! * [`merge`] folds the lines of several collections into one
//!   multi-line geometry.
//! * [`io`] reads and writes `GeoJSON` and flat point CSV files.

pub mod collection;
pub mod crs;
pub mod io;
pub mod merge;
pub mod polyline;

pub use collection::{Feature, FeatureCollection, Properties};
pub use crs::Crs;

/// Errors that can occur during geometry operations.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// A collection has no defined coordinate reference system.
    #[error("Collection '{collection}' has no coordinate reference system")]
    CrsMismatch {
        /// Which input collection lacks a CRS.
        collection: String,
    },

    /// A CRS name could not be mapped to a supported system.
    #[error("Unsupported coordinate reference system: {name}")]
    UnsupportedCrs {
        /// The name as it appeared in the input.
        name: String,
    },

    /// No line geometries were left to merge.
    #[error("No LineString or MultiLineString geometries to merge")]
    EmptyMerge,

    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input column is absent.
    #[error("Input is missing required column '{column}'")]
    MissingColumn {
        /// Name of the absent column.
        column: &'static str,
    },
}
