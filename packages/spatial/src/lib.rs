#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Selection of road segments that meet restriction areas or lines.
//!
//! Roads and restrictions are reprojected into one metric system (the UTM
//! zone of the roads when they are in degrees), restriction geometries are
//! loaded into an R-tree, and every road is tested against the entries its
//! bounding box overlaps. Area restrictions match within the buffer
//! distance; line restrictions only match on contact. The selected roads
//! are returned unchanged apart from being expressed in WGS 84.

pub mod index;

use std::collections::BTreeSet;
use std::sync::Arc;

use road_gap_geometry::{Crs, Feature, FeatureCollection, GeometryError};
use road_gap_models::progress::{ProgressCallback, null_progress};

pub use index::{Primitive, RestrictionIndex};

/// Errors that can occur while selecting restricted roads.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// An input collection has no defined coordinate reference system.
    #[error("Collection '{collection}' has no coordinate reference system")]
    CrsMismatch {
        /// Which input lacks a CRS: `roads`, `areas` or `lines`.
        collection: String,
    },

    /// The buffer distance is negative or not a number.
    #[error("Buffer distance must be a finite, non-negative number of meters (got {distance})")]
    InvalidDistance { distance: f64 },

    /// Reprojection or another geometry step failed.
    #[error(transparent)]
    Geometry(GeometryError),
}

impl From<GeometryError> for MatchError {
    fn from(e: GeometryError) -> Self {
        match e {
            GeometryError::CrsMismatch { collection } => Self::CrsMismatch { collection },
            other => Self::Geometry(other),
        }
    }
}

/// Roads selected by a [`RestrictionMatcher`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Selected roads in WGS 84, without duplicates, in input order.
    pub roads: FeatureCollection,
    /// Number of road features tested.
    pub considered: usize,
    /// Matching road features before duplicates were dropped.
    pub matched: usize,
}

impl MatchOutcome {
    /// Matches removed as duplicates of an earlier road.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.matched - self.roads.len()
    }
}

/// Selects roads that intersect buffered restriction areas or touch
/// restriction lines.
pub struct RestrictionMatcher {
    distance_meters: f64,
    progress: Arc<dyn ProgressCallback>,
}

impl RestrictionMatcher {
    /// A matcher that buffers areas by `distance_meters`.
    #[must_use]
    pub fn new(distance_meters: f64) -> Self {
        Self {
            distance_meters,
            progress: null_progress(),
        }
    }

    /// Reports one unit of progress per road tested.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the roads that meet any restriction.
    ///
    /// A road is selected when it intersects an area grown by the buffer
    /// distance (any point of the road within that distance of the area,
    /// boundary contact included) or when it intersects a line. Lines are
    /// never buffered. Roads equal in both attributes and geometry are
    /// reported once.
    ///
    /// # Errors
    ///
    /// * [`MatchError::InvalidDistance`] if the buffer distance is negative
    ///   or not finite
    /// * [`MatchError::CrsMismatch`] if any input collection has no CRS
    pub fn select(
        &self,
        roads: &FeatureCollection,
        areas: &FeatureCollection,
        lines: Option<&FeatureCollection>,
    ) -> Result<MatchOutcome, MatchError> {
        if !self.distance_meters.is_finite() || self.distance_meters < 0.0 {
            return Err(MatchError::InvalidDistance {
                distance: self.distance_meters,
            });
        }

        let roads_crs = roads.require_crs("roads")?;
        areas.require_crs("areas")?;
        if let Some(lines) = lines {
            lines.require_crs("lines")?;
        }

        let working = match roads_crs {
            Crs::Utm { .. } => Some(roads_crs),
            _ => roads.estimate_utm_crs("roads")?,
        };
        let Some(working) = working else {
            log::info!("No roads to match");
            return Ok(MatchOutcome {
                roads: FeatureCollection::new(Crs::Wgs84),
                considered: 0,
                matched: 0,
            });
        };
        log::info!("Matching in {working}");

        let index = self.build_index(working, areas, lines)?;
        log::info!("Indexed {} restriction parts", index.len());

        let projected = roads.to_crs(working, "roads")?;
        self.progress.set_total(projected.len() as u64);

        let mut seen = BTreeSet::new();
        let mut selected = Vec::new();
        let mut matched = 0_usize;

        for (road, original) in projected.features.iter().zip(&roads.features) {
            if index.touches(&road.geometry) {
                matched += 1;
                if seen.insert(dedup_key(original)?) {
                    selected.push(original.clone());
                }
            }
            self.progress.inc(1);
        }

        let roads = FeatureCollection::with_features(Some(roads_crs), selected)
            .to_crs(Crs::Wgs84, "roads")?;
        let outcome = MatchOutcome {
            roads,
            considered: projected.len(),
            matched,
        };

        log::info!(
            "Selected {} of {} roads ({} duplicates dropped)",
            outcome.roads.len(),
            outcome.considered,
            outcome.duplicates()
        );
        self.progress
            .finish(format!("{} roads selected", outcome.roads.len()));

        Ok(outcome)
    }

    fn build_index(
        &self,
        working: Crs,
        areas: &FeatureCollection,
        lines: Option<&FeatureCollection>,
    ) -> Result<RestrictionIndex, MatchError> {
        let mut builder = RestrictionIndex::builder();

        for feature in &areas.to_crs(working, "areas")?.features {
            builder.insert(&feature.geometry, self.distance_meters);
        }

        if let Some(lines) = lines {
            for feature in &lines.to_crs(working, "lines")?.features {
                builder.insert(&feature.geometry, 0.0);
            }
        }

        Ok(builder.build())
    }
}

/// Runs a [`RestrictionMatcher`] without progress reporting.
///
/// # Errors
///
/// See [`RestrictionMatcher::select`].
pub fn select_restricted_roads(
    roads: &FeatureCollection,
    areas: &FeatureCollection,
    lines: Option<&FeatureCollection>,
    distance_meters: f64,
) -> Result<FeatureCollection, MatchError> {
    Ok(RestrictionMatcher::new(distance_meters)
        .select(roads, areas, lines)?
        .roads)
}

/// Identity of a road for deduplication: its attributes and geometry.
fn dedup_key(feature: &Feature) -> Result<String, MatchError> {
    let properties = serde_json::to_string(&feature.properties).map_err(GeometryError::from)?;
    let geometry = serde_json::to_string(&geojson::Value::from(&feature.geometry))
        .map_err(GeometryError::from)?;
    Ok(format!("{properties}\n{geometry}"))
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, LineString, polygon};
    use road_gap_geometry::Properties;
    use serde_json::json;

    use super::*;

    const UTM: Crs = Crs::Utm {
        zone: 48,
        north: false,
    };

    fn feature(id: &str, geometry: Geometry<f64>) -> Feature {
        let mut properties = Properties::new();
        properties.insert("id".to_string(), json!(id));
        Feature {
            properties,
            geometry,
        }
    }

    fn road(id: &str, coords: &[(f64, f64)]) -> Feature {
        feature(id, Geometry::LineString(LineString::from(coords.to_vec())))
    }

    /// A 100 m square restriction area with its corner at the origin of a
    /// local grid inside UTM zone 48 south.
    fn area() -> Feature {
        square("area", 700_000.0, 9_300_000.0, 100.0)
    }

    fn utm(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection::with_features(Some(UTM), features)
    }

    fn ids(collection: &FeatureCollection) -> Vec<&str> {
        collection
            .features
            .iter()
            .filter_map(|f| f.properties["id"].as_str())
            .collect()
    }

    fn roads() -> FeatureCollection {
        utm(vec![
            road("inside", &[(700_010.0, 9_300_010.0), (700_020.0, 9_300_020.0)]),
            road("touching", &[(700_100.0, 9_300_050.0), (700_200.0, 9_300_050.0)]),
            road("near", &[(700_150.0, 9_300_050.0), (700_300.0, 9_300_050.0)]),
            road("far", &[(701_000.0, 9_301_000.0), (701_100.0, 9_301_000.0)]),
        ])
    }

    #[test]
    fn boundary_contact_matches_without_buffer() {
        let selected = select_restricted_roads(&roads(), &utm(vec![area()]), None, 0.0).unwrap();
        assert_eq!(ids(&selected), ["inside", "touching"]);
    }

    #[test]
    fn buffer_reaches_nearby_roads() {
        let selected = select_restricted_roads(&roads(), &utm(vec![area()]), None, 50.0).unwrap();
        assert_eq!(ids(&selected), ["inside", "touching", "near"]);
    }

    #[test]
    fn larger_buffer_never_selects_fewer_roads() {
        let areas = utm(vec![area()]);
        let mut previous = 0;
        for distance in [0.0, 10.0, 49.9, 50.0, 100.0, 2_000.0] {
            let count = select_restricted_roads(&roads(), &areas, None, distance)
                .unwrap()
                .len();
            assert!(count >= previous, "{distance} m selected {count} < {previous}");
            previous = count;
        }
        assert_eq!(previous, 4);
    }

    #[test]
    fn lines_are_not_buffered() {
        let lines = utm(vec![road(
            "line",
            &[(700_160.0, 9_299_900.0), (700_160.0, 9_300_200.0)],
        )]);
        let far_line = utm(vec![road(
            "line",
            &[(700_140.0, 9_299_900.0), (700_140.0, 9_300_000.0)],
        )]);
        let no_areas = utm(vec![]);

        let selected =
            select_restricted_roads(&roads(), &no_areas, Some(&lines), 1_000.0).unwrap();
        assert_eq!(ids(&selected), ["touching", "near"]);

        let selected =
            select_restricted_roads(&roads(), &no_areas, Some(&far_line), 1_000.0).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn duplicate_roads_are_reported_once() {
        let mut input = roads();
        input.features.push(input.features[0].clone());
        let mut renamed = input.features[0].clone();
        renamed
            .properties
            .insert("id".to_string(), json!("inside-copy"));
        input.features.push(renamed);

        let outcome = RestrictionMatcher::new(0.0)
            .select(&input, &utm(vec![area()]), None)
            .unwrap();

        assert_eq!(ids(&outcome.roads), ["inside", "touching", "inside-copy"]);
        assert_eq!(outcome.considered, 6);
        assert_eq!(outcome.matched, 4);
        assert_eq!(outcome.duplicates(), 1);
    }

    fn square(id: &str, x: f64, y: f64, size: f64) -> Feature {
        feature(
            id,
            Geometry::Polygon(polygon![
                (x: x, y: y),
                (x: x + size, y: y),
                (x: x + size, y: y + size),
                (x: x, y: y + size),
                (x: x, y: y),
            ]),
        )
    }

    #[test]
    fn road_crossing_two_areas_is_selected_once() {
        let areas = utm(vec![
            square("west", 700_000.0, 9_300_000.0, 10.0),
            square("east", 700_050.0, 9_300_000.0, 10.0),
        ]);
        let crossing = utm(vec![road(
            "crossing",
            &[(699_990.0, 9_300_005.0), (700_100.0, 9_300_005.0)],
        )]);

        let outcome = RestrictionMatcher::new(100.0)
            .select(&crossing, &areas, None)
            .unwrap();

        assert_eq!(ids(&outcome.roads), ["crossing"]);
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.duplicates(), 0);
    }

    #[test]
    fn road_meeting_area_and_line_is_selected_once() {
        let lines = utm(vec![road(
            "line",
            &[(700_200.0, 9_299_900.0), (700_200.0, 9_300_200.0)],
        )]);
        let near = utm(vec![road(
            "near",
            &[(700_120.0, 9_300_050.0), (700_300.0, 9_300_050.0)],
        )]);

        let outcome = RestrictionMatcher::new(50.0)
            .select(&near, &utm(vec![area()]), Some(&lines))
            .unwrap();

        assert_eq!(ids(&outcome.roads), ["near"]);
        assert_eq!(outcome.matched, 1);
    }

    #[test]
    fn output_is_wgs84() {
        let selected = select_restricted_roads(&roads(), &utm(vec![area()]), None, 0.0).unwrap();
        assert_eq!(selected.crs, Some(Crs::Wgs84));

        let Geometry::LineString(line) = &selected.features[0].geometry else {
            panic!("expected a LineString");
        };
        let start = line.0[0];
        assert!((100.0..110.0).contains(&start.x), "{start:?}");
        assert!((-10.0..0.0).contains(&start.y), "{start:?}");
    }

    #[test]
    fn geographic_roads_are_matched_in_meters() {
        let wgs84_roads = roads().to_crs(Crs::Wgs84, "roads").unwrap();
        let selected =
            select_restricted_roads(&wgs84_roads, &utm(vec![area()]), None, 60.0).unwrap();
        assert_eq!(ids(&selected), ["inside", "touching", "near"]);
    }

    #[test]
    fn missing_crs_is_rejected() {
        let undefined = FeatureCollection::with_features(None, vec![area()]);
        let err = select_restricted_roads(&roads(), &undefined, None, 10.0).unwrap_err();
        assert!(matches!(err, MatchError::CrsMismatch { collection } if collection == "areas"));

        let err = select_restricted_roads(&roads(), &utm(vec![]), Some(&undefined), 10.0)
            .unwrap_err();
        assert!(matches!(err, MatchError::CrsMismatch { collection } if collection == "lines"));
    }

    #[test]
    fn negative_distance_is_rejected() {
        assert!(matches!(
            select_restricted_roads(&roads(), &utm(vec![area()]), None, -1.0),
            Err(MatchError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn empty_roads_select_nothing() {
        let selected =
            select_restricted_roads(&utm(vec![]), &utm(vec![area()]), None, 10.0).unwrap();
        assert!(selected.is_empty());
        assert_eq!(selected.crs, Some(Crs::Wgs84));
    }
}
