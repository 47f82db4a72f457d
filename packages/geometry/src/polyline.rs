//! Rebuilds road segment line strings from flat points.
//!
//! Points are grouped by `segment_id`; groups come out in ascending
//! `segment_id` order and vertices keep their row order within a group.
//! A point with a missing (non-finite) coordinate breaks the vertex run,
//! so one group can describe several disjoint sub-paths. Each sub-path
//! with at least two distinct vertices becomes its own feature, carrying
//! the group's first-point attributes and its own first vertex as `x`/`y`.

use std::collections::BTreeMap;

use geo::{Coord, Geometry, LineString};
use road_gap_models::FlatPoint;
use serde_json::Value;

use crate::collection::{Feature, FeatureCollection, Properties};
use crate::Crs;

/// A segment that cannot form a line because it has fewer than two
/// distinct usable vertices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Segment {segment_id} has {vertices} usable vertices; a line needs two distinct ones")]
pub struct DegenerateSegmentError {
    pub segment_id: String,
    /// Points of the segment with finite coordinates.
    pub vertices: usize,
}

/// Line features built from flat points, plus the segments left out.
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineOutput {
    pub collection: FeatureCollection,
    pub skipped: Vec<DegenerateSegmentError>,
}

/// Builds one line feature per segment from longitude/latitude points.
#[must_use]
pub fn build_polylines(points: &[FlatPoint]) -> PolylineOutput {
    build_polylines_in(points, Crs::Wgs84)
}

/// Builds one line feature per segment, tagging the output with `crs`.
///
/// Segments without two distinct usable vertices are logged and reported
/// in [`PolylineOutput::skipped`]; they never fail the call.
#[must_use]
pub fn build_polylines_in(points: &[FlatPoint], crs: Crs) -> PolylineOutput {
    let mut groups: BTreeMap<&str, Vec<&FlatPoint>> = BTreeMap::new();
    for point in points {
        groups
            .entry(point.segment_id.as_str())
            .or_default()
            .push(point);
    }

    let mut features = Vec::with_capacity(groups.len());
    let mut skipped = Vec::new();

    for (segment_id, group) in &groups {
        let parts = match segment_lines(segment_id, group) {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!("Skipping segment: {e}");
                skipped.push(e);
                continue;
            }
        };

        if parts.len() > 1 {
            log::debug!("Segment {segment_id} splits into {} lines", parts.len());
        }

        let coords = coords_value(group);
        for part in parts {
            features.push(Feature {
                properties: segment_properties(group[0], &part, &coords),
                geometry: Geometry::LineString(part),
            });
        }
    }

    log::info!(
        "Built {} lines from {} segments ({} skipped)",
        features.len(),
        groups.len(),
        skipped.len()
    );

    PolylineOutput {
        collection: FeatureCollection::with_features(Some(crs), features),
        skipped,
    }
}

/// Splits a group into lines at non-finite points, keeping each run that
/// has two distinct vertices.
fn segment_lines(
    segment_id: &str,
    group: &[&FlatPoint],
) -> Result<Vec<LineString<f64>>, DegenerateSegmentError> {
    let lines: Vec<LineString<f64>> = group
        .split(|point| !point.is_finite())
        .filter(|run| has_two_distinct(run))
        .map(|run| {
            run.iter()
                .map(|point| Coord {
                    x: point.x,
                    y: point.y,
                })
                .collect()
        })
        .collect();

    if lines.is_empty() {
        return Err(DegenerateSegmentError {
            segment_id: segment_id.to_string(),
            vertices: group.iter().filter(|point| point.is_finite()).count(),
        });
    }

    Ok(lines)
}

fn has_two_distinct(run: &[&FlatPoint]) -> bool {
    run.first().is_some_and(|first| {
        run.iter().any(|point| point.x != first.x || point.y != first.y)
    })
}

/// The group's vertices as a `[[x, y], ...]` array, missing values as null.
fn coords_value(group: &[&FlatPoint]) -> Value {
    Value::Array(
        group
            .iter()
            .map(|point| Value::Array(vec![Value::from(point.x), Value::from(point.y)]))
            .collect(),
    )
}

fn segment_properties(
    representative: &FlatPoint,
    part: &LineString<f64>,
    coords: &Value,
) -> Properties {
    let mut properties = Properties::new();
    for (name, value) in representative.attributes() {
        properties.insert(name.to_string(), Value::from(value));
    }
    properties.insert(
        "segment_id".to_string(),
        Value::from(representative.segment_id.as_str()),
    );

    if let Some(start) = part.0.first() {
        properties.insert("x".to_string(), Value::from(start.x));
        properties.insert("y".to_string(), Value::from(start.y));
    }
    properties.insert("coords".to_string(), coords.clone());

    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(segment_id: &str, x: f64, y: f64) -> FlatPoint {
        FlatPoint {
            id: segment_id.split('_').next().unwrap_or_default().to_string(),
            segment_id: segment_id.to_string(),
            x,
            y,
            ..FlatPoint::default()
        }
    }

    fn line_coords(feature: &Feature) -> Vec<(f64, f64)> {
        match &feature.geometry {
            Geometry::LineString(line) => line.0.iter().map(|c| (c.x, c.y)).collect(),
            other => panic!("expected a LineString, got {other:?}"),
        }
    }

    #[test]
    fn preserves_vertex_order() {
        let points = [
            point("a_1", 0.0, 0.0),
            point("a_1", 1.0, 1.0),
            point("a_1", 2.0, 2.0),
        ];
        let output = build_polylines(&points);

        assert_eq!(output.collection.len(), 1);
        assert_eq!(
            line_coords(&output.collection.features[0]),
            [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]
        );
    }

    #[test]
    fn groups_interleaved_rows_by_segment_id() {
        let points = [
            point("b_1", 5.0, 5.0),
            point("a_1", 0.0, 0.0),
            point("b_1", 6.0, 6.0),
            point("a_1", 1.0, 1.0),
        ];
        let output = build_polylines(&points);

        let ids: Vec<&Value> = output
            .collection
            .features
            .iter()
            .map(|f| &f.properties["segment_id"])
            .collect();
        assert_eq!(ids, ["a_1", "b_1"]);
        assert_eq!(
            line_coords(&output.collection.features[1]),
            [(5.0, 5.0), (6.0, 6.0)]
        );
    }

    #[test]
    fn single_point_segment_is_skipped_without_failing() {
        let points = [
            point("a_1", 0.0, 0.0),
            point("a_2", 3.0, 3.0),
            point("a_2", 4.0, 4.0),
        ];
        let output = build_polylines(&points);

        assert_eq!(output.collection.len(), 1);
        assert_eq!(
            output.skipped,
            [DegenerateSegmentError {
                segment_id: "a_1".to_string(),
                vertices: 1
            }]
        );
    }

    #[test]
    fn repeated_vertex_is_degenerate() {
        let output = build_polylines(&[point("a_1", 1.0, 1.0), point("a_1", 1.0, 1.0)]);
        assert!(output.collection.is_empty());
        assert_eq!(output.skipped[0].vertices, 2);
    }

    #[test]
    fn missing_coordinates_split_into_parts() {
        let points = [
            point("a_1", 0.0, 0.0),
            point("a_1", 1.0, 0.0),
            point("a_1", f64::NAN, f64::NAN),
            point("a_1", 5.0, 5.0),
            point("a_1", 6.0, 5.0),
            point("a_1", f64::NAN, 1.0),
            point("a_1", 9.0, 9.0),
        ];
        let output = build_polylines(&points);

        assert_eq!(output.collection.len(), 2);
        let second = &output.collection.features[1];
        assert_eq!(line_coords(second), [(5.0, 5.0), (6.0, 5.0)]);
        assert_eq!(second.properties["x"], 5.0);
        assert_eq!(second.properties["y"], 5.0);
        assert_eq!(second.properties["segment_id"], "a_1");
        assert!(output.skipped.is_empty());
    }

    #[test]
    fn carries_first_point_attributes_and_coords() {
        let mut first = point("7_1", 106.8, -6.2);
        first.org_code = "ORG".to_string();
        let output = build_polylines(&[first, point("7_1", 106.9, -6.3)]);

        let properties = &output.collection.features[0].properties;
        assert_eq!(properties["org_code"], "ORG");
        assert_eq!(properties["id"], "7");
        assert_eq!(properties["x"], 106.8);
        assert_eq!(
            properties["coords"],
            serde_json::json!([[106.8, -6.2], [106.9, -6.3]])
        );
        assert_eq!(output.collection.crs, Some(Crs::Wgs84));
    }
}
