//! Merges the line geometries of several collections into one.

use geo::{Geometry, LineString, MultiLineString};

use crate::collection::{Feature, FeatureCollection, geometry_kind};
use crate::{Crs, GeometryError};

/// Collects every `LineString` and `MultiLineString` of `collections` into
/// one multi-line geometry in longitude/latitude.
///
/// Collections are visited in order and features in their stored order;
/// multi-line members are flattened into their component strings. Other
/// geometry kinds are ignored.
///
/// # Errors
///
/// * [`GeometryError::CrsMismatch`] if a collection has no CRS
/// * [`GeometryError::EmptyMerge`] if no line geometry was found
pub fn merge_lines(
    collections: &[FeatureCollection],
) -> Result<MultiLineString<f64>, GeometryError> {
    let mut lines: Vec<LineString<f64>> = Vec::new();
    let mut ignored = 0_usize;

    for (index, collection) in collections.iter().enumerate() {
        let crs = collection.require_crs(&format!("merge input {}", index + 1))?;

        for feature in &collection.features {
            match &feature.geometry {
                Geometry::LineString(line) => {
                    lines.push(reproject_line(crs, line));
                }
                Geometry::MultiLineString(multi) => {
                    lines.extend(multi.0.iter().map(|line| reproject_line(crs, line)));
                }
                other => {
                    log::debug!("Ignoring {} geometry in merge", geometry_kind(other));
                    ignored += 1;
                }
            }
        }
    }

    if lines.is_empty() {
        return Err(GeometryError::EmptyMerge);
    }

    log::info!(
        "Merged {} line strings from {} collections ({ignored} other geometries ignored)",
        lines.len(),
        collections.len()
    );

    Ok(MultiLineString::new(lines))
}

/// [`merge_lines`] wrapped as a one-feature WGS 84 collection.
///
/// # Errors
///
/// See [`merge_lines`].
pub fn merged_collection(
    collections: &[FeatureCollection],
) -> Result<FeatureCollection, GeometryError> {
    let merged = merge_lines(collections)?;
    Ok(FeatureCollection::with_features(
        Some(Crs::Wgs84),
        vec![Feature::from_geometry(Geometry::MultiLineString(merged))],
    ))
}

fn reproject_line(crs: Crs, line: &LineString<f64>) -> LineString<f64> {
    if crs == Crs::Wgs84 {
        return line.clone();
    }
    line.0.iter().map(|&coord| crs.to_lon_lat(coord)).collect()
}

#[cfg(test)]
mod tests {
    use geo::{Point, polygon};

    use super::*;

    fn lines_collection(crs: Option<Crs>, geometries: Vec<Geometry<f64>>) -> FeatureCollection {
        FeatureCollection::with_features(
            crs,
            geometries.into_iter().map(Feature::from_geometry).collect(),
        )
    }

    fn line(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(coords.to_vec())
    }

    #[test]
    fn keeps_input_order_and_flattens_multilines() {
        let first = lines_collection(
            Some(Crs::Wgs84),
            vec![
                Geometry::LineString(line(&[(0.0, 0.0), (1.0, 0.0)])),
                Geometry::MultiLineString(MultiLineString::new(vec![
                    line(&[(2.0, 0.0), (3.0, 0.0)]),
                    line(&[(4.0, 0.0), (5.0, 0.0)]),
                ])),
            ],
        );
        let second = lines_collection(
            Some(Crs::Wgs84),
            vec![Geometry::LineString(line(&[(6.0, 0.0), (7.0, 0.0)]))],
        );

        let merged = merge_lines(&[first, second]).unwrap();

        let starts: Vec<f64> = merged.0.iter().map(|l| l.0[0].x).collect();
        assert_eq!(starts, [0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn ignores_non_line_geometries() {
        let collection = lines_collection(
            Some(Crs::Wgs84),
            vec![
                Geometry::Point(Point::new(1.0, 1.0)),
                Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
                Geometry::LineString(line(&[(0.0, 0.0), (1.0, 1.0)])),
            ],
        );

        assert_eq!(merge_lines(&[collection]).unwrap().0.len(), 1);
    }

    #[test]
    fn no_lines_is_an_error() {
        let collection = lines_collection(
            Some(Crs::Wgs84),
            vec![Geometry::Point(Point::new(1.0, 1.0))],
        );
        assert!(matches!(
            merge_lines(&[collection]),
            Err(GeometryError::EmptyMerge)
        ));
        assert!(matches!(merge_lines(&[]), Err(GeometryError::EmptyMerge)));
    }

    #[test]
    fn undefined_crs_is_rejected() {
        let collection = lines_collection(
            None,
            vec![Geometry::LineString(line(&[(0.0, 0.0), (1.0, 1.0)]))],
        );
        assert!(matches!(
            merge_lines(&[collection]),
            Err(GeometryError::CrsMismatch { .. })
        ));
    }

    #[test]
    fn projected_input_comes_out_in_degrees() {
        let utm = Crs::Utm {
            zone: 48,
            north: false,
        };
        let wgs84 = lines_collection(
            Some(Crs::Wgs84),
            vec![Geometry::LineString(line(&[(106.8, -6.2), (106.9, -6.2)]))],
        );
        let projected = wgs84.to_crs(utm, "roads").unwrap();

        let merged = merged_collection(&[projected]).unwrap();

        assert_eq!(merged.crs, Some(Crs::Wgs84));
        assert_eq!(merged.len(), 1);
        let Geometry::MultiLineString(multi) = &merged.features[0].geometry else {
            panic!("expected a MultiLineString");
        };
        let start = multi.0[0].0[0];
        assert!((start.x - 106.8).abs() < 1e-6);
        assert!((start.y + 6.2).abs() < 1e-6);
    }
}
