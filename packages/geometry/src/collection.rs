//! Attributed geometry collections tagged with their CRS.

use geo::{BoundingRect, Coord, Geometry, Rect};

use crate::{Crs, GeometryError};

/// Attribute columns of a feature.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One geometry with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub properties: Properties,
    pub geometry: Geometry<f64>,
}

impl Feature {
    /// A feature without attributes.
    #[must_use]
    pub fn from_geometry(geometry: Geometry<f64>) -> Self {
        Self {
            properties: Properties::new(),
            geometry,
        }
    }
}

/// An ordered list of features expressed in one coordinate reference
/// system. `crs` is `None` when the source declared no usable system.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub crs: Option<Crs>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// An empty collection in `crs`.
    #[must_use]
    pub const fn new(crs: Crs) -> Self {
        Self {
            crs: Some(crs),
            features: Vec::new(),
        }
    }

    /// A collection of `features` in `crs`.
    #[must_use]
    pub const fn with_features(crs: Option<Crs>, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the collection's CRS, or [`GeometryError::CrsMismatch`]
    /// naming it as `name` when it has none.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::CrsMismatch`] if `crs` is `None`.
    pub fn require_crs(&self, name: &str) -> Result<Crs, GeometryError> {
        self.crs.ok_or_else(|| GeometryError::CrsMismatch {
            collection: name.to_string(),
        })
    }

    /// Reprojects every geometry into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::CrsMismatch`] if this collection has no CRS.
    pub fn to_crs(&self, target: Crs, name: &str) -> Result<Self, GeometryError> {
        let source = self.require_crs(name)?;
        if source == target {
            return Ok(self.clone());
        }

        log::debug!(
            "Reprojecting {} features of '{name}' from {source} to {target}",
            self.features.len()
        );

        Ok(Self {
            crs: Some(target),
            features: self
                .features
                .iter()
                .map(|feature| Feature {
                    properties: feature.properties.clone(),
                    geometry: source.transform(target, &feature.geometry),
                })
                .collect(),
        })
    }

    /// Bounding box of all geometries, in the collection's own units.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|feature| feature.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }

    /// UTM zone for the center of this collection's extent, or `None` for
    /// an empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::CrsMismatch`] if this collection has no CRS.
    pub fn estimate_utm_crs(&self, name: &str) -> Result<Option<Crs>, GeometryError> {
        let crs = self.require_crs(name)?;
        Ok(self
            .bounding_rect()
            .map(|rect| Crs::utm_for(crs.to_lon_lat(rect.center()))))
    }
}

/// `GeoJSON` type name of a geometry, for log messages.
#[must_use]
pub const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
