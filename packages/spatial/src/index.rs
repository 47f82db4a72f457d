//! R-tree of restriction geometries with per-entry reach.
//!
//! Every restriction geometry is broken into simple primitives (points,
//! line strings, polygons). Each primitive is stored with a `reach`: the
//! distance within which a road still counts as touching it. The stored
//! envelope is the primitive's bounding box grown by its reach, so an
//! envelope query with a road's bounding box returns every primitive the
//! road could be within reach of.

use geo::{
    BoundingRect, Distance, Euclidean, Geometry, Intersects, LineString, Point, Polygon, Rect,
};
use rstar::{AABB, RTree, RTreeObject};

/// A simple geometry that distance and intersection tests are defined on.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Point(Point<f64>),
    Line(LineString<f64>),
    Area(Polygon<f64>),
}

impl Primitive {
    /// Breaks a geometry into primitives. Multi-geometries and collections
    /// are flattened; lines, rectangles and triangles are converted.
    #[must_use]
    pub fn decompose(geometry: &Geometry<f64>) -> Vec<Self> {
        let mut primitives = Vec::new();
        collect(geometry, &mut primitives);
        primitives
    }

    fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Point(point) => Some(point.bounding_rect()),
            Self::Line(line) => line.bounding_rect(),
            Self::Area(polygon) => polygon.bounding_rect(),
        }
    }

    /// Whether `self` intersects `other` or lies within `reach` of it.
    ///
    /// Boundary contact counts as intersecting. A zero reach is a plain
    /// intersection test.
    #[must_use]
    pub fn within(&self, other: &Self, reach: f64) -> bool {
        match (self, other) {
            (Self::Point(a), Self::Point(b)) => within(a, b, reach),
            (Self::Point(a), Self::Line(b)) => within(a, b, reach),
            (Self::Point(a), Self::Area(b)) => within(a, b, reach),
            (Self::Line(a), Self::Point(b)) => within(a, b, reach),
            (Self::Line(a), Self::Line(b)) => within(a, b, reach),
            (Self::Line(a), Self::Area(b)) => within(a, b, reach),
            (Self::Area(a), Self::Point(b)) => within(a, b, reach),
            (Self::Area(a), Self::Line(b)) => within(a, b, reach),
            (Self::Area(a), Self::Area(b)) => within(a, b, reach),
        }
    }
}

fn within<A, B>(a: &A, b: &B, reach: f64) -> bool
where
    A: Intersects<B>,
    for<'a> Euclidean: Distance<f64, &'a A, &'a B>,
{
    a.intersects(b) || (reach > 0.0 && Euclidean.distance(a, b) <= reach)
}

fn collect(geometry: &Geometry<f64>, out: &mut Vec<Primitive>) {
    match geometry {
        Geometry::Point(point) => out.push(Primitive::Point(*point)),
        Geometry::Line(line) => out.push(Primitive::Line(LineString::from(*line))),
        Geometry::LineString(line) => out.push(Primitive::Line(line.clone())),
        Geometry::Polygon(polygon) => out.push(Primitive::Area(polygon.clone())),
        Geometry::MultiPoint(points) => out.extend(points.iter().copied().map(Primitive::Point)),
        Geometry::MultiLineString(lines) => {
            out.extend(lines.iter().cloned().map(Primitive::Line));
        }
        Geometry::MultiPolygon(polygons) => {
            out.extend(polygons.iter().cloned().map(Primitive::Area));
        }
        Geometry::Rect(rect) => out.push(Primitive::Area(rect.to_polygon())),
        Geometry::Triangle(triangle) => out.push(Primitive::Area(triangle.to_polygon())),
        Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect(geometry, out);
            }
        }
    }
}

/// A restriction primitive stored in the R-tree.
struct RestrictionEntry {
    primitive: Primitive,
    reach: f64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RestrictionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Restriction primitives indexed for road lookups.
///
/// All geometries must already be in the same metric system as the roads
/// that are tested against the index.
pub struct RestrictionIndex {
    entries: RTree<RestrictionEntry>,
}

impl RestrictionIndex {
    /// Starts an index builder.
    #[must_use]
    pub fn builder() -> RestrictionIndexBuilder {
        RestrictionIndexBuilder::default()
    }

    /// Number of indexed primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.size() == 0
    }

    /// Whether any part of `road` is within reach of an indexed primitive.
    #[must_use]
    pub fn touches(&self, road: &Geometry<f64>) -> bool {
        Primitive::decompose(road).iter().any(|part| {
            let Some(query_env) = part.bounding_rect().map(|rect| envelope(rect, 0.0)) else {
                return false;
            };
            self.entries
                .locate_in_envelope_intersecting(&query_env)
                .any(|entry| part.within(&entry.primitive, entry.reach))
        })
    }
}

/// Collects restriction geometries before bulk loading the R-tree.
#[derive(Default)]
pub struct RestrictionIndexBuilder {
    entries: Vec<RestrictionEntry>,
}

impl RestrictionIndexBuilder {
    /// Adds a geometry whose parts match roads within `reach`.
    pub fn insert(&mut self, geometry: &Geometry<f64>, reach: f64) {
        for primitive in Primitive::decompose(geometry) {
            let Some(rect) = primitive.bounding_rect() else {
                log::debug!("Skipping empty restriction geometry");
                continue;
            };
            self.entries.push(RestrictionEntry {
                primitive,
                reach,
                envelope: envelope(rect, reach),
            });
        }
    }

    #[must_use]
    pub fn build(self) -> RestrictionIndex {
        RestrictionIndex {
            entries: RTree::bulk_load(self.entries),
        }
    }
}

/// Bounding box of `rect` grown by `margin` on every side.
fn envelope(rect: Rect<f64>, margin: f64) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [rect.min().x - margin, rect.min().y - margin],
        [rect.max().x + margin, rect.max().y + margin],
    )
}
