//! Coordinate reference systems and the projections between them.
//!
//! Three families are supported: WGS 84 longitude/latitude (EPSG:4326),
//! Web Mercator (EPSG:3857), and the 120 UTM zones (EPSG:326zz north,
//! EPSG:327zz south). Every transform goes through WGS 84.
//!
//! UTM uses the Transverse Mercator series from Snyder, *Map
//! Projections: A Working Manual* (USGS PP 1395), on the WGS 84 ellipsoid.
//! Round trips stay within a few centimeters inside a zone.

use std::f64::consts::FRAC_PI_4;
use std::fmt;

use geo::{Coord, Geometry, MapCoords};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Latitude limit of the square Web Mercator world.
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// A coordinate reference system a collection is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Geographic longitude/latitude in degrees (EPSG:4326).
    Wgs84,
    /// Spherical Web Mercator in meters (EPSG:3857).
    WebMercator,
    /// Universal Transverse Mercator zone in meters.
    Utm {
        /// Zone number, 1 to 60.
        zone: u8,
        /// Northern hemisphere (no false northing).
        north: bool,
    },
}

impl Crs {
    /// Whether coordinates are angles (degrees) rather than meters.
    #[must_use]
    pub const fn is_geographic(self) -> bool {
        matches!(self, Self::Wgs84)
    }

    /// EPSG code of this system.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::WebMercator => 3857,
            Self::Utm { zone, north: true } => 32600 + zone as u32,
            Self::Utm { zone, north: false } => 32700 + zone as u32,
        }
    }

    /// Looks up a system by EPSG code.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Self::Wgs84),
            3857 | 900_913 => Some(Self::WebMercator),
            32601..=32660 => Some(Self::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(Self::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => None,
        }
    }

    /// Parses the name forms found in `GeoJSON` `crs` members and on the
    /// command line: `EPSG:32748`, `urn:ogc:def:crs:EPSG::32748`,
    /// `OGC:CRS84`, `urn:ogc:def:crs:OGC:1.3:CRS84`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Some(Self::Wgs84);
        }
        if !upper.contains("EPSG") {
            return None;
        }
        let code = upper.rsplit(':').next()?.parse::<u32>().ok()?;
        Self::from_epsg(code)
    }

    /// OGC URN naming this system, as written into `GeoJSON` output.
    #[must_use]
    pub fn urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg())
    }

    /// The UTM zone containing a longitude/latitude point.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn utm_for(lon_lat: Coord<f64>) -> Self {
        let zone = (((lon_lat.x + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Self::Utm {
            zone,
            north: lon_lat.y >= 0.0,
        }
    }

    /// Converts a coordinate of this system to WGS 84 longitude/latitude.
    #[must_use]
    pub fn to_lon_lat(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Wgs84 => coord,
            Self::WebMercator => web_mercator_inverse(coord),
            Self::Utm { zone, north } => transverse_mercator_inverse(coord, zone, north),
        }
    }

    /// Converts a WGS 84 longitude/latitude to this system.
    #[must_use]
    pub fn project(self, lon_lat: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Wgs84 => lon_lat,
            Self::WebMercator => web_mercator_forward(lon_lat),
            Self::Utm { zone, north } => transverse_mercator_forward(lon_lat, zone, north),
        }
    }

    /// Converts a coordinate of this system to `target`.
    #[must_use]
    pub fn transform_coord(self, target: Self, coord: Coord<f64>) -> Coord<f64> {
        if self == target {
            coord
        } else {
            target.project(self.to_lon_lat(coord))
        }
    }

    /// Converts every coordinate of a geometry from this system to `target`.
    #[must_use]
    pub fn transform(self, target: Self, geometry: &Geometry<f64>) -> Geometry<f64> {
        if self == target {
            return geometry.clone();
        }
        geometry.map_coords(move |coord| self.transform_coord(target, coord))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

fn central_meridian(zone: u8) -> f64 {
    f64::from(zone).mul_add(6.0, -183.0)
}

const fn eccentricity_squared() -> f64 {
    WGS84_F * (2.0 - WGS84_F)
}

/// Rectifying-latitude scale factor of the meridian arc series.
#[allow(clippy::suboptimal_flops)]
fn meridian_arc_factor(e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0
}

#[allow(clippy::suboptimal_flops)]
fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * (meridian_arc_factor(e2) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

#[allow(clippy::suboptimal_flops)]
fn transverse_mercator_forward(lon_lat: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let e2 = eccentricity_squared();
    let ep2 = e2 / (1.0 - e2);

    let phi = lon_lat.y.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = (lon_lat.x - central_meridian(zone)).to_radians() * cos_phi;
    let m = meridian_arc(phi, e2);

    let x = UTM_SCALE
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;
    let y = UTM_SCALE
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    Coord {
        x,
        y: if north { y } else { y + UTM_FALSE_NORTHING_SOUTH },
    }
}

#[allow(clippy::suboptimal_flops)]
fn transverse_mercator_inverse(coord: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let e2 = eccentricity_squared();
    let ep2 = e2 / (1.0 - e2);
    let northing = if north {
        coord.y
    } else {
        coord.y - UTM_FALSE_NORTHING_SOUTH
    };

    let mu = northing / UTM_SCALE / (WGS84_A * meridian_arc_factor(e2));
    let root = (1.0 - e2).sqrt();
    let e1 = (1.0 - root) / (1.0 + root);

    // Footpoint latitude.
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = phi1.tan();
    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - e2 * sin1 * sin1;
    let n1 = WGS84_A / w.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / w.powf(1.5);
    let d = (coord.x - UTM_FALSE_EASTING) / (n1 * UTM_SCALE);

    let phi = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos1;

    Coord {
        x: central_meridian(zone) + lambda.to_degrees(),
        y: phi.to_degrees(),
    }
}

fn web_mercator_forward(lon_lat: Coord<f64>) -> Coord<f64> {
    let lat = lon_lat
        .y
        .clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT)
        .to_radians();
    Coord {
        x: WGS84_A * lon_lat.x.to_radians(),
        y: WGS84_A * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

fn web_mercator_inverse(coord: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (coord.x / WGS84_A).to_degrees(),
        y: 2.0f64
            .mul_add((coord.y / WGS84_A).exp().atan(), -std::f64::consts::FRAC_PI_2)
            .to_degrees(),
    }
}
