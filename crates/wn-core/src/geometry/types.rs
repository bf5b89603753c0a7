//! Cross-section geometry types

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::{GeometryError, GeometryResult};

/// A survey point with an optional cross-section coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Horizontal distance along the cross-section, assigned by
    /// `set_l_coordinates`
    #[serde(default)]
    pub l: Option<f64>,
}

impl Point {
    /// Create a point without an `l` coordinate
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, l: None }
    }

    /// Create a point directly in cross-section coordinates
    pub fn from_lz(l: f64, z: f64) -> Self {
        Self {
            x: l,
            y: 0.0,
            z,
            l: Some(l),
        }
    }

    /// Distance in the horizontal (x, y) plane
    pub fn horizontal_distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// The `l` coordinate, or an error if it was never assigned
    pub fn require_l(&self) -> GeometryResult<f64> {
        self.l.ok_or(GeometryError::MissingL {
            x: self.x,
            y: self.y,
        })
    }

    /// `(l, z)` pair
    pub fn lz(&self) -> GeometryResult<DVec2> {
        Ok(DVec2::new(self.require_l()?, self.z))
    }

    /// Check whether two points share the same survey position
    pub fn same_location(&self, other: &Point) -> bool {
        const TOLERANCE: f64 = 1e-9;
        (self.x - other.x).abs() < TOLERANCE
            && (self.y - other.y).abs() < TOLERANCE
            && (self.z - other.z).abs() < TOLERANCE
    }
}

/// Side of the dike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Outward side, facing the open water
    WaterSide,
    /// Inward side, facing the polder
    LandSide,
}

impl Side {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Side::WaterSide => Side::LandSide,
            Side::LandSide => Side::WaterSide,
        }
    }
}

/// Role of a characteristic point, ordered from the water side to the land side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CharPointType {
    SurfaceLevelWaterSide,
    ToeCanal,
    StartCanal,
    DikeToeWaterSide,
    BermCrestWaterSide,
    BermStartWaterSide,
    DikeCrestWaterSide,
    TrafficLoadWaterSide,
    TrafficLoadLandSide,
    DikeCrestLandSide,
    BermStartLandSide,
    BermCrestLandSide,
    DikeToeLandSide,
    DitchStartWaterSide,
    DitchBottomWaterSide,
    DitchBottomLandSide,
    DitchStartLandSide,
    SurfaceLevelLandSide,
}

impl CharPointType {
    /// Outer surface-level point of a side
    pub fn surface_level(side: Side) -> Self {
        match side {
            Side::WaterSide => CharPointType::SurfaceLevelWaterSide,
            Side::LandSide => CharPointType::SurfaceLevelLandSide,
        }
    }

    /// Dike crest point of a side
    pub fn dike_crest(side: Side) -> Self {
        match side {
            Side::WaterSide => CharPointType::DikeCrestWaterSide,
            Side::LandSide => CharPointType::DikeCrestLandSide,
        }
    }
}

impl fmt::Display for CharPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A survey point with a fixed role
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicPoint {
    pub point_type: CharPointType,
    pub point: Point,
}

impl CharacteristicPoint {
    pub fn new(point_type: CharPointType, point: Point) -> Self {
        Self { point_type, point }
    }
}

/// Ground surface of a cross-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLine {
    pub name: String,
    pub points: Vec<Point>,
}

impl SurfaceLine {
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Surface as `(l, z)` vertices
    pub fn polyline(&self) -> GeometryResult<Vec<DVec2>> {
        self.points.iter().map(Point::lz).collect()
    }

    /// Outer `l` values as `(min, max)`
    pub fn l_range(&self) -> GeometryResult<(f64, f64)> {
        let polyline = self.polyline()?;
        wn_geom::polyline::l_range(&polyline)
            .ok_or_else(|| GeometryError::TooFewPoints(self.name.clone()))
    }

    /// Surface elevation at `l`, clamped to the outer points
    pub fn z_at(&self, l: f64) -> GeometryResult<f64> {
        let polyline = self.polyline()?;
        wn_geom::polyline::z_at(&polyline, l)
            .ok_or_else(|| GeometryError::TooFewPoints(self.name.clone()))
    }

    /// Lowest surface elevation
    pub fn min_z(&self) -> f64 {
        self.points.iter().map(|p| p.z).fold(f64::INFINITY, f64::min)
    }
}

/// Characteristic points of one cross-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicPointProfile {
    pub name: String,
    pub points: Vec<CharacteristicPoint>,
}

impl CharacteristicPointProfile {
    pub fn new(name: impl Into<String>, points: Vec<CharacteristicPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Look up a characteristic point that may be absent
    ///
    /// Fails if the role occurs more than once.
    pub fn find(&self, point_type: CharPointType) -> GeometryResult<Option<&CharacteristicPoint>> {
        let mut matches = self.points.iter().filter(|p| p.point_type == point_type);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(GeometryError::DuplicateCharPoint(point_type));
        }
        Ok(first)
    }

    /// Look up a characteristic point that must be present exactly once
    pub fn get(&self, point_type: CharPointType) -> GeometryResult<&CharacteristicPoint> {
        self.find(point_type)?
            .ok_or(GeometryError::CharPointNotFound(point_type))
    }

    /// `l` coordinate of a required characteristic point
    pub fn l_of(&self, point_type: CharPointType) -> GeometryResult<f64> {
        self.get(point_type)?.point.require_l()
    }
}
