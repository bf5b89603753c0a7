//! Cross-section geometry
//!
//! Surface line and characteristic points of one dike cross-section, the
//! assignment of the horizontal `l` coordinate and the queries the waternet
//! methods run against the surface.

mod types;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use types::{
    CharPointType, CharacteristicPoint, CharacteristicPointProfile, Point, Side, SurfaceLine,
};

/// Errors raised while building or querying a cross-section
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeometryError {
    #[error("Point ({x}, {y}) has no l-coordinate")]
    MissingL { x: f64, y: f64 },

    #[error("The left point ({x}, {y}) is not an endpoint of surface line '{line}'")]
    NotAnEndpoint { line: String, x: f64, y: f64 },

    #[error("The l-coordinates of '{0}' are not monotonic")]
    NonMonotonic(String),

    #[error("Characteristic point not found: {0}")]
    CharPointNotFound(CharPointType),

    #[error("Characteristic point defined more than once: {0}")]
    DuplicateCharPoint(CharPointType),

    #[error("Line '{0}' has too few points")]
    TooFewPoints(String),

    #[error("The outer characteristic points of '{0}' do not carry the extreme l-coordinates")]
    OuterPointsNotExtreme(String),
}

/// Result type for geometry operations
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Raw cross-section input as it comes from the survey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryInput {
    pub name: String,
    pub surface_line: Vec<Point>,
    pub characteristic_points: Vec<CharacteristicPoint>,
    /// Side of the dike placed at the low `l` end
    pub left_side: Side,
    /// Characteristic point placed at `l = 0` (the left end when absent)
    #[serde(default)]
    pub l_origin: Option<CharPointType>,
}

/// A cross-section with `l` coordinates assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub name: String,
    pub surface_line: SurfaceLine,
    pub char_points: CharacteristicPointProfile,
}

/// Assign `l` to every point: the horizontal distance from `left_point`,
/// minus the distance of `ref_point` to `left_point` when given
fn assign_l(points: &mut [Point], left_point: &Point, ref_point: Option<&Point>) {
    let offset = ref_point.map_or(0.0, |r| r.horizontal_distance(left_point));
    for point in points.iter_mut() {
        point.l = Some(point.horizontal_distance(left_point) - offset);
    }
}

impl SurfaceLine {
    /// Assign `l` coordinates starting at one of the two endpoints
    ///
    /// The resulting coordinates must increase strictly along the line.
    pub fn set_l_coordinates(
        &mut self,
        left_point: &Point,
        ref_point: Option<&Point>,
    ) -> GeometryResult<()> {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Err(GeometryError::TooFewPoints(self.name.clone()));
        };
        if !first.same_location(left_point) && !last.same_location(left_point) {
            return Err(GeometryError::NotAnEndpoint {
                line: self.name.clone(),
                x: left_point.x,
                y: left_point.y,
            });
        }

        assign_l(&mut self.points, left_point, ref_point);
        self.check_l_monotonic()
    }

    /// Check that `l` increases strictly along the line
    pub fn check_l_monotonic(&self) -> GeometryResult<()> {
        let ls = self
            .points
            .iter()
            .map(Point::require_l)
            .collect::<GeometryResult<Vec<_>>>()?;
        if ls.windows(2).all(|w| w[1] > w[0]) {
            Ok(())
        } else {
            Err(GeometryError::NonMonotonic(self.name.clone()))
        }
    }
}

impl CharacteristicPointProfile {
    /// Assign `l` coordinates relative to the surface line's left point
    ///
    /// Ties are allowed, but the order along the profile must be monotonic.
    pub fn set_l_coordinates(
        &mut self,
        left_point: &Point,
        ref_point: Option<&Point>,
    ) -> GeometryResult<()> {
        let mut points: Vec<Point> = self.points.iter().map(|cp| cp.point).collect();
        assign_l(&mut points, left_point, ref_point);
        for (cp, point) in self.points.iter_mut().zip(points) {
            cp.point = point;
        }
        self.check_l_monotonic()
    }

    /// Check that `l` never reverses direction along the profile
    pub fn check_l_monotonic(&self) -> GeometryResult<()> {
        let ls = self
            .points
            .iter()
            .map(|cp| cp.point.require_l())
            .collect::<GeometryResult<Vec<_>>>()?;
        let ascending = ls.windows(2).all(|w| w[1] >= w[0]);
        let descending = ls.windows(2).all(|w| w[1] <= w[0]);
        if ascending || descending {
            Ok(())
        } else {
            Err(GeometryError::NonMonotonic(self.name.clone()))
        }
    }
}

impl Geometry {
    /// Sign of the `l` direction when moving toward `side`
    ///
    /// Returns `1.0` when moving toward `side` increases `l`, else `-1.0`.
    pub fn determine_l_direction_sign(&self, side: Side) -> GeometryResult<f64> {
        let toward = self.char_points.l_of(CharPointType::surface_level(side))?;
        let away = self
            .char_points
            .l_of(CharPointType::surface_level(side.opposite()))?;
        Ok(if toward > away { 1.0 } else { -1.0 })
    }

    /// `l` of the outer surface end on `side`
    pub fn outer_l(&self, side: Side) -> GeometryResult<f64> {
        let (l_min, l_max) = self.surface_line.l_range()?;
        Ok(if self.determine_l_direction_sign(side)? > 0.0 {
            l_max
        } else {
            l_min
        })
    }

    /// Crossing of a horizontal level with the surface between two
    /// characteristic points
    ///
    /// When the level crosses more than once, the crossing nearest the
    /// `search_direction` end of the range is returned. `None` when the level
    /// does not cross inside the range.
    pub fn get_intersection(
        &self,
        level: f64,
        from_point: CharPointType,
        to_point: CharPointType,
        search_direction: Side,
    ) -> GeometryResult<Option<DVec2>> {
        let l_from = self.char_points.l_of(from_point)?;
        let l_to = self.char_points.l_of(to_point)?;
        let (lo, hi) = (l_from.min(l_to), l_from.max(l_to));

        let surface = self.surface_line.polyline()?;
        let crossings = wn_geom::polyline::level_crossings(&surface, level, lo, hi);
        let toward_high_l = self.determine_l_direction_sign(search_direction)? > 0.0;
        let l = if toward_high_l {
            crossings.last()
        } else {
            crossings.first()
        };
        Ok(l.map(|&l| DVec2::new(l, level)))
    }
}

/// Build a cross-section from survey input
///
/// The surface line is oriented so that `left_side` sits at its low `l` end
/// and `l` is assigned to the surface line and the characteristic points
/// together.
pub fn create_geometry(input: &GeometryInput) -> GeometryResult<Geometry> {
    if input.surface_line.len() < 2 {
        return Err(GeometryError::TooFewPoints(input.name.clone()));
    }

    let mut char_points =
        CharacteristicPointProfile::new(input.name.clone(), input.characteristic_points.clone());
    let outer = char_points
        .get(CharPointType::surface_level(input.left_side))?
        .point;

    let mut surface_line = SurfaceLine::new(input.name.clone(), input.surface_line.clone());
    let first = surface_line.points[0];
    let last = surface_line.points[surface_line.points.len() - 1];
    if last.horizontal_distance(&outer) < first.horizontal_distance(&outer) {
        debug!(name = %input.name, "Reversing surface line to put the left side first");
        surface_line.points.reverse();
    }

    let left_point = surface_line.points[0];
    let ref_point = input
        .l_origin
        .map(|t| char_points.get(t).map(|cp| cp.point))
        .transpose()?;

    surface_line.set_l_coordinates(&left_point, ref_point.as_ref())?;
    char_points.set_l_coordinates(&left_point, ref_point.as_ref())?;

    let geometry = Geometry {
        name: input.name.clone(),
        surface_line,
        char_points,
    };
    check_outer_points(&geometry)?;
    Ok(geometry)
}

fn check_outer_points(geometry: &Geometry) -> GeometryResult<()> {
    const TOLERANCE: f64 = 1e-6;
    let ls = geometry
        .char_points
        .points
        .iter()
        .map(|cp| cp.point.require_l())
        .collect::<GeometryResult<Vec<_>>>()?;
    let l_min = ls.iter().copied().fold(f64::INFINITY, f64::min);
    let l_max = ls.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let water = geometry
        .char_points
        .l_of(CharPointType::SurfaceLevelWaterSide)?;
    let land = geometry
        .char_points
        .l_of(CharPointType::SurfaceLevelLandSide)?;
    let (outer_lo, outer_hi) = (water.min(land), water.max(land));
    if (outer_lo - l_min).abs() > TOLERANCE || (outer_hi - l_max).abs() > TOLERANCE {
        return Err(GeometryError::OuterPointsNotExtreme(geometry.name.clone()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Cross-section built directly in `(l, z)` with the water side at `l = min`
    pub fn geometry_from_lz(
        surface: &[(f64, f64)],
        char_points: &[(CharPointType, f64)],
    ) -> Geometry {
        let surface_points: Vec<Point> = surface
            .iter()
            .map(|&(l, z)| Point::new(l, 0.0, z))
            .collect();
        let polyline: Vec<DVec2> = surface.iter().map(|&(l, z)| DVec2::new(l, z)).collect();
        let characteristic_points = char_points
            .iter()
            .map(|&(t, l)| {
                let z = wn_geom::polyline::z_at(&polyline, l).unwrap();
                CharacteristicPoint::new(t, Point::new(l, 0.0, z))
            })
            .collect();
        create_geometry(&GeometryInput {
            name: "test".into(),
            surface_line: surface_points,
            characteristic_points,
            left_side: Side::WaterSide,
            l_origin: None,
        })
        .unwrap()
    }
}
