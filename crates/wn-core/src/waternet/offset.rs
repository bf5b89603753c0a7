//! Offset templates: lines built from characteristic points

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;
use wn_geom::polyline;

use crate::geometry::{CharPointType, Geometry, GeometryError, Side};

/// Errors raised while evaluating an offset template
#[derive(Debug, Clone, thiserror::Error)]
pub enum OffsetError {
    #[error("Offset method '{method}' needs a previous point at {point_type}")]
    NoPreviousPoint {
        method: String,
        point_type: CharPointType,
    },

    #[error("Offset method '{method}' uses unknown water level '{variable}'")]
    UnknownWaterLevel { method: String, variable: String },

    #[error("Offset method '{0}' produced no points")]
    NoPoints(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

pub type OffsetResult<T> = Result<T, OffsetError>;

/// Level an offset is measured from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefLevel {
    /// The zero datum
    FixedLevel,
    /// A water level variable, resolved through the stage mapping
    WaterLevel(String),
    /// Surface elevation at the characteristic point
    SurfaceLevel,
    /// Elevation of the previously emitted point
    PreviousPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Offset {
    /// Added to the reference level
    Vertical(f64),
    /// Horizontal run per metre drop from the previous point; `0` keeps the level
    Slope(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOffsetPoint {
    pub char_point_type: CharPointType,
    pub ref_level: RefLevel,
    pub offset: Offset,
}

impl LineOffsetPoint {
    pub fn new(char_point_type: CharPointType, ref_level: RefLevel, offset: Offset) -> Self {
        Self {
            char_point_type,
            ref_level,
            offset,
        }
    }
}

/// Named template listing, per characteristic point, how to place a vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOffsetMethod {
    pub name: String,
    pub points: Vec<LineOffsetPoint>,
}

impl LineOffsetMethod {
    pub fn new(name: impl Into<String>, points: Vec<LineOffsetPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Water level variables referenced by this template
    pub fn water_level_variables(&self) -> impl Iterator<Item = &str> {
        self.points.iter().filter_map(|p| match &p.ref_level {
            RefLevel::WaterLevel(variable) => Some(variable.as_str()),
            _ => None,
        })
    }

    /// Evaluate the template on a cross-section
    ///
    /// `water_levels` maps the template's water level variables to elevations.
    /// The result is sorted by ascending `l` and spans the whole surface line.
    pub fn create_line(
        &self,
        geometry: &Geometry,
        water_levels: &BTreeMap<String, f64>,
    ) -> OffsetResult<Vec<DVec2>> {
        let mut emitted: Vec<DVec2> = Vec::with_capacity(self.points.len());

        for point in &self.points {
            let Some(cp) = geometry.char_points.find(point.char_point_type)? else {
                trace!(
                    method = %self.name,
                    point = %point.char_point_type,
                    "Skipping absent point"
                );
                continue;
            };
            let l = cp.point.require_l()?;
            let previous = emitted.last().copied();

            let z = match point.offset {
                Offset::Vertical(dz) => {
                    self.reference_level(point, geometry, l, previous, water_levels)? + dz
                }
                Offset::Slope(slope) => {
                    let previous = previous.ok_or_else(|| self.no_previous(point))?;
                    if slope == 0.0 {
                        previous.y
                    } else {
                        previous.y - (l - previous.x).abs() / slope
                    }
                }
            };
            emitted.push(DVec2::new(l, z));
        }

        if emitted.is_empty() {
            return Err(OffsetError::NoPoints(self.name.clone()));
        }

        // Template order runs outward to inward; ties keep that order
        let sign = geometry.determine_l_direction_sign(Side::LandSide)?;
        emitted.sort_by(|a, b| (a.x * sign).total_cmp(&(b.x * sign)));
        if sign < 0.0 {
            emitted.reverse();
        }

        let (l_min, l_max) = geometry.surface_line.l_range()?;
        Ok(polyline::extend_to(&emitted, l_min, l_max))
    }

    fn reference_level(
        &self,
        point: &LineOffsetPoint,
        geometry: &Geometry,
        l: f64,
        previous: Option<DVec2>,
        water_levels: &BTreeMap<String, f64>,
    ) -> OffsetResult<f64> {
        match &point.ref_level {
            RefLevel::FixedLevel => Ok(0.0),
            RefLevel::WaterLevel(variable) => {
                water_levels
                    .get(variable)
                    .copied()
                    .ok_or_else(|| OffsetError::UnknownWaterLevel {
                        method: self.name.clone(),
                        variable: variable.clone(),
                    })
            }
            RefLevel::SurfaceLevel => Ok(geometry.surface_line.z_at(l)?),
            RefLevel::PreviousPoint => previous
                .map(|p| p.y)
                .ok_or_else(|| self.no_previous(point)),
        }
    }

    fn no_previous(&self, point: &LineOffsetPoint) -> OffsetError {
        OffsetError::NoPreviousPoint {
            method: self.name.clone(),
            point_type: point.char_point_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::test_support::geometry_from_lz;
    use approx::assert_relative_eq;

    fn dike() -> Geometry {
        geometry_from_lz(
            &[
                (0.0, 0.0),
                (10.0, 0.0),
                (13.0, 3.0),
                (17.0, 3.0),
                (20.0, 0.0),
                (30.0, 0.0),
            ],
            &[
                (CharPointType::SurfaceLevelWaterSide, 0.0),
                (CharPointType::DikeToeWaterSide, 10.0),
                (CharPointType::DikeCrestWaterSide, 13.0),
                (CharPointType::DikeCrestLandSide, 17.0),
                (CharPointType::DikeToeLandSide, 20.0),
                (CharPointType::SurfaceLevelLandSide, 30.0),
            ],
        )
    }

    fn levels() -> BTreeMap<String, f64> {
        BTreeMap::from([("river".to_string(), 2.0)])
    }

    #[test]
    fn test_create_line_spans_surface() {
        let method = LineOffsetMethod::new(
            "phreatic",
            vec![
                LineOffsetPoint::new(
                    CharPointType::DikeCrestWaterSide,
                    RefLevel::WaterLevel("river".into()),
                    Offset::Vertical(0.0),
                ),
                LineOffsetPoint::new(
                    CharPointType::DikeToeLandSide,
                    RefLevel::SurfaceLevel,
                    Offset::Vertical(-0.5),
                ),
            ],
        );
        let line = method.create_line(&dike(), &levels()).unwrap();
        assert_relative_eq!(line.first().unwrap().x, 0.0);
        assert_relative_eq!(line.first().unwrap().y, 2.0);
        assert_relative_eq!(line.last().unwrap().x, 30.0);
        assert_relative_eq!(line.last().unwrap().y, -0.5);
        assert!(line.windows(2).all(|w| w[1].x >= w[0].x));
    }

    #[test]
    fn test_slope_and_previous_point() {
        let method = LineOffsetMethod::new(
            "sloped",
            vec![
                LineOffsetPoint::new(
                    CharPointType::DikeCrestLandSide,
                    RefLevel::FixedLevel,
                    Offset::Vertical(2.0),
                ),
                LineOffsetPoint::new(
                    CharPointType::DikeToeLandSide,
                    RefLevel::PreviousPoint,
                    Offset::Slope(3.0),
                ),
                LineOffsetPoint::new(
                    CharPointType::SurfaceLevelLandSide,
                    RefLevel::PreviousPoint,
                    Offset::Slope(0.0),
                ),
            ],
        );
        let line = method.create_line(&dike(), &levels()).unwrap();
        // 3 m run at slope 3 drops 1 m
        assert_relative_eq!(polyline::z_at(&line, 20.0).unwrap(), 1.0);
        assert_relative_eq!(polyline::z_at(&line, 30.0).unwrap(), 1.0);
        assert_relative_eq!(polyline::z_at(&line, 0.0).unwrap(), 2.0);
    }

    #[test]
    fn test_absent_points_are_skipped() {
        let method = LineOffsetMethod::new(
            "ditch",
            vec![
                LineOffsetPoint::new(
                    CharPointType::DitchStartLandSide,
                    RefLevel::SurfaceLevel,
                    Offset::Vertical(-1.0),
                ),
                LineOffsetPoint::new(
                    CharPointType::DikeToeLandSide,
                    RefLevel::SurfaceLevel,
                    Offset::Vertical(-1.0),
                ),
            ],
        );
        let line = method.create_line(&dike(), &levels()).unwrap();
        assert!(line.iter().all(|p| (p.y + 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_first_point_cannot_use_previous() {
        let method = LineOffsetMethod::new(
            "bad",
            vec![LineOffsetPoint::new(
                CharPointType::DikeToeLandSide,
                RefLevel::PreviousPoint,
                Offset::Vertical(0.0),
            )],
        );
        assert!(matches!(
            method.create_line(&dike(), &levels()),
            Err(OffsetError::NoPreviousPoint { .. })
        ));

        let slope_first = LineOffsetMethod::new(
            "bad",
            vec![LineOffsetPoint::new(
                CharPointType::DikeToeLandSide,
                RefLevel::FixedLevel,
                Offset::Slope(2.0),
            )],
        );
        assert!(slope_first.create_line(&dike(), &levels()).is_err());
    }

    #[test]
    fn test_unknown_water_level() {
        let method = LineOffsetMethod::new(
            "polder",
            vec![LineOffsetPoint::new(
                CharPointType::DikeToeLandSide,
                RefLevel::WaterLevel("polder".into()),
                Offset::Vertical(0.0),
            )],
        );
        assert_eq!(method.water_level_variables().collect::<Vec<_>>(), vec!["polder"]);
        assert!(matches!(
            method.create_line(&dike(), &levels()),
            Err(OffsetError::UnknownWaterLevel { .. })
        ));
    }

    #[test]
    fn test_no_points() {
        let method = LineOffsetMethod::new(
            "empty",
            vec![LineOffsetPoint::new(
                CharPointType::DitchBottomLandSide,
                RefLevel::FixedLevel,
                Offset::Vertical(0.0),
            )],
        );
        assert!(matches!(
            method.create_line(&dike(), &levels()),
            Err(OffsetError::NoPoints(_))
        ));
    }
}
