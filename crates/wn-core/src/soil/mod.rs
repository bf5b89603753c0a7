//! Soil profiles and subsoil
//!
//! 1D soil profiles describe the layering at one location. The subsoil is
//! the 2D polygon decomposition of one or more profiles placed along a
//! cross-section.

mod builder;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use wn_geom::{GeomError, Polygon2D};

use crate::geometry::GeometryError;

pub use builder::{SubsoilInput, subsoil_from_soil_profiles};

/// Errors raised while building soil profiles or the subsoil
#[derive(Debug, Clone, thiserror::Error)]
pub enum SoilError {
    #[error("Soil profile '{0}' has no layers")]
    EmptyProfile(String),

    #[error("Layer tops of soil profile '{0}' are not strictly descending")]
    LayersNotDescending(String),

    #[error("No soil profiles given")]
    NoProfiles,

    #[error("Expected {expected} transitions for {profiles} soil profiles, got {actual}")]
    TransitionCount {
        profiles: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Transitions must be strictly ascending")]
    TransitionsNotAscending,

    #[error("Transition at l = {l} lies outside the surface line ({l_min} to {l_max})")]
    TransitionOutOfRange { l: f64, l_min: f64, l_max: f64 },

    #[error("Bottom layer thickness must be positive, got {0}")]
    InvalidThickness(f64),

    #[error("Unknown soil profile: {0}")]
    UnknownProfile(String),

    #[error("Soil profile position '{0}' is missing its l-coordinate")]
    MissingPosition(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Polygon kernel error: {0}")]
    Geom(#[from] GeomError),
}

/// Result type for soil operations
pub type SoilResult<T> = Result<T, SoilError>;

/// One layer of a soil profile, extending down to the next layer's top
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub soil_type: String,
    pub top: f64,
    #[serde(default)]
    pub is_aquifer: Option<bool>,
}

impl SoilLayer {
    pub fn new(soil_type: impl Into<String>, top: f64) -> Self {
        Self {
            soil_type: soil_type.into(),
            top,
            is_aquifer: None,
        }
    }

    /// Mark the layer as (non-)aquifer
    pub fn with_aquifer(mut self, is_aquifer: bool) -> Self {
        self.is_aquifer = Some(is_aquifer);
        self
    }
}

/// Vertical layering at one location, top layer first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilProfile {
    pub name: String,
    layers: Vec<SoilLayer>,
}

/// Raw profile data, validated on deserialization
#[derive(Deserialize)]
struct SoilProfileData {
    name: String,
    layers: Vec<SoilLayer>,
}

impl<'de> Deserialize<'de> for SoilProfile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let data = SoilProfileData::deserialize(deserializer)?;
        SoilProfile::new(data.name, data.layers).map_err(serde::de::Error::custom)
    }
}

impl SoilProfile {
    /// Create a profile; layer tops must be strictly descending
    pub fn new(name: impl Into<String>, layers: Vec<SoilLayer>) -> SoilResult<Self> {
        let name = name.into();
        if layers.is_empty() {
            return Err(SoilError::EmptyProfile(name));
        }
        if !layers.windows(2).all(|w| w[1].top < w[0].top) {
            return Err(SoilError::LayersNotDescending(name));
        }
        Ok(Self { name, layers })
    }

    pub fn layers(&self) -> &[SoilLayer] {
        &self.layers
    }
}

/// Horizontal placement of a soil profile along the cross-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfilePosition {
    pub profile_name: String,
    /// Left boundary of the profile's span; `None` for the leftmost profile
    #[serde(default)]
    pub l: Option<f64>,
}

/// A soil polygon in cross-section coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilPolygon {
    pub soil_type: String,
    /// Closed ring of `(l, z)` vertices (first vertex not repeated)
    pub points: Vec<DVec2>,
    #[serde(default)]
    pub is_aquifer: Option<bool>,
    /// Layer id assigned by the consuming calculation model
    #[serde(default)]
    pub layer_id: Option<String>,
}

impl SoilPolygon {
    pub fn is_aquifer(&self) -> bool {
        self.is_aquifer.unwrap_or(false)
    }

    pub fn to_polygon(&self) -> Polygon2D {
        Polygon2D::new(self.points.clone())
    }
}

/// The 2D soil polygons of one cross-section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subsoil {
    pub soil_polygons: Vec<SoilPolygon>,
}

impl Subsoil {
    pub fn new(soil_polygons: Vec<SoilPolygon>) -> Self {
        Self { soil_polygons }
    }

    /// Aquifer-flagged polygons
    pub fn aquifers(&self) -> impl Iterator<Item = &SoilPolygon> {
        self.soil_polygons.iter().filter(|p| p.is_aquifer())
    }

    /// Lowest elevation of all soil polygons
    pub fn bottom(&self) -> Option<f64> {
        self.soil_polygons
            .iter()
            .flat_map(|p| p.points.iter().map(|v| v.y))
            .reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_requires_descending_tops() {
        let ok = SoilProfile::new(
            "p",
            vec![SoilLayer::new("clay", 0.0), SoilLayer::new("sand", -2.0)],
        );
        assert!(ok.is_ok());

        let equal = SoilProfile::new(
            "p",
            vec![SoilLayer::new("clay", 0.0), SoilLayer::new("sand", 0.0)],
        );
        assert!(matches!(equal, Err(SoilError::LayersNotDescending(_))));

        assert!(matches!(
            SoilProfile::new("p", vec![]),
            Err(SoilError::EmptyProfile(_))
        ));
    }

    #[test]
    fn test_profile_deserialization_validates() {
        let bad = r#"(name: "p", layers: [
            (soil_type: "a", top: -1.0),
            (soil_type: "b", top: 0.0),
        ])"#;
        assert!(ron::from_str::<SoilProfile>(bad).is_err());

        let good = r#"(name: "p", layers: [
            (soil_type: "a", top: 0.0),
            (soil_type: "b", top: -1.0, is_aquifer: Some(true)),
        ])"#;
        let profile: SoilProfile = ron::from_str(good).unwrap();
        assert_eq!(profile.layers().len(), 2);
        assert_eq!(profile.layers()[1].is_aquifer, Some(true));
    }

    #[test]
    fn test_subsoil_bottom_and_aquifers() {
        let subsoil = Subsoil::new(vec![
            SoilPolygon {
                soil_type: "clay".into(),
                points: vec![
                    DVec2::new(0.0, 0.0),
                    DVec2::new(10.0, 0.0),
                    DVec2::new(10.0, -2.0),
                    DVec2::new(0.0, -2.0),
                ],
                is_aquifer: None,
                layer_id: None,
            },
            SoilPolygon {
                soil_type: "sand".into(),
                points: vec![
                    DVec2::new(0.0, -2.0),
                    DVec2::new(10.0, -2.0),
                    DVec2::new(10.0, -7.0),
                    DVec2::new(0.0, -7.0),
                ],
                is_aquifer: Some(true),
                layer_id: None,
            },
        ]);
        assert_eq!(subsoil.bottom(), Some(-7.0));
        assert_eq!(subsoil.aquifers().count(), 1);
    }
}
