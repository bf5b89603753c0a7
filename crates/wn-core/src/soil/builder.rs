//! Subsoil construction from 1D soil profiles

use glam::DVec2;
use tracing::{debug, warn};
use wn_geom::{Polygon2D, PolygonKernel};

use super::{SoilError, SoilPolygon, SoilProfile, SoilProfilePosition, SoilResult, Subsoil};
use crate::constants::FLOOR_MARGIN;
use crate::geometry::SurfaceLine;

/// Profiles and transitions resolved from named positions
#[derive(Debug, Clone)]
pub struct SubsoilInput {
    pub profiles: Vec<SoilProfile>,
    pub transitions: Vec<f64>,
}

impl SubsoilInput {
    /// Resolve named profile positions against a profile catalogue
    ///
    /// The first position is the leftmost profile and has no `l`; every
    /// following position must carry its left boundary.
    pub fn from_positions(
        catalogue: &[SoilProfile],
        positions: &[SoilProfilePosition],
    ) -> SoilResult<Self> {
        let mut profiles = Vec::with_capacity(positions.len());
        let mut transitions = Vec::with_capacity(positions.len().saturating_sub(1));
        for (i, position) in positions.iter().enumerate() {
            let profile = catalogue
                .iter()
                .find(|p| p.name == position.profile_name)
                .ok_or_else(|| SoilError::UnknownProfile(position.profile_name.clone()))?;
            profiles.push(profile.clone());
            if i > 0 {
                let l = position
                    .l
                    .ok_or_else(|| SoilError::MissingPosition(position.profile_name.clone()))?;
                transitions.push(l);
            }
        }
        Ok(Self {
            profiles,
            transitions,
        })
    }
}

/// Build the 2D subsoil from soil profiles placed along the surface line
///
/// # Arguments
/// * `kernel` - Polygon kernel used for clipping
/// * `surface_line` - Surface line with `l` coordinates assigned
/// * `profiles` - Soil profiles, leftmost first
/// * `transitions` - Ascending `l` values where the next profile starts
/// * `thickness_bottom_layer` - Thickness given to the last layer of each profile
/// * `min_soil_profile_depth` - Elevation the last layer must reach at least
pub fn subsoil_from_soil_profiles(
    kernel: &dyn PolygonKernel,
    surface_line: &SurfaceLine,
    profiles: &[SoilProfile],
    transitions: &[f64],
    thickness_bottom_layer: f64,
    min_soil_profile_depth: Option<f64>,
) -> SoilResult<Subsoil> {
    let surface = surface_line.polyline()?;
    let (l_min, l_max) = surface_line.l_range()?;

    if profiles.is_empty() {
        return Err(SoilError::NoProfiles);
    }
    if transitions.len() != profiles.len() - 1 {
        return Err(SoilError::TransitionCount {
            profiles: profiles.len(),
            expected: profiles.len() - 1,
            actual: transitions.len(),
        });
    }
    if !transitions.windows(2).all(|w| w[1] > w[0]) {
        return Err(SoilError::TransitionsNotAscending);
    }
    if let Some(&l) = transitions.iter().find(|&&l| l <= l_min || l >= l_max) {
        return Err(SoilError::TransitionOutOfRange { l, l_min, l_max });
    }
    if thickness_bottom_layer <= 0.0 {
        return Err(SoilError::InvalidThickness(thickness_bottom_layer));
    }

    let layer_bottom = |layers: &[super::SoilLayer], j: usize| match layers.get(j + 1) {
        Some(next) => next.top,
        None => {
            let bottom = layers[j].top - thickness_bottom_layer;
            min_soil_profile_depth.map_or(bottom, |depth| bottom.min(depth))
        }
    };

    // Surface-bound polygon reaching well below every layer
    let deepest = profiles
        .iter()
        .map(|p| layer_bottom(p.layers(), p.layers().len() - 1))
        .fold(surface_line.min_z(), f64::min);
    let surface_polygon = Polygon2D::below_polyline(&surface, deepest - FLOOR_MARGIN);

    let lefts = std::iter::once(l_min).chain(transitions.iter().copied());
    let rights = transitions.iter().copied().chain(std::iter::once(l_max));

    let mut soil_polygons = Vec::new();
    let mut emitted: Vec<Polygon2D> = Vec::new();
    for ((profile, left), right) in profiles.iter().zip(lefts).zip(rights) {
        let layers = profile.layers();
        for (j, layer) in layers.iter().enumerate() {
            let rectangle = Polygon2D::rectangle(
                DVec2::new(left, layer_bottom(layers, j)),
                DVec2::new(right, layer.top),
            );
            let mut pieces =
                kernel.intersection(&[rectangle], std::slice::from_ref(&surface_polygon))?;
            if !emitted.is_empty() && !pieces.is_empty() {
                pieces = kernel.difference(&pieces, &emitted)?;
            }
            if pieces.is_empty() {
                debug!(
                    profile = %profile.name,
                    soil_type = %layer.soil_type,
                    "Layer lies entirely above the surface"
                );
                continue;
            }
            emitted = kernel.union(&emitted, &pieces)?;

            for piece in pieces {
                if !piece.interiors.is_empty() {
                    warn!(
                        soil_type = %layer.soil_type,
                        "Dropping holes from a clipped soil polygon"
                    );
                }
                soil_polygons.push(SoilPolygon {
                    soil_type: layer.soil_type.clone(),
                    points: piece.exterior,
                    is_aquifer: layer.is_aquifer,
                    layer_id: None,
                });
            }
        }
    }

    debug!(
        surface_line = %surface_line.name,
        count = soil_polygons.len(),
        "Built subsoil"
    );
    Ok(Subsoil::new(soil_polygons))
}
