//! Aquifer detection from the subsoil

use glam::DVec2;
use tracing::debug;
use wn_geom::polyline::L_TOLERANCE;
use wn_geom::{GeomError, Polygon2D, PolygonKernel};

use crate::constants::{FLOOR_MARGIN, SURFACE_TOUCH_TOLERANCE};
use crate::geometry::{CharPointType, Geometry, GeometryError};
use crate::soil::Subsoil;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AquiferError {
    #[error(
        "Aquifer between l = {l_min} and l = {l_max} (bottom {z_min}) neither spans the cross-section nor touches the surface"
    )]
    InvalidAquifer { l_min: f64, l_max: f64, z_min: f64 },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Polygon kernel error: {0}")]
    Geom(#[from] GeomError),
}

pub type AquiferResult<T> = Result<T, AquiferError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AquiferType {
    Primary,
    Intermediate,
}

/// One connected aquifer region
#[derive(Debug, Clone, PartialEq)]
pub struct Aquifer {
    /// Outer ring of the region
    pub points: Vec<DVec2>,
    pub aquifer_type: AquiferType,
    /// Position in ascending order of bottom elevation; 0 is the primary aquifer
    pub order_id: usize,
}

impl Aquifer {
    /// Split the ring into a top and a bottom arc, both sorted by `l`
    pub fn boundaries(&self) -> (Vec<DVec2>, Vec<DVec2>) {
        let ring = Polygon2D::new(self.points.clone()).to_clockwise().exterior;
        let Some((min, max)) = Polygon2D::new(ring.clone()).bounds() else {
            return (Vec::new(), Vec::new());
        };

        let extreme = |at_l: f64, highest: bool| -> usize {
            let mut best: Option<usize> = None;
            for (i, p) in ring.iter().enumerate() {
                if (p.x - at_l).abs() > L_TOLERANCE {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some(b) if highest => p.y > ring[b].y,
                    Some(b) => p.y < ring[b].y,
                };
                if better {
                    best = Some(i);
                }
            }
            best.unwrap_or(0)
        };

        let top_left = extreme(min.x, true);
        let top_right = extreme(max.x, true);
        let bottom_right = extreme(max.x, false);
        let bottom_left = extreme(min.x, false);

        let mut top = walk(&ring, top_left, top_right);
        let mut bottom = walk(&ring, bottom_right, bottom_left);
        bottom.reverse();

        // Overhangs are flattened into `l` order
        top.sort_by(|a, b| a.x.total_cmp(&b.x));
        bottom.sort_by(|a, b| a.x.total_cmp(&b.x));
        (top, bottom)
    }

    pub fn min_z(&self) -> f64 {
        self.points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min)
    }
}

/// Ring vertices from `from` to `to`, both inclusive, in ring order
fn walk(ring: &[DVec2], from: usize, to: usize) -> Vec<DVec2> {
    let n = ring.len();
    let mut arc = vec![ring[from]];
    let mut i = from;
    while i != to {
        i = (i + 1) % n;
        arc.push(ring[i]);
    }
    arc
}

/// Find the aquifers of a cross-section
///
/// Aquifer polygons are merged into connected regions. Regions spanning the
/// whole cross-section are kept. A region that stops short must touch the
/// surface; it is kept when it also reaches the land-side crest, otherwise
/// it is dropped as a local fragment.
pub fn detect_aquifers(
    kernel: &dyn PolygonKernel,
    geometry: &Geometry,
    subsoil: &Subsoil,
) -> AquiferResult<Vec<Aquifer>> {
    let polygons: Vec<Polygon2D> = subsoil.aquifers().map(|p| p.to_polygon()).collect();
    if polygons.is_empty() {
        debug!("No aquifer layers in subsoil");
        return Ok(Vec::new());
    }

    let merged = kernel.union_all(&polygons)?;
    let surface = geometry.surface_line.polyline()?;
    let (l_min, l_max) = geometry.surface_line.l_range()?;

    let mut kept: Vec<Polygon2D> = Vec::new();
    for region in merged {
        let Some((min, max)) = region.bounds() else {
            continue;
        };
        if min.x <= l_min + L_TOLERANCE && max.x >= l_max - L_TOLERANCE {
            kept.push(region);
            continue;
        }

        if !touches_surface(kernel, &region, &surface)? {
            return Err(AquiferError::InvalidAquifer {
                l_min: min.x,
                l_max: max.x,
                z_min: min.y,
            });
        }

        let crest = geometry.char_points.l_of(CharPointType::DikeCrestLandSide)?;
        let probe = [
            DVec2::new(crest, max.y + FLOOR_MARGIN),
            DVec2::new(crest, min.y - FLOOR_MARGIN),
        ];
        if kernel.intersects_polyline(std::slice::from_ref(&region), &probe)? {
            kept.push(region);
        } else {
            debug!(l_min = min.x, l_max = max.x, "Dropping aquifer fragment away from the crest");
        }
    }

    kept.sort_by(|a, b| region_min_z(a).total_cmp(&region_min_z(b)));
    let aquifers: Vec<Aquifer> = kept
        .into_iter()
        .enumerate()
        .map(|(order_id, region)| Aquifer {
            points: region.exterior,
            aquifer_type: if order_id == 0 {
                AquiferType::Primary
            } else {
                AquiferType::Intermediate
            },
            order_id,
        })
        .collect();

    debug!(count = aquifers.len(), "Detected aquifers");
    Ok(aquifers)
}

fn region_min_z(polygon: &Polygon2D) -> f64 {
    polygon.bounds().map_or(f64::INFINITY, |(min, _)| min.y)
}

fn touches_surface(
    kernel: &dyn PolygonKernel,
    region: &Polygon2D,
    surface: &[DVec2],
) -> AquiferResult<bool> {
    if kernel.intersects_polyline(std::slice::from_ref(region), surface)? {
        return Ok(true);
    }
    for vertex in &region.exterior {
        if kernel.distance_to_polyline(*vertex, surface)? <= SURFACE_TOUCH_TOLERANCE {
            return Ok(true);
        }
    }
    Ok(false)
}
