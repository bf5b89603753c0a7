//! Corrections of the phreatic line against the surface

use glam::DVec2;
use tracing::debug;
use wn_geom::polyline::{self, L_TOLERANCE};
use wn_geom::{Polygon2D, PolygonKernel};

use super::WaternetResult;
use crate::config::{MinimalSurfaceOffset, PhreaticLineModifications};
use crate::constants::FLOOR_MARGIN;
use crate::geometry::{CharPointType, Geometry, Side};

/// Applies the configured phreatic line corrections for one cross-section
pub struct PhreaticLineModifier<'a> {
    kernel: &'a dyn PolygonKernel,
    geometry: &'a Geometry,
}

impl<'a> PhreaticLineModifier<'a> {
    pub fn new(kernel: &'a dyn PolygonKernel, geometry: &'a Geometry) -> Self {
        Self { kernel, geometry }
    }

    /// Apply the enabled modifications to a phreatic line sorted by `l`
    pub fn modify(
        &self,
        points: &[DVec2],
        modifications: &PhreaticLineModifications,
    ) -> WaternetResult<Vec<DVec2>> {
        let mut points = points.to_vec();
        // The minimal offset zone ends at free water whether or not the line is clipped there
        let bounded = modifications.minimal_surface_offset.is_some();

        let outward = if modifications.outward_intersection || bounded {
            self.free_water_crossing(&points, Side::WaterSide)?
        } else {
            None
        };
        if let (true, Some(crossing)) = (modifications.outward_intersection, outward) {
            points = self.clip_beyond(&points, crossing, Side::WaterSide)?;
        }

        let inward = if modifications.inward_intersection || bounded {
            self.free_water_crossing(&points, Side::LandSide)?
        } else {
            None
        };
        if let (true, Some(crossing)) = (modifications.inward_intersection, inward) {
            points = self.clip_beyond(&points, crossing, Side::LandSide)?;
        }

        if let Some(minimal) = &modifications.minimal_surface_offset {
            points = self.apply_minimal_surface_offset(&points, minimal, outward, inward)?;
        }
        Ok(points)
    }

    /// Crossing of the free water level at the outer end of `side` with the slope
    ///
    /// `None` unless the phreatic level at the outer end lies above the surface.
    pub fn free_water_crossing(
        &self,
        points: &[DVec2],
        side: Side,
    ) -> WaternetResult<Option<DVec2>> {
        let l_outer = self.geometry.outer_l(side)?;
        let Some(level) = polyline::z_at(points, l_outer) else {
            return Ok(None);
        };
        let surface_z = self.geometry.surface_line.z_at(l_outer)?;
        if level <= surface_z {
            return Ok(None);
        }

        let crossing = self.geometry.get_intersection(
            level,
            CharPointType::surface_level(side),
            CharPointType::dike_crest(side),
            side.opposite(),
        )?;
        if crossing.is_none() {
            debug!(?side, level, "Free water level does not reach the slope");
        }
        Ok(crossing)
    }

    /// Replace the part beyond `crossing`, toward the outer end of `side`, by
    /// a horizontal run at the crossing level
    fn clip_beyond(
        &self,
        points: &[DVec2],
        crossing: DVec2,
        side: Side,
    ) -> WaternetResult<Vec<DVec2>> {
        let sign = self.geometry.determine_l_direction_sign(side)?;
        let l_outer = self.geometry.outer_l(side)?;

        let mut clipped: Vec<DVec2> = points
            .iter()
            .filter(|p| (p.x - crossing.x) * sign < -L_TOLERANCE)
            .copied()
            .collect();
        clipped.push(crossing);
        clipped.push(DVec2::new(l_outer, crossing.y));
        clipped.sort_by(|a, b| a.x.total_cmp(&b.x));
        Ok(clipped)
    }

    /// Keep the phreatic line at least `offset` below the surface between two
    /// characteristic points, outside free water and outside the ditch
    fn apply_minimal_surface_offset(
        &self,
        points: &[DVec2],
        minimal: &MinimalSurfaceOffset,
        outward: Option<DVec2>,
        inward: Option<DVec2>,
    ) -> WaternetResult<Vec<DVec2>> {
        let geometry = self.geometry;
        let surface = geometry.surface_line.polyline()?;
        let (l_min, l_max) = geometry.surface_line.l_range()?;

        let from = geometry.char_points.l_of(minimal.from_point)?;
        let to = geometry.char_points.l_of(minimal.to_point)?;
        let outward_l = match outward {
            Some(c) => c.x,
            None => geometry.outer_l(Side::WaterSide)?,
        };
        let inward_l = match inward {
            Some(c) => c.x,
            None => geometry.outer_l(Side::LandSide)?,
        };
        let zone_lo = from.min(to).max(outward_l.min(inward_l));
        let zone_hi = from.max(to).min(outward_l.max(inward_l));
        if zone_hi <= zone_lo + L_TOLERANCE {
            debug!(zone_lo, zone_hi, "Minimal surface offset zone is empty");
            return Ok(points.to_vec());
        }

        let z_low = surface
            .iter()
            .chain(points)
            .map(|p| p.y)
            .fold(f64::INFINITY, f64::min);
        let z_high = surface
            .iter()
            .chain(points)
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = z_low - minimal.offset.abs() - FLOOR_MARGIN;
        let ceiling = z_high + FLOOR_MARGIN;

        let phreatic = Polygon2D::below_polyline(&polyline::extend_to(points, l_min, l_max), floor);
        let lowered = polyline::shift_vertical(&surface, -minimal.offset);

        let mut allowed = vec![Polygon2D::below_polyline(&lowered, floor)];
        if zone_lo > l_min + L_TOLERANCE {
            allowed.push(Polygon2D::rectangle(
                DVec2::new(l_min, floor),
                DVec2::new(zone_lo, ceiling),
            ));
        }
        if zone_hi < l_max - L_TOLERANCE {
            allowed.push(Polygon2D::rectangle(
                DVec2::new(zone_hi, floor),
                DVec2::new(l_max, ceiling),
            ));
        }
        let ditch_start = geometry
            .char_points
            .find(CharPointType::DitchStartWaterSide)?;
        let ditch_end = geometry.char_points.find(CharPointType::DitchStartLandSide)?;
        if let (Some(a), Some(b)) = (ditch_start, ditch_end) {
            let (la, lb) = (a.point.require_l()?, b.point.require_l()?);
            allowed.push(Polygon2D::rectangle(
                DVec2::new(la.min(lb), floor),
                DVec2::new(la.max(lb), ceiling),
            ));
        }

        let allowed = self.kernel.union_all(&allowed)?;
        let corrected = self.kernel.intersection(&[phreatic], &allowed)?;
        let line = self.kernel.upper_boundary(&corrected)?;
        debug!(zone_lo, zone_hi, points = line.len(), "Applied minimal surface offset");
        Ok(line)
    }
}
