//! Removal of crossings between reference lines

use glam::DVec2;
use tracing::debug;
use wn_geom::polyline::{self, L_TOLERANCE};
use wn_geom::{GeomResult, Polygon2D, PolygonKernel};

use super::reference_line::{AquiferLines, ReferenceLineSet};
use crate::constants::{BELOW_SOIL_BOTTOM, FLOOR_MARGIN, MIN_OVERLAP_AREA};

/// Which line of a crossing pair gets pushed down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineToMove {
    Top,
    Bottom,
    Both,
}

/// Push lines below the soil bottom wherever `top_line` dips under `bottom_line`
///
/// Returns `(top, bottom)`. Lines that are not moved come back unchanged;
/// moved lines span the combined `l` range of both inputs. Applying the
/// correction to its own output changes nothing.
pub fn correct_crossing(
    kernel: &dyn PolygonKernel,
    top_line: &[DVec2],
    bottom_line: &[DVec2],
    soil_bottom: f64,
    which: LineToMove,
) -> GeomResult<(Vec<DVec2>, Vec<DVec2>)> {
    let unchanged = || (top_line.to_vec(), bottom_line.to_vec());
    let (Some((t0, t1)), Some((b0, b1))) =
        (polyline::l_range(top_line), polyline::l_range(bottom_line))
    else {
        return Ok(unchanged());
    };
    let (l_min, l_max) = (t0.min(b0), t1.max(b1));
    if l_max - l_min < L_TOLERANCE {
        return Ok(unchanged());
    }

    let top = polyline::extend_to(top_line, l_min, l_max);
    let bottom = polyline::extend_to(bottom_line, l_min, l_max);
    let elevations = || top.iter().chain(&bottom).map(|p| p.y);
    let ceiling = elevations().fold(soil_bottom, f64::max) + FLOOR_MARGIN;
    let floor = elevations().fold(soil_bottom, f64::min) - FLOOR_MARGIN;

    let above_top = Polygon2D::above_polyline(&top, ceiling);
    let below_bottom = kernel.intersection(
        &[Polygon2D::below_polyline(&bottom, floor)],
        &[Polygon2D::rectangle(
            DVec2::new(l_min, soil_bottom),
            DVec2::new(l_max, ceiling),
        )],
    )?;
    let overlap: Vec<Polygon2D> = kernel
        .intersection(&[above_top], &below_bottom)?
        .into_iter()
        .filter(|p| p.area() > MIN_OVERLAP_AREA)
        .collect();
    if overlap.is_empty() {
        return Ok(unchanged());
    }

    let masks: Vec<Polygon2D> = overlap
        .iter()
        .filter_map(Polygon2D::bounds)
        .map(|(min, max)| {
            Polygon2D::rectangle(
                DVec2::new(min.x, soil_bottom - BELOW_SOIL_BOTTOM),
                DVec2::new(max.x, ceiling),
            )
        })
        .collect();

    let push_down = |line: &[DVec2]| -> GeomResult<Vec<DVec2>> {
        let region = kernel.union(&[Polygon2D::above_polyline(line, ceiling)], &masks)?;
        kernel.lower_boundary(&region)
    };

    match which {
        LineToMove::Top => Ok((push_down(&top)?, bottom_line.to_vec())),
        LineToMove::Bottom => Ok((top_line.to_vec(), push_down(&bottom)?)),
        LineToMove::Both => Ok((push_down(&top)?, push_down(&bottom)?)),
    }
}

/// Line groups a crossing rule can name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Phreatic,
    PhreaticIntrusion,
    /// Top line of the lower aquifer of the pair
    AquiferTop,
    AquiferTopIntrusion,
    /// Bottom line of the upper aquifer of the pair
    AquiferBottom,
    AquiferBottomIntrusion,
}

/// `(top, bottom, line to move)`
type Rule = (Role, Role, LineToMove);

/// Between the phreatic reference line and the primary aquifer
const SURFACE_ZONE_RULES: [Rule; 4] = [
    (Role::Phreatic, Role::AquiferTop, LineToMove::Top),
    (Role::PhreaticIntrusion, Role::AquiferTop, LineToMove::Top),
    (Role::Phreatic, Role::AquiferTopIntrusion, LineToMove::Bottom),
    (Role::PhreaticIntrusion, Role::AquiferTopIntrusion, LineToMove::Both),
];

/// Between two adjacent aquifers
const AQUIFER_PAIR_RULES: [Rule; 3] = [
    (Role::AquiferBottomIntrusion, Role::AquiferTop, LineToMove::Top),
    (Role::AquiferBottom, Role::AquiferTopIntrusion, LineToMove::Bottom),
    (Role::AquiferBottomIntrusion, Role::AquiferTopIntrusion, LineToMove::Both),
];

struct Roles<'a> {
    phreatic: &'a [String],
    phreatic_intrusions: &'a [String],
    upper: Option<&'a AquiferLines>,
    lower: Option<&'a AquiferLines>,
}

impl Roles<'_> {
    fn names(&self, role: Role) -> Vec<String> {
        match role {
            Role::Phreatic => self.phreatic.to_vec(),
            Role::PhreaticIntrusion => self.phreatic_intrusions.to_vec(),
            Role::AquiferTop => self.lower.map(|a| vec![a.top.clone()]).unwrap_or_default(),
            Role::AquiferTopIntrusion => self
                .lower
                .map(|a| a.top_intrusions.clone())
                .unwrap_or_default(),
            Role::AquiferBottom => self
                .upper
                .map(|a| vec![a.bottom.clone()])
                .unwrap_or_default(),
            Role::AquiferBottomIntrusion => self
                .upper
                .map(|a| a.bottom_intrusions.clone())
                .unwrap_or_default(),
        }
    }
}

/// Applies the crossing rules to the reference lines of a stage
pub struct ReferenceLineCorrector<'a> {
    kernel: &'a dyn PolygonKernel,
    soil_bottom: f64,
}

impl<'a> ReferenceLineCorrector<'a> {
    pub fn new(kernel: &'a dyn PolygonKernel, soil_bottom: f64) -> Self {
        Self {
            kernel,
            soil_bottom,
        }
    }

    /// Correct the surface zone first, then each adjacent aquifer pair
    ///
    /// `phreatic_configs` names the reference line configurations that carry
    /// the phreatic head on top.
    pub fn correct(
        &self,
        set: &ReferenceLineSet,
        phreatic_configs: &[String],
    ) -> GeomResult<ReferenceLineSet> {
        let mut corrected = set.clone();
        let phreatic: Vec<String> = phreatic_configs
            .iter()
            .flat_map(|c| set.generated_by(c).iter().cloned())
            .collect();
        let phreatic_intrusions: Vec<String> = phreatic_configs
            .iter()
            .flat_map(|c| set.intrusions_of(c).iter().cloned())
            .collect();

        let surface_zone = Roles {
            phreatic: &phreatic,
            phreatic_intrusions: &phreatic_intrusions,
            upper: None,
            lower: set.registry.get(0),
        };
        self.apply(&mut corrected, &surface_zone, &SURFACE_ZONE_RULES)?;

        for order in set.registry.orders() {
            let (Some(lower), Some(upper)) = (set.registry.get(order), set.registry.get(order + 1))
            else {
                continue;
            };
            let pair = Roles {
                phreatic: &[],
                phreatic_intrusions: &[],
                upper: Some(upper),
                lower: Some(lower),
            };
            self.apply(&mut corrected, &pair, &AQUIFER_PAIR_RULES)?;
        }
        Ok(corrected)
    }

    fn apply(
        &self,
        set: &mut ReferenceLineSet,
        roles: &Roles<'_>,
        rules: &[Rule],
    ) -> GeomResult<()> {
        for &(top_role, bottom_role, which) in rules {
            for top_name in roles.names(top_role) {
                for bottom_name in roles.names(bottom_role) {
                    let (Some(top), Some(bottom)) = (set.line(&top_name), set.line(&bottom_name))
                    else {
                        continue;
                    };
                    let (top_points, bottom_points) = (top.line.points(), bottom.line.points());
                    let (new_top, new_bottom) = correct_crossing(
                        self.kernel,
                        &top_points,
                        &bottom_points,
                        self.soil_bottom,
                        which,
                    )?;
                    if new_top != top_points || new_bottom != bottom_points {
                        debug!(
                            top = %top_name,
                            bottom = %bottom_name,
                            ?which,
                            "Corrected crossing"
                        );
                    }
                    set.replace_points(&top_name, &new_top);
                    set.replace_points(&bottom_name, &new_bottom);
                }
            }
        }
        Ok(())
    }
}
