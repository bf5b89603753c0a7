//! Head lines interpolated from the previous stage's waternet

use glam::DVec2;
use tracing::debug;
use wn_geom::polyline::{self, L_TOLERANCE};
use wn_geom::{GeomError, PolygonKernel};

use crate::constants::{ELEVATION_TOLERANCE, INTERPOLATION_SIMPLIFY_TOLERANCE};
use crate::geometry::{GeometryError, SurfaceLine};
use crate::water::{HeadLine, ReferenceLine, Waternet};

#[derive(Debug, Clone, thiserror::Error)]
pub enum InterpolationError {
    #[error("Previous waternet '{0}' has no phreatic line")]
    NoPhreaticLine(String),

    #[error("Reference line '{0}' has no head line assigned")]
    MissingHead(String),

    #[error("Head line '{head_line}' of reference line '{reference_line}' is not in the previous waternet")]
    UnknownHeadLine {
        reference_line: String,
        head_line: String,
    },

    #[error("Lines at l = {l}, z = {z} carry different heads")]
    AmbiguousHead { l: f64, z: f64 },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Polygon kernel error: {0}")]
    Geom(#[from] GeomError),
}

pub type InterpolationResult<T> = Result<T, InterpolationError>;

/// Waternet and surface of the stage before the current one
#[derive(Debug, Clone, Copy)]
pub struct PreviousStage<'a> {
    pub waternet: &'a Waternet,
    pub surface_line: &'a SurfaceLine,
}

/// A line of the previous stage that can bracket a target elevation
enum Bracket<'a> {
    Surface,
    Phreatic,
    Reference(&'a ReferenceLine),
}

/// Which side of a bracketing line the target lies on
#[derive(Clone, Copy)]
enum Approach {
    FromAbove,
    FromBelow,
}

struct Context<'a> {
    previous: PreviousStage<'a>,
    phreatic: Vec<DVec2>,
}

impl Context<'_> {
    fn head_line_at(&self, name: &str, owner: &str, l: f64) -> InterpolationResult<f64> {
        let head_line = self.previous.waternet.head_line(name).ok_or_else(|| {
            InterpolationError::UnknownHeadLine {
                reference_line: owner.to_string(),
                head_line: name.to_string(),
            }
        })?;
        head_line
            .line
            .z_at(l)
            .ok_or_else(|| InterpolationError::MissingHead(owner.to_string()))
    }

    /// Head supplied by a bracketing line, seen from `side`
    fn head(&self, bracket: &Bracket<'_>, l: f64, side: Approach) -> InterpolationResult<f64> {
        match bracket {
            Bracket::Surface | Bracket::Phreatic => {
                polyline::z_at(&self.phreatic, l).ok_or_else(|| {
                    InterpolationError::NoPhreaticLine(self.previous.waternet.name.clone())
                })
            }
            Bracket::Reference(line) => {
                let (preferred, other) = match side {
                    Approach::FromAbove => (&line.head_line_top, &line.head_line_bottom),
                    Approach::FromBelow => (&line.head_line_bottom, &line.head_line_top),
                };
                let name = preferred
                    .as_ref()
                    .or(other.as_ref())
                    .ok_or_else(|| InterpolationError::MissingHead(line.name().to_string()))?;
                self.head_line_at(name, line.name(), l)
            }
        }
    }

    /// Every head a line lying exactly at the target can supply
    fn heads_on_line(&self, bracket: &Bracket<'_>, l: f64) -> InterpolationResult<Vec<f64>> {
        match bracket {
            Bracket::Reference(line) => {
                let names: Vec<&String> = [&line.head_line_top, &line.head_line_bottom]
                    .into_iter()
                    .flatten()
                    .collect();
                if names.is_empty() {
                    return Err(InterpolationError::MissingHead(line.name().to_string()));
                }
                names
                    .into_iter()
                    .map(|name| self.head_line_at(name, line.name(), l))
                    .collect()
            }
            other => Ok(vec![self.head(other, l, Approach::FromAbove)?]),
        }
    }
}

/// Interpolate a head line along `target` from the previous stage
///
/// At every `l` where a previous-stage line or the target has a vertex, the
/// head is interpolated by elevation between the nearest previous-stage
/// lines below and above the target.
pub fn interpolate_head_line(
    kernel: &dyn PolygonKernel,
    name: &str,
    target: &ReferenceLine,
    previous: PreviousStage<'_>,
) -> InterpolationResult<HeadLine> {
    let phreatic = previous
        .waternet
        .phreatic_line()
        .ok_or_else(|| InterpolationError::NoPhreaticLine(previous.waternet.name.clone()))?
        .line
        .points();
    let surface = previous.surface_line.polyline()?;

    let mut brackets: Vec<(Bracket<'_>, Vec<DVec2>)> = vec![
        (Bracket::Surface, surface),
        (Bracket::Phreatic, phreatic.clone()),
    ];
    brackets.extend(
        previous
            .waternet
            .reference_lines
            .iter()
            .map(|line| (Bracket::Reference(line), line.line.points())),
    );

    let target_points = target.line.points();
    let mut ls: Vec<f64> = brackets
        .iter()
        .flat_map(|(_, points)| points.iter().map(|p| p.x))
        .chain(target_points.iter().map(|p| p.x))
        .collect();
    ls.sort_by(f64::total_cmp);
    ls.dedup_by(|a, b| (*a - *b).abs() < L_TOLERANCE);

    let context = Context { previous, phreatic };
    let mut points = Vec::with_capacity(ls.len());
    for l in ls {
        let Some(zt) = polyline::z_at(&target_points, l) else {
            continue;
        };
        let elevations: Vec<Option<f64>> = brackets
            .iter()
            .map(|(_, points)| polyline::z_at(points, l))
            .collect();
        let head = head_at(&context, &brackets, &elevations, l, zt)?;
        points.push(DVec2::new(l, head));
    }

    let simplified = kernel.simplify_polyline(&points, INTERPOLATION_SIMPLIFY_TOLERANCE)?;
    debug!(
        head_line = name,
        reference_line = target.name(),
        points = simplified.len(),
        "Interpolated head line"
    );
    Ok(HeadLine::new(name, &simplified, false))
}

fn head_at(
    context: &Context<'_>,
    brackets: &[(Bracket<'_>, Vec<DVec2>)],
    elevations: &[Option<f64>],
    l: f64,
    zt: f64,
) -> InterpolationResult<f64> {
    let mut on_target: Vec<f64> = Vec::new();
    let mut below: Option<(usize, f64)> = None;
    let mut above: Option<(usize, f64)> = None;

    for (i, z) in elevations.iter().enumerate() {
        let Some(z) = *z else { continue };
        if (z - zt).abs() <= ELEVATION_TOLERANCE {
            on_target.extend(context.heads_on_line(&brackets[i].0, l)?);
        } else if z < zt {
            if below.is_none_or(|(_, best)| z > best) {
                below = Some((i, z));
            }
        } else if above.is_none_or(|(_, best)| z < best) {
            above = Some((i, z));
        }
    }

    if let Some(&first) = on_target.first() {
        if on_target.iter().any(|h| (h - first).abs() > ELEVATION_TOLERANCE) {
            return Err(InterpolationError::AmbiguousHead { l, z: zt });
        }
        return Ok(first);
    }

    match (below, above) {
        (Some((ib, zb)), Some((ia, za))) => {
            let hb = context.head(&brackets[ib].0, l, Approach::FromAbove)?;
            let ha = context.head(&brackets[ia].0, l, Approach::FromBelow)?;
            Ok(hb + (zt - zb) / (za - zb) * (ha - hb))
        }
        (Some((ib, _)), None) => context.head(&brackets[ib].0, l, Approach::FromAbove),
        (None, Some((ia, _))) => context.head(&brackets[ia].0, l, Approach::FromBelow),
        (None, None) => Err(InterpolationError::NoPhreaticLine(
            context.previous.waternet.name.clone(),
        )),
    }
}
