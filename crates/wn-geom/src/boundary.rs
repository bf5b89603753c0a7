//! Boundary extraction
//!
//! Extracts the upper or lower boundary of a polygon region as a polyline
//! sorted by `l`. Where the boundary jumps vertically (at a vertical wall of
//! the region) two vertices with the same `l` are emitted, left limit first.

use glam::DVec2;

use crate::kernel::Polygon2D;
use crate::polyline::{L_TOLERANCE, remove_collinear};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Approach {
    FromLeft,
    FromRight,
}

/// Upper boundary of a region
pub fn upper_boundary(region: &[Polygon2D]) -> Vec<DVec2> {
    envelope(region, Envelope::Upper)
}

/// Lower boundary of a region
pub fn lower_boundary(region: &[Polygon2D]) -> Vec<DVec2> {
    envelope(region, Envelope::Lower)
}

fn envelope(region: &[Polygon2D], kind: Envelope) -> Vec<DVec2> {
    // Vertical edges never contribute; the jump is recovered from the
    // left and right limits of the neighbouring edges.
    let edges: Vec<(DVec2, DVec2)> = region
        .iter()
        .flat_map(Polygon2D::edges)
        .filter(|(a, b)| (b.x - a.x).abs() > L_TOLERANCE)
        .map(|(a, b)| if a.x < b.x { (a, b) } else { (b, a) })
        .collect();
    if edges.is_empty() {
        return Vec::new();
    }

    let mut xs: Vec<f64> = edges.iter().flat_map(|(a, b)| [a.x, b.x]).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup_by(|a, b| (*a - *b).abs() < L_TOLERANCE);

    let mut points = Vec::with_capacity(xs.len() * 2);
    for &x in &xs {
        let left = limit(&edges, x, Approach::FromLeft, kind);
        let right = limit(&edges, x, Approach::FromRight, kind);
        match (left, right) {
            (Some(a), Some(b)) if (a - b).abs() < L_TOLERANCE => points.push(DVec2::new(x, a)),
            (Some(a), Some(b)) => {
                points.push(DVec2::new(x, a));
                points.push(DVec2::new(x, b));
            }
            (Some(z), None) | (None, Some(z)) => points.push(DVec2::new(x, z)),
            (None, None) => {}
        }
    }

    remove_collinear(&points, L_TOLERANCE)
}

fn limit(edges: &[(DVec2, DVec2)], x: f64, approach: Approach, kind: Envelope) -> Option<f64> {
    edges
        .iter()
        .filter(|(a, b)| match approach {
            Approach::FromLeft => a.x < x - L_TOLERANCE && b.x > x - L_TOLERANCE,
            Approach::FromRight => a.x < x + L_TOLERANCE && b.x > x + L_TOLERANCE,
        })
        .map(|(a, b)| {
            let t = ((x - a.x) / (b.x - a.x)).clamp(0.0, 1.0);
            a.y + (b.y - a.y) * t
        })
        .reduce(|acc, z| match kind {
            Envelope::Upper => acc.max(z),
            Envelope::Lower => acc.min(z),
        })
}
