//! Polyline helpers
//!
//! Helpers for open curves whose vertices are sorted by the horizontal
//! coordinate. Vertical jumps are allowed: two consecutive vertices may
//! share the same `l`.

use glam::DVec2;

/// Tolerance used when comparing horizontal coordinates
pub const L_TOLERANCE: f64 = 1e-6;

/// Elevation of a polyline at `l`
///
/// Values outside the polyline's range take the nearest end elevation.
/// At a vertical jump the first (left) value wins.
pub fn z_at(points: &[DVec2], l: f64) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    if l <= first.x {
        return Some(first.y);
    }
    if l >= last.x {
        return Some(last.y);
    }
    points.windows(2).find_map(|w| {
        let (a, b) = (w[0], w[1]);
        if l >= a.x && l <= b.x {
            let dx = b.x - a.x;
            if dx.abs() < f64::EPSILON {
                Some(a.y)
            } else {
                Some(a.y + (b.y - a.y) * (l - a.x) / dx)
            }
        } else {
            None
        }
    })
}

/// Part of a polyline inside `[l_min, l_max]`, with interpolated end points
pub fn clip(points: &[DVec2], l_min: f64, l_max: f64) -> Vec<DVec2> {
    let (Some(start), Some(end)) = (z_at(points, l_min), z_at(points, l_max)) else {
        return Vec::new();
    };
    let mut clipped = vec![DVec2::new(l_min, start)];
    clipped.extend(
        points
            .iter()
            .filter(|p| p.x > l_min + L_TOLERANCE && p.x < l_max - L_TOLERANCE)
            .copied(),
    );
    if l_max > l_min + L_TOLERANCE {
        clipped.push(DVec2::new(l_max, end));
    }
    clipped
}

/// Horizontal positions where a polyline crosses `level` inside `[l_min, l_max]`
///
/// Results are sorted by `l` and free of duplicates.
pub fn level_crossings(points: &[DVec2], level: f64, l_min: f64, l_max: f64) -> Vec<f64> {
    let clipped = clip(points, l_min, l_max);
    let mut crossings: Vec<f64> = Vec::new();
    for w in clipped.windows(2) {
        let (a, b) = (w[0], w[1]);
        let da = a.y - level;
        let db = b.y - level;
        if da * db > 0.0 {
            continue;
        }
        if da == 0.0 && db == 0.0 {
            // Segment lies on the level; both ends count
            crossings.push(a.x);
            crossings.push(b.x);
        } else if da == 0.0 {
            crossings.push(a.x);
        } else if db == 0.0 {
            crossings.push(b.x);
        } else {
            crossings.push(a.x + (b.x - a.x) * da / (da - db));
        }
    }
    crossings.sort_by(f64::total_cmp);
    crossings.dedup_by(|a, b| (*a - *b).abs() < L_TOLERANCE);
    crossings
}

/// Extend a polyline to `[l_min, l_max]` by repeating its end elevations
pub fn extend_to(points: &[DVec2], l_min: f64, l_max: f64) -> Vec<DVec2> {
    let mut extended = points.to_vec();
    if let Some(first) = points.first() {
        if first.x > l_min + L_TOLERANCE {
            extended.insert(0, DVec2::new(l_min, first.y));
        }
    }
    if let Some(last) = points.last() {
        if last.x < l_max - L_TOLERANCE {
            extended.push(DVec2::new(l_max, last.y));
        }
    }
    extended
}

/// Shift every vertex vertically by `dz`
pub fn shift_vertical(points: &[DVec2], dz: f64) -> Vec<DVec2> {
    points.iter().map(|p| DVec2::new(p.x, p.y + dz)).collect()
}

/// Mean elevation of the vertices
pub fn mean_z(points: &[DVec2]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64)
}

/// Horizontal range covered by the polyline
pub fn l_range(points: &[DVec2]) -> Option<(f64, f64)> {
    let first = points.first()?;
    Some(
        points
            .iter()
            .fold((first.x, first.x), |(lo, hi), p| (lo.min(p.x), hi.max(p.x))),
    )
}

/// Drop repeated vertices and vertices lying on the straight line between
/// their neighbours
///
/// Vertical jumps are kept.
pub fn remove_collinear(points: &[DVec2], tolerance: f64) -> Vec<DVec2> {
    let mut result: Vec<DVec2> = Vec::with_capacity(points.len());
    for &p in points {
        if result
            .last()
            .is_some_and(|last| last.distance(p) < tolerance)
        {
            continue;
        }
        if result.len() >= 2 {
            let a = result[result.len() - 2];
            let b = result[result.len() - 1];
            let strictly_between = a.x + tolerance < b.x && b.x + tolerance < p.x;
            if strictly_between {
                let expected = a.y + (p.y - a.y) * (b.x - a.x) / (p.x - a.x);
                if (expected - b.y).abs() < tolerance {
                    result.pop();
                }
            }
        }
        result.push(p);
    }
    result
}
