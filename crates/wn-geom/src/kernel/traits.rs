//! Polygon kernel trait definitions
//!
//! These traits define the interface that all polygon kernels must implement.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boundary;

/// Error type for polygon kernel operations
#[derive(Debug, Clone, Error)]
pub enum GeomError {
    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Boolean operation failed: {0}")]
    BooleanFailed(String),

    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for polygon operations
pub type GeomResult<T> = Result<T, GeomError>;

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (add)
    Union,
    /// Subtraction (cut)
    Subtract,
    /// Intersection (common)
    Intersect,
}

/// A simple polygon in the `(l, z)` plane, optionally with holes
///
/// Rings are stored open: the first vertex is not repeated at the end.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon2D {
    /// Outer ring
    pub exterior: Vec<DVec2>,
    /// Hole rings
    #[serde(default)]
    pub interiors: Vec<Vec<DVec2>>,
}

impl Polygon2D {
    /// Create a polygon from an outer ring
    pub fn new(exterior: Vec<DVec2>) -> Self {
        Self {
            exterior: open_ring(exterior),
            interiors: Vec::new(),
        }
    }

    /// Create a polygon with holes
    pub fn with_interiors(exterior: Vec<DVec2>, interiors: Vec<Vec<DVec2>>) -> Self {
        Self {
            exterior: open_ring(exterior),
            interiors: interiors.into_iter().map(open_ring).collect(),
        }
    }

    /// Create an axis-aligned rectangle from two opposite corners
    pub fn rectangle(a: DVec2, b: DVec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(vec![
            min,
            DVec2::new(max.x, min.y),
            max,
            DVec2::new(min.x, max.y),
        ])
    }

    /// Region between a polyline (sorted by `l`) and a horizontal floor below it
    pub fn below_polyline(line: &[DVec2], floor: f64) -> Self {
        let mut ring = line.to_vec();
        if let (Some(first), Some(last)) = (line.first(), line.last()) {
            ring.push(DVec2::new(last.x, floor));
            ring.push(DVec2::new(first.x, floor));
        }
        Self::new(ring)
    }

    /// Region between a polyline (sorted by `l`) and a horizontal ceiling above it
    pub fn above_polyline(line: &[DVec2], ceiling: f64) -> Self {
        let mut ring = line.to_vec();
        if let (Some(first), Some(last)) = (line.first(), line.last()) {
            ring.push(DVec2::new(last.x, ceiling));
            ring.push(DVec2::new(first.x, ceiling));
        }
        Self::new(ring)
    }

    /// Check whether the outer ring has enough vertices to enclose an area
    pub fn is_empty(&self) -> bool {
        self.exterior.len() < 3
    }

    /// Signed area of the outer ring (negative when clockwise)
    pub fn signed_area(&self) -> f64 {
        ring_signed_area(&self.exterior)
    }

    /// Area of the polygon with its holes removed
    pub fn area(&self) -> f64 {
        let holes: f64 = self
            .interiors
            .iter()
            .map(|ring| ring_signed_area(ring).abs())
            .sum();
        (self.signed_area().abs() - holes).max(0.0)
    }

    /// Check if the outer ring runs clockwise
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Copy of this polygon with a clockwise outer ring
    pub fn to_clockwise(&self) -> Self {
        let mut polygon = self.clone();
        if !polygon.is_clockwise() {
            polygon.exterior.reverse();
        }
        polygon
    }

    /// Bounding box as `(min, max)` corners
    pub fn bounds(&self) -> Option<(DVec2, DVec2)> {
        let first = *self.exterior.first()?;
        Some(
            self.exterior
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Iterate over all edges of all rings
    pub fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        std::iter::once(&self.exterior)
            .chain(self.interiors.iter())
            .flat_map(|ring| {
                let n = ring.len();
                (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
            })
    }
}

fn open_ring(mut ring: Vec<DVec2>) -> Vec<DVec2> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn ring_signed_area(ring: &[DVec2]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// The polygon kernel trait
///
/// Implementations of this trait provide the actual polygon algebra
/// using different backends. A region is a slice of polygons that
/// together describe one (possibly disconnected) area.
pub trait PolygonKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    /// Perform a boolean operation on two regions
    ///
    /// # Arguments
    /// * `a` - The first region
    /// * `b` - The second region
    /// * `op` - The boolean operation type
    fn boolean(
        &self,
        a: &[Polygon2D],
        b: &[Polygon2D],
        op: BooleanType,
    ) -> GeomResult<Vec<Polygon2D>>;

    /// Check whether a point lies inside a region
    fn contains_point(&self, region: &[Polygon2D], point: DVec2) -> GeomResult<bool>;

    /// Check whether a polyline touches or crosses a region
    fn intersects_polyline(&self, region: &[Polygon2D], line: &[DVec2]) -> GeomResult<bool>;

    /// Shortest distance from a point to a polyline
    fn distance_to_polyline(&self, point: DVec2, line: &[DVec2]) -> GeomResult<f64>;

    /// Straight-line simplification of a polyline within `tolerance`
    fn simplify_polyline(&self, line: &[DVec2], tolerance: f64) -> GeomResult<Vec<DVec2>>;

    // ========== Provided Methods ==========

    /// Union of two regions
    fn union(&self, a: &[Polygon2D], b: &[Polygon2D]) -> GeomResult<Vec<Polygon2D>> {
        self.boolean(a, b, BooleanType::Union)
    }

    /// Intersection of two regions
    fn intersection(&self, a: &[Polygon2D], b: &[Polygon2D]) -> GeomResult<Vec<Polygon2D>> {
        self.boolean(a, b, BooleanType::Intersect)
    }

    /// Region `a` with region `b` removed
    fn difference(&self, a: &[Polygon2D], b: &[Polygon2D]) -> GeomResult<Vec<Polygon2D>> {
        self.boolean(a, b, BooleanType::Subtract)
    }

    /// Union of every polygon in a collection, split into disjoint pieces
    fn union_all(&self, polygons: &[Polygon2D]) -> GeomResult<Vec<Polygon2D>> {
        polygons.iter().try_fold(Vec::new(), |acc, polygon| {
            self.union(&acc, std::slice::from_ref(polygon))
        })
    }

    /// Upper boundary of a region as a polyline sorted by `l`
    fn upper_boundary(&self, region: &[Polygon2D]) -> GeomResult<Vec<DVec2>> {
        Ok(boundary::upper_boundary(region))
    }

    /// Lower boundary of a region as a polyline sorted by `l`
    fn lower_boundary(&self, region: &[Polygon2D]) -> GeomResult<Vec<DVec2>> {
        Ok(boundary::lower_boundary(region))
    }
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

impl PolygonKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn boolean(
        &self,
        _a: &[Polygon2D],
        _b: &[Polygon2D],
        _op: BooleanType,
    ) -> GeomResult<Vec<Polygon2D>> {
        Err(GeomError::KernelNotAvailable(
            "No polygon kernel available".into(),
        ))
    }

    fn contains_point(&self, _region: &[Polygon2D], _point: DVec2) -> GeomResult<bool> {
        Err(GeomError::KernelNotAvailable(
            "No polygon kernel available".into(),
        ))
    }

    fn intersects_polyline(&self, _region: &[Polygon2D], _line: &[DVec2]) -> GeomResult<bool> {
        Err(GeomError::KernelNotAvailable(
            "No polygon kernel available".into(),
        ))
    }

    fn distance_to_polyline(&self, _point: DVec2, _line: &[DVec2]) -> GeomResult<f64> {
        Err(GeomError::KernelNotAvailable(
            "No polygon kernel available".into(),
        ))
    }

    fn simplify_polyline(&self, _line: &[DVec2], _tolerance: f64) -> GeomResult<Vec<DVec2>> {
        Err(GeomError::KernelNotAvailable(
            "No polygon kernel available".into(),
        ))
    }
}

/// Get the default polygon kernel based on available features
pub fn default_kernel() -> Box<dyn PolygonKernel> {
    #[cfg(feature = "geo")]
    {
        Box::new(super::GeoKernel::new())
    }

    #[cfg(not(feature = "geo"))]
    {
        Box::new(NullKernel)
    }
}
