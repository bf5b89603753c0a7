//! Geo Polygon Kernel Backend
//!
//! Pure Rust polygon algebra using the `geo` crate.

use glam::DVec2;

use geo::{
    BooleanOps, Contains, Coord, EuclideanDistance, Intersects, LineString, MultiPolygon, Point,
    Polygon, Simplify,
};

use super::{BooleanType, GeomError, GeomResult, Polygon2D, PolygonKernel};

/// Pieces smaller than this are boolean-operation slivers
const MIN_PIECE_AREA: f64 = 1e-10;

/// Geo-based polygon kernel
#[derive(Debug, Default)]
pub struct GeoKernel;

impl GeoKernel {
    /// Create a new geo kernel
    pub fn new() -> Self {
        Self
    }

    fn to_line_string(points: &[DVec2]) -> LineString<f64> {
        points.iter().map(|p| Coord { x: p.x, y: p.y }).collect()
    }

    fn to_geo(polygon: &Polygon2D) -> Polygon<f64> {
        Polygon::new(
            Self::to_line_string(&polygon.exterior),
            polygon
                .interiors
                .iter()
                .map(|ring| Self::to_line_string(ring))
                .collect(),
        )
    }

    fn to_multi(region: &[Polygon2D]) -> MultiPolygon<f64> {
        MultiPolygon::new(
            region
                .iter()
                .filter(|p| !p.is_empty())
                .map(Self::to_geo)
                .collect(),
        )
    }

    fn from_ring(ring: &LineString<f64>) -> Vec<DVec2> {
        ring.coords().map(|c| DVec2::new(c.x, c.y)).collect()
    }

    fn from_geo(polygon: &Polygon<f64>) -> Polygon2D {
        Polygon2D::with_interiors(
            Self::from_ring(polygon.exterior()),
            polygon.interiors().iter().map(Self::from_ring).collect(),
        )
    }
}

impl PolygonKernel for GeoKernel {
    fn name(&self) -> &str {
        "geo"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn boolean(
        &self,
        a: &[Polygon2D],
        b: &[Polygon2D],
        op: BooleanType,
    ) -> GeomResult<Vec<Polygon2D>> {
        if a.iter().chain(b).any(|p| p.exterior.iter().any(|v| !v.is_finite())) {
            return Err(GeomError::InvalidPolygon(
                "polygon contains non-finite coordinates".into(),
            ));
        }

        let a = Self::to_multi(a);
        let b = Self::to_multi(b);
        let result = match op {
            BooleanType::Union => a.union(&b),
            BooleanType::Intersect => a.intersection(&b),
            BooleanType::Subtract => a.difference(&b),
        };

        Ok(result
            .0
            .iter()
            .map(Self::from_geo)
            .filter(|p| p.area() > MIN_PIECE_AREA)
            .collect())
    }

    fn contains_point(&self, region: &[Polygon2D], point: DVec2) -> GeomResult<bool> {
        let point = Point::new(point.x, point.y);
        Ok(region.iter().any(|p| Self::to_geo(p).contains(&point)))
    }

    fn intersects_polyline(&self, region: &[Polygon2D], line: &[DVec2]) -> GeomResult<bool> {
        if line.len() < 2 {
            return Err(GeomError::OperationFailed(
                "polyline needs at least two points".into(),
            ));
        }
        let line = Self::to_line_string(line);
        Ok(region.iter().any(|p| Self::to_geo(p).intersects(&line)))
    }

    #[allow(deprecated)]
    fn distance_to_polyline(&self, point: DVec2, line: &[DVec2]) -> GeomResult<f64> {
        match line {
            [] => Err(GeomError::OperationFailed("empty polyline".into())),
            [single] => Ok(point.distance(*single)),
            _ => {
                let line = Self::to_line_string(line);
                Ok(Point::new(point.x, point.y).euclidean_distance(&line))
            }
        }
    }

    fn simplify_polyline(&self, line: &[DVec2], tolerance: f64) -> GeomResult<Vec<DVec2>> {
        if line.len() < 3 {
            return Ok(line.to_vec());
        }
        let simplified = Self::to_line_string(line).simplify(&tolerance);
        Ok(Self::from_ring(&simplified))
    }
}
