//! Cross-Section Polygon Algebra
//!
//! This crate provides:
//! - Abstract polygon kernel traits for 2D boolean operations
//! - A `geo` backed kernel and a null fallback
//! - Polyline helpers for curves sorted along the horizontal axis
//! - Upper/lower boundary extraction of polygon regions
//!
//! All coordinates are `(l, z)` pairs stored in [`glam::DVec2`], with `x`
//! holding the horizontal `l` coordinate and `y` the elevation `z`.

pub mod boundary;
pub mod kernel;
pub mod polyline;

// Re-exports for convenience
pub use boundary::{lower_boundary, upper_boundary};
pub use kernel::{
    BooleanType, GeomError, GeomResult, NullKernel, Polygon2D, PolygonKernel, default_kernel,
};

#[cfg(feature = "geo")]
pub use kernel::GeoKernel;
