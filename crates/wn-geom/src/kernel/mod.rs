//! Polygon kernel abstraction
//!
//! Backends are selected at compile time through cargo features.

#[cfg(feature = "geo")]
mod geo_kernel;
mod traits;

#[cfg(feature = "geo")]
pub use geo_kernel::GeoKernel;
pub use traits::*;
