//! Global constants for wn-core

/// Distance (m) by which artificial floors and ceilings clear every line
pub const FLOOR_MARGIN: f64 = 10.0;

/// Shift (m) applied to one of two points sharing the same `l`
pub const DUPLICATE_L_SHIFT: f64 = 0.001;

/// Depth (m) below the soil bottom that corrected lines are pushed to
pub const BELOW_SOIL_BOTTOM: f64 = 0.01;

/// Overlap pieces smaller than this area (m²) are not treated as crossings
pub const MIN_OVERLAP_AREA: f64 = 1e-6;

/// Straight-line simplification tolerance (m) for interpolated head lines
pub const INTERPOLATION_SIMPLIFY_TOLERANCE: f64 = 0.001;

/// Distance (m) within which an aquifer counts as touching the surface
pub const SURFACE_TOUCH_TOLERANCE: f64 = 1e-3;

/// Elevations closer than this (m) are treated as equal
pub const ELEVATION_TOLERANCE: f64 = 1e-9;
