//! Waternet synthesis for dike cross-sections
//!
//! This crate provides:
//! - Cross-section geometry with `l` coordinate assignment
//! - Subsoil construction from 1D soil profiles
//! - Head lines, reference lines and waternets
//! - The per-stage waternet pipeline and its configuration
//! - RON scenario files running a sequence of stages

pub mod config;
pub mod constants;
pub mod geometry;
pub mod scenario;
pub mod soil;
pub mod water;
pub mod waternet;

// Re-exports for convenience
pub use config::{
    AquiferSelection, ConfigError, ConfigResult, HeadLineConfig, HeadLineMethod,
    MinimalSurfaceOffset, PhreaticLineModifications, ReferenceLineConfig, ReferenceLineMethod,
    WaternetConfig,
};
pub use geometry::{
    CharPointType, CharacteristicPoint, Geometry, GeometryError, GeometryInput, Point, Side,
    SurfaceLine, create_geometry,
};
pub use scenario::{Scenario, ScenarioError, StageConfig, StageWaternet};
pub use soil::{SoilError, SoilLayer, SoilPolygon, SoilProfile, SoilProfilePosition, Subsoil};
pub use water::{HeadLine, ReferenceLine, WaterLevels, WaterLine, Waternet};
pub use waternet::offset::{LineOffsetMethod, LineOffsetPoint, Offset, RefLevel};
pub use waternet::{WaternetCreator, WaternetError, WaternetResult};
