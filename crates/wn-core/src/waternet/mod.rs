//! Waternet synthesis for one calculation stage
//!
//! The pipeline runs in fixed steps, each producing a new snapshot:
//!
//! 1. resolve the stage's water level variables
//! 2. build offset head lines, then correct the phreatic line
//! 3. build reference lines (aquifer, offset, intrusion)
//! 4. correct crossings between reference lines
//! 5. perturb duplicate `l` values on reference lines
//! 6. build head lines interpolated from the previous stage
//! 7. perturb duplicate `l` values on head lines
//! 8. assemble the waternet

pub mod aquifer;
pub mod correction;
pub mod interpolate;
pub mod offset;
pub mod phreatic;
pub mod reference_line;

use std::collections::BTreeMap;

use tracing::{debug, info};
use wn_geom::{GeomError, PolygonKernel};

use crate::config::{ConfigError, HeadLineMethod, ReferenceLineMethod, WaternetConfig};
use crate::geometry::{Geometry, GeometryError};
use crate::soil::Subsoil;
use crate::water::{HeadLine, ReferenceLine, WaterLevels, Waternet};

use aquifer::{AquiferError, detect_aquifers};
use correction::ReferenceLineCorrector;
use interpolate::{InterpolationError, PreviousStage, interpolate_head_line};
use offset::{LineOffsetMethod, OffsetError};
use phreatic::PhreaticLineModifier;
use reference_line::{ReferenceLineFactory, ReferenceLineSet};

/// Errors that abort the synthesis of a stage
#[derive(Debug, Clone, thiserror::Error)]
pub enum WaternetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Offset error: {0}")]
    Offset(#[from] OffsetError),

    #[error("Aquifer error: {0}")]
    Aquifer(#[from] AquiferError),

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("Polygon kernel error: {0}")]
    Geom(#[from] GeomError),

    #[error("Reference line '{reference_line}' resolves to {count} lines; head line '{head_line}' needs exactly one")]
    AmbiguousTarget {
        head_line: String,
        reference_line: String,
        count: usize,
    },

    #[error("Intrusion line '{line}': source '{source_line}' produced no reference lines")]
    UnresolvedIntrusionSource { line: String, source_line: String },
}

/// Result type for waternet synthesis
pub type WaternetResult<T> = Result<T, WaternetError>;

/// Water level variables resolved to elevations
pub type ResolvedLevels = BTreeMap<String, f64>;

/// Builds the waternet of one stage
pub struct WaternetCreator<'a> {
    kernel: &'a dyn PolygonKernel,
    geometry: &'a Geometry,
    subsoil: &'a Subsoil,
    config: &'a WaternetConfig,
    offset_methods: &'a [LineOffsetMethod],
    water_levels: Option<&'a WaterLevels>,
    previous: Option<PreviousStage<'a>>,
}

impl<'a> WaternetCreator<'a> {
    pub fn new(
        kernel: &'a dyn PolygonKernel,
        geometry: &'a Geometry,
        subsoil: &'a Subsoil,
        config: &'a WaternetConfig,
    ) -> Self {
        Self {
            kernel,
            geometry,
            subsoil,
            config,
            offset_methods: &[],
            water_levels: None,
            previous: None,
        }
    }

    pub fn with_offset_methods(mut self, offset_methods: &'a [LineOffsetMethod]) -> Self {
        self.offset_methods = offset_methods;
        self
    }

    pub fn with_water_levels(mut self, water_levels: &'a WaterLevels) -> Self {
        self.water_levels = Some(water_levels);
        self
    }

    pub fn with_previous_stage(mut self, previous: PreviousStage<'a>) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Run the pipeline
    pub fn create(&self) -> WaternetResult<Waternet> {
        self.config
            .validate(self.offset_methods, self.previous.is_some())?;

        let levels = self.resolve_levels()?;
        let head_lines = self.build_offset_head_lines(&levels)?;
        let reference_lines = self.build_reference_lines(&levels)?;
        let reference_lines = self.correct_crossings(&reference_lines)?;
        let reference_lines = perturb_reference_lines(reference_lines);
        let head_lines = self.build_interpolated_head_lines(head_lines, &reference_lines)?;
        let head_lines = perturb_head_lines(head_lines);

        info!(
            waternet = %self.config.name,
            head_lines = head_lines.len(),
            reference_lines = reference_lines.lines.len(),
            "Created waternet"
        );
        Ok(Waternet {
            name: self.config.name.clone(),
            head_lines,
            reference_lines: reference_lines.lines,
        })
    }

    /// Map each water level variable to an elevation at this cross-section
    pub fn resolve_levels(&self) -> WaternetResult<ResolvedLevels> {
        let location = &self.geometry.name;
        self.config
            .water_level_config
            .iter()
            .map(|(variable, name)| {
                self.water_levels
                    .and_then(|levels| levels.get(location, name))
                    .map(|level| (variable.clone(), level))
                    .ok_or_else(|| {
                        ConfigError::UnknownWaterLevel {
                            location: location.clone(),
                            name: name.clone(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    /// Offset head lines in configuration order, with the phreatic line corrected
    fn build_offset_head_lines(&self, levels: &ResolvedLevels) -> WaternetResult<Vec<HeadLine>> {
        let modifier = PhreaticLineModifier::new(self.kernel, self.geometry);
        let mut head_lines = Vec::new();
        for config in &self.config.head_lines {
            let HeadLineMethod::Offsets { offset_method } = &config.method else {
                continue;
            };
            let method = self.offset_method(&config.name, offset_method)?;
            let mut points = method.create_line(self.geometry, levels)?;
            if config.is_phreatic {
                points = modifier.modify(&points, &self.config.phreatic_line_modifications)?;
            }
            head_lines.push(HeadLine::new(config.name.clone(), &points, config.is_phreatic));
        }
        debug!(count = head_lines.len(), "Built offset head lines");
        Ok(head_lines)
    }

    fn build_reference_lines(&self, levels: &ResolvedLevels) -> WaternetResult<ReferenceLineSet> {
        let aquifers = detect_aquifers(self.kernel, self.geometry, self.subsoil)?;
        ReferenceLineFactory::new(self.geometry, &aquifers, self.offset_methods, levels)
            .build(&self.config.reference_lines)
    }

    fn correct_crossings(&self, set: &ReferenceLineSet) -> WaternetResult<ReferenceLineSet> {
        let soil_bottom = self
            .subsoil
            .bottom()
            .unwrap_or_else(|| self.geometry.surface_line.min_z());
        let phreatic_configs = self.phreatic_reference_configs();
        Ok(ReferenceLineCorrector::new(self.kernel, soil_bottom).correct(set, &phreatic_configs)?)
    }

    /// Non-aquifer reference line configurations carrying the phreatic head on top
    fn phreatic_reference_configs(&self) -> Vec<String> {
        let Some(phreatic) = self.config.phreatic_line() else {
            return Vec::new();
        };
        self.config
            .reference_lines
            .iter()
            .filter(|r| matches!(r.method, ReferenceLineMethod::Offsets { .. }))
            .filter(|r| r.head_line_top.as_deref() == Some(phreatic.name.as_str()))
            .map(|r| r.name.clone())
            .collect()
    }

    /// Add interpolated head lines and restore configuration order
    fn build_interpolated_head_lines(
        &self,
        offset_head_lines: Vec<HeadLine>,
        reference_lines: &ReferenceLineSet,
    ) -> WaternetResult<Vec<HeadLine>> {
        let mut by_name: BTreeMap<String, HeadLine> = offset_head_lines
            .into_iter()
            .map(|h| (h.name().to_string(), h))
            .collect();

        for config in &self.config.head_lines {
            let HeadLineMethod::InterpolateFromWaternet { reference_line } = &config.method else {
                continue;
            };
            let Some(previous) = self.previous else {
                return Err(
                    ConfigError::InterpolationWithoutPreviousStage(config.name.clone()).into(),
                );
            };
            let target = self.interpolation_target(&config.name, reference_line, reference_lines)?;
            let head_line = interpolate_head_line(self.kernel, &config.name, target, previous)?;
            by_name.insert(config.name.clone(), head_line);
        }

        Ok(self
            .config
            .head_lines
            .iter()
            .filter_map(|c| by_name.remove(&c.name))
            .collect())
    }

    /// The single reference line generated for a configured name
    fn interpolation_target<'r>(
        &self,
        head_line: &str,
        reference_line: &str,
        reference_lines: &'r ReferenceLineSet,
    ) -> WaternetResult<&'r ReferenceLine> {
        let generated = reference_lines.generated_by(reference_line);
        match generated {
            [single] => reference_lines.line(single).ok_or_else(|| {
                WaternetError::AmbiguousTarget {
                    head_line: head_line.to_string(),
                    reference_line: reference_line.to_string(),
                    count: 0,
                }
            }),
            _ => Err(WaternetError::AmbiguousTarget {
                head_line: head_line.to_string(),
                reference_line: reference_line.to_string(),
                count: generated.len(),
            }),
        }
    }

    fn offset_method(&self, line: &str, name: &str) -> WaternetResult<&'a LineOffsetMethod> {
        self.offset_methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                ConfigError::UnknownOffsetMethod {
                    line: line.to_string(),
                    method: name.to_string(),
                }
                .into()
            })
    }
}

fn perturb_reference_lines(mut set: ReferenceLineSet) -> ReferenceLineSet {
    for line in &mut set.lines {
        line.line.perturb_duplicate_l();
    }
    set
}

fn perturb_head_lines(mut lines: Vec<HeadLine>) -> Vec<HeadLine> {
    for line in &mut lines {
        line.line.perturb_duplicate_l();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeadLineConfig, PhreaticLineModifications, ReferenceLineConfig};
    use crate::geometry::CharPointType;
    use crate::geometry::test_support::geometry_from_lz;
    use offset::{LineOffsetPoint, Offset, RefLevel};
    use wn_geom::GeoKernel;

    fn geometry() -> Geometry {
        geometry_from_lz(
            &[(0.0, 0.0), (30.0, 0.0)],
            &[
                (CharPointType::SurfaceLevelWaterSide, 0.0),
                (CharPointType::DikeToeLandSide, 15.0),
                (CharPointType::SurfaceLevelLandSide, 30.0),
            ],
        )
    }

    fn methods() -> Vec<LineOffsetMethod> {
        vec![LineOffsetMethod::new(
            "river",
            vec![LineOffsetPoint::new(
                CharPointType::DikeToeLandSide,
                RefLevel::WaterLevel("outer".into()),
                Offset::Vertical(0.0),
            )],
        )]
    }

    fn config() -> WaternetConfig {
        WaternetConfig {
            name: "stage".into(),
            water_level_config: BTreeMap::from([("outer".to_string(), "high".to_string())]),
            head_lines: vec![HeadLineConfig {
                name: "phreatic".into(),
                is_phreatic: true,
                method: HeadLineMethod::Offsets {
                    offset_method: "river".into(),
                },
            }],
            reference_lines: vec![ReferenceLineConfig {
                name: "surface_ref".into(),
                head_line_top: Some("phreatic".into()),
                head_line_bottom: None,
                method: ReferenceLineMethod::Offsets {
                    offset_method: "river".into(),
                },
            }],
            phreatic_line_modifications: PhreaticLineModifications::default(),
        }
    }

    #[test]
    fn test_resolve_levels_reads_location() {
        let kernel = GeoKernel::new();
        let geometry = geometry();
        let subsoil = Subsoil::default();
        let config = config();
        let mut levels = WaterLevels::default();
        levels.insert("test", "high", 1.5);

        let creator = WaternetCreator::new(&kernel, &geometry, &subsoil, &config)
            .with_water_levels(&levels);
        assert_eq!(creator.resolve_levels().unwrap()["outer"], 1.5);

        let other = WaterLevels::default();
        let creator = WaternetCreator::new(&kernel, &geometry, &subsoil, &config)
            .with_water_levels(&other);
        assert!(matches!(
            creator.resolve_levels(),
            Err(WaternetError::Config(ConfigError::UnknownWaterLevel { .. }))
        ));
    }

    #[test]
    fn test_create_without_subsoil() {
        let kernel = GeoKernel::new();
        let geometry = geometry();
        let subsoil = Subsoil::default();
        let config = config();
        let methods = methods();
        let mut levels = WaterLevels::default();
        levels.insert("test", "high", 1.5);

        let waternet = WaternetCreator::new(&kernel, &geometry, &subsoil, &config)
            .with_offset_methods(&methods)
            .with_water_levels(&levels)
            .create()
            .unwrap();
        assert_eq!(waternet.name, "stage");
        assert_eq!(waternet.phreatic_line().unwrap().line.z, vec![1.5, 1.5, 1.5]);
        assert_eq!(waternet.reference_lines.len(), 1);
    }

    #[test]
    fn test_invalid_config_fails_before_synthesis() {
        let kernel = GeoKernel::new();
        let geometry = geometry();
        let subsoil = Subsoil::default();
        let config = config();
        let waternet = WaternetCreator::new(&kernel, &geometry, &subsoil, &config).create();
        assert!(matches!(
            waternet,
            Err(WaternetError::Config(ConfigError::UnknownOffsetMethod { .. }))
        ));
    }
}
