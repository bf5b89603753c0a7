//! Waternet configuration for one calculation stage

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::CharPointType;
use crate::waternet::offset::LineOffsetMethod;

/// Configuration errors, raised before any geometry is computed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Duplicate head line name: {0}")]
    DuplicateHeadLine(String),

    #[error("Duplicate reference line name: {0}")]
    DuplicateReferenceLine(String),

    #[error("Waternet config '{0}' has no phreatic head line")]
    MissingPhreaticLine(String),

    #[error("More than one phreatic head line: {0}")]
    MultiplePhreaticLines(String),

    #[error("Head line '{0}' is not assigned to any reference line")]
    UnassignedHeadLine(String),

    #[error("Reference line '{reference_line}' refers to unknown head line '{head_line}'")]
    UnknownHeadLine {
        reference_line: String,
        head_line: String,
    },

    #[error("Line '{line}' uses unknown offset method '{method}'")]
    UnknownOffsetMethod { line: String, method: String },

    #[error("Intrusion line '{line}' refers to unknown reference line '{source_line}'")]
    UnknownIntrusionSource { line: String, source_line: String },

    #[error("Intrusion line '{line}' cannot use intrusion line '{source_line}' as its source")]
    IntrusionOfIntrusion { line: String, source_line: String },

    #[error("Intrusion line '{0}' has zero intrusion length")]
    ZeroIntrusionLength(String),

    #[error("Head line '{head_line}' interpolates at unknown reference line '{reference_line}'")]
    UnknownInterpolationTarget {
        head_line: String,
        reference_line: String,
    },

    #[error("Head line '{0}' interpolates from a previous stage, but there is none")]
    InterpolationWithoutPreviousStage(String),

    #[error("Phreatic head line '{0}' must be built from an offset method")]
    PhreaticNotOffset(String),

    #[error("Offset method '{method}' uses water level variable '{variable}', which the stage does not map")]
    UnmappedWaterLevel { method: String, variable: String },

    #[error("No water level '{name}' at location '{location}'")]
    UnknownWaterLevel { location: String, name: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How a head line is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeadLineMethod {
    /// Evaluate a named offset template
    Offsets { offset_method: String },
    /// Interpolate the previous stage's heads along a reference line of this stage
    InterpolateFromWaternet { reference_line: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadLineConfig {
    pub name: String,
    #[serde(default)]
    pub is_phreatic: bool,
    pub method: HeadLineMethod,
}

/// Which aquifers an aquifer reference line follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AquiferSelection {
    Primary,
    Intermediate,
}

/// How a reference line is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReferenceLineMethod {
    Offsets {
        offset_method: String,
    },
    /// Top and bottom boundaries of the selected aquifers
    Aquifer {
        aquifer: AquiferSelection,
    },
    /// Another reference line shifted vertically
    Intrusion {
        from_reference_line: String,
        intrusion_length: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLineConfig {
    pub name: String,
    #[serde(default)]
    pub head_line_top: Option<String>,
    #[serde(default)]
    pub head_line_bottom: Option<String>,
    pub method: ReferenceLineMethod,
}

/// Keep the phreatic line a minimum depth below the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalSurfaceOffset {
    pub offset: f64,
    pub from_point: CharPointType,
    pub to_point: CharPointType,
}

/// Corrections applied to the phreatic head line after it is built
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhreaticLineModifications {
    /// Clip to the outer slope where free water stands above the water-side surface
    #[serde(default)]
    pub outward_intersection: bool,
    /// Clip to the inner slope where free water stands above the land-side surface
    #[serde(default)]
    pub inward_intersection: bool,
    #[serde(default)]
    pub minimal_surface_offset: Option<MinimalSurfaceOffset>,
}

/// Complete waternet description of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaternetConfig {
    pub name: String,
    /// Water level variable -> water level name at the cross-section location
    #[serde(default)]
    pub water_level_config: BTreeMap<String, String>,
    pub head_lines: Vec<HeadLineConfig>,
    pub reference_lines: Vec<ReferenceLineConfig>,
    #[serde(default)]
    pub phreatic_line_modifications: PhreaticLineModifications,
}

impl WaternetConfig {
    pub fn head_line(&self, name: &str) -> Option<&HeadLineConfig> {
        self.head_lines.iter().find(|h| h.name == name)
    }

    pub fn reference_line(&self, name: &str) -> Option<&ReferenceLineConfig> {
        self.reference_lines.iter().find(|r| r.name == name)
    }

    pub fn phreatic_line(&self) -> Option<&HeadLineConfig> {
        self.head_lines.iter().find(|h| h.is_phreatic)
    }

    /// Check the configuration for consistency
    ///
    /// `has_previous_stage` tells whether interpolation from a previous stage
    /// is possible.
    pub fn validate(
        &self,
        offset_methods: &[LineOffsetMethod],
        has_previous_stage: bool,
    ) -> ConfigResult<()> {
        self.validate_names()?;
        self.validate_phreatic()?;
        self.validate_head_assignments()?;
        self.validate_methods(offset_methods, has_previous_stage)?;
        self.validate_intrusions()
    }

    fn validate_names(&self) -> ConfigResult<()> {
        let mut seen = BTreeSet::new();
        for head_line in &self.head_lines {
            if !seen.insert(head_line.name.as_str()) {
                return Err(ConfigError::DuplicateHeadLine(head_line.name.clone()));
            }
        }
        let mut seen = BTreeSet::new();
        for reference_line in &self.reference_lines {
            if !seen.insert(reference_line.name.as_str()) {
                return Err(ConfigError::DuplicateReferenceLine(
                    reference_line.name.clone(),
                ));
            }
        }
        Ok(())
    }

    fn validate_phreatic(&self) -> ConfigResult<()> {
        let phreatic: Vec<&str> = self
            .head_lines
            .iter()
            .filter(|h| h.is_phreatic)
            .map(|h| h.name.as_str())
            .collect();
        match phreatic.as_slice() {
            [] => Err(ConfigError::MissingPhreaticLine(self.name.clone())),
            [name] => match self.head_line(name).map(|h| &h.method) {
                Some(HeadLineMethod::Offsets { .. }) => Ok(()),
                _ => Err(ConfigError::PhreaticNotOffset(name.to_string())),
            },
            names => Err(ConfigError::MultiplePhreaticLines(names.join(", "))),
        }
    }

    fn validate_head_assignments(&self) -> ConfigResult<()> {
        let mut used = BTreeSet::new();
        for reference_line in &self.reference_lines {
            let assigned = [&reference_line.head_line_top, &reference_line.head_line_bottom];
            for head_line in assigned.into_iter().flatten() {
                if self.head_line(head_line).is_none() {
                    return Err(ConfigError::UnknownHeadLine {
                        reference_line: reference_line.name.clone(),
                        head_line: head_line.clone(),
                    });
                }
                used.insert(head_line.as_str());
            }
        }
        match self
            .head_lines
            .iter()
            .find(|h| !h.is_phreatic && !used.contains(h.name.as_str()))
        {
            Some(unused) => Err(ConfigError::UnassignedHeadLine(unused.name.clone())),
            None => Ok(()),
        }
    }

    fn validate_methods(
        &self,
        offset_methods: &[LineOffsetMethod],
        has_previous_stage: bool,
    ) -> ConfigResult<()> {
        let check_offset = |line: &str, method: &str| -> ConfigResult<()> {
            let template = offset_methods.iter().find(|m| m.name == method).ok_or_else(|| {
                ConfigError::UnknownOffsetMethod {
                    line: line.to_string(),
                    method: method.to_string(),
                }
            })?;
            match template
                .water_level_variables()
                .find(|v| !self.water_level_config.contains_key(*v))
            {
                Some(variable) => Err(ConfigError::UnmappedWaterLevel {
                    method: method.to_string(),
                    variable: variable.to_string(),
                }),
                None => Ok(()),
            }
        };

        for head_line in &self.head_lines {
            match &head_line.method {
                HeadLineMethod::Offsets { offset_method } => {
                    check_offset(&head_line.name, offset_method)?
                }
                HeadLineMethod::InterpolateFromWaternet { reference_line } => {
                    if self.reference_line(reference_line).is_none() {
                        return Err(ConfigError::UnknownInterpolationTarget {
                            head_line: head_line.name.clone(),
                            reference_line: reference_line.clone(),
                        });
                    }
                    if !has_previous_stage {
                        return Err(ConfigError::InterpolationWithoutPreviousStage(
                            head_line.name.clone(),
                        ));
                    }
                }
            }
        }
        for reference_line in &self.reference_lines {
            if let ReferenceLineMethod::Offsets { offset_method } = &reference_line.method {
                check_offset(&reference_line.name, offset_method)?;
            }
        }
        Ok(())
    }

    fn validate_intrusions(&self) -> ConfigResult<()> {
        for reference_line in &self.reference_lines {
            let ReferenceLineMethod::Intrusion {
                from_reference_line,
                intrusion_length,
            } = &reference_line.method
            else {
                continue;
            };
            let source = self.reference_line(from_reference_line).ok_or_else(|| {
                ConfigError::UnknownIntrusionSource {
                    line: reference_line.name.clone(),
                    source_line: from_reference_line.clone(),
                }
            })?;
            if matches!(source.method, ReferenceLineMethod::Intrusion { .. }) {
                return Err(ConfigError::IntrusionOfIntrusion {
                    line: reference_line.name.clone(),
                    source_line: from_reference_line.clone(),
                });
            }
            if *intrusion_length == 0.0 {
                return Err(ConfigError::ZeroIntrusionLength(reference_line.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waternet::offset::{LineOffsetPoint, Offset, RefLevel};

    fn offset_methods() -> Vec<LineOffsetMethod> {
        vec![
            LineOffsetMethod::new(
                "river",
                vec![LineOffsetPoint::new(
                    CharPointType::DikeCrestWaterSide,
                    RefLevel::WaterLevel("outer".into()),
                    Offset::Vertical(0.0),
                )],
            ),
            LineOffsetMethod::new(
                "flat",
                vec![LineOffsetPoint::new(
                    CharPointType::DikeToeLandSide,
                    RefLevel::SurfaceLevel,
                    Offset::Vertical(-1.0),
                )],
            ),
        ]
    }

    fn config() -> WaternetConfig {
        WaternetConfig {
            name: "daily".into(),
            water_level_config: BTreeMap::from([("outer".to_string(), "mean".to_string())]),
            head_lines: vec![
                HeadLineConfig {
                    name: "phreatic".into(),
                    is_phreatic: true,
                    method: HeadLineMethod::Offsets {
                        offset_method: "river".into(),
                    },
                },
                HeadLineConfig {
                    name: "aquifer".into(),
                    is_phreatic: false,
                    method: HeadLineMethod::Offsets {
                        offset_method: "flat".into(),
                    },
                },
            ],
            reference_lines: vec![
                ReferenceLineConfig {
                    name: "sand".into(),
                    head_line_top: Some("aquifer".into()),
                    head_line_bottom: Some("aquifer".into()),
                    method: ReferenceLineMethod::Aquifer {
                        aquifer: AquiferSelection::Primary,
                    },
                },
                ReferenceLineConfig {
                    name: "intrusion".into(),
                    head_line_top: Some("aquifer".into()),
                    head_line_bottom: None,
                    method: ReferenceLineMethod::Intrusion {
                        from_reference_line: "sand".into(),
                        intrusion_length: 1.0,
                    },
                },
            ],
            phreatic_line_modifications: PhreaticLineModifications::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(config().validate(&offset_methods(), false), Ok(()));
    }

    #[test]
    fn test_duplicate_names() {
        let mut c = config();
        c.head_lines.push(c.head_lines[1].clone());
        assert_eq!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::DuplicateHeadLine("aquifer".into()))
        );

        let mut c = config();
        c.reference_lines.push(c.reference_lines[0].clone());
        assert_eq!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::DuplicateReferenceLine("sand".into()))
        );
    }

    #[test]
    fn test_phreatic_count() {
        let mut c = config();
        c.head_lines[0].is_phreatic = false;
        c.reference_lines[1].head_line_bottom = Some("phreatic".into());
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::MissingPhreaticLine(_))
        ));

        let mut c = config();
        c.head_lines[1].is_phreatic = true;
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::MultiplePhreaticLines(_))
        ));
    }

    #[test]
    fn test_head_line_assignments() {
        let mut c = config();
        c.reference_lines[1].head_line_bottom = Some("missing".into());
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::UnknownHeadLine { .. })
        ));

        let mut c = config();
        c.head_lines.push(HeadLineConfig {
            name: "orphan".into(),
            is_phreatic: false,
            method: HeadLineMethod::Offsets {
                offset_method: "flat".into(),
            },
        });
        assert_eq!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::UnassignedHeadLine("orphan".into()))
        );
    }

    #[test]
    fn test_offset_methods_and_water_levels() {
        let mut c = config();
        c.head_lines[1].method = HeadLineMethod::Offsets {
            offset_method: "nope".into(),
        };
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::UnknownOffsetMethod { .. })
        ));

        let mut c = config();
        c.water_level_config.clear();
        assert_eq!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::UnmappedWaterLevel {
                method: "river".into(),
                variable: "outer".into(),
            })
        );
    }

    #[test]
    fn test_intrusion_sources() {
        let mut c = config();
        c.reference_lines[1].method = ReferenceLineMethod::Intrusion {
            from_reference_line: "ghost".into(),
            intrusion_length: 1.0,
        };
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::UnknownIntrusionSource { .. })
        ));

        let mut c = config();
        c.reference_lines.push(ReferenceLineConfig {
            name: "second".into(),
            head_line_top: Some("aquifer".into()),
            head_line_bottom: None,
            method: ReferenceLineMethod::Intrusion {
                from_reference_line: "intrusion".into(),
                intrusion_length: 1.0,
            },
        });
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::IntrusionOfIntrusion { .. })
        ));

        let mut c = config();
        c.reference_lines[1].method = ReferenceLineMethod::Intrusion {
            from_reference_line: "sand".into(),
            intrusion_length: 0.0,
        };
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::ZeroIntrusionLength(_))
        ));
    }

    #[test]
    fn test_interpolation_rules() {
        let mut c = config();
        c.head_lines[1].method = HeadLineMethod::InterpolateFromWaternet {
            reference_line: "intrusion".into(),
        };
        assert_eq!(c.validate(&offset_methods(), true), Ok(()));
        assert!(matches!(
            c.validate(&offset_methods(), false),
            Err(ConfigError::InterpolationWithoutPreviousStage(_))
        ));

        c.head_lines[1].method = HeadLineMethod::InterpolateFromWaternet {
            reference_line: "nowhere".into(),
        };
        assert!(matches!(
            c.validate(&offset_methods(), true),
            Err(ConfigError::UnknownInterpolationTarget { .. })
        ));

        let mut c = config();
        c.head_lines[0].method = HeadLineMethod::InterpolateFromWaternet {
            reference_line: "sand".into(),
        };
        assert!(matches!(
            c.validate(&offset_methods(), true),
            Err(ConfigError::PhreaticNotOffset(_))
        ));
    }

    #[test]
    fn test_config_from_ron() {
        let text = r#"(
            name: "daily",
            water_level_config: {"outer": "mean"},
            head_lines: [
                (name: "phreatic", is_phreatic: true, method: Offsets(offset_method: "river")),
            ],
            reference_lines: [],
            phreatic_line_modifications: (
                outward_intersection: true,
                minimal_surface_offset: Some((
                    offset: 0.5,
                    from_point: DikeCrestLandSide,
                    to_point: SurfaceLevelLandSide,
                )),
            ),
        )"#;
        let c: WaternetConfig = ron::from_str(text).unwrap();
        assert!(c.phreatic_line_modifications.outward_intersection);
        assert!(!c.phreatic_line_modifications.inward_intersection);
        assert_eq!(c.validate(&offset_methods(), false), Ok(()));
    }
}
