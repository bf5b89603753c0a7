//! Reference line placement: aquifer, offset and intrusion methods

use std::collections::BTreeMap;

use glam::DVec2;
use tracing::{debug, warn};
use wn_geom::polyline;

use super::aquifer::{Aquifer, AquiferType};
use super::offset::LineOffsetMethod;
use super::{WaternetError, WaternetResult};
use crate::config::{AquiferSelection, ConfigError, ReferenceLineConfig, ReferenceLineMethod};
use crate::geometry::Geometry;
use crate::water::ReferenceLine;

/// Reference lines generated for one aquifer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AquiferLines {
    pub top: String,
    pub bottom: String,
    /// Intrusions rising from the top line
    pub top_intrusions: Vec<String>,
    /// Intrusions sinking from the bottom line
    pub bottom_intrusions: Vec<String>,
}

/// Reference line names per aquifer order
///
/// Each update returns a new registry, so snapshots taken earlier in the
/// pipeline stay untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AquiferRegistry {
    lines: BTreeMap<usize, AquiferLines>,
}

impl AquiferRegistry {
    pub fn get(&self, order: usize) -> Option<&AquiferLines> {
        self.lines.get(&order)
    }

    /// Registered aquifer orders, ascending
    pub fn orders(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.keys().copied()
    }

    /// Order of the aquifer whose top or bottom line is `line`
    pub fn order_of(&self, line: &str) -> Option<usize> {
        self.lines
            .iter()
            .find(|(_, l)| l.top == line || l.bottom == line)
            .map(|(order, _)| *order)
    }

    #[must_use]
    pub fn with_aquifer(&self, order: usize, top: String, bottom: String) -> Self {
        let mut next = self.clone();
        if next.lines.contains_key(&order) {
            warn!(order, "Aquifer lines registered twice; keeping the latest");
        }
        next.lines.insert(
            order,
            AquiferLines {
                top,
                bottom,
                ..Default::default()
            },
        );
        next
    }

    #[must_use]
    pub fn with_intrusion(&self, order: usize, name: String, upward: bool) -> Self {
        let mut next = self.clone();
        if let Some(lines) = next.lines.get_mut(&order) {
            if upward {
                lines.top_intrusions.push(name);
            } else {
                lines.bottom_intrusions.push(name);
            }
        }
        next
    }
}

/// Reference lines of a stage together with their bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceLineSet {
    pub lines: Vec<ReferenceLine>,
    pub registry: AquiferRegistry,
    /// Generated line names per configured reference line
    pub generated: BTreeMap<String, Vec<String>>,
    /// Intrusion line names per source configuration
    pub intrusions: BTreeMap<String, Vec<String>>,
}

impl ReferenceLineSet {
    pub fn line(&self, name: &str) -> Option<&ReferenceLine> {
        self.lines.iter().find(|l| l.name() == name)
    }

    pub fn generated_by(&self, config_name: &str) -> &[String] {
        self.generated
            .get(config_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn intrusions_of(&self, config_name: &str) -> &[String] {
        self.intrusions
            .get(config_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replace the vertices of a line, keeping its head assignments
    pub fn replace_points(&mut self, name: &str, points: &[DVec2]) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.name() == name) {
            *line = line.with_points(points);
        }
    }

    #[must_use]
    fn with_line(mut self, config_name: &str, line: ReferenceLine) -> Self {
        self.generated
            .entry(config_name.to_string())
            .or_default()
            .push(line.name().to_string());
        self.lines.push(line);
        self
    }
}

/// Builds the reference lines of a stage from its configuration
pub struct ReferenceLineFactory<'a> {
    geometry: &'a Geometry,
    aquifers: &'a [Aquifer],
    offset_methods: &'a [LineOffsetMethod],
    water_levels: &'a BTreeMap<String, f64>,
}

impl<'a> ReferenceLineFactory<'a> {
    pub fn new(
        geometry: &'a Geometry,
        aquifers: &'a [Aquifer],
        offset_methods: &'a [LineOffsetMethod],
        water_levels: &'a BTreeMap<String, f64>,
    ) -> Self {
        Self {
            geometry,
            aquifers,
            offset_methods,
            water_levels,
        }
    }

    /// Build aquifer lines first, then offset lines, then intrusions
    pub fn build(&self, configs: &[ReferenceLineConfig]) -> WaternetResult<ReferenceLineSet> {
        let mut set = ReferenceLineSet::default();

        for config in configs {
            if let ReferenceLineMethod::Aquifer { aquifer } = config.method {
                set = self.add_aquifer_lines(set, config, aquifer);
            }
        }
        for config in configs {
            if let ReferenceLineMethod::Offsets { offset_method } = &config.method {
                set = self.add_offset_line(set, config, offset_method)?;
            }
        }
        for config in configs {
            if let ReferenceLineMethod::Intrusion {
                from_reference_line,
                intrusion_length,
            } = &config.method
            {
                set =
                    self.add_intrusion_lines(set, config, from_reference_line, *intrusion_length)?;
            }
        }

        debug!(count = set.lines.len(), "Built reference lines");
        Ok(set)
    }

    fn add_aquifer_lines(
        &self,
        mut set: ReferenceLineSet,
        config: &ReferenceLineConfig,
        selection: AquiferSelection,
    ) -> ReferenceLineSet {
        let wanted = match selection {
            AquiferSelection::Primary => AquiferType::Primary,
            AquiferSelection::Intermediate => AquiferType::Intermediate,
        };
        let mut count = 0;
        for aquifer in self.aquifers.iter().filter(|a| a.aquifer_type == wanted) {
            let (top, bottom) = aquifer.boundaries();
            let top_name = format!("{}_{}_top", config.name, aquifer.order_id);
            let bottom_name = format!("{}_{}_bottom", config.name, aquifer.order_id);

            set.registry =
                set.registry
                    .with_aquifer(aquifer.order_id, top_name.clone(), bottom_name.clone());
            set = set.with_line(&config.name, self.line(config, top_name, &top));
            set = set.with_line(&config.name, self.line(config, bottom_name, &bottom));
            count += 1;
        }
        if count == 0 {
            debug!(line = %config.name, ?selection, "No matching aquifers");
        }
        set
    }

    fn add_offset_line(
        &self,
        set: ReferenceLineSet,
        config: &ReferenceLineConfig,
        offset_method: &str,
    ) -> WaternetResult<ReferenceLineSet> {
        let method = self
            .offset_methods
            .iter()
            .find(|m| m.name == offset_method)
            .ok_or_else(|| ConfigError::UnknownOffsetMethod {
                line: config.name.clone(),
                method: offset_method.to_string(),
            })?;
        let points = method.create_line(self.geometry, self.water_levels)?;
        Ok(set.with_line(&config.name, self.line(config, config.name.clone(), &points)))
    }

    fn add_intrusion_lines(
        &self,
        mut set: ReferenceLineSet,
        config: &ReferenceLineConfig,
        source: &str,
        length: f64,
    ) -> WaternetResult<ReferenceLineSet> {
        let generated = set.generated_by(source).to_vec();
        let orders: Vec<usize> = generated
            .iter()
            .filter_map(|name| set.registry.order_of(name))
            .fold(Vec::new(), |mut acc, order| {
                if !acc.contains(&order) {
                    acc.push(order);
                }
                acc
            });

        if orders.is_empty() {
            let Some(source_line) = generated.first().and_then(|n| set.line(n)).cloned() else {
                return Err(WaternetError::UnresolvedIntrusionSource {
                    line: config.name.clone(),
                    source_line: source.to_string(),
                });
            };
            let line = self.shifted(config, config.name.clone(), &source_line, length);
            set.intrusions
                .entry(source.to_string())
                .or_default()
                .push(config.name.clone());
            return Ok(set.with_line(&config.name, line));
        }

        let upward = length > 0.0;
        for &order in &orders {
            let Some(lines) = set.registry.get(order).cloned() else {
                continue;
            };
            let (Some(top), Some(bottom)) = (set.line(&lines.top), set.line(&lines.bottom)) else {
                continue;
            };
            let top_mean = polyline::mean_z(&top.line.points()).unwrap_or(f64::NEG_INFINITY);
            let bottom_mean = polyline::mean_z(&bottom.line.points()).unwrap_or(f64::NEG_INFINITY);
            let top_is_higher = top_mean >= bottom_mean;
            let source_line = if top_is_higher == upward { top } else { bottom }.clone();

            let name = if orders.len() == 1 {
                config.name.clone()
            } else {
                format!("{}_{}", config.name, order)
            };
            let line = self.shifted(config, name.clone(), &source_line, length);

            set.registry = set.registry.with_intrusion(order, name.clone(), upward);
            set.intrusions
                .entry(source.to_string())
                .or_default()
                .push(name);
            set = set.with_line(&config.name, line);
        }
        Ok(set)
    }

    fn shifted(
        &self,
        config: &ReferenceLineConfig,
        name: String,
        source: &ReferenceLine,
        length: f64,
    ) -> ReferenceLine {
        let points = polyline::shift_vertical(&source.line.points(), length);
        self.line(config, name, &points)
    }

    fn line(&self, config: &ReferenceLineConfig, name: String, points: &[DVec2]) -> ReferenceLine {
        ReferenceLine::new(
            name,
            points,
            config.head_line_top.clone(),
            config.head_line_bottom.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CharPointType;
    use crate::geometry::test_support::geometry_from_lz;
    use crate::waternet::offset::{LineOffsetPoint, Offset, RefLevel};
    use approx::assert_relative_eq;

    fn flat() -> Geometry {
        geometry_from_lz(
            &[(0.0, 0.0), (30.0, 0.0)],
            &[
                (CharPointType::SurfaceLevelWaterSide, 0.0),
                (CharPointType::DikeToeLandSide, 15.0),
                (CharPointType::SurfaceLevelLandSide, 30.0),
            ],
        )
    }

    fn slab(order_id: usize, top: f64, bottom: f64) -> Aquifer {
        Aquifer {
            points: vec![
                DVec2::new(0.0, top),
                DVec2::new(30.0, top),
                DVec2::new(30.0, bottom),
                DVec2::new(0.0, bottom),
            ],
            aquifer_type: if order_id == 0 {
                AquiferType::Primary
            } else {
                AquiferType::Intermediate
            },
            order_id,
        }
    }

    fn config(name: &str, method: ReferenceLineMethod) -> ReferenceLineConfig {
        ReferenceLineConfig {
            name: name.into(),
            head_line_top: Some("head".into()),
            head_line_bottom: Some("head".into()),
            method,
        }
    }

    fn offsets() -> Vec<LineOffsetMethod> {
        vec![LineOffsetMethod::new(
            "phreatic_ref",
            vec![LineOffsetPoint::new(
                CharPointType::DikeToeLandSide,
                RefLevel::SurfaceLevel,
                Offset::Vertical(-0.5),
            )],
        )]
    }

    #[test]
    fn test_registry_updates_are_copies() {
        let empty = AquiferRegistry::default();
        let one = empty.with_aquifer(0, "a_0_top".into(), "a_0_bottom".into());
        let two = one.with_intrusion(0, "up".into(), true);
        assert!(empty.get(0).is_none());
        assert!(one.get(0).unwrap().top_intrusions.is_empty());
        assert_eq!(two.get(0).unwrap().top_intrusions, vec!["up".to_string()]);
        assert_eq!(two.order_of("a_0_bottom"), Some(0));
    }

    #[test]
    fn test_aquifer_lines_are_named_per_order() {
        let geometry = flat();
        let aquifers = [slab(0, -8.0, -10.0), slab(1, -3.0, -5.0), slab(2, -1.0, -2.0)];
        let levels = BTreeMap::new();
        let factory = ReferenceLineFactory::new(&geometry, &aquifers, &[], &levels);
        let set = factory
            .build(&[
                config(
                    "primary",
                    ReferenceLineMethod::Aquifer {
                        aquifer: AquiferSelection::Primary,
                    },
                ),
                config(
                    "inter",
                    ReferenceLineMethod::Aquifer {
                        aquifer: AquiferSelection::Intermediate,
                    },
                ),
            ])
            .unwrap();

        assert_eq!(set.lines.len(), 6);
        assert!(set.line("primary_0_top").is_some());
        assert!(set.line("inter_1_bottom").is_some());
        assert!(set.line("inter_2_top").is_some());
        assert_eq!(set.registry.orders().collect::<Vec<_>>(), vec![0, 1, 2]);
        let top = set.line("primary_0_top").unwrap();
        assert_relative_eq!(top.line.z[0], -8.0);
        assert_eq!(top.head_line_top.as_deref(), Some("head"));
    }

    #[test]
    fn test_intrusion_picks_line_by_direction() {
        let geometry = flat();
        let aquifers = [slab(0, -8.0, -10.0)];
        let levels = BTreeMap::new();
        let factory = ReferenceLineFactory::new(&geometry, &aquifers, &[], &levels);
        let set = factory
            .build(&[
                config(
                    "sand",
                    ReferenceLineMethod::Aquifer {
                        aquifer: AquiferSelection::Primary,
                    },
                ),
                config(
                    "up",
                    ReferenceLineMethod::Intrusion {
                        from_reference_line: "sand".into(),
                        intrusion_length: 1.0,
                    },
                ),
                config(
                    "down",
                    ReferenceLineMethod::Intrusion {
                        from_reference_line: "sand".into(),
                        intrusion_length: -2.0,
                    },
                ),
            ])
            .unwrap();

        let up = set.line("up").unwrap();
        assert!(up.line.z.iter().all(|z| (z + 7.0).abs() < 1e-12));
        let down = set.line("down").unwrap();
        assert!(down.line.z.iter().all(|z| (z + 12.0).abs() < 1e-12));

        let lines = set.registry.get(0).unwrap();
        assert_eq!(lines.top_intrusions, vec!["up".to_string()]);
        assert_eq!(lines.bottom_intrusions, vec!["down".to_string()]);
        assert_eq!(set.intrusions_of("sand").len(), 2);
    }

    #[test]
    fn test_intrusion_over_several_aquifers_is_suffixed() {
        let geometry = flat();
        let aquifers = [slab(0, -8.0, -10.0), slab(1, -3.0, -5.0), slab(2, -1.0, -2.0)];
        let levels = BTreeMap::new();
        let factory = ReferenceLineFactory::new(&geometry, &aquifers, &[], &levels);
        let set = factory
            .build(&[
                config(
                    "inter",
                    ReferenceLineMethod::Aquifer {
                        aquifer: AquiferSelection::Intermediate,
                    },
                ),
                config(
                    "rise",
                    ReferenceLineMethod::Intrusion {
                        from_reference_line: "inter".into(),
                        intrusion_length: 0.5,
                    },
                ),
            ])
            .unwrap();
        assert!(set.line("rise_1").is_some());
        assert!(set.line("rise_2").is_some());
        assert!(set.line("rise").is_none());
        assert_eq!(set.generated_by("rise").len(), 2);
    }

    #[test]
    fn test_intrusion_from_empty_source_fails() {
        let geometry = flat();
        let aquifers = [slab(0, -8.0, -10.0)];
        let levels = BTreeMap::new();
        let factory = ReferenceLineFactory::new(&geometry, &aquifers, &[], &levels);
        let err = factory
            .build(&[
                config(
                    "inter",
                    ReferenceLineMethod::Aquifer {
                        aquifer: AquiferSelection::Intermediate,
                    },
                ),
                config(
                    "rise",
                    ReferenceLineMethod::Intrusion {
                        from_reference_line: "inter".into(),
                        intrusion_length: 0.5,
                    },
                ),
            ])
            .unwrap_err();
        match err {
            WaternetError::UnresolvedIntrusionSource { line, source_line } => {
                assert_eq!(line, "rise");
                assert_eq!(source_line, "inter");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_offset_line_and_its_intrusion() {
        let geometry = flat();
        let methods = offsets();
        let levels = BTreeMap::new();
        let factory = ReferenceLineFactory::new(&geometry, &[], &methods, &levels);
        let set = factory
            .build(&[
                config(
                    "ref",
                    ReferenceLineMethod::Offsets {
                        offset_method: "phreatic_ref".into(),
                    },
                ),
                config(
                    "ref_down",
                    ReferenceLineMethod::Intrusion {
                        from_reference_line: "ref".into(),
                        intrusion_length: -1.0,
                    },
                ),
            ])
            .unwrap();
        let ref_line = set.line("ref").unwrap();
        assert_relative_eq!(ref_line.line.z[0], -0.5);
        let down = set.line("ref_down").unwrap();
        assert_relative_eq!(down.line.z[0], -1.5);
        assert_eq!(set.intrusions_of("ref"), ["ref_down".to_string()]);
        assert!(set.registry.orders().next().is_none());
    }

    #[test]
    fn test_unknown_offset_method() {
        let geometry = flat();
        let levels = BTreeMap::new();
        let factory = ReferenceLineFactory::new(&geometry, &[], &[], &levels);
        let result = factory.build(&[config(
            "ref",
            ReferenceLineMethod::Offsets {
                offset_method: "missing".into(),
            },
        )]);
        assert!(result.is_err());
    }
}
