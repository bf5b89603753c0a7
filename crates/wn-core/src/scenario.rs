//! Scenario files
//!
//! A scenario is one cross-section with its soil profiles, water levels,
//! offset templates and the waternet configurations of its calculation
//! stages, stored as a RON document.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wn_geom::PolygonKernel;

use crate::config::WaternetConfig;
use crate::geometry::{Geometry, GeometryError, GeometryInput, create_geometry};
use crate::soil::{
    SoilError, SoilProfile, SoilProfilePosition, Subsoil, SubsoilInput, subsoil_from_soil_profiles,
};
use crate::water::{WaterLevels, Waternet};
use crate::waternet::interpolate::PreviousStage;
use crate::waternet::offset::LineOffsetMethod;
use crate::waternet::{WaternetCreator, WaternetError};

/// Current scenario file version
pub const SCENARIO_VERSION: u32 = 1;

fn default_version() -> u32 {
    SCENARIO_VERSION
}

/// One calculation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    /// Profile placement for this stage; the scenario's placement when absent
    #[serde(default)]
    pub soil_profile_positions: Option<Vec<SoilProfilePosition>>,
    pub waternet: WaternetConfig,
}

/// Waternet produced for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageWaternet {
    pub stage: String,
    pub waternet: Waternet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_version")]
    pub version: u32,
    pub name: String,
    pub geometry: GeometryInput,
    pub soil_profiles: Vec<SoilProfile>,
    pub soil_profile_positions: Vec<SoilProfilePosition>,
    pub thickness_bottom_layer: f64,
    #[serde(default)]
    pub min_soil_profile_depth: Option<f64>,
    #[serde(default)]
    pub water_levels: WaterLevels,
    #[serde(default)]
    pub offset_methods: Vec<LineOffsetMethod>,
    /// Stages in chronological order
    pub stages: Vec<StageConfig>,
}

impl Scenario {
    /// Save the scenario to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScenarioError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?).map_err(|e| ScenarioError::Io(e.to_string()))?;
        debug!(path = %path.display(), "Saved scenario");
        Ok(())
    }

    /// Serialize the scenario to RON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, ScenarioError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ScenarioError::Serialize(e.to_string()))?;
        Ok(content.into_bytes())
    }

    /// Load a scenario from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ScenarioError::Io(e.to_string()))?;
        let scenario: Scenario =
            ron::from_str(&content).map_err(|e| ScenarioError::Deserialize(e.to_string()))?;
        debug!(path = %path.display(), name = %scenario.name, "Loaded scenario");
        Ok(scenario)
    }

    /// Load a scenario from RON bytes
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, ScenarioError> {
        let content =
            std::str::from_utf8(data).map_err(|e| ScenarioError::Deserialize(e.to_string()))?;
        ron::from_str(content).map_err(|e| ScenarioError::Deserialize(e.to_string()))
    }

    /// Check the scenario without running any polygon operations
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.check_stages()?;
        create_geometry(&self.geometry)?;
        for (i, stage) in self.stages.iter().enumerate() {
            SubsoilInput::from_positions(&self.soil_profiles, self.positions(stage)).map_err(
                |source| ScenarioError::Soil {
                    stage: stage.name.clone(),
                    source,
                },
            )?;
            stage
                .waternet
                .validate(&self.offset_methods, i > 0)
                .map_err(|e| ScenarioError::Stage {
                    stage: stage.name.clone(),
                    source: e.into(),
                })?;
        }
        Ok(())
    }

    /// Create the waternet of every stage, in order
    ///
    /// Each stage after the first sees the previous stage's waternet for
    /// interpolated head lines.
    pub fn run(&self, kernel: &dyn PolygonKernel) -> Result<Vec<StageWaternet>, ScenarioError> {
        self.check_stages()?;
        let geometry = create_geometry(&self.geometry)?;
        info!(scenario = %self.name, stages = self.stages.len(), "Running scenario");

        let mut results: Vec<StageWaternet> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let subsoil = self.build_subsoil(kernel, &geometry, stage)?;
            let mut creator = WaternetCreator::new(kernel, &geometry, &subsoil, &stage.waternet)
                .with_offset_methods(&self.offset_methods)
                .with_water_levels(&self.water_levels);
            if let Some(previous) = results.last() {
                creator = creator.with_previous_stage(PreviousStage {
                    waternet: &previous.waternet,
                    surface_line: &geometry.surface_line,
                });
            }
            let waternet = creator.create().map_err(|source| ScenarioError::Stage {
                stage: stage.name.clone(),
                source,
            })?;
            info!(stage = %stage.name, "Stage complete");
            results.push(StageWaternet {
                stage: stage.name.clone(),
                waternet,
            });
        }
        Ok(results)
    }

    fn positions<'s>(&'s self, stage: &'s StageConfig) -> &'s [SoilProfilePosition] {
        stage
            .soil_profile_positions
            .as_deref()
            .unwrap_or(&self.soil_profile_positions)
    }

    fn build_subsoil(
        &self,
        kernel: &dyn PolygonKernel,
        geometry: &Geometry,
        stage: &StageConfig,
    ) -> Result<Subsoil, ScenarioError> {
        let build = || -> Result<Subsoil, SoilError> {
            let input = SubsoilInput::from_positions(&self.soil_profiles, self.positions(stage))?;
            subsoil_from_soil_profiles(
                kernel,
                &geometry.surface_line,
                &input.profiles,
                &input.transitions,
                self.thickness_bottom_layer,
                self.min_soil_profile_depth,
            )
        };
        build().map_err(|source| ScenarioError::Soil {
            stage: stage.name.clone(),
            source,
        })
    }

    fn check_stages(&self) -> Result<(), ScenarioError> {
        if self.stages.is_empty() {
            return Err(ScenarioError::NoStages(self.name.clone()));
        }
        let mut seen = BTreeSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(ScenarioError::DuplicateStage(stage.name.clone()));
            }
        }
        Ok(())
    }
}

/// Scenario-related errors
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Scenario '{0}' has no stages")]
    NoStages(String),
    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Subsoil of stage '{stage}': {source}")]
    Soil { stage: String, source: SoilError },
    #[error("Stage '{stage}': {source}")]
    Stage {
        stage: String,
        source: WaternetError,
    },
}
