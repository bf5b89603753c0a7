//! Water lines, waternets and water level tables

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use wn_geom::polyline::{self, L_TOLERANCE};

use crate::constants::DUPLICATE_L_SHIFT;

/// A named curve with parallel `l` and `z` arrays, sorted by `l`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaterLine {
    pub name: String,
    pub l: Vec<f64>,
    pub z: Vec<f64>,
}

impl WaterLine {
    /// Create a line from `(l, z)` vertices
    ///
    /// Vertices are sorted by `l`; vertices sharing an `l` keep their order.
    pub fn from_points(name: impl Into<String>, points: &[DVec2]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self {
            name: name.into(),
            l: sorted.iter().map(|p| p.x).collect(),
            z: sorted.iter().map(|p| p.y).collect(),
        }
    }

    /// Vertices as `(l, z)` pairs
    pub fn points(&self) -> Vec<DVec2> {
        self.l
            .iter()
            .zip(&self.z)
            .map(|(&l, &z)| DVec2::new(l, z))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.l.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l.is_empty()
    }

    /// Elevation at `l`, clamped to the end points
    pub fn z_at(&self, l: f64) -> Option<f64> {
        polyline::z_at(&self.points(), l)
    }

    /// Shift points that share their `l` with the previous point by 1 mm
    ///
    /// Each later point of a run moves forward, except for a run at the end
    /// of the line, where the earlier points move back. Every vertex ends up
    /// strictly after its predecessor, so the consuming model keeps the
    /// intended vertex order when it re-sorts points by `l`.
    pub fn perturb_duplicate_l(&mut self) {
        let n = self.l.len();
        if n < 2 {
            return;
        }
        let last = self.l[n - 1];
        let tail = (0..n)
            .rev()
            .take_while(|&i| (self.l[i] - last).abs() < L_TOLERANCE)
            .last()
            .unwrap_or(n - 1);

        for i in (tail..n - 1).rev() {
            self.l[i] = self.l[i + 1] - DUPLICATE_L_SHIFT;
        }
        for i in 1..tail {
            if self.l[i] <= self.l[i - 1] + L_TOLERANCE {
                self.l[i] = self.l[i - 1] + DUPLICATE_L_SHIFT;
            }
        }
    }
}

/// A curve of hydraulic head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadLine {
    pub line: WaterLine,
    #[serde(default)]
    pub is_phreatic: bool,
}

impl HeadLine {
    pub fn new(name: impl Into<String>, points: &[DVec2], is_phreatic: bool) -> Self {
        Self {
            line: WaterLine::from_points(name, points),
            is_phreatic,
        }
    }

    pub fn name(&self) -> &str {
        &self.line.name
    }
}

/// A subsurface boundary with the head lines valid above and below it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLine {
    pub line: WaterLine,
    #[serde(default)]
    pub head_line_top: Option<String>,
    #[serde(default)]
    pub head_line_bottom: Option<String>,
}

impl ReferenceLine {
    pub fn new(
        name: impl Into<String>,
        points: &[DVec2],
        head_line_top: Option<String>,
        head_line_bottom: Option<String>,
    ) -> Self {
        Self {
            line: WaterLine::from_points(name, points),
            head_line_top,
            head_line_bottom,
        }
    }

    pub fn name(&self) -> &str {
        &self.line.name
    }

    /// Copy of this line with new vertices
    pub fn with_points(&self, points: &[DVec2]) -> Self {
        Self {
            line: WaterLine::from_points(self.line.name.clone(), points),
            head_line_top: self.head_line_top.clone(),
            head_line_bottom: self.head_line_bottom.clone(),
        }
    }
}

/// The pore-pressure boundary curves of one calculation stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Waternet {
    pub name: String,
    pub head_lines: Vec<HeadLine>,
    pub reference_lines: Vec<ReferenceLine>,
}

impl Waternet {
    /// The head line representing the free water table
    pub fn phreatic_line(&self) -> Option<&HeadLine> {
        self.head_lines.iter().find(|h| h.is_phreatic)
    }

    pub fn head_line(&self, name: &str) -> Option<&HeadLine> {
        self.head_lines.iter().find(|h| h.name() == name)
    }

    pub fn reference_line(&self, name: &str) -> Option<&ReferenceLine> {
        self.reference_lines.iter().find(|r| r.name() == name)
    }
}

/// Named water levels per location
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaterLevels {
    pub locations: BTreeMap<String, BTreeMap<String, f64>>,
}

impl WaterLevels {
    /// Add or replace a level
    pub fn insert(&mut self, location: impl Into<String>, name: impl Into<String>, level: f64) {
        self.locations
            .entry(location.into())
            .or_default()
            .insert(name.into(), level);
    }

    pub fn get(&self, location: &str, name: &str) -> Option<f64> {
        self.locations.get(location)?.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_points_sorts_and_keeps_jump_order() {
        let line = WaterLine::from_points(
            "a",
            &[
                DVec2::new(10.0, 0.0),
                DVec2::new(0.0, 1.0),
                DVec2::new(5.0, 1.0),
                DVec2::new(5.0, -1.0),
            ],
        );
        assert_eq!(line.l, vec![0.0, 5.0, 5.0, 10.0]);
        assert_eq!(line.z, vec![1.0, 1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_perturb_duplicate_l() {
        let mut line = WaterLine::from_points(
            "a",
            &[
                DVec2::new(0.0, 1.0),
                DVec2::new(5.0, 1.0),
                DVec2::new(5.0, -1.0),
                DVec2::new(10.0, -1.0),
                DVec2::new(10.0, 2.0),
            ],
        );
        line.perturb_duplicate_l();
        assert_relative_eq!(line.l[1], 5.0);
        assert_relative_eq!(line.l[2], 5.001);
        assert_relative_eq!(line.l[3], 9.999);
        assert_relative_eq!(line.l[4], 10.0);
        assert!(line.l.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_perturb_runs_of_duplicate_l() {
        let mut line = WaterLine {
            name: "a".into(),
            l: vec![0.0, 5.0, 5.0, 5.0, 10.0],
            z: vec![0.0; 5],
        };
        line.perturb_duplicate_l();
        assert_relative_eq!(line.l[2], 5.001, epsilon = 1e-9);
        assert_relative_eq!(line.l[3], 5.002, epsilon = 1e-9);
        assert!(line.l.windows(2).all(|w| w[1] > w[0]));

        let mut line = WaterLine {
            name: "b".into(),
            l: vec![0.0, 10.0, 10.0, 10.0],
            z: vec![0.0; 4],
        };
        line.perturb_duplicate_l();
        assert_relative_eq!(line.l[1], 9.998, epsilon = 1e-9);
        assert_relative_eq!(line.l[2], 9.999, epsilon = 1e-9);
        assert_relative_eq!(line.l[3], 10.0, epsilon = 1e-9);
        assert!(line.l.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_water_levels_lookup() {
        let mut levels = WaterLevels::default();
        levels.insert("dike", "high", 2.0);
        assert_eq!(levels.get("dike", "high"), Some(2.0));
        assert_eq!(levels.get("dike", "low"), None);
        assert_eq!(levels.get("other", "high"), None);
    }

    #[test]
    fn test_waternet_lookup() {
        let waternet = Waternet {
            name: "stage".into(),
            head_lines: vec![
                HeadLine::new("phreatic", &[DVec2::new(0.0, 1.0), DVec2::new(1.0, 1.0)], true),
                HeadLine::new("aquifer", &[DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0)], false),
            ],
            reference_lines: vec![],
        };
        assert_eq!(waternet.phreatic_line().unwrap().name(), "phreatic");
        assert!(waternet.head_line("aquifer").is_some());
        assert!(waternet.reference_line("aquifer").is_none());
    }
}
