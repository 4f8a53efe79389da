use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use folje_fixtures::{CalibrationPoint, Fixture};
use serde::Deserialize;

/// A saved show: fixtures and calibration points keyed by id.
///
/// Read-only here; fields the console does not use are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowFile {
    pub fixtures: BTreeMap<String, Fixture>,
    pub calibration_points: BTreeMap<String, CalibrationPoint>,
}

impl ShowFile {
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read show file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse show file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn fixtures(&self) -> Vec<Fixture> {
        self.fixtures.values().cloned().collect()
    }

    pub fn calibration_points(&self) -> Vec<CalibrationPoint> {
        self.calibration_points.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW: &str = r#"{
        "fixtures": {
            "f1": {
                "id": "f1",
                "name": "Left Spot",
                "universe": 1,
                "panAddress": 0,
                "finePanAddress": 1,
                "tiltAddress": 2,
                "fineTiltAddress": 3,
                "minPan": 0,
                "maxPan": 65535,
                "calibration": {
                    "c1": { "id": "c1", "pan": 1000, "tilt": 2000 }
                }
            }
        },
        "calibrationPoints": {
            "c1": { "id": "c1", "name": "Centre", "x": 0.5, "y": 0.5 }
        }
    }"#;

    #[test]
    fn test_parse_show() {
        let show = ShowFile::parse(SHOW).unwrap();

        let fixtures = show.fixtures();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].name, "Left Spot");
        assert_eq!(fixtures[0].calibration_for("c1").map(|m| m.pan), Some(1000));

        let points = show.calibration_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].position.x, 0.5);
    }

    #[test]
    fn test_empty_show() {
        let show = ShowFile::parse("{}").unwrap();
        assert!(show.fixtures().is_empty());
        assert!(show.calibration_points().is_empty());
    }
}
