use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use universe::{FixtureError, UniverseBuffer, DMX_CHANNELS};

mod universe;

/// Sentinel channel address for a fixture attribute that is not patched.
pub const UNUSED_CHANNEL: i32 = -1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }
}

/// A named reference location on the stage map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub position: Point2D,
}

impl CalibrationPoint {
    pub fn new(id: &str, name: &str, x: f64, y: f64) -> Self {
        CalibrationPoint {
            id: id.to_string(),
            name: name.to_string(),
            position: Point2D::new(x, y),
        }
    }
}

/// Pan/tilt recorded for a fixture while it pointed at a calibration point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibratedMapping {
    pub pan: u16,
    pub tilt: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: String,
    pub name: String,
    pub universe: u16,
    pub pan_address: i32,
    pub fine_pan_address: i32,
    pub tilt_address: i32,
    pub fine_tilt_address: i32,
    /// Keyed by calibration point id.
    #[serde(default)]
    pub calibration: HashMap<String, CalibratedMapping>,
}

impl Fixture {
    pub fn new(
        id: &str,
        name: &str,
        universe: u16,
        pan_address: i32,
        fine_pan_address: i32,
        tilt_address: i32,
        fine_tilt_address: i32,
    ) -> Self {
        Fixture {
            id: id.to_string(),
            name: name.to_string(),
            universe,
            pan_address,
            fine_pan_address,
            tilt_address,
            fine_tilt_address,
            calibration: HashMap::new(),
        }
    }

    pub fn set_calibration(&mut self, point_id: &str, pan: u16, tilt: u16) {
        self.calibration
            .insert(point_id.to_string(), CalibratedMapping { pan, tilt });
    }

    pub fn calibration_for(&self, point_id: &str) -> Option<CalibratedMapping> {
        self.calibration.get(point_id).copied()
    }

    /// Writes coarse and fine pan/tilt bytes into `buffer`.
    ///
    /// Attributes whose address is unused or outside the universe are skipped,
    /// so a tilt-only fixture only touches its tilt channels.
    pub fn write_pan_tilt(&self, buffer: &mut UniverseBuffer, pan: u16, tilt: u16) {
        let writes = [
            (self.pan_address, coarse(pan)),
            (self.fine_pan_address, fine(pan)),
            (self.tilt_address, coarse(tilt)),
            (self.fine_tilt_address, fine(tilt)),
        ];

        for (address, value) in writes {
            // Out-of-range addresses are expected for partially patched fixtures.
            let _ = buffer.set(address, value);
        }
    }
}

fn coarse(value: u16) -> u8 {
    (value / 256) as u8
}

fn fine(value: u16) -> u8 {
    (value % 256) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_head() -> Fixture {
        Fixture::new("spot-1", "Left Spot", 1, 0, 1, 2, 3)
    }

    #[test]
    fn test_write_pan_tilt_splits_coarse_and_fine() {
        let fixture = moving_head();
        let mut buffer = UniverseBuffer::new();

        fixture.write_pan_tilt(&mut buffer, 0x1234, 0xABCD);

        assert_eq!(buffer.get(0), Some(0x12));
        assert_eq!(buffer.get(1), Some(0x34));
        assert_eq!(buffer.get(2), Some(0xAB));
        assert_eq!(buffer.get(3), Some(0xCD));
    }

    #[test]
    fn test_write_pan_tilt_is_last_writer_wins() {
        let fixture = moving_head();
        let mut buffer = UniverseBuffer::new();

        fixture.write_pan_tilt(&mut buffer, 65535, 65535);
        fixture.write_pan_tilt(&mut buffer, 256, 1);

        assert_eq!(&buffer.data()[0..4], &[1, 0, 0, 1]);
    }

    #[test]
    fn test_unused_addresses_leave_buffer_untouched() {
        let tilt_only = Fixture::new("tilt", "Tilt Only", 1, UNUSED_CHANNEL, -5, 10, 11);
        let mut buffer = UniverseBuffer::new();
        buffer.set(0, 0x7F).unwrap();

        tilt_only.write_pan_tilt(&mut buffer, 0xFFFF, 0x0102);

        assert_eq!(buffer.get(0), Some(0x7F));
        assert_eq!(buffer.get(10), Some(0x01));
        assert_eq!(buffer.get(11), Some(0x02));
        assert_eq!(buffer.data().iter().filter(|v| **v != 0).count(), 3);
    }

    #[test]
    fn test_out_of_range_address_is_skipped() {
        let fixture = Fixture::new("far", "Far", 1, 511, 512, UNUSED_CHANNEL, 4096);
        let mut buffer = UniverseBuffer::new();

        fixture.write_pan_tilt(&mut buffer, 0x0A0B, 0xFFFF);

        assert_eq!(buffer.get(511), Some(0x0A));
        assert_eq!(buffer.data().iter().filter(|v| **v != 0).count(), 1);
    }

    #[test]
    fn test_calibration_lookup() {
        let mut fixture = moving_head();
        fixture.set_calibration("a", 100, 200);
        fixture.set_calibration("b", 300, 400);
        fixture.set_calibration("b", 301, 401);

        assert_eq!(fixture.calibration_for("c"), None);
        assert_eq!(
            fixture.calibration_for("b"),
            Some(CalibratedMapping { pan: 301, tilt: 401 })
        );
    }

    #[test]
    fn test_fixture_json_uses_camel_case() {
        let json = r#"{
            "id": "wash-2",
            "name": "Right Wash",
            "universe": 3,
            "panAddress": 10,
            "finePanAddress": 11,
            "tiltAddress": 12,
            "fineTiltAddress": -1,
            "calibration": { "p1": { "pan": 1000, "tilt": 2000 } }
        }"#;

        let fixture: Fixture = serde_json::from_str(json).unwrap();
        assert_eq!(fixture.universe, 3);
        assert_eq!(fixture.fine_tilt_address, UNUSED_CHANNEL);
        assert_eq!(
            fixture.calibration_for("p1"),
            Some(CalibratedMapping { pan: 1000, tilt: 2000 })
        );
    }

    #[test]
    fn test_calibration_point_position_is_flattened() {
        let point: CalibrationPoint =
            serde_json::from_str(r#"{"id":"c","name":"Centre","x":0.5,"y":0.25}"#).unwrap();
        assert_eq!(point.position, Point2D::new(0.5, 0.25));
    }
}
