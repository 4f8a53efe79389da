use std::collections::{BTreeMap, BTreeSet, HashMap};

use folje_fixtures::{CalibrationPoint, Fixture, Point2D, UniverseBuffer};

use crate::error::FollowError;
use crate::interpolation::{to_device_units, Interpolator};
use crate::sacn::network_config::BroadcastConfig;
use crate::sacn::frame::DmxFrame;

/// Fill value for positions outside a fixture's calibrated area.
pub const OUTSIDE_HULL: f64 = -1.0;

/// Whether a fixture follows position input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationStatus {
    Ready,
    /// No mapping recorded yet for the listed calibration point ids.
    Incomplete { missing: Vec<String> },
    /// Calibrated everywhere, but the interpolator could not be built.
    Failed(String),
}

/// Everything the broadcaster and the console mutators share, guarded by one lock.
#[derive(Debug, Default)]
pub struct ConsoleState {
    fixtures: BTreeMap<String, Fixture>,
    calibration_points: BTreeMap<String, CalibrationPoint>,
    universes: BTreeMap<u16, UniverseBuffer>,
    interpolators: BTreeMap<String, Interpolator>,
    statuses: HashMap<String, CalibrationStatus>,
    broadcast_config: BroadcastConfig,
    last_position: Option<Point2D>,
}

impl ConsoleState {
    pub fn new(broadcast_config: BroadcastConfig) -> Self {
        ConsoleState {
            broadcast_config,
            ..ConsoleState::default()
        }
    }

    /// Replaces the fixture set. Universe buffers are rebuilt zeroed for exactly
    /// the universes the new fixtures reference.
    pub fn set_fixtures(&mut self, fixtures: Vec<Fixture>) {
        self.fixtures = fixtures
            .into_iter()
            .map(|fixture| (fixture.id.clone(), fixture))
            .collect();

        self.universes = self
            .referenced_universes()
            .into_iter()
            .map(|universe| (universe, UniverseBuffer::new()))
            .collect();

        self.rebuild_interpolators();
        self.reapply_position();
    }

    pub fn set_calibration_points(&mut self, points: Vec<CalibrationPoint>) {
        self.calibration_points = points
            .into_iter()
            .map(|point| (point.id.clone(), point))
            .collect();

        self.rebuild_interpolators();
        self.reapply_position();
    }

    /// Records the pan/tilt a fixture has at one calibration point.
    pub fn set_fixture_calibration(
        &mut self,
        fixture_id: &str,
        point_id: &str,
        pan: u16,
        tilt: u16,
    ) -> Result<(), FollowError> {
        let fixture = self
            .fixtures
            .get_mut(fixture_id)
            .ok_or_else(|| FollowError::UnknownFixture(fixture_id.to_string()))?;
        fixture.set_calibration(point_id, pan, tilt);

        self.rebuild_interpolators();
        self.reapply_position();
        Ok(())
    }

    pub fn set_pan_tilt(&mut self, fixture_id: &str, pan: u16, tilt: u16) -> Result<(), FollowError> {
        let fixture = self
            .fixtures
            .get(fixture_id)
            .ok_or_else(|| FollowError::UnknownFixture(fixture_id.to_string()))?;

        let buffer = self.universes.entry(fixture.universe).or_default();
        fixture.write_pan_tilt(buffer, pan, tilt);
        Ok(())
    }

    /// Drives every calibrated fixture towards `position`. Returns how many
    /// fixtures were written; fixtures whose calibrated area does not cover the
    /// position keep their current channel values.
    pub fn apply_position(&mut self, position: Point2D) -> usize {
        self.last_position = Some(position);

        let mut written = 0;
        for (id, interpolator) in &self.interpolators {
            let Some(fixture) = self.fixtures.get(id) else {
                continue;
            };

            let (pan, tilt) = match interpolator.interpolate(position) {
                Ok(values) => values,
                Err(e) => {
                    log::debug!("fixture {}: {}", id, e);
                    continue;
                }
            };
            let fill = interpolator.fill_value();
            if pan == fill && tilt == fill {
                continue;
            }

            let buffer = self.universes.entry(fixture.universe).or_default();
            fixture.write_pan_tilt(buffer, to_device_units(pan), to_device_units(tilt));
            written += 1;
        }
        written
    }

    pub fn last_position(&self) -> Option<Point2D> {
        self.last_position
    }

    pub fn referenced_universes(&self) -> BTreeSet<u16> {
        self.fixtures.values().map(|fixture| fixture.universe).collect()
    }

    /// Copies every referenced universe's buffer into a frame.
    pub fn frame_snapshot(&self) -> Vec<DmxFrame> {
        self.universes
            .iter()
            .map(|(universe, buffer)| DmxFrame {
                universe: *universe,
                data: *buffer.data(),
            })
            .collect()
    }

    pub fn universe_data(&self, universe: u16) -> Option<UniverseBuffer> {
        self.universes.get(&universe).copied()
    }

    pub fn calibration_status(&self, fixture_id: &str) -> Option<CalibrationStatus> {
        self.statuses.get(fixture_id).cloned()
    }

    pub fn fixtures(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values()
    }

    pub fn calibration_points(&self) -> impl Iterator<Item = &CalibrationPoint> {
        self.calibration_points.values()
    }

    pub fn broadcast_config(&self) -> &BroadcastConfig {
        &self.broadcast_config
    }

    pub fn set_broadcast_config(&mut self, config: BroadcastConfig) {
        self.broadcast_config = config;
    }

    /// Rebuilds every interpolator from scratch, calibration points ordered by id.
    fn rebuild_interpolators(&mut self) {
        self.interpolators.clear();
        self.statuses.clear();

        let positions: Vec<Point2D> = self
            .calibration_points
            .values()
            .map(|point| point.position)
            .collect();

        for fixture in self.fixtures.values() {
            let mut missing = Vec::new();
            let mut pans = Vec::with_capacity(positions.len());
            let mut tilts = Vec::with_capacity(positions.len());

            for point in self.calibration_points.values() {
                match fixture.calibration_for(&point.id) {
                    Some(mapping) => {
                        pans.push(mapping.pan as f64);
                        tilts.push(mapping.tilt as f64);
                    }
                    None => missing.push(point.id.clone()),
                }
            }

            if !missing.is_empty() {
                self.statuses.insert(
                    fixture.id.clone(),
                    CalibrationStatus::Incomplete { missing },
                );
                continue;
            }

            let status = match Interpolator::build(&positions, &pans, &tilts, OUTSIDE_HULL) {
                Ok(interpolator) => {
                    self.interpolators.insert(fixture.id.clone(), interpolator);
                    CalibrationStatus::Ready
                }
                Err(e) => {
                    log::debug!("fixture {} excluded from position input: {}", fixture.id, e);
                    CalibrationStatus::Failed(e.to_string())
                }
            };
            self.statuses.insert(fixture.id.clone(), status);
        }

        log::debug!(
            "rebuilt interpolators: {} of {} fixtures follow position input",
            self.interpolators.len(),
            self.fixtures.len()
        );
    }

    fn reapply_position(&mut self) {
        if let Some(position) = self.last_position {
            self.apply_position(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use folje_fixtures::UNUSED_CHANNEL;

    use super::*;

    fn calibration_points() -> Vec<CalibrationPoint> {
        vec![
            CalibrationPoint::new("a", "Downstage left", 0.0, 0.0),
            CalibrationPoint::new("b", "Downstage right", 10.0, 0.0),
            CalibrationPoint::new("c", "Upstage left", 0.0, 10.0),
        ]
    }

    fn calibrated(id: &str, universe: u16, base: i32) -> Fixture {
        let mut fixture = Fixture::new(id, id, universe, base, base + 1, base + 2, base + 3);
        fixture.set_calibration("a", 0, 0);
        fixture.set_calibration("b", 10000, 0);
        fixture.set_calibration("c", 0, 10000);
        fixture
    }

    fn pan_tilt(buffer: &UniverseBuffer, base: i32) -> (u16, u16) {
        let byte = |offset: i32| buffer.get(base + offset).unwrap_or(0) as u16;
        (byte(0) * 256 + byte(1), byte(2) * 256 + byte(3))
    }

    #[test]
    fn test_set_fixtures_rebuilds_zeroed_buffers() {
        let mut state = ConsoleState::default();
        state.set_fixtures(vec![calibrated("one", 1, 0), calibrated("two", 3, 0)]);
        state.set_pan_tilt("one", 0xFFFF, 0xFFFF).unwrap();

        state.set_fixtures(vec![calibrated("one", 1, 0), calibrated("three", 7, 0)]);

        assert_eq!(state.universe_data(1), Some(UniverseBuffer::new()));
        assert_eq!(state.universe_data(3), None);
        assert_eq!(state.universe_data(7), Some(UniverseBuffer::new()));
        assert_eq!(
            state.referenced_universes().into_iter().collect::<Vec<_>>(),
            vec![1, 7]
        );
    }

    #[test]
    fn test_set_pan_tilt_for_unknown_fixture() {
        let mut state = ConsoleState::default();
        assert_eq!(
            state.set_pan_tilt("ghost", 1, 1),
            Err(FollowError::UnknownFixture("ghost".to_string()))
        );
    }

    #[test]
    fn test_set_pan_tilt_skips_unused_channels() {
        let mut state = ConsoleState::default();
        let tilt_only = Fixture::new("t", "Tilt", 2, UNUSED_CHANNEL, UNUSED_CHANNEL, 20, 21);
        state.set_fixtures(vec![tilt_only]);

        state.set_pan_tilt("t", 0xFFFF, 0x0304).unwrap();

        let buffer = state.universe_data(2).unwrap();
        assert_eq!(buffer.get(20), Some(3));
        assert_eq!(buffer.get(21), Some(4));
        assert_eq!(buffer.data().iter().filter(|v| **v != 0).count(), 2);
    }

    #[test]
    fn test_apply_position_drives_calibrated_fixtures() {
        let mut state = ConsoleState::default();
        state.set_calibration_points(calibration_points());
        state.set_fixtures(vec![calibrated("one", 1, 0), calibrated("two", 1, 10)]);

        assert_eq!(state.apply_position(Point2D::new(5.0, 5.0)), 2);

        let buffer = state.universe_data(1).unwrap();
        assert_eq!(pan_tilt(&buffer, 0), (5000, 5000));
        assert_eq!(pan_tilt(&buffer, 10), (5000, 5000));
    }

    #[test]
    fn test_positions_outside_hull_leave_channels_untouched() {
        let mut state = ConsoleState::default();
        state.set_calibration_points(calibration_points());
        state.set_fixtures(vec![calibrated("one", 1, 0)]);
        state.set_pan_tilt("one", 1234, 4321).unwrap();

        assert_eq!(state.apply_position(Point2D::new(100.0, 100.0)), 0);
        assert_eq!(pan_tilt(&state.universe_data(1).unwrap(), 0), (1234, 4321));
    }

    #[test]
    fn test_under_calibrated_fixture_is_excluded() {
        let mut state = ConsoleState::default();
        state.set_calibration_points(calibration_points());
        let mut partial = Fixture::new("partial", "Partial", 1, 0, 1, 2, 3);
        partial.set_calibration("a", 100, 100);
        state.set_fixtures(vec![partial]);

        assert_eq!(state.apply_position(Point2D::new(1.0, 1.0)), 0);
        assert_eq!(state.universe_data(1), Some(UniverseBuffer::new()));
        assert_eq!(
            state.calibration_status("partial"),
            Some(CalibrationStatus::Incomplete {
                missing: vec!["b".to_string(), "c".to_string()]
            })
        );
    }

    #[test]
    fn test_degenerate_calibration_is_reported_as_failed() {
        let mut state = ConsoleState::default();
        state.set_calibration_points(vec![
            CalibrationPoint::new("a", "A", 0.0, 0.0),
            CalibrationPoint::new("b", "B", 1.0, 1.0),
            CalibrationPoint::new("c", "C", 2.0, 2.0),
        ]);
        state.set_fixtures(vec![calibrated("one", 1, 0)]);

        assert!(matches!(
            state.calibration_status("one"),
            Some(CalibrationStatus::Failed(_))
        ));
        assert_eq!(state.calibration_status("missing"), None);
    }

    #[test]
    fn test_calibration_change_rebuilds_and_reapplies_position() {
        let mut state = ConsoleState::default();
        state.set_calibration_points(calibration_points());
        let mut fixture = calibrated("one", 1, 0);
        fixture.calibration.remove("c");
        state.set_fixtures(vec![fixture]);

        assert_eq!(state.apply_position(Point2D::new(0.0, 10.0)), 0);

        state.set_fixture_calibration("one", "c", 0, 20000).unwrap();

        assert_eq!(state.calibration_status("one"), Some(CalibrationStatus::Ready));
        assert_eq!(pan_tilt(&state.universe_data(1).unwrap(), 0), (0, 20000));
    }

    #[test]
    fn test_frame_snapshot_copies_buffers() {
        let mut state = ConsoleState::default();
        state.set_fixtures(vec![calibrated("one", 4, 0), calibrated("two", 2, 0)]);
        state.set_pan_tilt("one", 0x0102, 0).unwrap();

        let frames = state.frame_snapshot();
        state.set_pan_tilt("one", 0, 0).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].universe, 2);
        assert_eq!(frames[1].universe, 4);
        assert_eq!(&frames[1].data[0..2], &[1, 2]);
    }
}
