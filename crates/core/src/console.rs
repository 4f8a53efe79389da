use std::sync::Arc;

use folje_fixtures::{CalibrationPoint, Fixture, Point2D, UniverseBuffer};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::broadcast::BroadcastManager;
use crate::error::FollowError;
use crate::messages::{BroadcastStatus, ConsoleEvent, Settings};
use crate::sacn::network_config::BroadcastConfig;
use crate::sacn::transport::{Connector, E131Connector};
use crate::state::{CalibrationStatus, ConsoleState};

/// Follow-spot console: fixtures, calibration and the sACN broadcaster behind
/// one shared state lock.
///
/// Mutations run on the caller's task and hold the lock only while they touch
/// state; the broadcaster takes the same lock once per tick to snapshot buffers.
pub struct FollowConsole {
    state: Arc<Mutex<ConsoleState>>,
    broadcast_manager: BroadcastManager,
    is_running: bool,
}

impl FollowConsole {
    pub fn new(settings: &Settings) -> Self {
        Self::with_connector(
            settings.broadcast.clone(),
            Arc::new(E131Connector::new(&settings.source_name)),
        )
    }

    /// Builds a console that opens its transports through `connector`.
    pub fn with_connector(config: BroadcastConfig, connector: Arc<dyn Connector>) -> Self {
        let state = Arc::new(Mutex::new(ConsoleState::new(config)));
        let broadcast_manager = BroadcastManager::new(state.clone(), connector);

        Self {
            state,
            broadcast_manager,
            is_running: false,
        }
    }

    /// Starts the broadcaster.
    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Initializing follow console...");

        self.broadcast_manager
            .start()
            .map_err(|e| anyhow::anyhow!("Broadcaster start failed: {}", e))?;

        self.is_running = true;
        log::info!("Follow console initialized successfully");
        Ok(())
    }

    /// Stops the broadcaster and waits until every universe has been closed.
    pub async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_running {
            return Ok(());
        }

        log::info!("Shutting down follow console...");

        self.broadcast_manager
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("Broadcaster shutdown failed: {}", e))?;

        self.is_running = false;
        log::info!("Follow console shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Replaces all fixtures. Universe buffers are rebuilt zeroed.
    pub fn set_fixtures(&self, fixtures: Vec<Fixture>) {
        let count = fixtures.len();
        self.state.lock().set_fixtures(fixtures);
        log::info!("Loaded {} fixtures", count);
    }

    pub fn set_calibration_points(&self, points: Vec<CalibrationPoint>) {
        let count = points.len();
        self.state.lock().set_calibration_points(points);
        log::info!("Loaded {} calibration points", count);
    }

    /// Records a fixture's pan/tilt at one calibration point.
    pub fn set_fixture_calibration(
        &self,
        fixture_id: &str,
        point_id: &str,
        pan: u16,
        tilt: u16,
    ) -> Result<(), FollowError> {
        self.state
            .lock()
            .set_fixture_calibration(fixture_id, point_id, pan, tilt)
    }

    /// Installs a new broadcast configuration; the broadcaster reconnects with it.
    pub fn set_broadcast_config(&self, config: BroadcastConfig) {
        log::info!("Broadcast config updated: {}", config.mode_string());
        self.state.lock().set_broadcast_config(config);
        self.broadcast_manager.request_reconfigure();
    }

    pub fn broadcast_config(&self) -> BroadcastConfig {
        self.state.lock().broadcast_config().clone()
    }

    pub fn set_pan_tilt_for_fixture(
        &self,
        fixture_id: &str,
        pan: u16,
        tilt: u16,
    ) -> Result<(), FollowError> {
        self.state.lock().set_pan_tilt(fixture_id, pan, tilt)
    }

    /// Points every calibrated fixture at `position`. Returns how many fixtures moved.
    pub fn set_position_for_all_fixtures(&self, position: Point2D) -> usize {
        self.state.lock().apply_position(position)
    }

    pub fn universe_data(&self, universe: u16) -> Option<UniverseBuffer> {
        self.state.lock().universe_data(universe)
    }

    pub fn calibration_status(&self, fixture_id: &str) -> Option<CalibrationStatus> {
        self.state.lock().calibration_status(fixture_id)
    }

    pub fn fixture_ids(&self) -> Vec<String> {
        self.state.lock().fixtures().map(|f| f.id.clone()).collect()
    }

    /// Get the event receiver (should only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ConsoleEvent>> {
        self.broadcast_manager.take_event_receiver()
    }

    pub fn broadcast_status(&self) -> BroadcastStatus {
        self.broadcast_manager.status()
    }

    pub fn subscribe_broadcast_status(&self) -> watch::Receiver<BroadcastStatus> {
        self.broadcast_manager.subscribe_status()
    }

    /// True once the broadcast loop has stopped on an unexpected fault.
    pub fn is_broadcast_halted(&self) -> bool {
        self.broadcast_manager.is_halted()
    }
}
