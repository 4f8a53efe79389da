use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};

use crate::messages::{BroadcastState, BroadcastStatus, ConsoleEvent};
use crate::sacn::network_config::BroadcastConfig;
use crate::sacn::frame::DmxFrame;
use crate::sacn::transport::{Connector, Transport, UniverseOptions};
use crate::state::ConsoleState;

/// How often frame counters are logged.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// The broadcast worker. Owns the transport and the active universe set; reads
/// console state only to snapshot it.
pub struct Broadcaster {
    state: Arc<Mutex<ConsoleState>>,
    connector: Arc<dyn Connector>,
    config: BroadcastConfig,
    options: UniverseOptions,
    transport: Option<Box<dyn Transport>>,
    active: BTreeMap<u16, mpsc::Sender<DmxFrame>>,
    status: BroadcastStatus,
    status_tx: watch::Sender<BroadcastStatus>,
    event_tx: mpsc::Sender<ConsoleEvent>,
    sender_failing: bool,
    failing_universes: HashSet<u16>,
}

impl Broadcaster {
    pub fn new(
        state: Arc<Mutex<ConsoleState>>,
        connector: Arc<dyn Connector>,
        status_tx: watch::Sender<BroadcastStatus>,
        event_tx: mpsc::Sender<ConsoleEvent>,
    ) -> Self {
        let config = state.lock().broadcast_config().clone();
        let options = UniverseOptions::from_config(&config);

        Self {
            state,
            connector,
            config,
            options,
            transport: None,
            active: BTreeMap::new(),
            status: BroadcastStatus::default(),
            status_tx,
            event_tx,
            sender_failing: false,
            failing_universes: HashSet::new(),
        }
    }

    /// Runs until `stop_rx` fires or its sender is dropped, then tears everything down.
    ///
    /// A reconfigure signal is always handled before a pending tick.
    pub async fn run(
        mut self,
        mut stop_rx: oneshot::Receiver<()>,
        mut reconfigure_rx: mpsc::Receiver<()>,
    ) {
        let mut ticker = new_ticker(&self.config);

        log::info!(
            "sACN broadcaster started, running at {:.1}Hz ({})",
            1.0 / self.config.tick_period().as_secs_f64(),
            self.config.mode_string()
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    log::info!("sACN broadcaster received shutdown signal");
                    break;
                }

                Some(()) = reconfigure_rx.recv() => {
                    self.reconfigure().await;
                    ticker = new_ticker(&self.config);
                }

                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.stop().await;
    }

    async fn tick(&mut self) {
        self.status.ticks += 1;

        // Hold the lock only for the copy.
        let (frames, universes) = {
            let state = self.state.lock();
            (state.frame_snapshot(), state.referenced_universes())
        };

        if !self.ensure_transport().await {
            self.publish();
            return;
        }
        self.reconcile(&universes).await;

        let mut closed = Vec::new();
        for frame in frames {
            let Some(sender) = self.active.get(&frame.universe) else {
                continue;
            };
            match sender.try_send(frame) {
                Ok(()) => self.status.frames_sent += 1,
                Err(TrySendError::Full(_)) => {
                    self.status.frames_dropped += 1;
                    log::debug!("sACN universe {} queue full, frame dropped", frame.universe);
                }
                Err(TrySendError::Closed(_)) => closed.push(frame.universe),
            }
        }

        for universe in closed {
            log::warn!("sACN universe {} stopped unexpectedly, restarting", universe);
            self.active.remove(&universe);
            if let Some(transport) = self.transport.as_mut() {
                transport.stop_universe(universe).await;
            }
        }
        self.status.active_universes = self.active.keys().copied().collect();

        if self.status.ticks % ticks_per_report(&self.config) == 0 {
            log::info!(
                "sACN: {} frames sent, {} dropped, {} universes active",
                self.status.frames_sent,
                self.status.frames_dropped,
                self.active.len()
            );
        }

        self.publish();
    }

    /// Opens the transport if there is none. Returns whether one is available.
    async fn ensure_transport(&mut self) -> bool {
        if self.transport.is_some() {
            return true;
        }

        match self.connector.connect(&self.config).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.sender_failing = false;
                self.status.state = BroadcastState::Connected;

                let mode = self.config.mode_string();
                log::info!("sACN sender connected ({})", mode);
                emit(&self.event_tx, ConsoleEvent::BroadcastConnected { mode });
                true
            }
            Err(e) => {
                self.status.state = BroadcastState::Idle;
                if self.sender_failing {
                    log::debug!("{}", e);
                } else {
                    log::warn!("{}, retrying every tick", e);
                    emit(&self.event_tx, ConsoleEvent::SenderUnavailable(e.to_string()));
                    self.sender_failing = true;
                }
                false
            }
        }
    }

    /// Brings the active universe set in line with the universes fixtures reference.
    async fn reconcile(&mut self, wanted: &BTreeSet<u16>) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let stale: Vec<u16> = self
            .active
            .keys()
            .filter(|universe| !wanted.contains(*universe))
            .copied()
            .collect();
        for universe in stale {
            self.active.remove(&universe);
            transport.stop_universe(universe).await;
            log::info!("sACN universe {} stopped", universe);
        }

        for universe in wanted {
            if self.active.contains_key(universe) {
                continue;
            }
            match transport.start_universe(*universe, &self.options).await {
                Ok(sender) => {
                    self.active.insert(*universe, sender);
                    self.failing_universes.remove(universe);
                    log::info!("sACN universe {} started", universe);
                }
                Err(e) => {
                    if self.failing_universes.insert(*universe) {
                        log::warn!("{}", e);
                        emit(
                            &self.event_tx,
                            ConsoleEvent::UniverseActivationFailed {
                                universe: *universe,
                                reason: e.to_string(),
                            },
                        );
                    } else {
                        log::debug!("{}", e);
                    }
                }
            }
        }

        self.failing_universes.retain(|universe| wanted.contains(universe));
        self.status.active_universes = self.active.keys().copied().collect();
    }

    async fn reconfigure(&mut self) {
        log::info!("Reconfiguring sACN output");
        self.teardown(BroadcastState::Idle).await;

        self.config = self.state.lock().broadcast_config().clone();
        self.options = UniverseOptions::from_config(&self.config);
        self.sender_failing = false;
        self.failing_universes.clear();

        if self.ensure_transport().await {
            let universes = self.state.lock().referenced_universes();
            self.reconcile(&universes).await;
        }
        self.publish();
    }

    /// Stops every universe, closes the transport and moves to `next`.
    async fn teardown(&mut self, next: BroadcastState) {
        self.active.clear();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.status.state = next;
        self.status.active_universes.clear();
    }

    async fn stop(&mut self) {
        self.teardown(BroadcastState::Stopping).await;
        self.publish();

        log::info!(
            "sACN broadcaster shut down after sending {} frames ({} dropped)",
            self.status.frames_sent,
            self.status.frames_dropped
        );
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}

fn new_ticker(config: &BroadcastConfig) -> Interval {
    let mut ticker = interval(config.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn ticks_per_report(config: &BroadcastConfig) -> u64 {
    let ticks = REPORT_INTERVAL.as_secs_f64() / config.tick_period().as_secs_f64();
    (ticks.round() as u64).max(1)
}

/// Events never block the worker; when nobody drains them they are dropped.
fn emit(event_tx: &mpsc::Sender<ConsoleEvent>, event: ConsoleEvent) {
    if let Err(e) = event_tx.try_send(event) {
        log::debug!("Console event not delivered: {}", e);
    }
}
