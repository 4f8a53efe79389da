use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::broadcaster::Broadcaster;
use crate::messages::{BroadcastStatus, ConsoleEvent};
use crate::sacn::transport::Connector;
use crate::state::ConsoleState;

/// Capacity of the console event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Starts, reconfigures and stops the broadcast worker.
///
/// The worker runs in its own task under a supervisor task. If the worker
/// panics the supervisor logs it, marks the manager halted and sends
/// [`ConsoleEvent::BroadcastHalted`]; the rest of the process keeps running.
pub struct BroadcastManager {
    state: Arc<Mutex<ConsoleState>>,
    connector: Arc<dyn Connector>,
    event_sender: mpsc::Sender<ConsoleEvent>,
    event_receiver: Option<mpsc::Receiver<ConsoleEvent>>,
    status_sender: Option<watch::Sender<BroadcastStatus>>,
    status_receiver: watch::Receiver<BroadcastStatus>,
    stop_sender: Option<oneshot::Sender<()>>,
    reconfigure_sender: Option<mpsc::Sender<()>>,
    supervisor: Option<JoinHandle<()>>,
    halted: Arc<AtomicBool>,
    running: bool,
}

impl BroadcastManager {
    pub fn new(state: Arc<Mutex<ConsoleState>>, connector: Arc<dyn Connector>) -> Self {
        let (event_sender, event_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (status_sender, status_receiver) = watch::channel(BroadcastStatus::default());

        Self {
            state,
            connector,
            event_sender,
            event_receiver: Some(event_receiver),
            status_sender: Some(status_sender),
            status_receiver,
            stop_sender: None,
            reconfigure_sender: None,
            supervisor: None,
            halted: Arc::new(AtomicBool::new(false)),
            running: false,
        }
    }

    /// Spawns the worker. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), anyhow::Error> {
        if self.running {
            return Err(anyhow::anyhow!("Broadcast manager is already running"));
        }
        let status_sender = self
            .status_sender
            .take()
            .ok_or_else(|| anyhow::anyhow!("Broadcast manager cannot be restarted"))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        // One pending reconfigure is enough; the worker reads the latest config.
        let (reconfigure_tx, reconfigure_rx) = mpsc::channel(1);

        let broadcaster = Broadcaster::new(
            self.state.clone(),
            self.connector.clone(),
            status_sender,
            self.event_sender.clone(),
        );
        let worker = tokio::spawn(broadcaster.run(stop_rx, reconfigure_rx));

        let event_sender = self.event_sender.clone();
        let halted = self.halted.clone();
        let supervisor = tokio::spawn(async move {
            match worker.await {
                Ok(()) => log::debug!("sACN broadcaster task finished"),
                Err(e) if e.is_panic() => {
                    let reason = panic_message(e.into_panic());
                    log::error!("sACN broadcaster halted: {}", reason);
                    halted.store(true, Ordering::SeqCst);
                    if let Err(e) = event_sender.try_send(ConsoleEvent::BroadcastHalted(reason)) {
                        log::warn!("Could not report broadcaster halt: {}", e);
                    }
                }
                Err(e) => log::warn!("sACN broadcaster task cancelled: {}", e),
            }
        });

        self.stop_sender = Some(stop_tx);
        self.reconfigure_sender = Some(reconfigure_tx);
        self.supervisor = Some(supervisor);
        self.running = true;
        Ok(())
    }

    /// Asks the worker to tear down and reconnect with the config currently in
    /// the console state.
    pub fn request_reconfigure(&self) {
        let Some(sender) = &self.reconfigure_sender else {
            return;
        };
        match sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => {
                log::debug!("Reconfigure ignored, broadcaster is not running")
            }
        }
    }

    /// Get the event receiver (should only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ConsoleEvent>> {
        self.event_receiver.take()
    }

    pub fn status(&self) -> BroadcastStatus {
        self.status_receiver.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<BroadcastStatus> {
        self.status_receiver.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits until every universe is closed.
    pub async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if !self.running {
            return Ok(());
        }

        log::info!("Shutting down sACN broadcaster...");

        if let Some(stop) = self.stop_sender.take() {
            // Already gone if the worker halted.
            let _ = stop.send(());
        }
        self.reconfigure_sender = None;

        if let Some(supervisor) = self.supervisor.take() {
            supervisor
                .await
                .map_err(|e| anyhow::anyhow!("Broadcast supervisor failed: {}", e))?;
        }

        self.running = false;
        log::info!("sACN broadcaster shutdown complete");
        Ok(())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
