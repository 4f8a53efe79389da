use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sacn::source::SacnSource;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::frame::{is_valid_universe, source_name, DmxFrame, DEFAULT_PRIORITY, NULL_START_CODE};
use super::network_config::BroadcastConfig;
use crate::error::FollowError;

/// Frames a universe can have waiting before new ones are dropped.
pub const UNIVERSE_QUEUE_DEPTH: usize = 2;

/// Where one universe is sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniverseOptions {
    pub multicast: bool,
    pub destinations: Vec<SocketAddr>,
}

impl UniverseOptions {
    pub fn from_config(config: &BroadcastConfig) -> Self {
        let (destinations, rejected) = config.resolve_destinations();
        for destination in rejected {
            log::warn!("Ignoring unparsable sACN destination '{}'", destination);
        }
        UniverseOptions {
            multicast: config.multicast,
            destinations,
        }
    }

    /// Send targets in order; `None` is the universe's multicast group.
    fn targets(&self) -> Vec<Option<SocketAddr>> {
        let mut targets = Vec::with_capacity(self.destinations.len() + 1);
        if self.multicast {
            targets.push(None);
        }
        targets.extend(self.destinations.iter().copied().map(Some));
        targets
    }
}

/// A live sender with zero or more transmitting universes.
#[async_trait]
pub trait Transport: Send {
    /// Starts transmitting `universe` and returns its bounded frame queue.
    async fn start_universe(
        &mut self,
        universe: u16,
        options: &UniverseOptions,
    ) -> Result<mpsc::Sender<DmxFrame>, FollowError>;

    /// Stops `universe`. Returns once nothing more will be sent for it.
    async fn stop_universe(&mut self, universe: u16);

    /// Stops every universe and releases the sender.
    async fn close(&mut self);
}

/// Opens transports for a broadcast configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &BroadcastConfig) -> Result<Box<dyn Transport>, FollowError>;
}

/// Connects real sACN senders over UDP.
pub struct E131Connector {
    source_name: String,
}

impl E131Connector {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
        }
    }
}

#[async_trait]
impl Connector for E131Connector {
    async fn connect(&self, config: &BroadcastConfig) -> Result<Box<dyn Transport>, FollowError> {
        let address = config
            .bind_address()
            .map_err(FollowError::SenderUnavailable)?;
        let bind = SocketAddr::V4(SocketAddrV4::new(address, 0));
        let name = source_name(&self.source_name);

        let source = SacnSource::with_ip(name, bind).map_err(|e| {
            FollowError::SenderUnavailable(format!("failed to bind {}: {}", address, e))
        })?;
        log::info!("sACN sender bound to {} as '{}'", address, name);

        Ok(Box::new(E131Transport {
            source: Arc::new(Mutex::new(source)),
            universes: HashMap::new(),
            registered: HashSet::new(),
        }))
    }
}

struct UniverseStream {
    sender: mpsc::Sender<DmxFrame>,
    task: JoinHandle<()>,
}

pub struct E131Transport {
    source: Arc<Mutex<SacnSource>>,
    universes: HashMap<u16, UniverseStream>,
    /// Universes registered with the source at some point during this connection.
    registered: HashSet<u16>,
}

impl E131Transport {
    fn register(&mut self, universe: u16) -> Result<(), FollowError> {
        let result = self.source.lock().register_universe(universe);
        match result {
            Ok(()) => {
                self.registered.insert(universe);
                Ok(())
            }
            // A stream stopped earlier may still hold its registration.
            Err(e) if self.registered.contains(&universe) => {
                log::debug!("sACN universe {} re-registration: {}", universe, e);
                Ok(())
            }
            Err(e) => Err(FollowError::UniverseActivationFailure {
                universe,
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Transport for E131Transport {
    async fn start_universe(
        &mut self,
        universe: u16,
        options: &UniverseOptions,
    ) -> Result<mpsc::Sender<DmxFrame>, FollowError> {
        if !is_valid_universe(universe) {
            return Err(FollowError::UniverseActivationFailure {
                universe,
                reason: "sACN universes are numbered 1-63999".to_string(),
            });
        }
        if let Some(stream) = self.universes.get(&universe) {
            return Ok(stream.sender.clone());
        }
        self.register(universe)?;

        let (sender, receiver) = mpsc::channel(UNIVERSE_QUEUE_DEPTH);
        let task = tokio::spawn(stream_universe(
            self.source.clone(),
            universe,
            options.targets(),
            receiver,
        ));

        self.universes.insert(
            universe,
            UniverseStream {
                sender: sender.clone(),
                task,
            },
        );
        Ok(sender)
    }

    async fn stop_universe(&mut self, universe: u16) {
        let Some(stream) = self.universes.remove(&universe) else {
            return;
        };
        drop(stream.sender);
        if let Err(e) = stream.task.await {
            log::error!("sACN universe {} task failed: {}", universe, e);
        }
    }

    async fn close(&mut self) {
        let mut universes: Vec<u16> = self.universes.keys().copied().collect();
        universes.sort_unstable();
        for universe in universes {
            self.stop_universe(universe).await;
        }
    }
}

/// Sends queued frames for one universe until every sender is dropped, then
/// announces the end of the stream on the multicast group.
async fn stream_universe(
    source: Arc<Mutex<SacnSource>>,
    universe: u16,
    targets: Vec<Option<SocketAddr>>,
    mut receiver: mpsc::Receiver<DmxFrame>,
) {
    let mut failing = false;

    while let Some(frame) = receiver.recv().await {
        let slots = frame.slots();
        let mut sender = source.lock();
        for target in &targets {
            let result = sender.send(&[universe], &slots, Some(DEFAULT_PRIORITY), *target, None);
            match result {
                Ok(()) => failing = false,
                Err(e) if failing => log::debug!(
                    "sACN universe {} send to {} failed: {}",
                    universe,
                    describe(target),
                    e
                ),
                Err(e) => {
                    log::warn!(
                        "sACN universe {} send to {} failed: {}",
                        universe,
                        describe(target),
                        e
                    );
                    failing = true;
                }
            }
        }
    }

    if targets.contains(&None) {
        if let Err(e) = source.lock().terminate_stream(universe, NULL_START_CODE) {
            log::debug!("sACN universe {} termination failed: {}", universe, e);
        }
    }
    log::debug!("sACN universe {} stream terminated", universe);
}

fn describe(target: &Option<SocketAddr>) -> String {
    match target {
        Some(address) => address.to_string(),
        None => "multicast".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_put_multicast_group_first() {
        let options = UniverseOptions {
            multicast: true,
            destinations: vec!["10.0.0.9:5568".parse().unwrap()],
        };
        assert_eq!(
            options.targets(),
            vec![None, Some("10.0.0.9:5568".parse::<SocketAddr>().unwrap())]
        );
    }

    #[test]
    fn test_unicast_only_targets() {
        let options = UniverseOptions {
            multicast: false,
            destinations: vec![],
        };
        assert!(options.targets().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_universe_fails_activation() {
        let connector = E131Connector::new("test");
        let config = BroadcastConfig {
            source_address: "127.0.0.1".to_string(),
            multicast: false,
            ..BroadcastConfig::default()
        };
        let mut transport = connector.connect(&config).await.unwrap();

        let result = transport.start_universe(0, &UniverseOptions::default()).await;
        assert!(matches!(
            result,
            Err(FollowError::UniverseActivationFailure { universe: 0, .. })
        ));
        transport.close().await;
    }

    #[tokio::test]
    async fn test_universe_restarts_on_the_same_connection() {
        let connector = E131Connector::new("test");
        let config = BroadcastConfig {
            source_address: "127.0.0.1".to_string(),
            multicast: false,
            ..BroadcastConfig::default()
        };
        let mut transport = connector.connect(&config).await.unwrap();
        let options = UniverseOptions::default();

        transport.start_universe(3, &options).await.unwrap();
        transport.stop_universe(3).await;
        assert!(transport.start_universe(3, &options).await.is_ok());
        transport.close().await;
    }

    #[tokio::test]
    async fn test_bad_source_address_is_unavailable() {
        let connector = E131Connector::new("test");
        let config = BroadcastConfig {
            source_address: "not an address".to_string(),
            ..BroadcastConfig::default()
        };
        assert!(matches!(
            connector.connect(&config).await,
            Err(FollowError::SenderUnavailable(_))
        ));
    }
}
