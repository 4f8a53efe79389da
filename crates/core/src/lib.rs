pub use broadcast::BroadcastManager;
pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use console::FollowConsole;
pub use error::FollowError;
pub use interpolation::{barycentric, to_device_units, Interpolator, Triangulation};
pub use messages::{BroadcastState, BroadcastStatus, ConsoleEvent, Settings};
pub use network::interface_enumerator::{
    default_source_address, enumerate_ipv4_addresses, InterfaceInfo,
};
pub use sacn::network_config::BroadcastConfig;
pub use sacn::frame::DmxFrame;
pub use sacn::transport::{Connector, E131Connector, Transport, UniverseOptions};
pub use state::{CalibrationStatus, ConsoleState, OUTSIDE_HULL};

mod broadcast;
mod config;
mod console;
mod error;
mod interpolation;
pub mod messages;
mod network;
pub mod sacn;
mod state;
