pub mod frame;
pub mod network_config;
pub mod transport;
