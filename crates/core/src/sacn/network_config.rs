use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::frame::SACN_PORT;

/// Shortest tick the broadcaster runs at, however high the frame rate.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Output settings for the sACN broadcaster.
///
/// Replaced wholesale on reconfiguration; the broadcaster reconnects with the new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastConfig {
    /// Local IPv4 address to send from. Empty binds to all interfaces.
    pub source_address: String,
    /// Frames per second. Zero falls back to one frame per second.
    pub fps: u32,
    pub multicast: bool,
    /// Unicast receivers, as `IP` or `IP:port`.
    pub destinations: Vec<String>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        BroadcastConfig {
            source_address: String::new(),
            fps: 25,
            multicast: true,
            destinations: Vec::new(),
        }
    }
}

impl BroadcastConfig {
    /// Time between broadcaster ticks. `fps == 0` ticks at 1 Hz rather than stopping.
    ///
    /// Never shorter than one millisecond, so any frame rate yields a usable timer.
    pub fn tick_period(&self) -> Duration {
        if self.fps == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs_f64(1.0 / self.fps as f64).max(MIN_TICK_PERIOD)
        }
    }

    /// Address to bind the sending socket to.
    pub fn bind_address(&self) -> Result<Ipv4Addr, String> {
        if self.source_address.trim().is_empty() {
            return Ok(Ipv4Addr::UNSPECIFIED);
        }
        self.source_address
            .trim()
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("invalid source address '{}': {}", self.source_address, e))
    }

    /// Parsed unicast destinations. Entries that do not parse are returned separately.
    pub fn resolve_destinations(&self) -> (Vec<SocketAddr>, Vec<String>) {
        let mut resolved = Vec::new();
        let mut rejected = Vec::new();

        for destination in &self.destinations {
            match parse_destination(destination) {
                Some(address) => {
                    if !resolved.contains(&address) {
                        resolved.push(address);
                    }
                }
                None => rejected.push(destination.clone()),
            }
        }

        (resolved, rejected)
    }

    pub fn mode_string(&self) -> String {
        match (self.multicast, self.destinations.len()) {
            (true, 0) => "multicast".to_string(),
            (true, n) => format!("multicast + {} unicast", n),
            (false, 0) => "no output".to_string(),
            (false, n) => format!("{} unicast", n),
        }
    }
}

/// Parses `IP` (sACN port implied) or `IP:port`.
pub fn parse_destination(destination: &str) -> Option<SocketAddr> {
    let destination = destination.trim();
    if let Ok(address) = destination.parse::<SocketAddr>() {
        return Some(address);
    }
    destination
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, SACN_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_fps_ticks_once_per_second() {
        let config = BroadcastConfig {
            fps: 0,
            ..BroadcastConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_secs(1));

        let config = BroadcastConfig {
            fps: 40,
            ..BroadcastConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(25));
    }

    #[test]
    fn test_huge_fps_keeps_a_nonzero_period() {
        let config = BroadcastConfig {
            fps: u32::MAX,
            ..BroadcastConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(1));

        let config = BroadcastConfig {
            fps: 5000,
            ..BroadcastConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(1));
    }

    #[test]
    fn test_resolve_destinations() {
        let config = BroadcastConfig {
            destinations: vec![
                "10.0.0.5".to_string(),
                "10.0.0.6:6000".to_string(),
                "not-an-ip".to_string(),
                " 10.0.0.5 ".to_string(),
            ],
            ..BroadcastConfig::default()
        };

        let (resolved, rejected) = config.resolve_destinations();
        assert_eq!(
            resolved,
            vec![
                "10.0.0.5:5568".parse::<SocketAddr>().unwrap(),
                "10.0.0.6:6000".parse::<SocketAddr>().unwrap(),
            ]
        );
        assert_eq!(rejected, vec!["not-an-ip".to_string()]);
    }

    #[test]
    fn test_bind_address() {
        let mut config = BroadcastConfig::default();
        assert_eq!(config.bind_address(), Ok(Ipv4Addr::UNSPECIFIED));

        config.source_address = "192.168.1.20".to_string();
        assert_eq!(config.bind_address(), Ok(Ipv4Addr::new(192, 168, 1, 20)));

        config.source_address = "fe80::1".to_string();
        assert!(config.bind_address().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let config: BroadcastConfig =
            serde_json::from_str(r#"{"sourceAddress":"10.1.1.1","fps":0}"#).unwrap();
        assert_eq!(config.source_address, "10.1.1.1");
        assert_eq!(config.fps, 0);
        assert!(config.multicast);
        assert!(config.destinations.is_empty());
    }
}
