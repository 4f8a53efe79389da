use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sacn::network_config::BroadcastConfig;

/// Notifications from the broadcaster to whoever drives the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    /// A sender was opened; `mode` describes where frames go.
    BroadcastConnected { mode: String },
    /// The sender could not be opened. Retried every tick; reported once per failure streak.
    SenderUnavailable(String),
    UniverseActivationFailed { universe: u16, reason: String },
    /// The broadcast loop stopped on an unexpected fault and will not restart.
    BroadcastHalted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastState {
    /// No sender.
    #[default]
    Idle,
    /// Sender open, zero or more universes transmitting.
    Connected,
    /// Tearing down. Terminal.
    Stopping,
}

/// Snapshot of the broadcaster, published after every tick and state change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BroadcastStatus {
    pub state: BroadcastState,
    pub active_universes: Vec<u16>,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub ticks: u64,
}

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Announced in every sACN packet.
    pub source_name: String,
    pub broadcast: BroadcastConfig,
    /// Show file opened most recently.
    pub last_show_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Sent as-is, without a "-<hostname>" suffix. Consoles sharing a
            // network tell themselves apart by setting distinct names.
            source_name: "Folje".to_string(),
            broadcast: BroadcastConfig::default(),
            last_show_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_name_is_sent_verbatim() {
        let settings = Settings::default();
        assert_eq!(settings.source_name, "Folje");
        assert_eq!(crate::sacn::frame::source_name(&settings.source_name), "Folje");
    }
}
