use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// A local IPv4 address that sACN can be sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub address: Ipv4Addr,
}

/// Enumerate the non-loopback IPv4 addresses of this machine
pub fn enumerate_ipv4_addresses() -> Result<Vec<InterfaceInfo>, String> {
    let interfaces =
        if_addrs::get_if_addrs().map_err(|e| format!("Failed to enumerate interfaces: {e}"))?;

    let mut addresses: Vec<InterfaceInfo> = interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(address) => Some(InterfaceInfo {
                name: iface.name,
                address,
            }),
            IpAddr::V6(_) => None,
        })
        .collect();

    addresses.dedup_by(|a, b| a.address == b.address);
    Ok(addresses)
}

/// Address to bind to when none is configured: the first enumerated interface.
pub fn default_source_address() -> Option<Ipv4Addr> {
    match enumerate_ipv4_addresses() {
        Ok(addresses) => addresses.first().map(|info| info.address),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}
