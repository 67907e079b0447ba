//! Shared types for Cast device discovery.

use serde::Serialize;
use thiserror::Error;

use crate::cast::device::Device;

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// mDNS daemon error.
    #[error("mDNS daemon error: {0}")]
    MdnsDaemon(String),

    /// Browsing finished without finding any Cast device.
    #[error("no Cast devices found")]
    NoDevices,
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A Cast device as advertised over mDNS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    /// Stable device id (TXT `id`). Used to dedupe announcements.
    pub name: String,
    /// User-facing name (TXT `fn`).
    pub friendly_name: String,
    /// IPv4 address from the resolved records.
    pub address: String,
    pub port: u16,
}

impl DiscoveredDevice {
    pub fn to_device(&self) -> Device {
        Device::new(self.address.clone(), self.port, self.friendly_name.clone())
    }
}
