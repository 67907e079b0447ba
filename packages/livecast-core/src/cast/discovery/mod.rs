//! Cast device discovery and selection.

mod mdns;
mod types;

use std::sync::Arc;
use std::time::Duration;

pub use mdns::{create_daemon, discover_mdns};
pub use types::{DiscoveredDevice, DiscoveryError, DiscoveryResult};

/// Picks the device whose friendly name equals `preferred`, else the first one.
pub fn select_device<'a>(
    devices: &'a [DiscoveredDevice],
    preferred: Option<&str>,
) -> Option<&'a DiscoveredDevice> {
    preferred
        .and_then(|name| devices.iter().find(|device| device.friendly_name == name))
        .or_else(|| devices.first())
}

/// Runs one mDNS browse on a private daemon and selects a device.
///
/// Returns [`DiscoveryError::NoDevices`] when nothing answered in time.
pub async fn discover_device(
    browse_timeout: Duration,
    preferred: Option<&str>,
) -> DiscoveryResult<DiscoveredDevice> {
    let daemon = Arc::new(create_daemon()?);
    let devices = discover_mdns(&daemon, browse_timeout).await;
    if let Err(e) = daemon.shutdown() {
        log::debug!("[mDNS] Daemon shutdown failed: {:?}", e);
    }

    let devices = devices?;
    let selected = select_device(&devices, preferred)
        .cloned()
        .ok_or(DiscoveryError::NoDevices)?;

    match preferred {
        Some(name) if selected.friendly_name != name => log::warn!(
            "[Discovery] Preferred device {:?} not found, using {}",
            name,
            selected.friendly_name
        ),
        _ => log::info!(
            "[Discovery] Selected {} at {}:{}",
            selected.friendly_name,
            selected.address,
            selected.port
        ),
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<DiscoveredDevice> {
        ["Living room", "Bedroom speaker"]
            .iter()
            .enumerate()
            .map(|(i, friendly)| DiscoveredDevice {
                name: format!("id-{}", i),
                friendly_name: friendly.to_string(),
                address: format!("10.0.0.{}", i + 1),
                port: 8009,
            })
            .collect()
    }

    #[test]
    fn preferred_name_wins() {
        let devices = devices();
        let selected = select_device(&devices, Some("Bedroom speaker")).unwrap();
        assert_eq!(selected.address, "10.0.0.2");
    }

    #[test]
    fn falls_back_to_first_device() {
        let devices = devices();
        assert_eq!(
            select_device(&devices, Some("Garage")).unwrap().friendly_name,
            "Living room"
        );
        assert_eq!(select_device(&devices, None).unwrap().name, "id-0");
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(select_device(&[], Some("Bedroom speaker")).is_none());
    }
}
