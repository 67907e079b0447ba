//! mDNS-based Cast device discovery.
//!
//! Browses `_googlecast._tcp.local.` for a fixed window and collects every
//! resolved service. Speaker groups announce themselves under the same
//! service type but cannot be controlled as a single receiver, so they are
//! skipped.

use mdns_sd::{ResolvedService, ScopedIp, ServiceDaemon, ServiceEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use super::types::{DiscoveredDevice, DiscoveryError, DiscoveryResult};

/// Cast mDNS service type (note: trailing dot is required by mdns-sd).
const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// TXT `md` (model) of a multi-room group.
const GROUP_MODEL: &str = "Google Cast Group";

/// Instance name prefix of a multi-room group.
const GROUP_INSTANCE_PREFIX: &str = "google-cast-group-";

/// Discovers Cast devices using mDNS.
///
/// # Arguments
///
/// * `daemon` - Shared mDNS service daemon
/// * `browse_timeout` - How long to collect announcements
///
/// # Returns
///
/// Devices in discovery order, deduplicated by TXT `id`.
pub async fn discover_mdns(
    daemon: &Arc<ServiceDaemon>,
    browse_timeout: Duration,
) -> DiscoveryResult<Vec<DiscoveredDevice>> {
    log::debug!(
        "[mDNS] Browsing {} for {}ms",
        CAST_SERVICE_TYPE,
        browse_timeout.as_millis()
    );

    let receiver = daemon
        .browse(CAST_SERVICE_TYPE)
        .map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))?;

    let mut devices = Vec::new();
    let deadline = Instant::now() + browse_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match timeout(remaining, receiver.recv_async()).await {
            Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                log::trace!("[mDNS] Service resolved: {:?}", info.fullname);
                if let Some(device) = parse_cast_service(&info) {
                    devices.push(device);
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                log::debug!("[mDNS] Receiver channel closed: {:?}", e);
                break;
            }
            Err(_) => break,
        }
    }

    if let Err(e) = daemon.stop_browse(CAST_SERVICE_TYPE) {
        log::warn!("[mDNS] Failed to stop browse: {:?}", e);
    }

    let devices = dedupe_by_name(devices);
    log::info!("[mDNS] Discovery complete: {} device(s)", devices.len());
    Ok(devices)
}

/// Parses a resolved service; `None` for groups or services without an IPv4 address.
fn parse_cast_service(info: &ResolvedService) -> Option<DiscoveredDevice> {
    if is_group(&info.fullname, txt_value(info, "md").as_deref()) {
        log::debug!("[mDNS] Skipping group {}", info.fullname);
        return None;
    }

    let address = info.addresses.iter().find_map(|addr| match addr {
        ScopedIp::V4(v4) => Some(v4.addr().to_string()),
        _ => None,
    })?;

    let fallback = instance_name(&info.fullname);
    let name = txt_value(info, "id").unwrap_or_else(|| fallback.clone());
    let friendly_name = txt_value(info, "fn").unwrap_or(fallback);

    Some(DiscoveredDevice {
        name,
        friendly_name,
        address,
        port: info.port,
    })
}

fn txt_value(info: &ResolvedService, key: &str) -> Option<String> {
    info.txt_properties
        .get_property_val_str(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn is_group(fullname: &str, model: Option<&str>) -> bool {
    model.is_some_and(|model| model.eq_ignore_ascii_case(GROUP_MODEL))
        || instance_name(fullname)
            .to_ascii_lowercase()
            .starts_with(GROUP_INSTANCE_PREFIX)
}

/// `Kitchen-abc123._googlecast._tcp.local.` -> `Kitchen-abc123`
fn instance_name(fullname: &str) -> String {
    fullname
        .trim()
        .strip_suffix(CAST_SERVICE_TYPE)
        .map(|name| name.trim_end_matches('.'))
        .filter(|name| !name.is_empty())
        .unwrap_or(fullname)
        .to_string()
}

/// Keeps the first announcement for each device name, preserving order.
fn dedupe_by_name(devices: Vec<DiscoveredDevice>) -> Vec<DiscoveredDevice> {
    let mut seen = HashSet::new();
    devices
        .into_iter()
        .filter(|device| seen.insert(device.name.clone()))
        .collect()
}

/// Creates a new mDNS service daemon.
///
/// The daemon spawns a background thread; reuse it across discovery calls.
pub fn create_daemon() -> DiscoveryResult<ServiceDaemon> {
    ServiceDaemon::new().map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))
}
