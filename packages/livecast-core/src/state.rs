//! Core configuration types.
//!
//! [`Config`] holds every tunable the core reads. The server builds it from
//! YAML and environment overrides; tests use [`Config::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cast::LoadMode;
use crate::protocol_constants::{
    APP_LOAD_TIMEOUT_SECS, DEVICE_MAILBOX_CAPACITY, DISCOVERY_TIMEOUT_MS,
    MUTE_INTERLOCK_COOLDOWN_SECS, MUTE_POLL_INTERVAL_SECS, NETWORK_TIMEOUT_SECS,
};

/// Stream playback volume applied on auto-unmute when nothing else is configured.
pub const DEFAULT_STREAM_VOLUME: f32 = 0.5;

/// Configuration for stream arbitration behavior.
///
/// Groups the mute interlock, auto-unmute and load parameters.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ArbitrationConfig {
    /// Unmute (and set `stream_volume`) when a stream starts.
    pub auto_unmute: bool,

    /// Suppress auto-unmute for a cooldown after the user mutes the device.
    pub use_mute_interlock: bool,

    /// Interval between mute-state samples (seconds).
    pub mute_poll_interval_secs: u64,

    /// How long an observed mute suppresses auto-unmute (seconds).
    pub mute_interlock_cooldown_secs: u64,

    /// Volume level (0.0-1.0) set on auto-unmute. `None` leaves the level alone
    /// and disables volume restore.
    pub stream_volume: Option<f32>,

    /// When `load_and_play` reports success.
    pub load_mode: LoadMode,
}

impl ArbitrationConfig {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.mute_poll_interval_secs == 0 {
            return Err("mute_poll_interval_secs must be >= 1 (interval panics on 0)".to_string());
        }
        if let Some(level) = self.stream_volume {
            if !(0.0..=1.0).contains(&level) {
                return Err(format!("stream_volume must be within 0.0..=1.0, got {}", level));
            }
        }
        Ok(())
    }

    pub fn mute_poll_interval(&self) -> Duration {
        Duration::from_secs(self.mute_poll_interval_secs)
    }

    pub fn mute_interlock_cooldown(&self) -> Duration {
        Duration::from_secs(self.mute_interlock_cooldown_secs)
    }
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            auto_unmute: true,
            use_mute_interlock: true,
            mute_poll_interval_secs: MUTE_POLL_INTERVAL_SECS,
            mute_interlock_cooldown_secs: MUTE_INTERLOCK_COOLDOWN_SECS,
            stream_volume: Some(DEFAULT_STREAM_VOLUME),
            load_mode: LoadMode::default(),
        }
    }
}

/// Configuration for the Livecast core.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Network
    /// Bound on connecting and on each request/reply (seconds).
    pub network_timeout_secs: u64,

    /// Bound on the whole launch + load sequence (seconds).
    pub app_load_timeout_secs: u64,

    // Discovery
    /// mDNS browse window (milliseconds).
    pub discovery_timeout_ms: u64,

    // Actor
    /// Capacity of the per-device notification mailbox.
    pub mailbox_capacity: usize,

    // Media
    /// Artwork URL attached to every loaded stream.
    pub image_url: Option<String>,

    /// Arbitration configuration.
    pub arbitration: ArbitrationConfig,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.network_timeout_secs == 0 {
            return Err("network_timeout_secs must be >= 1".to_string());
        }
        if self.app_load_timeout_secs == 0 {
            return Err("app_load_timeout_secs must be >= 1".to_string());
        }
        if self.mailbox_capacity == 0 {
            return Err("mailbox_capacity must be >= 1 (mpsc::channel panics on 0)".to_string());
        }
        self.arbitration.validate()
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn app_load_timeout(&self) -> Duration {
        Duration::from_secs(self.app_load_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_timeout_secs: NETWORK_TIMEOUT_SECS,
            app_load_timeout_secs: APP_LOAD_TIMEOUT_SECS,
            discovery_timeout_ms: DISCOVERY_TIMEOUT_MS,
            mailbox_capacity: DEVICE_MAILBOX_CAPACITY,
            image_url: None,
            arbitration: ArbitrationConfig::default(),
        }
    }
}
