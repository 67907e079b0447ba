//! Domain events emitted by the arbitration services.
//!
//! This module provides:
//! - [`EventEmitter`] trait for services to emit events
//! - Event types for arbitration decisions and device state observations

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Decisions taken by the arbitration engine.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ArbitrationEvent {
    /// A stream became the active stream on the device.
    StreamActivated {
        stream: String,
        /// Stream it replaced, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        preempted: Option<String>,
        /// `true` when the device was already playing it and no load was sent.
        #[serde(rename = "alreadyPlaying")]
        already_playing: bool,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The active stream ended and playback was stopped.
    StreamStopped {
        stream: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A notification was deliberately not acted on.
    StreamIgnored {
        stream: String,
        reason: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Device volume was returned to its pre-stream level.
    VolumeRestored {
        level: f32,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Device state changes noticed while polling.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// An external mute was observed; auto-unmute is suppressed until expiry.
    MuteInterlockEngaged {
        /// Cooldown in seconds.
        #[serde(rename = "cooldownSecs")]
        cooldown_secs: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The device was unmuted as a stream started.
    Unmuted {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}
