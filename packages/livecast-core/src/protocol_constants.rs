//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the Cast v2 protocol and by receiver firmware.
//! Changing them breaks interoperability with real devices.

// ─────────────────────────────────────────────────────────────────────────────
// Cast v2 Transport
// ─────────────────────────────────────────────────────────────────────────────

/// TLS port Cast devices listen on when the address carries no port.
pub const CAST_DEFAULT_PORT: u16 = 8009;

/// Largest `CastMessage` body accepted or produced (bytes).
///
/// Receivers drop frames above 64 KiB, so we refuse to build them and treat
/// inbound ones as malformed.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// `CastMessage.protocol_version` value for CASTV2_1_0.
pub const PROTOCOL_VERSION_CASTV2_1_0: u64 = 0;

/// `CastMessage.payload_type` value for UTF-8 string payloads.
pub const PAYLOAD_TYPE_STRING: u64 = 0;

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint Identities
// ─────────────────────────────────────────────────────────────────────────────

/// Source id used for every message we send.
pub const SENDER_ID: &str = "sender-0";

/// Destination id of the device platform (receiver) endpoint.
pub const RECEIVER_ID: &str = "receiver-0";

/// Destination id receivers use for broadcasts to all senders.
pub const BROADCAST_ID: &str = "*";

/// App id of the Default Media Receiver.
pub const DEFAULT_MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";

// ─────────────────────────────────────────────────────────────────────────────
// Namespaces
// ─────────────────────────────────────────────────────────────────────────────

pub const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
pub const NS_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
pub const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
pub const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";

// ─────────────────────────────────────────────────────────────────────────────
// Request Correlation
// ─────────────────────────────────────────────────────────────────────────────

/// First correlation id handed out, and the value the counter wraps back to.
pub const REQUEST_ID_MIN: u32 = 1;

/// Last correlation id handed out before wrapping.
///
/// `0` is never issued: some receivers echo `0` on unsolicited status
/// broadcasts.
pub const REQUEST_ID_MAX: u32 = 9998;

// ─────────────────────────────────────────────────────────────────────────────
// Timeouts
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for a single correlated request, connect included (seconds).
pub const NETWORK_TIMEOUT_SECS: u64 = 10;

/// Upper bound for launch + load + (optionally) waiting for PLAYING (seconds).
pub const APP_LOAD_TIMEOUT_SECS: u64 = 10;

/// mDNS browse window when looking for devices (milliseconds).
pub const DISCOVERY_TIMEOUT_MS: u64 = 4000;

// ─────────────────────────────────────────────────────────────────────────────
// Arbitration Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Interval between mute-state samples (seconds).
pub const MUTE_POLL_INTERVAL_SECS: u64 = 60;

/// How long a detected user mute suppresses auto-unmute (seconds).
pub const MUTE_INTERLOCK_COOLDOWN_SECS: u64 = 15 * 60;

/// Capacity of the per-device notification mailbox.
pub const DEVICE_MAILBOX_CAPACITY: usize = 32;

/// Per-subscriber buffer for replies on a virtual channel.
pub const CHANNEL_SUBSCRIBER_CAPACITY: usize = 64;

/// Bound on fire-and-forget writes (CLOSE, PONG) and TLS shutdown (milliseconds).
pub const CONTROL_WRITE_TIMEOUT_MS: u64 = 2000;

// ─────────────────────────────────────────────────────────────────────────────
// Notifications & Streams
// ─────────────────────────────────────────────────────────────────────────────

/// Notification payload meaning "this mount just went live".
pub const STREAM_STARTED_PAYLOAD: &str = "started";

/// Topic prefix under which stream notifications are published.
pub const DEFAULT_TOPIC_PREFIX: &str = "mounts";

/// Content type assumed when neither the directory nor config names one.
pub const DEFAULT_STREAM_MIME_TYPE: &str = "audio/mpeg";
