//! Centralized error types for the Livecast core library.
//!
//! Each layer defines its own `thiserror` enum; [`LivecastError`] collects
//! them for callers (the server binary, bootstrap) that need one type.

use serde::Serialize;
use thiserror::Error;

use crate::cast::device::DeviceAddressError;
use crate::cast::discovery::DiscoveryError;
use crate::cast::frame::FrameError;
use crate::cast::tracker::RpcError;
use crate::stream::DirectoryError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for RpcError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection_failed",
            Self::Timeout(_) => "timeout",
            Self::Device(_) => "device_error",
            Self::MalformedReply(_) => "malformed_reply",
            Self::ConnectionClosed => "connection_closed",
            Self::DuplicateRequest(_) => "duplicate_request",
        }
    }
}

impl ErrorCode for FrameError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::TooLarge(_) => "frame_too_large",
            Self::Truncated => "frame_truncated",
            Self::UnsupportedWireType(_) => "unsupported_wire_type",
            Self::InvalidUtf8(_) => "invalid_utf8",
        }
    }
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::MdnsDaemon(_) => "mdns_daemon_failed",
            Self::NoDevices => "no_devices_found",
        }
    }
}

impl ErrorCode for DirectoryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_) => "http_error_status",
            Self::InvalidListing(_) => "directory_parse_error",
            Self::NotListed(_) => "stream_not_listed",
        }
    }
}

/// Application-wide error type.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum LivecastError {
    /// Device discovery failed or found nothing.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// A Cast request failed.
    #[error("Cast request failed: {0}")]
    Cast(String),

    /// Stream directory could not be queried.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Invalid device address.
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// Configuration values failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The device actor is no longer running.
    #[error("Device actor stopped")]
    ActorStopped,
}

impl LivecastError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Cast(_) => "cast_error",
            Self::Directory(_) => "directory_error",
            Self::InvalidAddress(_) => "invalid_address",
            Self::Configuration(_) => "configuration_error",
            Self::ActorStopped => "actor_stopped",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

// Re-export Result type aliases from their defining modules
pub use crate::cast::discovery::DiscoveryResult;
pub use crate::cast::frame::FrameResult;
pub use crate::cast::tracker::RpcResult;
pub use crate::stream::DirectoryResult;

/// Convenient Result alias for application-wide operations.
pub type LivecastResult<T> = Result<T, LivecastError>;

impl From<RpcError> for LivecastError {
    fn from(err: RpcError) -> Self {
        Self::Cast(err.to_string())
    }
}

impl From<DiscoveryError> for LivecastError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err.to_string())
    }
}

impl From<DirectoryError> for LivecastError {
    fn from(err: DirectoryError) -> Self {
        Self::Directory(err.to_string())
    }
}

impl From<DeviceAddressError> for LivecastError {
    fn from(err: DeviceAddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}
