//! Google Cast (v2) device control.
//!
//! Layers, bottom up:
//!
//! - [`frame`]: length-prefixed protobuf `CastMessage` codec
//! - [`channel`]/[`session`]: virtual channels multiplexed over one TLS stream
//! - [`tracker`]: request ids and reply correlation
//! - [`control`]/[`media`]: receiver and media commands on an open session
//! - [`client`]: one short-lived session per operation, behind [`CastClient`]
//! - [`discovery`]: mDNS browsing for devices

pub mod channel;
pub mod client;
pub mod connector;
pub mod control;
pub mod device;
pub mod discovery;
pub mod frame;
pub mod media;
pub mod messages;
pub mod session;
#[cfg(test)]
pub(crate) mod test_fixtures;
pub mod tracker;
pub mod traits;

pub use channel::{Channel, Namespace};
pub use client::CastClientImpl;
pub use connector::{SessionConnector, TlsSessionConnector};
pub use device::{Device, DeviceAddressError};
pub use discovery::{discover_device, select_device, DiscoveredDevice, DiscoveryError};
pub use media::LoadMode;
pub use messages::{DeviceStatus, MediaSessionId, MediaStatus, PlayerState, Volume};
pub use session::ChannelSession;
pub use tracker::{RequestIds, RpcError, RpcResult};
pub use traits::{CastClient, CastDeviceControl, CastMediaControl};
