//! Opening sessions.
//!
//! Clients open a fresh session per operation through a [`SessionConnector`],
//! which lets tests substitute an in-memory device for the TLS socket.

use std::time::Duration;

use async_trait::async_trait;

use super::device::Device;
use super::session::ChannelSession;
use super::tracker::RpcResult;

/// Opens a new [`ChannelSession`] to a device.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, device: &Device) -> RpcResult<ChannelSession>;
}

/// Production connector: TCP + TLS to `device.host:device.port`.
#[derive(Debug, Clone)]
pub struct TlsSessionConnector {
    connect_timeout: Duration,
}

impl TlsSessionConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl SessionConnector for TlsSessionConnector {
    async fn connect(&self, device: &Device) -> RpcResult<ChannelSession> {
        ChannelSession::connect(device, self.connect_timeout).await
    }
}
