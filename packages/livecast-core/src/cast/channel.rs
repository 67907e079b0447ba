//! Virtual channel identities.
//!
//! A channel is the triple `(local id, remote id, namespace)`. Many channels
//! share one physical connection; the triple is all that is needed to route
//! an inbound frame to the right subscriber.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::frame::CastMessage;
use crate::protocol_constants::{
    BROADCAST_ID, NS_CONNECTION, NS_HEARTBEAT, NS_MEDIA, NS_RECEIVER, RECEIVER_ID, SENDER_ID,
};

/// The namespaces this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Virtual connection open/close.
    Connection,
    /// PING/PONG keepalive.
    Heartbeat,
    /// Platform receiver: status, volume, app launch/stop.
    Receiver,
    /// Media session control inside a launched app.
    Media,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => NS_CONNECTION,
            Self::Heartbeat => NS_HEARTBEAT,
            Self::Receiver => NS_RECEIVER,
            Self::Media => NS_MEDIA,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace string not handled by this crate.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown namespace: {0}")]
pub struct UnknownNamespace(pub String);

impl FromStr for Namespace {
    type Err = UnknownNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            NS_CONNECTION => Ok(Self::Connection),
            NS_HEARTBEAT => Ok(Self::Heartbeat),
            NS_RECEIVER => Ok(Self::Receiver),
            NS_MEDIA => Ok(Self::Media),
            other => Err(UnknownNamespace(other.to_string())),
        }
    }
}

/// Logical handle for one virtual channel. Opening one performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    pub local_id: String,
    pub remote_id: String,
    pub namespace: Namespace,
}

impl Channel {
    pub fn new(
        local_id: impl Into<String>,
        remote_id: impl Into<String>,
        namespace: Namespace,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            remote_id: remote_id.into(),
            namespace,
        }
    }

    /// Channel from our sender to the device platform endpoint.
    pub fn platform(namespace: Namespace) -> Self {
        Self::new(SENDER_ID, RECEIVER_ID, namespace)
    }

    /// Channel from our sender to a launched application's transport.
    pub fn transport(transport_id: impl Into<String>, namespace: Namespace) -> Self {
        Self::new(SENDER_ID, transport_id, namespace)
    }

    /// Whether an inbound frame was sent on this channel.
    ///
    /// Receivers address broadcasts (unsolicited status updates) to `*`.
    pub fn accepts(&self, message: &CastMessage) -> bool {
        message.namespace == self.namespace.as_str()
            && message.source_id == self.remote_id
            && (message.destination_id == self.local_id || message.destination_id == BROADCAST_ID)
    }

    /// Wraps a JSON payload into an outbound frame for this channel.
    pub fn outbound(&self, payload: String) -> CastMessage {
        CastMessage::new(
            self.local_id.clone(),
            self.remote_id.clone(),
            self.namespace.as_str(),
            payload,
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [{}]", self.local_id, self.remote_id, self.namespace)
    }
}
