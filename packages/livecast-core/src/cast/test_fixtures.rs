//! In-memory Cast device for session and client tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use super::channel::{Channel, Namespace};
use super::connector::SessionConnector;
use super::device::Device;
use super::frame::{CastCodec, CastMessage};
use super::session::ChannelSession;
use super::tracker::{RpcError, RpcResult};

const PIPE_CAPACITY: usize = 64 * 1024;
/// Smaller than any frame, so writes block once the peer stops reading.
const STALLED_PIPE_CAPACITY: usize = 8;

/// Device side of an in-memory session.
pub(crate) struct FakeDevice {
    framed: Framed<DuplexStream, CastCodec>,
}

pub(crate) fn session_pair() -> (ChannelSession, FakeDevice) {
    pipe_pair(PIPE_CAPACITY)
}

/// Pair whose device side is expected to never read.
pub(crate) fn stalled_session_pair() -> (ChannelSession, FakeDevice) {
    pipe_pair(STALLED_PIPE_CAPACITY)
}

fn pipe_pair(capacity: usize) -> (ChannelSession, FakeDevice) {
    let (local, remote) = tokio::io::duplex(capacity);
    let session = ChannelSession::from_stream(local, "fake-device");
    let device = FakeDevice {
        framed: Framed::new(remote, CastCodec),
    };
    (session, device)
}

impl FakeDevice {
    /// Next frame from the sender with its parsed JSON body; `None` on EOF.
    pub async fn next(&mut self) -> Option<(CastMessage, Value)> {
        let frame = self.framed.next().await?.ok()?;
        let body = serde_json::from_str(&frame.payload).unwrap_or(Value::Null);
        Some((frame, body))
    }

    /// Skips frames until one of type `kind` arrives.
    pub async fn expect(&mut self, kind: &str) -> (CastMessage, Value) {
        loop {
            match self.next().await {
                Some((frame, body)) if body["type"] == kind => return (frame, body),
                Some(_) => continue,
                None => panic!("connection closed while waiting for {}", kind),
            }
        }
    }

    /// Answers `to` on the same channel, swapping source and destination.
    pub async fn reply(&mut self, to: &CastMessage, body: Value) {
        let frame = CastMessage::new(
            to.destination_id.clone(),
            to.source_id.clone(),
            to.namespace.clone(),
            body.to_string(),
        );
        self.framed.send(frame).await.unwrap();
    }

    pub async fn send_from(
        &mut self,
        source: &str,
        destination: &str,
        namespace: Namespace,
        body: Value,
    ) {
        let channel = Channel::new(source, destination, namespace);
        self.framed.send(channel.outbound(body.to_string())).await.unwrap();
    }
}

type Script = Arc<dyn Fn(FakeDevice) -> BoxFuture<'static, ()> + Send + Sync>;

/// Connector that hands each new session to a scripted fake device.
pub(crate) struct ScriptedConnector {
    script: Option<Script>,
    stalled: bool,
    connections: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new<F, Fut>(script: F) -> Self
    where
        F: Fn(FakeDevice) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            script: Some(Arc::new(move |device| script(device).boxed())),
            stalled: false,
            connections: AtomicUsize::new(0),
        }
    }

    /// Connector whose devices accept the connection and then never read.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::new(|device| async move {
                let _device = device;
                std::future::pending::<()>().await;
            })
        }
    }

    /// Connector whose every connect attempt fails.
    pub fn refusing() -> Self {
        Self {
            script: None,
            stalled: false,
            connections: AtomicUsize::new(0),
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn connect(&self, device: &Device) -> RpcResult<ChannelSession> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let Some(script) = &self.script else {
            return Err(RpcError::Connection(format!("{}: refused", device.address())));
        };

        let (session, fake) = if self.stalled {
            stalled_session_pair()
        } else {
            session_pair()
        };
        tokio::spawn(script(fake));
        Ok(session)
    }
}
