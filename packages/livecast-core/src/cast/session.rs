//! Channel session: one physical connection carrying many virtual channels.
//!
//! A reader task owns the read half. Every inbound frame is
//! 1. answered directly if it is a heartbeat PING,
//! 2. offered to the session's [`PendingRequests`], and
//! 3. fanned out to subscribers of the matching channel (FIFO per channel).
//!
//! When the read side fails or the device closes the platform connection,
//! all pending requests are failed immediately instead of waiting for their
//! timeouts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_native_tls::native_tls;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use super::channel::{Channel, Namespace};
use super::device::Device;
use super::frame::{CastCodec, CastMessage};
use super::messages::{reply_type, Reply, Request};
use super::tracker::{PendingRequests, RpcError, RpcResult};
use crate::protocol_constants::{
    CHANNEL_SUBSCRIBER_CAPACITY, CONTROL_WRITE_TIMEOUT_MS, RECEIVER_ID,
};

const CONTROL_WRITE_TIMEOUT: Duration = Duration::from_millis(CONTROL_WRITE_TIMEOUT_MS);

/// Byte stream a session can run over (TLS socket in production, duplex pipe in tests).
pub trait CastStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> CastStream for T {}

type BoxedStream = Box<dyn CastStream>;

struct Shared {
    peer: String,
    writer: tokio::sync::Mutex<FramedWrite<WriteHalf<BoxedStream>, CastCodec>>,
    pending: PendingRequests,
    subscribers: Mutex<Vec<(Channel, mpsc::Sender<Reply>)>>,
    channels: Mutex<HashSet<Channel>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

/// One connection to one device.
pub struct ChannelSession {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelSession {
    /// Opens a TLS connection to `device`.
    ///
    /// Cast devices present self-signed certificates, so certificate and
    /// hostname verification are disabled.
    pub async fn connect(device: &Device, timeout: Duration) -> RpcResult<Self> {
        let address = device.address();
        log::debug!("[CastSession] Connecting to {}", address);

        let tcp = tokio::time::timeout(
            timeout,
            TcpStream::connect((device.host.as_str(), device.port)),
        )
        .await
        .map_err(|_| RpcError::Connection(format!("connect to {} timed out", address)))?
        .map_err(|e| RpcError::Connection(format!("{}: {}", address, e)))?;

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| RpcError::Connection(format!("TLS setup failed: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let tls = tokio::time::timeout(timeout, connector.connect(&device.host, tcp))
            .await
            .map_err(|_| RpcError::Connection(format!("TLS handshake with {} timed out", address)))?
            .map_err(|e| RpcError::Connection(format!("TLS handshake with {}: {}", address, e)))?;

        Ok(Self::from_stream(tls, address))
    }

    /// Wraps an already-established byte stream and starts the reader task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: CastStream + 'static,
    {
        let boxed: BoxedStream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);

        let shared = Arc::new(Shared {
            peer: peer.into(),
            writer: tokio::sync::Mutex::new(FramedWrite::new(write_half, CastCodec)),
            pending: PendingRequests::new(),
            subscribers: Mutex::new(Vec::new()),
            channels: Mutex::new(HashSet::new()),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });

        let reader = FramedRead::new(read_half, CastCodec);
        let handle = tokio::spawn(read_loop(reader, Arc::clone(&shared)));

        Self {
            shared,
            reader: Mutex::new(Some(handle)),
        }
    }

    /// Peer address, for logs.
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    /// Registers a virtual channel. No I/O; the caller sends CONNECT itself.
    pub fn open_channel(&self, channel: Channel) -> Channel {
        self.shared.channels.lock().insert(channel.clone());
        channel
    }

    /// Serializes and writes one request on `channel`.
    pub async fn send(&self, channel: &Channel, request: &Request) -> RpcResult<()> {
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }
        let payload = request
            .to_payload()
            .map_err(|e| RpcError::MalformedReply(format!("cannot encode request: {}", e)))?;
        self.shared.write(channel.outbound(payload)).await
    }

    /// [`send`](Self::send), failing with [`RpcError::Timeout`] if the write
    /// does not complete within `timeout`.
    pub async fn send_within(
        &self,
        channel: &Channel,
        request: &Request,
        timeout: Duration,
    ) -> RpcResult<()> {
        tokio::time::timeout(timeout, self.send(channel, request))
            .await
            .map_err(|_| RpcError::Timeout(timeout))?
    }

    /// Lazy, FIFO sequence of replies arriving on `channel`.
    ///
    /// Ends when the session closes. Replies that arrive while the subscriber
    /// is more than [`CHANNEL_SUBSCRIBER_CAPACITY`] behind are dropped.
    pub fn on_message(&self, channel: &Channel) -> ReceiverStream<Reply> {
        let (tx, rx) = mpsc::channel(CHANNEL_SUBSCRIBER_CAPACITY);
        if !self.shared.shutdown.is_cancelled() {
            self.shared.subscribers.lock().push((channel.clone(), tx));
        }
        ReceiverStream::new(rx)
    }

    pub(crate) fn pending(&self) -> &PendingRequests {
        &self.shared.pending
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire) || self.shared.shutdown.is_cancelled()
    }

    /// Sends CLOSE on every opened connection channel and tears the socket down.
    ///
    /// Idempotent; safe after the peer already went away.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if !self.shared.shutdown.is_cancelled() {
            let goodbye = tokio::time::timeout(CONTROL_WRITE_TIMEOUT, self.say_goodbye()).await;
            if goodbye.is_err() {
                log::debug!(
                    "[CastSession] {}: peer not reading, dropping connection",
                    self.peer()
                );
            }
        }

        self.shared.shutdown.cancel();
        self.shared.pending.fail_all();
        self.shared.subscribers.lock().clear();

        let reader = self.reader.lock().take();
        if let Some(handle) = reader {
            handle.abort();
        }
        log::debug!("[CastSession] {}: closed", self.peer());
    }

    /// CLOSE on every connection channel, then TLS shutdown.
    async fn say_goodbye(&self) {
        let connections: Vec<Channel> = self
            .shared
            .channels
            .lock()
            .iter()
            .filter(|channel| channel.namespace == Namespace::Connection)
            .cloned()
            .collect();

        for channel in connections {
            if let Ok(payload) = Request::Close.to_payload() {
                if let Err(e) = self.shared.write(channel.outbound(payload)).await {
                    log::debug!("[CastSession] {}: CLOSE not delivered: {}", self.peer(), e);
                    break;
                }
            }
        }

        let mut writer = self.shared.writer.lock().await;
        if let Err(e) = writer.close().await {
            log::debug!("[CastSession] {}: shutdown error: {}", self.peer(), e);
        }
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
    }
}

impl Shared {
    async fn write(&self, frame: CastMessage) -> RpcResult<()> {
        let mut writer = self.writer.lock().await;
        writer
            .send(frame)
            .await
            .map_err(|e| RpcError::Connection(format!("{}: write failed: {}", self.peer, e)))
    }

    async fn handle_inbound(&self, frame: CastMessage) {
        let reply = match Reply::parse(&frame.payload) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!(
                    "[CastSession] {}: undecodable payload on {}: {}",
                    self.peer,
                    frame.namespace,
                    e
                );
                return;
            }
        };

        match frame.namespace.parse::<Namespace>() {
            Ok(Namespace::Heartbeat) if reply.kind == reply_type::PING => {
                let channel = Channel::new(
                    frame.destination_id.clone(),
                    frame.source_id.clone(),
                    Namespace::Heartbeat,
                );
                if let Ok(payload) = Request::Pong.to_payload() {
                    let pong = self.write(channel.outbound(payload));
                    match tokio::time::timeout(CONTROL_WRITE_TIMEOUT, pong).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            log::debug!("[CastSession] {}: PONG failed: {}", self.peer, e)
                        }
                        Err(_) => log::debug!("[CastSession] {}: PONG write stalled", self.peer),
                    }
                }
                return;
            }
            Ok(Namespace::Connection) if reply.kind == reply_type::CLOSE => {
                log::debug!(
                    "[CastSession] {}: peer {} closed virtual connection",
                    self.peer,
                    frame.source_id
                );
                if frame.source_id == RECEIVER_ID {
                    self.shutdown.cancel();
                } else {
                    self.pending.fail_remote(
                        &frame.source_id,
                        RpcError::Device(format!("{} closed the connection", frame.source_id)),
                    );
                }
                return;
            }
            Ok(_) => {}
            Err(e) => {
                log::trace!("[CastSession] {}: ignoring frame: {}", self.peer, e);
                return;
            }
        }

        self.pending.dispatch(&frame, &reply);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, tx)| !tx.is_closed());
        for (channel, tx) in subscribers.iter() {
            if channel.accepts(&frame) && tx.try_send(reply.clone()).is_err() {
                log::warn!(
                    "[CastSession] {}: subscriber on {} lagging, dropped {}",
                    self.peer,
                    channel,
                    reply.kind
                );
            }
        }
    }
}

async fn read_loop(mut reader: FramedRead<ReadHalf<BoxedStream>, CastCodec>, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            frame = reader.next() => match frame {
                Some(Ok(frame)) => shared.handle_inbound(frame).await,
                Some(Err(e)) => {
                    log::warn!("[CastSession] {}: read failed: {}", shared.peer, e);
                    break;
                }
                None => {
                    log::debug!("[CastSession] {}: connection closed by peer", shared.peer);
                    break;
                }
            }
        }
    }

    shared.shutdown.cancel();
    let failed = shared.pending.fail_all();
    if failed > 0 {
        log::debug!(
            "[CastSession] {}: failed {} pending request(s) on disconnect",
            shared.peer,
            failed
        );
    }
    shared.subscribers.lock().clear();
}
