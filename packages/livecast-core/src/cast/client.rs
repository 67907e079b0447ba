//! Cast client: one short-lived session per operation.
//!
//! Every call opens a fresh TLS session, performs the handshake and a single
//! correlated request, then closes the session regardless of outcome.
//! Operations against the same device are serialized through a per-device
//! lock so at most one session per device is open at a time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::connector::{SessionConnector, TlsSessionConnector};
use super::control;
use super::device::Device;
use super::media::{self, LoadMode};
use super::messages::{DeviceStatus, MediaSessionId, MediaStatus};
use super::session::ChannelSession;
use super::traits::{CastDeviceControl, CastMediaControl};
use super::tracker::{RequestIds, RpcError, RpcResult};
use crate::protocol_constants::{APP_LOAD_TIMEOUT_SECS, NETWORK_TIMEOUT_SECS};
use crate::stream::StreamDescriptor;

/// An open session plus the device lock it was opened under.
struct Lease {
    session: ChannelSession,
    _guard: OwnedMutexGuard<()>,
}

/// Production [`CastClient`](super::CastClient).
pub struct CastClientImpl {
    connector: Arc<dyn SessionConnector>,
    /// Shared across devices so ids stay unique process-wide.
    ids: RequestIds,
    /// Per-device operation locks, keyed by `host:port`.
    locks: DashMap<String, Arc<Mutex<()>>>,
    network_timeout: Duration,
    app_load_timeout: Duration,
}

impl std::fmt::Debug for CastClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastClientImpl")
            .field("connector", &"SessionConnector")
            .field("network_timeout", &self.network_timeout)
            .field("app_load_timeout", &self.app_load_timeout)
            .finish()
    }
}

impl Default for CastClientImpl {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(NETWORK_TIMEOUT_SECS),
            Duration::from_secs(APP_LOAD_TIMEOUT_SECS),
        )
    }
}

impl CastClientImpl {
    /// Creates a client that connects over TLS.
    ///
    /// # Arguments
    /// * `network_timeout` - Bound on connecting and on each request/reply
    /// * `app_load_timeout` - Bound on the whole launch + load sequence
    #[must_use]
    pub fn new(network_timeout: Duration, app_load_timeout: Duration) -> Self {
        Self::with_connector(
            Arc::new(TlsSessionConnector::new(network_timeout)),
            network_timeout,
            app_load_timeout,
        )
    }

    /// Creates a client that opens sessions through `connector`.
    #[must_use]
    pub fn with_connector(
        connector: Arc<dyn SessionConnector>,
        network_timeout: Duration,
        app_load_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            ids: RequestIds::new(),
            locks: DashMap::new(),
            network_timeout,
            app_load_timeout,
        }
    }

    fn device_lock(&self, device: &Device) -> Arc<Mutex<()>> {
        self.locks.entry(device.address()).or_default().clone()
    }

    /// Waits for the device lock, then opens a session.
    async fn lease(&self, device: &Device, operation: &str) -> Option<Lease> {
        let guard = self.device_lock(device).lock_owned().await;
        match self.connector.connect(device).await {
            Ok(session) => Some(Lease {
                session,
                _guard: guard,
            }),
            Err(e) => {
                log::warn!("[CastClient] {} on {}: {}", operation, device, e);
                None
            }
        }
    }

    /// Bounds a whole operation, CONNECT and request writes included.
    async fn bounded<T>(
        limit: Duration,
        operation: impl Future<Output = RpcResult<T>>,
    ) -> RpcResult<T> {
        tokio::time::timeout(limit, operation)
            .await
            .unwrap_or(Err(RpcError::Timeout(limit)))
    }

    /// Closes the lease's session and flattens `result` to an option.
    async fn finish<T>(
        &self,
        lease: Lease,
        device: &Device,
        operation: &str,
        result: RpcResult<T>,
    ) -> Option<T> {
        lease.session.close().await;
        match result {
            Ok(value) => Some(value),
            Err(e) if e.is_timeout_equivalent() => {
                log::warn!("[CastClient] {} on {} timed out: {}", operation, device, e);
                None
            }
            Err(e) => {
                log::warn!("[CastClient] {} on {} failed: {}", operation, device, e);
                None
            }
        }
    }
}

#[async_trait]
impl CastDeviceControl for CastClientImpl {
    async fn get_status(&self, device: &Device) -> Option<DeviceStatus> {
        let lease = self.lease(device, "get_status").await?;
        let limit = self.network_timeout;
        let result =
            Self::bounded(limit, control::get_status(&lease.session, &self.ids, limit)).await;
        self.finish(lease, device, "get_status", result).await
    }

    async fn set_volume(&self, device: &Device, level: f32) -> Option<DeviceStatus> {
        let lease = self.lease(device, "set_volume").await?;
        let limit = self.network_timeout;
        let result = Self::bounded(
            limit,
            control::set_volume(&lease.session, &self.ids, level, limit),
        )
        .await;
        self.finish(lease, device, "set_volume", result).await
    }

    async fn set_muted(&self, device: &Device, muted: bool) -> Option<DeviceStatus> {
        let lease = self.lease(device, "set_muted").await?;
        let limit = self.network_timeout;
        let result = Self::bounded(
            limit,
            control::set_muted(&lease.session, &self.ids, muted, limit),
        )
        .await;
        self.finish(lease, device, "set_muted", result).await
    }

    async fn stop_playback(&self, device: &Device, session_id: &str) -> Option<DeviceStatus> {
        let lease = self.lease(device, "stop_playback").await?;
        let limit = self.network_timeout;
        let result = Self::bounded(
            limit,
            control::stop_playback(&lease.session, &self.ids, session_id, limit),
        )
        .await;
        self.finish(lease, device, "stop_playback", result).await
    }
}

#[async_trait]
impl CastMediaControl for CastClientImpl {
    async fn get_media_status(&self, device: &Device, session_id: &str) -> Option<MediaStatus> {
        let lease = self.lease(device, "get_media_status").await?;
        let limit = self.network_timeout;
        let result = Self::bounded(
            limit,
            media::get_media_status(&lease.session, &self.ids, session_id, limit),
        )
        .await;
        self.finish(lease, device, "get_media_status", result).await
    }

    async fn play(
        &self,
        device: &Device,
        session_id: &str,
        media_session_id: MediaSessionId,
    ) -> Option<MediaStatus> {
        let lease = self.lease(device, "play").await?;
        let limit = self.network_timeout;
        let result = Self::bounded(
            limit,
            media::play(&lease.session, &self.ids, session_id, media_session_id, limit),
        )
        .await;
        self.finish(lease, device, "play", result).await
    }

    async fn pause(
        &self,
        device: &Device,
        session_id: &str,
        media_session_id: MediaSessionId,
    ) -> Option<MediaStatus> {
        let lease = self.lease(device, "pause").await?;
        let limit = self.network_timeout;
        let result = Self::bounded(
            limit,
            media::pause(&lease.session, &self.ids, session_id, media_session_id, limit),
        )
        .await;
        self.finish(lease, device, "pause", result).await
    }

    async fn load_and_play(
        &self,
        device: &Device,
        stream: &StreamDescriptor,
        mode: LoadMode,
    ) -> Option<MediaSessionId> {
        let lease = self.lease(device, "load_and_play").await?;
        let load = media::load_and_play(
            &lease.session,
            &self.ids,
            stream,
            mode,
            self.network_timeout,
        );
        let result = Self::bounded(self.app_load_timeout, load).await;
        self.finish(lease, device, "load_and_play", result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::test_fixtures::ScriptedConnector;
    use serde_json::json;

    fn device() -> Device {
        Device::new("10.0.0.9", 8009, "Bedroom speaker")
    }

    fn client(connector: Arc<ScriptedConnector>) -> CastClientImpl {
        CastClientImpl::with_connector(connector, Duration::from_secs(10), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn refused_connection_yields_none() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client(Arc::clone(&connector));

        assert!(client.get_status(&device()).await.is_none());
        assert!(client.set_muted(&device(), false).await.is_none());
        assert_eq!(connector.connections(), 2);
    }

    #[tokio::test]
    async fn each_operation_opens_its_own_session() {
        let connector = Arc::new(ScriptedConnector::new(|mut device| async move {
            let (frame, body) = device.expect("GET_STATUS").await;
            device
                .reply(
                    &frame,
                    json!({
                        "type": "RECEIVER_STATUS",
                        "requestId": body["requestId"],
                        "status": {"volume": {"level": 0.3, "muted": false}}
                    }),
                )
                .await;
            // Session is closed by the client after one request.
            while device.next().await.is_some() {}
        }));
        let client = client(Arc::clone(&connector));

        let first = client.get_status(&device()).await.unwrap();
        let second = client.get_status(&device()).await.unwrap();
        assert!((first.volume().level - 0.3).abs() < 1e-6);
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(connector.connections(), 2);
        assert_eq!(client.locks.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_times_out_to_none() {
        let connector = Arc::new(ScriptedConnector::new(|mut device| async move {
            while device.next().await.is_some() {}
        }));
        let client = client(connector);

        assert!(client.get_status(&device()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn device_that_stops_reading_does_not_wedge_the_client() {
        let connector = Arc::new(ScriptedConnector::stalled());
        let client = client(Arc::clone(&connector));

        let calls = async {
            let first = client.get_status(&device()).await;
            let second = client.set_muted(&device(), true).await;
            (first, second)
        };
        let (first, second) = tokio::time::timeout(Duration::from_secs(120), calls)
            .await
            .expect("operations against a stalled device must be bounded");
        assert!(first.is_none());
        assert!(second.is_none());
        assert_eq!(connector.connections(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn load_is_bounded_by_app_load_timeout() {
        let connector = Arc::new(ScriptedConnector::new(|mut device| async move {
            let (frame, body) = device.expect("LAUNCH").await;
            device
                .reply(
                    &frame,
                    json!({
                        "type": "RECEIVER_STATUS",
                        "requestId": body["requestId"],
                        "status": {"applications": [{
                            "appId": "CC1AD845", "sessionId": "s", "transportId": "t"
                        }]}
                    }),
                )
                .await;
            let (frame, body) = device.expect("LOAD").await;
            device
                .reply(
                    &frame,
                    json!({
                        "type": "MEDIA_STATUS",
                        "requestId": body["requestId"],
                        "status": [{"mediaSessionId": 1, "playerState": "BUFFERING"}]
                    }),
                )
                .await;
            // Never reaches PLAYING.
            while device.next().await.is_some() {}
        }));
        let client = client(connector);
        let stream = StreamDescriptor {
            name: "live".into(),
            priority: 1,
            playback_url: "http://radio/live".into(),
            mime_type: "audio/mpeg".into(),
            display_title: "Live".into(),
            display_subtitle: String::new(),
            image_url: None,
        };

        let result = client
            .load_and_play(&device(), &stream, LoadMode::WaitForPlaying)
            .await;
        assert!(result.is_none());
    }
}
