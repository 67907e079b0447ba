//! Platform receiver commands: status, volume, mute, stop.
//!
//! Each function performs the CONNECT handshake on the given session and
//! issues exactly one correlated request expecting `RECEIVER_STATUS`.
//! Connection lifetime is owned by the caller ([`super::CastClientImpl`]).

use std::time::Duration;

use super::channel::{Channel, Namespace};
use super::messages::{reply_type, DeviceStatus, Request, VolumeChange};
use super::session::ChannelSession;
use super::tracker::{issue, ReplyMatcher, RequestIds, RpcError, RpcResult};

pub async fn get_status(
    session: &ChannelSession,
    ids: &RequestIds,
    timeout: Duration,
) -> RpcResult<DeviceStatus> {
    let request_id = ids.next_id();
    receiver_request(session, Request::GetStatus { request_id }, request_id, timeout).await
}

pub async fn set_volume(
    session: &ChannelSession,
    ids: &RequestIds,
    level: f32,
    timeout: Duration,
) -> RpcResult<DeviceStatus> {
    let request_id = ids.next_id();
    let request = Request::SetVolume {
        volume: VolumeChange::level(level),
        request_id,
    };
    receiver_request(session, request, request_id, timeout).await
}

pub async fn set_muted(
    session: &ChannelSession,
    ids: &RequestIds,
    muted: bool,
    timeout: Duration,
) -> RpcResult<DeviceStatus> {
    let request_id = ids.next_id();
    let request = Request::SetVolume {
        volume: VolumeChange::muted(muted),
        request_id,
    };
    receiver_request(session, request, request_id, timeout).await
}

/// Stops the application running as `session_id`.
pub async fn stop_playback(
    session: &ChannelSession,
    ids: &RequestIds,
    session_id: &str,
    timeout: Duration,
) -> RpcResult<DeviceStatus> {
    let request_id = ids.next_id();
    let request = Request::Stop {
        session_id: session_id.to_string(),
        request_id,
    };
    receiver_request(session, request, request_id, timeout).await
}

/// Sends CONNECT to the platform receiver and returns its receiver channel.
pub(crate) async fn connect_platform(
    session: &ChannelSession,
    timeout: Duration,
) -> RpcResult<Channel> {
    let connection = session.open_channel(Channel::platform(Namespace::Connection));
    session
        .send_within(&connection, &Request::connect(), timeout)
        .await?;
    Ok(session.open_channel(Channel::platform(Namespace::Receiver)))
}

async fn receiver_request(
    session: &ChannelSession,
    request: Request,
    request_id: u32,
    timeout: Duration,
) -> RpcResult<DeviceStatus> {
    let receiver = connect_platform(session, timeout).await?;
    let reply = issue(
        session,
        &receiver,
        &request,
        ReplyMatcher::new(request_id, reply_type::RECEIVER_STATUS),
        timeout,
    )
    .await?;

    reply
        .decode::<DeviceStatus>()
        .map_err(|e| RpcError::MalformedReply(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::test_fixtures::{session_pair, stalled_session_pair};
    use serde_json::json;

    fn status(request_id: &serde_json::Value, level: f32, muted: bool) -> serde_json::Value {
        json!({
            "type": "RECEIVER_STATUS",
            "requestId": request_id,
            "status": {"applications": [], "volume": {"level": level, "muted": muted}}
        })
    }

    #[tokio::test]
    async fn get_status_connects_then_queries_receiver() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            let (connect, _) = device.expect("CONNECT").await;
            assert_eq!(connect.destination_id, "receiver-0");
            assert_eq!(connect.namespace, "urn:x-cast:com.google.cast.tp.connection");

            let (frame, body) = device.expect("GET_STATUS").await;
            assert_eq!(frame.namespace, "urn:x-cast:com.google.cast.receiver");
            device.reply(&frame, status(&body["requestId"], 0.4, false)).await;
            device
        });

        let result = get_status(&session, &ids, Duration::from_secs(5)).await.unwrap();
        assert!((result.volume().level - 0.4).abs() < 1e-6);
        assert_eq!(result.request_id, 1);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn set_muted_sends_mute_flag_only() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            let (frame, body) = device.expect("SET_VOLUME").await;
            assert_eq!(body["volume"], json!({"muted": true}));
            device.reply(&frame, status(&body["requestId"], 0.4, true)).await;
            device
        });

        let result = set_muted(&session, &ids, true, Duration::from_secs(5)).await.unwrap();
        assert!(result.volume().muted);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn stop_playback_names_session() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            let (frame, body) = device.expect("STOP").await;
            assert_eq!(body["sessionId"], "abc");
            device.reply(&frame, status(&body["requestId"], 0.2, false)).await;
            device
        });

        assert!(stop_playback(&session, &ids, "abc", Duration::from_secs(5)).await.is_ok());
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_status_is_reported() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            let (frame, body) = device.expect("GET_STATUS").await;
            device
                .reply(&frame, json!({"type": "RECEIVER_STATUS", "requestId": body["requestId"]}))
                .await;
            device
        });

        let result = get_status(&session, &ids, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(RpcError::MalformedReply(_))));
        let _device = device_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn request_to_device_that_never_reads_times_out() {
        let (session, _device) = stalled_session_pair();
        let ids = RequestIds::new();

        let result = tokio::time::timeout(
            Duration::from_secs(60),
            get_status(&session, &ids, Duration::from_secs(10)),
        )
        .await
        .expect("blocked write must be bounded by the request timeout");
        assert!(matches!(result, Err(RpcError::Timeout(_))));

        tokio::time::timeout(Duration::from_secs(60), session.close())
            .await
            .expect("close must not wait on a peer that never reads");
        assert!(session.is_closed());
    }
}
