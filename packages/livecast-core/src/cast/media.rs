//! Media session commands.
//!
//! Media channels are addressed to the application's session/transport id
//! rather than `receiver-0`. PLAY and PAUSE tolerate receivers that echo a
//! zero `requestId`, but only complete once the reported player state is the
//! one asked for.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::channel::{Channel, Namespace};
use super::control::connect_platform;
use super::messages::{
    reply_type, DeviceStatus, Image, MediaInformation, MediaMetadata, MediaSessionId, MediaStatus,
    PlayerState, Reply, Request, StreamType,
};
use super::session::ChannelSession;
use super::tracker::{issue, ReplyMatcher, RequestIds, RpcError, RpcResult};
use crate::protocol_constants::DEFAULT_MEDIA_RECEIVER_APP_ID;
use crate::stream::StreamDescriptor;

/// How long `load_and_play` waits before reporting success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Resolve on the LOAD reply.
    #[default]
    Acknowledge,
    /// Resolve on the first `PLAYING` status after LOAD.
    WaitForPlaying,
}

pub async fn get_media_status(
    session: &ChannelSession,
    ids: &RequestIds,
    session_id: &str,
    timeout: Duration,
) -> RpcResult<MediaStatus> {
    let media = connect_app(session, session_id, timeout).await?;
    let request_id = ids.next_id();
    let reply = issue(
        session,
        &media,
        &Request::GetStatus { request_id },
        ReplyMatcher::new(request_id, reply_type::MEDIA_STATUS),
        timeout,
    )
    .await?;
    decode_media_status(&reply)
}

pub async fn play(
    session: &ChannelSession,
    ids: &RequestIds,
    session_id: &str,
    media_session_id: MediaSessionId,
    timeout: Duration,
) -> RpcResult<MediaStatus> {
    let request_id = ids.next_id();
    let request = Request::Play {
        request_id,
        media_session_id,
        session_id: session_id.to_string(),
    };
    transition(session, session_id, request, request_id, PlayerState::Playing, timeout).await
}

pub async fn pause(
    session: &ChannelSession,
    ids: &RequestIds,
    session_id: &str,
    media_session_id: MediaSessionId,
    timeout: Duration,
) -> RpcResult<MediaStatus> {
    let request_id = ids.next_id();
    let request = Request::Pause {
        request_id,
        media_session_id,
        session_id: session_id.to_string(),
    };
    transition(session, session_id, request, request_id, PlayerState::Paused, timeout).await
}

/// Launches the Default Media Receiver and loads `descriptor` as live,
/// autoplaying media. Returns the new media session id.
///
/// Each request is bounded by `timeout`; waiting for `PLAYING` is not, so
/// callers bound the whole operation.
pub async fn load_and_play(
    session: &ChannelSession,
    ids: &RequestIds,
    descriptor: &StreamDescriptor,
    mode: LoadMode,
    timeout: Duration,
) -> RpcResult<MediaSessionId> {
    let receiver = connect_platform(session, timeout).await?;

    let launch_id = ids.next_id();
    let launched = issue(
        session,
        &receiver,
        &Request::launch_default_receiver(launch_id),
        ReplyMatcher::new(launch_id, reply_type::RECEIVER_STATUS)
            .with_condition(lists_media_receiver),
        timeout,
    )
    .await?;

    let status: DeviceStatus = launched
        .decode()
        .map_err(|e| RpcError::MalformedReply(e.to_string()))?;
    let app = status
        .application(DEFAULT_MEDIA_RECEIVER_APP_ID)
        .ok_or_else(|| RpcError::MalformedReply("launched app missing from status".into()))?;
    let app_session = app.session_id.clone();
    let transport = if app.transport_id.is_empty() {
        app.session_id.clone()
    } else {
        app.transport_id.clone()
    };
    log::debug!(
        "[CastMedia] {}: receiver app up (session={}, transport={})",
        session.peer(),
        app_session,
        transport
    );

    let media = connect_app(session, &transport, timeout).await?;
    // Subscribe before LOAD so no status broadcast is missed.
    let mut updates = (mode == LoadMode::WaitForPlaying).then(|| session.on_message(&media));

    let load_id = ids.next_id();
    let request = Request::Load {
        request_id: load_id,
        session_id: app_session,
        media: media_information(descriptor),
        autoplay: true,
    };
    let loaded = issue(
        session,
        &media,
        &request,
        ReplyMatcher::new(load_id, reply_type::MEDIA_STATUS),
        timeout,
    )
    .await?;

    let loaded = decode_media_status(&loaded)?;
    let current = loaded
        .current()
        .ok_or_else(|| RpcError::MalformedReply("LOAD reply carried no media session".into()))?;
    log::info!(
        "[CastMedia] {}: loaded {} (mediaSessionId={}, state={:?})",
        session.peer(),
        descriptor.playback_url,
        current.media_session_id,
        current.player_state
    );

    let loaded_id = current.media_session_id;
    if current.player_state == PlayerState::Playing {
        return Ok(loaded_id);
    }
    let Some(updates) = updates.as_mut() else {
        return Ok(loaded_id);
    };

    // Broadcasts about media that was playing before this LOAD may already
    // be queued; only the new media session counts.
    while let Some(update) = updates.next().await {
        if update.kind != reply_type::MEDIA_STATUS {
            continue;
        }
        let Ok(status) = update.decode::<MediaStatus>() else {
            continue;
        };
        let playing = status.current().is_some_and(|current| {
            current.media_session_id == loaded_id && current.player_state == PlayerState::Playing
        });
        if playing {
            return Ok(loaded_id);
        }
    }

    Err(RpcError::ConnectionClosed)
}

/// Sends CONNECT (with origin) to an app transport and returns its media channel.
async fn connect_app(
    session: &ChannelSession,
    transport_id: &str,
    timeout: Duration,
) -> RpcResult<Channel> {
    let connection = session.open_channel(Channel::transport(transport_id, Namespace::Connection));
    session
        .send_within(&connection, &Request::connect_app(), timeout)
        .await?;
    Ok(session.open_channel(Channel::transport(transport_id, Namespace::Media)))
}

async fn transition(
    session: &ChannelSession,
    session_id: &str,
    request: Request,
    request_id: u32,
    target: PlayerState,
    timeout: Duration,
) -> RpcResult<MediaStatus> {
    let media = connect_app(session, session_id, timeout).await?;
    let matcher = ReplyMatcher::new(request_id, reply_type::MEDIA_STATUS)
        .accept_zero_id()
        .with_condition(move |reply| {
            reply
                .decode::<MediaStatus>()
                .map(|status| status.player_state() == target)
                .unwrap_or(false)
        });

    let reply = issue(session, &media, &request, matcher, timeout).await?;
    decode_media_status(&reply)
}

fn lists_media_receiver(reply: &Reply) -> bool {
    reply
        .decode::<DeviceStatus>()
        .map(|status| status.application(DEFAULT_MEDIA_RECEIVER_APP_ID).is_some())
        .unwrap_or(false)
}

fn decode_media_status(reply: &Reply) -> RpcResult<MediaStatus> {
    reply
        .decode::<MediaStatus>()
        .map_err(|e| RpcError::MalformedReply(e.to_string()))
}

fn media_information(descriptor: &StreamDescriptor) -> MediaInformation {
    MediaInformation {
        content_id: descriptor.playback_url.clone(),
        content_type: descriptor.mime_type.clone(),
        stream_type: StreamType::Live,
        metadata: MediaMetadata {
            kind: 0,
            metadata_type: 0,
            title: descriptor.display_title.clone(),
            subtitle: descriptor.display_subtitle.clone(),
            images: descriptor
                .image_url
                .iter()
                .map(|url| Image { url: url.clone() })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::test_fixtures::{session_pair, FakeDevice};
    use serde_json::{json, Value};

    fn media_status(request_id: &Value, media_session_id: i64, state: &str) -> Value {
        json!({
            "type": "MEDIA_STATUS",
            "requestId": request_id,
            "status": [{
                "mediaSessionId": media_session_id,
                "playerState": state,
                "media": {"contentId": "http://radio/live", "contentType": "audio/mpeg"}
            }]
        })
    }

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor {
            name: "live".into(),
            priority: 1,
            playback_url: "http://radio/live".into(),
            mime_type: "audio/mpeg".into(),
            display_title: "Live".into(),
            display_subtitle: "Now".into(),
            image_url: Some("https://img/logo.png".into()),
        }
    }

    /// Answers LAUNCH with a running Default Media Receiver.
    async fn answer_launch(device: &mut FakeDevice) {
        let (frame, body) = device.expect("LAUNCH").await;
        assert_eq!(body["appId"], "CC1AD845");
        device
            .reply(
                &frame,
                json!({
                    "type": "RECEIVER_STATUS",
                    "requestId": body["requestId"],
                    "status": {"applications": [{
                        "appId": "CC1AD845",
                        "sessionId": "sess-1",
                        "transportId": "web-1"
                    }]}
                }),
            )
            .await;
    }

    #[tokio::test]
    async fn play_waits_for_playing_and_accepts_zero_id() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            let (connect, body) = device.expect("CONNECT").await;
            assert_eq!(connect.destination_id, "sess-1");
            assert_eq!(body["origin"], json!({}));

            let (frame, body) = device.expect("PLAY").await;
            assert_eq!(body["mediaSessionId"], 7);
            assert_eq!(body["sessionId"], "sess-1");
            device.reply(&frame, media_status(&body["requestId"], 7, "BUFFERING")).await;
            device.reply(&frame, media_status(&json!(0), 7, "PLAYING")).await;
            device
        });

        let status = play(&session, &ids, "sess-1", 7, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status.player_state(), PlayerState::Playing);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn media_status_query_ignores_zero_id() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            let (frame, _) = device.expect("GET_STATUS").await;
            device.reply(&frame, media_status(&json!(0), 7, "PLAYING")).await;
            device
        });

        let result = get_media_status(&session, &ids, "sess-1", Duration::from_secs(10)).await;
        assert!(matches!(result, Err(RpcError::Timeout(_))));
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn load_acknowledge_returns_media_session() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            answer_launch(&mut device).await;
            let (connect, _) = device.expect("CONNECT").await;
            assert_eq!(connect.destination_id, "web-1");

            let (frame, body) = device.expect("LOAD").await;
            assert_eq!(frame.destination_id, "web-1");
            assert_eq!(body["sessionId"], "sess-1");
            assert_eq!(body["autoplay"], true);
            assert_eq!(body["media"]["contentId"], "http://radio/live");
            assert_eq!(body["media"]["metadata"]["subtitle"], "Now");
            device.reply(&frame, media_status(&body["requestId"], 3, "BUFFERING")).await;
            device
        });

        let id = load_and_play(
            &session,
            &ids,
            &descriptor(),
            LoadMode::Acknowledge,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(id, 3);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn load_wait_for_playing_resolves_on_broadcast() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            answer_launch(&mut device).await;
            let (frame, body) = device.expect("LOAD").await;
            device.reply(&frame, media_status(&body["requestId"], 4, "BUFFERING")).await;
            device
                .send_from("web-1", "*", Namespace::Media, media_status(&json!(0), 4, "PLAYING"))
                .await;
            device
        });

        let id = load_and_play(
            &session,
            &ids,
            &descriptor(),
            LoadMode::WaitForPlaying,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(id, 4);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn load_wait_for_playing_ignores_earlier_media_session() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            answer_launch(&mut device).await;
            let (frame, body) = device.expect("LOAD").await;
            // The stream that was playing before reports in ahead of the LOAD reply.
            device
                .send_from("web-1", "*", Namespace::Media, media_status(&json!(0), 4, "PLAYING"))
                .await;
            device.reply(&frame, media_status(&body["requestId"], 5, "BUFFERING")).await;
            device
                .send_from("web-1", "*", Namespace::Media, media_status(&json!(0), 5, "BUFFERING"))
                .await;
            device
                .send_from("web-1", "*", Namespace::Media, media_status(&json!(0), 5, "PLAYING"))
                .await;
            device
        });

        let id = load_and_play(
            &session,
            &ids,
            &descriptor(),
            LoadMode::WaitForPlaying,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(id, 5);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn load_wait_for_playing_keeps_waiting_while_new_media_buffers() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            answer_launch(&mut device).await;
            let (frame, body) = device.expect("LOAD").await;
            device
                .send_from("web-1", "*", Namespace::Media, media_status(&json!(0), 4, "PLAYING"))
                .await;
            device.reply(&frame, media_status(&body["requestId"], 5, "BUFFERING")).await;
            device
        });

        let result = tokio::time::timeout(
            Duration::from_secs(30),
            load_and_play(
                &session,
                &ids,
                &descriptor(),
                LoadMode::WaitForPlaying,
                Duration::from_secs(5),
            ),
        )
        .await;
        assert!(result.is_err(), "resolved on a stale media session: {:?}", result);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn load_failure_is_a_device_error() {
        let (session, mut device) = session_pair();
        let ids = RequestIds::new();

        let device_task = tokio::spawn(async move {
            answer_launch(&mut device).await;
            let (frame, body) = device.expect("LOAD").await;
            device
                .reply(&frame, json!({"type": "LOAD_FAILED", "requestId": body["requestId"]}))
                .await;
            device
        });

        let result = load_and_play(
            &session,
            &ids,
            &descriptor(),
            LoadMode::Acknowledge,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(RpcError::Device(_))));
        let _device = device_task.await.unwrap();
    }
}
