//! JSON payloads exchanged on Cast virtual channels.
//!
//! Outbound requests are a closed set and modelled as one tagged enum.
//! Inbound replies are first parsed into a loose [`Reply`] envelope so the
//! tracker can correlate on `type`/`requestId` without knowing the body;
//! callers then decode the body into [`DeviceStatus`] or [`MediaStatus`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol_constants::DEFAULT_MEDIA_RECEIVER_APP_ID;

/// Media session id assigned by the receiver app.
pub type MediaSessionId = i64;

/// Reply `type` values.
pub mod reply_type {
    pub const RECEIVER_STATUS: &str = "RECEIVER_STATUS";
    pub const MEDIA_STATUS: &str = "MEDIA_STATUS";
    pub const LAUNCH_ERROR: &str = "LAUNCH_ERROR";
    pub const LOAD_FAILED: &str = "LOAD_FAILED";
    pub const LOAD_CANCELLED: &str = "LOAD_CANCELLED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const PING: &str = "PING";
    pub const CLOSE: &str = "CLOSE";

    /// Types that fail whichever request they correlate with.
    pub const ERRORS: &[&str] = &[LAUNCH_ERROR, LOAD_FAILED, LOAD_CANCELLED, INVALID_REQUEST];
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Empty `origin` object required by app transports on CONNECT.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Origin {}

/// Either a level or a mute flag; receivers reject both at once.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct VolumeChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl VolumeChange {
    pub fn level(level: f32) -> Self {
        Self {
            level: Some(level.clamp(0.0, 1.0)),
            muted: None,
        }
    }

    pub fn muted(muted: bool) -> Self {
        Self {
            level: None,
            muted: Some(muted),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    Buffered,
    Live,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Image {
    pub url: String,
}

/// Generic media metadata (`metadataType: 0`).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(rename = "type")]
    pub kind: u8,
    pub metadata_type: u8,
    pub title: String,
    pub subtitle: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaInformation {
    pub content_id: String,
    pub content_type: String,
    pub stream_type: StreamType,
    pub metadata: MediaMetadata,
}

/// Every request this crate sends.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Connect {
        #[serde(skip_serializing_if = "Option::is_none")]
        origin: Option<Origin>,
    },
    Close,
    Pong,
    GetStatus {
        #[serde(rename = "requestId")]
        request_id: u32,
    },
    SetVolume {
        volume: VolumeChange,
        #[serde(rename = "requestId")]
        request_id: u32,
    },
    Stop {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "requestId")]
        request_id: u32,
    },
    Launch {
        #[serde(rename = "appId")]
        app_id: String,
        #[serde(rename = "requestId")]
        request_id: u32,
    },
    Load {
        #[serde(rename = "requestId")]
        request_id: u32,
        #[serde(rename = "sessionId")]
        session_id: String,
        media: MediaInformation,
        autoplay: bool,
    },
    Play {
        #[serde(rename = "requestId")]
        request_id: u32,
        #[serde(rename = "mediaSessionId")]
        media_session_id: MediaSessionId,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Pause {
        #[serde(rename = "requestId")]
        request_id: u32,
        #[serde(rename = "mediaSessionId")]
        media_session_id: MediaSessionId,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl Request {
    /// CONNECT for the platform receiver.
    pub fn connect() -> Self {
        Self::Connect { origin: None }
    }

    /// CONNECT for an application transport.
    pub fn connect_app() -> Self {
        Self::Connect {
            origin: Some(Origin::default()),
        }
    }

    pub fn launch_default_receiver(request_id: u32) -> Self {
        Self::Launch {
            app_id: DEFAULT_MEDIA_RECEIVER_APP_ID.to_string(),
            request_id,
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Replies
// ─────────────────────────────────────────────────────────────────────────────

/// Loosely parsed inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// `type` field; empty when absent.
    pub kind: String,
    /// `requestId`; `0` for broadcasts and for receivers with the zero-echo quirk.
    pub request_id: u32,
    pub body: Value,
}

impl Reply {
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        let body: Value = serde_json::from_str(payload)?;
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let request_id = body
            .get("requestId")
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
            .unwrap_or(0);

        Ok(Self {
            kind,
            request_id,
            body,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.body)
    }

    /// `reason` or `detailedErrorCode` of an error reply, for logs.
    pub fn error_reason(&self) -> String {
        self.body
            .get("reason")
            .map(|reason| reason.to_string())
            .or_else(|| {
                self.body
                    .get("detailedErrorCode")
                    .map(|code| code.to_string())
            })
            .unwrap_or_else(|| self.kind.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct Volume {
    #[serde(default)]
    pub level: f32,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    #[serde(default)]
    pub display_name: String,
    pub session_id: String,
    #[serde(default)]
    pub transport_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReceiverStatus {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub volume: Volume,
}

/// `RECEIVER_STATUS` body.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub request_id: u32,
    pub status: ReceiverStatus,
}

impl DeviceStatus {
    /// Session id of the foreground application, if one is running.
    pub fn session_id(&self) -> Option<&str> {
        self.status
            .applications
            .first()
            .map(|app| app.session_id.as_str())
    }

    pub fn application(&self, app_id: &str) -> Option<&Application> {
        self.status
            .applications
            .iter()
            .find(|app| app.app_id == app_id)
    }

    pub fn volume(&self) -> Volume {
        self.status.volume
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadedMedia {
    pub content_id: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSessionStatus {
    pub media_session_id: MediaSessionId,
    #[serde(default)]
    pub player_state: PlayerState,
    #[serde(default)]
    pub media: Option<LoadedMedia>,
}

/// `MEDIA_STATUS` body.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    #[serde(default)]
    pub request_id: u32,
    #[serde(default)]
    pub status: Vec<MediaSessionStatus>,
}

impl MediaStatus {
    pub fn current(&self) -> Option<&MediaSessionStatus> {
        self.status.first()
    }

    pub fn player_state(&self) -> PlayerState {
        self.current()
            .map(|status| status.player_state)
            .unwrap_or_default()
    }
}
