//! Simulated Cast device for arbitration tests.
//!
//! [`MockCast`] keeps a tiny model of one receiver (volume, mute, running app,
//! loaded media) and records every call so tests can assert on the commands
//! the engine sent.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cast::messages::{
    Application, LoadedMedia, MediaSessionStatus, ReceiverStatus,
};
use crate::cast::{
    CastDeviceControl, CastMediaControl, Device, DeviceStatus, LoadMode, MediaSessionId,
    MediaStatus, PlayerState, Volume,
};
use crate::protocol_constants::DEFAULT_MEDIA_RECEIVER_APP_ID;
use crate::stream::StreamDescriptor;

/// A command observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    GetStatus,
    GetMediaStatus(String),
    SetVolume(f32),
    SetMuted(bool),
    Stop(String),
    Play(String, MediaSessionId),
    Pause(String, MediaSessionId),
    Load(String),
}

#[derive(Debug, Clone)]
pub(crate) struct DeviceModel {
    /// `false` makes every status query fail, as a timeout would.
    pub status_available: bool,
    pub load_succeeds: bool,
    pub volume: Volume,
    pub app_id: String,
    pub app_session: Option<String>,
    pub current_url: Option<String>,
    pub player_state: PlayerState,
    pub media_session_id: MediaSessionId,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self {
            status_available: true,
            load_succeeds: true,
            volume: Volume {
                level: 0.2,
                muted: false,
            },
            app_id: DEFAULT_MEDIA_RECEIVER_APP_ID.to_string(),
            app_session: None,
            current_url: None,
            player_state: PlayerState::Idle,
            media_session_id: 0,
        }
    }
}

#[derive(Default)]
pub(crate) struct MockCast {
    pub model: Mutex<DeviceModel>,
    calls: Mutex<Vec<Call>>,
}

impl MockCast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: DeviceModel) -> Self {
        Self {
            model: Mutex::new(model),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Load(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn status(&self) -> Option<DeviceStatus> {
        let model = self.model.lock();
        if !model.status_available {
            return None;
        }

        let applications = model
            .app_session
            .iter()
            .map(|session| Application {
                app_id: model.app_id.clone(),
                display_name: String::new(),
                session_id: session.clone(),
                transport_id: session.clone(),
            })
            .collect();

        Some(DeviceStatus {
            request_id: 1,
            status: ReceiverStatus {
                applications,
                volume: model.volume,
            },
        })
    }

    fn media_status(&self) -> MediaStatus {
        let model = self.model.lock();
        MediaStatus {
            request_id: 1,
            status: vec![MediaSessionStatus {
                media_session_id: model.media_session_id,
                player_state: model.player_state,
                media: model.current_url.as_ref().map(|url| LoadedMedia {
                    content_id: url.clone(),
                    content_type: "audio/mpeg".into(),
                }),
            }],
        }
    }
}

#[async_trait]
impl CastDeviceControl for MockCast {
    async fn get_status(&self, _device: &Device) -> Option<DeviceStatus> {
        self.record(Call::GetStatus);
        self.status()
    }

    async fn set_volume(&self, _device: &Device, level: f32) -> Option<DeviceStatus> {
        self.record(Call::SetVolume(level));
        self.model.lock().volume.level = level.clamp(0.0, 1.0);
        self.status()
    }

    async fn set_muted(&self, _device: &Device, muted: bool) -> Option<DeviceStatus> {
        self.record(Call::SetMuted(muted));
        self.model.lock().volume.muted = muted;
        self.status()
    }

    async fn stop_playback(&self, _device: &Device, session_id: &str) -> Option<DeviceStatus> {
        self.record(Call::Stop(session_id.to_string()));
        {
            let mut model = self.model.lock();
            model.app_session = None;
            model.current_url = None;
            model.player_state = PlayerState::Idle;
        }
        self.status()
    }
}

#[async_trait]
impl CastMediaControl for MockCast {
    async fn get_media_status(&self, _device: &Device, session_id: &str) -> Option<MediaStatus> {
        self.record(Call::GetMediaStatus(session_id.to_string()));
        if self.model.lock().app_session.as_deref() != Some(session_id) {
            return None;
        }
        Some(self.media_status())
    }

    async fn play(
        &self,
        _device: &Device,
        session_id: &str,
        media_session_id: MediaSessionId,
    ) -> Option<MediaStatus> {
        self.record(Call::Play(session_id.to_string(), media_session_id));
        self.model.lock().player_state = PlayerState::Playing;
        Some(self.media_status())
    }

    async fn pause(
        &self,
        _device: &Device,
        session_id: &str,
        media_session_id: MediaSessionId,
    ) -> Option<MediaStatus> {
        self.record(Call::Pause(session_id.to_string(), media_session_id));
        self.model.lock().player_state = PlayerState::Paused;
        Some(self.media_status())
    }

    async fn load_and_play(
        &self,
        _device: &Device,
        stream: &StreamDescriptor,
        mode: LoadMode,
    ) -> Option<MediaSessionId> {
        self.record(Call::Load(stream.playback_url.clone()));
        let mut model = self.model.lock();
        if !model.load_succeeds {
            return None;
        }

        model.media_session_id += 1;
        model.app_id = DEFAULT_MEDIA_RECEIVER_APP_ID.to_string();
        model.app_session = Some(format!("session-{}", model.media_session_id));
        model.current_url = Some(stream.playback_url.clone());
        model.player_state = match mode {
            LoadMode::Acknowledge => PlayerState::Buffering,
            LoadMode::WaitForPlaying => PlayerState::Playing,
        };
        Some(model.media_session_id)
    }
}
