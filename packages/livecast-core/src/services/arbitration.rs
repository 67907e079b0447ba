//! Stream arbitration.
//!
//! Decides, per notification, whether a newly started stream should take
//! over the device, and cleans up when the active stream ends. Only a
//! strictly higher priority preempts; equal priority always yields.
//!
//! The engine never returns errors. Every failed device call is logged by the
//! client and shows up here as a missing result, which leaves the state as it
//! was.

use std::sync::Arc;

use crate::cast::{CastClient, Device, LoadMode, MediaSessionId, Volume};
use crate::events::{ArbitrationEvent, DeviceEvent, EventEmitter};
use crate::notifications::StreamNotification;
use crate::protocol_constants::DEFAULT_MEDIA_RECEIVER_APP_ID;
use crate::services::mute_interlock::MuteInterlock;
use crate::services::player_state::{query_player_state, PlayerStateSnapshot};
use crate::services::volume_restore::{auto_unmute, restore_volume};
use crate::state::ArbitrationConfig;
use crate::stream::{StreamDescriptor, StreamResolver, StreamTable};
use crate::utils::now_millis;

/// Per-device arbitration state, owned by the device actor.
#[derive(Debug, Clone)]
pub struct ArbitrationState {
    /// Stream we last loaded (or found already playing).
    pub active_stream: Option<String>,
    /// Level captured when going from no stream to a stream.
    pub pre_stream_volume: Option<f32>,
    pub interlock: MuteInterlock,
}

impl ArbitrationState {
    pub fn new(config: &ArbitrationConfig) -> Self {
        Self {
            active_stream: None,
            pre_stream_volume: None,
            interlock: MuteInterlock::new(
                config.use_mute_interlock,
                config.mute_interlock_cooldown(),
            ),
        }
    }
}

/// What the engine did with a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbitrationOutcome {
    /// Stream name is not in the priority table.
    UnknownStream,
    /// Active stream has equal or higher priority.
    Yielded,
    /// Resolver could not produce a playable descriptor.
    Unresolvable,
    /// Device was already playing the stream; no load was sent.
    AlreadyPlaying,
    /// Stream was loaded and is now active.
    Loaded(MediaSessionId),
    /// Load failed; state unchanged.
    LoadFailed,
    /// Active stream ended and was stopped.
    Stopped { restored: Option<f32> },
    /// A non-active stream ended while another one is active.
    EndIgnored,
    /// A stream ended with nothing active; restore was checked.
    RestoreChecked { restored: Option<f32> },
}

pub struct ArbitrationEngine {
    client: Arc<dyn CastClient>,
    device: Device,
    streams: StreamTable,
    resolver: Arc<dyn StreamResolver>,
    config: ArbitrationConfig,
    emitter: Arc<dyn EventEmitter>,
    state: ArbitrationState,
}

impl ArbitrationEngine {
    pub fn new(
        client: Arc<dyn CastClient>,
        device: Device,
        streams: StreamTable,
        resolver: Arc<dyn StreamResolver>,
        config: ArbitrationConfig,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let state = ArbitrationState::new(&config);
        Self {
            client,
            device,
            streams,
            resolver,
            config,
            emitter,
            state,
        }
    }

    pub fn state(&self) -> &ArbitrationState {
        &self.state
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn streams(&self) -> &StreamTable {
        &self.streams
    }

    pub async fn handle(&mut self, notification: &StreamNotification) -> ArbitrationOutcome {
        match notification {
            StreamNotification::Started(name) => self.stream_started(name).await,
            StreamNotification::Ended(name) => self.stream_ended(name).await,
        }
    }

    /// Handles "stream `name` went live".
    pub async fn stream_started(&mut self, name: &str) -> ArbitrationOutcome {
        let Some(spec) = self.streams.get(name).cloned() else {
            log::warn!("[Arbitration] Ignoring unknown stream {}", name);
            return ArbitrationOutcome::UnknownStream;
        };

        let snapshot = query_player_state(self.client.as_ref(), &self.device).await;

        if let Some(active) = &self.state.active_stream {
            let active_priority = self.streams.priority(active).unwrap_or(i32::MIN);
            if spec.priority <= active_priority {
                log::info!(
                    "[Arbitration] {} (priority {}) yields to active {} (priority {})",
                    name,
                    spec.priority,
                    active,
                    active_priority
                );
                self.emit_ignored(name, "lower or equal priority");
                return ArbitrationOutcome::Yielded;
            }
        }

        let descriptor = match self.resolver.resolve(&spec).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::warn!("[Arbitration] Cannot resolve {}: {}", name, e);
                self.emit_ignored(name, "not resolvable");
                return ArbitrationOutcome::Unresolvable;
            }
        };

        let preempted = self.state.active_stream.clone();

        if snapshot.is_playing(&descriptor.playback_url) {
            log::info!(
                "[Arbitration] {} already playing {}, skipping load",
                self.device,
                descriptor.playback_url
            );
            self.activate(name, preempted, &snapshot, true);
            return ArbitrationOutcome::AlreadyPlaying;
        }

        let Some(media_session_id) = self.load(&descriptor).await else {
            log::warn!("[Arbitration] Loading {} on {} failed", name, self.device);
            return ArbitrationOutcome::LoadFailed;
        };

        self.activate(name, preempted, &snapshot, false);
        self.apply_auto_unmute(&snapshot).await;
        ArbitrationOutcome::Loaded(media_session_id)
    }

    /// Handles "stream `name` went offline".
    pub async fn stream_ended(&mut self, name: &str) -> ArbitrationOutcome {
        if self.streams.get(name).is_none() {
            log::warn!("[Arbitration] Ignoring end of unknown stream {}", name);
            return ArbitrationOutcome::UnknownStream;
        }

        let active = self.state.active_stream.clone();
        match active.as_deref() {
            Some(active) if active == name => {
                let known_volume = self.stop_active().await;
                self.state.active_stream = None;
                log::info!("[Arbitration] {} ended, playback stopped", name);
                self.emitter.emit_arbitration(ArbitrationEvent::StreamStopped {
                    stream: name.to_string(),
                    timestamp: now_millis(),
                });

                let restored = self.restore(known_volume).await;
                ArbitrationOutcome::Stopped { restored }
            }
            Some(active) => {
                log::debug!("[Arbitration] {} ended while {} is active, ignoring", name, active);
                ArbitrationOutcome::EndIgnored
            }
            None => {
                let restored = self.restore(None).await;
                ArbitrationOutcome::RestoreChecked { restored }
            }
        }
    }

    /// Samples the mute flag for the interlock.
    pub async fn poll_mute(&mut self) {
        let muted = self
            .client
            .get_status(&self.device)
            .await
            .map(|status| status.volume().muted);

        if self.state.interlock.observe(muted) {
            self.emitter.emit_device(DeviceEvent::MuteInterlockEngaged {
                cooldown_secs: self.state.interlock.cooldown().as_secs(),
                timestamp: now_millis(),
            });
        }
    }

    async fn load(&self, descriptor: &StreamDescriptor) -> Option<MediaSessionId> {
        log::info!(
            "[Arbitration] Loading {} ({}) on {}",
            descriptor.name,
            descriptor.playback_url,
            self.device
        );
        let media_session_id = self
            .client
            .load_and_play(&self.device, descriptor, self.config.load_mode)
            .await?;

        if self.config.load_mode == LoadMode::Acknowledge {
            self.kick_playback(media_session_id).await;
        }
        Some(media_session_id)
    }

    /// Sends PLAY after an acknowledged load, for receivers that ignore autoplay.
    async fn kick_playback(&self, media_session_id: MediaSessionId) {
        let Some(status) = self.client.get_status(&self.device).await else {
            return;
        };
        let Some(session_id) = status
            .application(DEFAULT_MEDIA_RECEIVER_APP_ID)
            .map(|app| app.session_id.clone())
        else {
            return;
        };

        self.client
            .play(&self.device, &session_id, media_session_id)
            .await;
    }

    fn activate(
        &mut self,
        name: &str,
        preempted: Option<String>,
        snapshot: &PlayerStateSnapshot,
        already_playing: bool,
    ) {
        if preempted.is_none() {
            self.state.pre_stream_volume = snapshot.volume_level();
        }
        self.state.active_stream = Some(name.to_string());

        self.emitter.emit_arbitration(ArbitrationEvent::StreamActivated {
            stream: name.to_string(),
            preempted,
            already_playing,
            timestamp: now_millis(),
        });
    }

    async fn apply_auto_unmute(&self, snapshot: &PlayerStateSnapshot) {
        if !self.config.auto_unmute {
            return;
        }
        if self.state.interlock.is_active() {
            log::info!("[Arbitration] Mute interlock active, leaving {} muted", self.device);
            return;
        }

        let unmuted = auto_unmute(
            self.client.as_ref(),
            &self.device,
            snapshot.muted(),
            self.config.stream_volume,
        )
        .await;
        if unmuted {
            self.emitter.emit_device(DeviceEvent::Unmuted {
                timestamp: now_millis(),
            });
        }
    }

    /// Stops the Default Media Receiver session, if one is running.
    ///
    /// Returns the freshest volume seen along the way.
    async fn stop_active(&self) -> Option<Volume> {
        let status = self.client.get_status(&self.device).await?;
        let Some(app) = status.application(DEFAULT_MEDIA_RECEIVER_APP_ID) else {
            log::debug!("[Arbitration] No media receiver running on {}", self.device);
            return Some(status.volume());
        };

        self.client
            .stop_playback(&self.device, &app.session_id)
            .await
            .map(|stopped| stopped.volume())
    }

    async fn restore(&self, known: Option<Volume>) -> Option<f32> {
        let restored = restore_volume(
            self.client.as_ref(),
            &self.device,
            known,
            self.config.stream_volume,
            self.state.pre_stream_volume,
        )
        .await;

        if let Some(level) = restored {
            self.emitter.emit_arbitration(ArbitrationEvent::VolumeRestored {
                level,
                timestamp: now_millis(),
            });
        }
        restored
    }

    fn emit_ignored(&self, name: &str, reason: &str) {
        self.emitter.emit_arbitration(ArbitrationEvent::StreamIgnored {
            stream: name.to_string(),
            reason: reason.to_string(),
            timestamp: now_millis(),
        });
    }
}
