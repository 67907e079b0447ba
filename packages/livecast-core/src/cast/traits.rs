//! Trait abstractions for Cast device operations.
//!
//! The arbitration services depend on these traits rather than on
//! [`CastClientImpl`](super::CastClientImpl), so tests can script device
//! behaviour without a socket.
//!
//! Every operation reports failure as `None`. The underlying error has
//! already been logged by the implementation; callers only need to know
//! that no usable result came back (which includes timeouts).

use async_trait::async_trait;

use super::device::Device;
use super::media::LoadMode;
use super::messages::{DeviceStatus, MediaSessionId, MediaStatus};
use crate::stream::StreamDescriptor;

/// Platform receiver control: status, volume, mute and stopping apps.
#[async_trait]
pub trait CastDeviceControl: Send + Sync {
    /// Queries the receiver status (running applications and volume).
    async fn get_status(&self, device: &Device) -> Option<DeviceStatus>;

    /// Sets the device volume level (0.0–1.0, clamped).
    async fn set_volume(&self, device: &Device, level: f32) -> Option<DeviceStatus>;

    /// Sets or clears the device mute flag without touching the level.
    async fn set_muted(&self, device: &Device, muted: bool) -> Option<DeviceStatus>;

    /// Stops the application running under `session_id`.
    ///
    /// # Arguments
    /// * `device` - Target device
    /// * `session_id` - Application session id from a prior `get_status`
    async fn stop_playback(&self, device: &Device, session_id: &str) -> Option<DeviceStatus>;
}

/// Media session control on the Default Media Receiver.
#[async_trait]
pub trait CastMediaControl: Send + Sync {
    /// Queries the media status of the app running under `session_id`.
    async fn get_media_status(&self, device: &Device, session_id: &str) -> Option<MediaStatus>;

    /// Resumes playback; completes once the player reports `PLAYING`.
    async fn play(
        &self,
        device: &Device,
        session_id: &str,
        media_session_id: MediaSessionId,
    ) -> Option<MediaStatus>;

    /// Pauses playback; completes once the player reports `PAUSED`.
    async fn pause(
        &self,
        device: &Device,
        session_id: &str,
        media_session_id: MediaSessionId,
    ) -> Option<MediaStatus>;

    /// Launches the Default Media Receiver and loads `stream` as live media.
    ///
    /// # Returns
    /// The media session id on success.
    async fn load_and_play(
        &self,
        device: &Device,
        stream: &StreamDescriptor,
        mode: LoadMode,
    ) -> Option<MediaSessionId>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Traits (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for all Cast operations.
///
/// Used by the arbitration engine, which drives both receiver and media control.
#[async_trait]
pub trait CastClient: CastDeviceControl + CastMediaControl {}

/// Blanket implementation for any type implementing both traits.
impl<T: CastDeviceControl + CastMediaControl> CastClient for T {}
