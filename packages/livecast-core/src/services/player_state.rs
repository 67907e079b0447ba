//! Point-in-time view of what a device is playing.

use crate::cast::{CastClient, Device, PlayerState, Volume};

/// Fresh result of a status query, never mutated.
///
/// Missing media fields mean "nothing playing", not an error. `volume` is
/// `None` when the device status itself could not be read, so callers never
/// infer mute or level from a failed query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStateSnapshot {
    pub session_id: Option<String>,
    pub current_url: Option<String>,
    pub player_state: PlayerState,
    pub volume: Option<Volume>,
}

impl PlayerStateSnapshot {
    pub fn muted(&self) -> Option<bool> {
        self.volume.map(|volume| volume.muted)
    }

    pub fn volume_level(&self) -> Option<f32> {
        self.volume.map(|volume| volume.level)
    }

    /// `true` if `url` is loaded and reported as `PLAYING`.
    pub fn is_playing(&self, url: &str) -> bool {
        self.player_state == PlayerState::Playing && self.current_url.as_deref() == Some(url)
    }
}

/// Queries device status and, if an app session is running, its media status.
pub async fn query_player_state(client: &dyn CastClient, device: &Device) -> PlayerStateSnapshot {
    let Some(status) = client.get_status(device).await else {
        log::debug!("[PlayerState] {}: status unavailable", device);
        return PlayerStateSnapshot::default();
    };

    let mut snapshot = PlayerStateSnapshot {
        volume: Some(status.volume()),
        ..Default::default()
    };

    let Some(session_id) = status.session_id() else {
        return snapshot;
    };
    snapshot.session_id = Some(session_id.to_string());

    if let Some(media) = client.get_media_status(device, session_id).await {
        if let Some(current) = media.current() {
            snapshot.player_state = current.player_state;
            snapshot.current_url = current.media.as_ref().map(|media| media.content_id.clone());
        }
    }

    snapshot
}
