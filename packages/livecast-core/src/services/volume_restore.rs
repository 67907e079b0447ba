//! Auto-unmute on stream start and volume restore on stream end.
//!
//! The restore only fires if the device is still at the level we set for the
//! stream. A level the user changed mid-stream is theirs to keep.

use crate::cast::{CastClient, Device, Volume};

/// Volume level in hundredths, the precision receivers report reliably.
pub fn round2(level: f32) -> i32 {
    (level * 100.0).round() as i32
}

pub fn levels_match(a: f32, b: f32) -> bool {
    round2(a) == round2(b)
}

/// Outcome of comparing the current level against the stream level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestoreDecision {
    /// Set the volume back to this pre-stream level.
    Restore(f32),
    /// Leave the volume as it is.
    Leave,
}

/// Decides whether to restore, given what we know.
///
/// # Arguments
/// * `current` - Level from a fresh status, `None` if unavailable
/// * `stream_level` - Level applied when the stream started
/// * `pre_stream` - Level captured before the first stream started
pub fn decide(
    current: Option<f32>,
    stream_level: Option<f32>,
    pre_stream: Option<f32>,
) -> RestoreDecision {
    match (current, stream_level, pre_stream) {
        (Some(current), Some(stream_level), Some(pre_stream))
            if levels_match(current, stream_level) =>
        {
            RestoreDecision::Restore(pre_stream)
        }
        _ => RestoreDecision::Leave,
    }
}

/// Restores the pre-stream level if the device is still at the stream level.
///
/// `known` is a status that is already fresh (e.g. the STOP reply); when
/// absent, the status is queried. Returns the level restored to, if any.
pub async fn restore_volume(
    client: &dyn CastClient,
    device: &Device,
    known: Option<Volume>,
    stream_level: Option<f32>,
    pre_stream: Option<f32>,
) -> Option<f32> {
    if stream_level.is_none() || pre_stream.is_none() {
        return None;
    }

    let current = match known {
        Some(volume) => Some(volume.level),
        None => client
            .get_status(device)
            .await
            .map(|status| status.volume().level),
    };

    match decide(current, stream_level, pre_stream) {
        RestoreDecision::Restore(level) => {
            log::info!("[VolumeRestore] {}: restoring volume to {:.2}", device, level);
            client.set_volume(device, level).await.map(|_| level)
        }
        RestoreDecision::Leave => {
            log::debug!(
                "[VolumeRestore] {}: leaving volume at {:?} (stream level {:?})",
                device,
                current,
                stream_level
            );
            None
        }
    }
}

/// Unmutes the device and applies the stream volume.
///
/// The caller has already checked the auto-unmute setting and the interlock.
/// Returns `true` if an unmute was sent.
pub async fn auto_unmute(
    client: &dyn CastClient,
    device: &Device,
    muted: Option<bool>,
    stream_level: Option<f32>,
) -> bool {
    let unmuted = if muted == Some(true) {
        log::info!("[VolumeRestore] {}: auto-unmuting", device);
        client.set_muted(device, false).await.is_some()
    } else {
        false
    };

    if let Some(level) = stream_level {
        client.set_volume(device, level).await;
    }

    unmuted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_to_hundredths() {
        assert!(levels_match(0.5, 0.501));
        assert!(levels_match(0.499_999, 0.5));
        assert!(!levels_match(0.5, 0.52));
    }

    #[test]
    fn restores_only_at_stream_level() {
        assert_eq!(decide(Some(0.5), Some(0.5), Some(0.2)), RestoreDecision::Restore(0.2));
        assert_eq!(decide(Some(0.7), Some(0.5), Some(0.2)), RestoreDecision::Leave);
    }

    #[test]
    fn missing_inputs_leave_volume() {
        assert_eq!(decide(None, Some(0.5), Some(0.2)), RestoreDecision::Leave);
        assert_eq!(decide(Some(0.5), None, Some(0.2)), RestoreDecision::Leave);
        assert_eq!(decide(Some(0.5), Some(0.5), None), RestoreDecision::Leave);
    }
}
