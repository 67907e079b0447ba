//! Stream start/end notifications.
//!
//! Notifications arrive as `(topic, payload)` pairs. The topic's trailing
//! segment names the stream; a payload of `started` means it went live and
//! anything else means it ended.

use crate::protocol_constants::STREAM_STARTED_PAYLOAD;

/// A decoded notification for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotification {
    Started(String),
    Ended(String),
}

impl StreamNotification {
    /// Decodes a notification; `None` when the topic names no stream.
    pub fn decode(topic: &str, payload: &[u8]) -> Option<Self> {
        let name = topic.rsplit('/').next()?.trim();
        if name.is_empty() {
            return None;
        }

        let payload = String::from_utf8_lossy(payload);
        if payload.trim() == STREAM_STARTED_PAYLOAD {
            Some(Self::Started(name.to_string()))
        } else {
            Some(Self::Ended(name.to_string()))
        }
    }

    pub fn stream(&self) -> &str {
        match self {
            Self::Started(name) | Self::Ended(name) => name,
        }
    }
}

/// Topic carrying notifications for `stream` under `prefix`.
pub fn topic_for(prefix: &str, stream: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        stream.to_string()
    } else {
        format!("{}/{}", prefix, stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_payload_decodes_to_started() {
        assert_eq!(
            StreamNotification::decode("mounts/hmjamaat", b"started"),
            Some(StreamNotification::Started("hmjamaat".into()))
        );
    }

    #[test]
    fn any_other_payload_means_ended() {
        let decoded = StreamNotification::decode("mounts/hma_furqaan", b"stopped").unwrap();
        assert_eq!(decoded, StreamNotification::Ended("hma_furqaan".into()));
        assert_eq!(decoded.stream(), "hma_furqaan");
        assert!(matches!(
            StreamNotification::decode("mounts/x", b""),
            Some(StreamNotification::Ended(_))
        ));
    }

    #[test]
    fn topic_without_stream_is_rejected() {
        assert_eq!(StreamNotification::decode("", b"started"), None);
        assert_eq!(StreamNotification::decode("mounts/", b"started"), None);
    }

    #[test]
    fn topic_for_joins_prefix() {
        assert_eq!(topic_for("mounts", "live"), "mounts/live");
        assert_eq!(topic_for("mounts/", "live"), "mounts/live");
        assert_eq!(topic_for("", "live"), "live");
    }
}
