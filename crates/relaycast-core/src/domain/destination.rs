//! Restream destination configuration.

use serde::{Deserialize, Serialize};

use super::stream::StreamId;

/// An external RTMP endpoint a live stream can be forwarded to.
///
/// Owned and mutated by the destination store; the supervision runtime
/// only ever reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Store-assigned identifier, unique per owner.
    pub id: i64,
    /// Stream this destination belongs to.
    pub stream: StreamId,
    /// Base RTMP URL of the remote ingest (e.g. `rtmp://live.example.com/app`).
    pub url: String,
    /// Stream key appended to the URL when publishing.
    pub stream_key: String,
    /// Inactive destinations are skipped when forwarding starts.
    pub active: bool,
}

impl Destination {
    /// Full publish target: base URL joined with the stream key.
    #[must_use]
    pub fn publish_url(&self) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), self.stream_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_url_joins_url_and_key() {
        let dest = Destination {
            id: 1,
            stream: StreamId::new("abc"),
            url: "rtmp://live.example.com/app".to_string(),
            stream_key: "k-123".to_string(),
            active: true,
        };
        assert_eq!(dest.publish_url(), "rtmp://live.example.com/app/k-123");
    }

    #[test]
    fn publish_url_tolerates_trailing_slash() {
        let dest = Destination {
            id: 1,
            stream: StreamId::new("abc"),
            url: "rtmp://live.example.com/app/".to_string(),
            stream_key: "k".to_string(),
            active: true,
        };
        assert_eq!(dest.publish_url(), "rtmp://live.example.com/app/k");
    }
}
