//! Stream identity and supervision key types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifying one publisher's routable channel.
///
/// The token is issued by the surrounding application; the supervision
/// runtime never inspects its contents, it only uses it as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Wrap a raw stream token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Composite supervision key for one (stream, destination) forwarding pair.
///
/// A typed key instead of a concatenated string: two streams can never
/// collide by containing each other's separators, and matching by stream
/// component is explicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestreamKey {
    /// The publishing stream being forwarded.
    pub stream: StreamId,
    /// The destination the stream is forwarded to.
    pub destination_id: i64,
}

impl RestreamKey {
    /// Build a key for a (stream, destination) pair.
    pub fn new(stream: impl Into<StreamId>, destination_id: i64) -> Self {
        Self {
            stream: stream.into(),
            destination_id,
        }
    }
}

impl fmt::Display for RestreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.stream, self.destination_id)
    }
}
