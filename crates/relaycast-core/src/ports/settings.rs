//! Pattern settings store trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{PatternSettings, StreamId};

/// Store for per-stream pattern generator settings.
///
/// The implementation handles serialization internally. A stream with no
/// stored settings yields `None`; callers fall back to
/// [`PatternSettings::with_defaults`].
#[async_trait]
pub trait PatternSettingsRepository: Send + Sync {
    /// Load the stored settings for a stream, if any.
    async fn load(&self, stream: &StreamId) -> Result<Option<PatternSettings>, RepositoryError>;

    /// Persist settings for a stream, replacing any previous value.
    async fn save(
        &self,
        stream: &StreamId,
        settings: &PatternSettings,
    ) -> Result<(), RepositoryError>;
}
