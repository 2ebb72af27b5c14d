//! Destination store trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{Destination, StreamId};

/// Read-only view of the restream destination store.
///
/// Destinations are created and edited elsewhere in the application; the
/// runtime only lists the active ones when forwarding starts.
#[async_trait]
pub trait DestinationRepository: Send + Sync {
    /// List the active destinations configured for a stream.
    ///
    /// An empty list is a normal outcome, not an error.
    async fn list_active(&self, stream: &StreamId) -> Result<Vec<Destination>, RepositoryError>;
}
