//! Audit log trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::StreamId;

/// Append-only log of permanent forwarding failures.
///
/// Written once per (stream, destination) pair when the retry ceiling is
/// exceeded; recovery after that requires an explicit manual restart.
#[async_trait]
pub trait StreamAuditLog: Send + Sync {
    /// Record that forwarding to a destination was abandoned.
    async fn record_permanent_failure(
        &self,
        stream: &StreamId,
        destination_id: i64,
        reason: &str,
    ) -> Result<(), RepositoryError>;
}
