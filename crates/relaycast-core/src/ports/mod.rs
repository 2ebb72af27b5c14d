//! Port definitions (trait abstractions) for external stores.
//!
//! Ports define the interfaces the supervision runtime expects from the
//! surrounding application's persistence layer. They contain no
//! implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No database types in any signature
//! - Traits are minimal and intent-based
//! - Store failures never abort supervision; callers log and continue

pub mod audit;
pub mod destinations;
pub mod settings;

use std::sync::Arc;
use thiserror::Error;

pub use audit::StreamAuditLog;
pub use destinations::DestinationRepository;
pub use settings::PatternSettingsRepository;

/// Domain-specific errors for store operations.
///
/// Abstracts away the storage backend so the runtime can handle failures
/// uniformly.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Container for the store trait objects the runtime consumes.
///
/// Wired once at application start and passed by reference to the managers;
/// there is no global lookup.
#[derive(Clone)]
pub struct Stores {
    /// Per-stream pattern generator settings.
    pub settings: Arc<dyn PatternSettingsRepository>,
    /// Restream destination lists.
    pub destinations: Arc<dyn DestinationRepository>,
    /// Append-only permanent-failure log.
    pub audit: Arc<dyn StreamAuditLog>,
}

impl Stores {
    /// Create a new store container.
    pub fn new(
        settings: Arc<dyn PatternSettingsRepository>,
        destinations: Arc<dyn DestinationRepository>,
        audit: Arc<dyn StreamAuditLog>,
    ) -> Self {
        Self {
            settings,
            destinations,
            audit,
        }
    }
}
