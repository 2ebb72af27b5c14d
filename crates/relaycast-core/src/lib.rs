//! Core domain types and port definitions for the relaycast supervision
//! runtime.
//!
//! This crate is intentionally free of process and filesystem concerns: it
//! holds the domain vocabulary (stream identities, destinations, pattern
//! settings) and the trait abstractions the runtime expects from the
//! surrounding application (settings, destination and audit stores).

pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    Destination, ErrorRecord, PatternKind, PatternSettings, PatternSettingsUpdate, RestreamKey,
    StreamId,
};
pub use ports::{
    DestinationRepository, PatternSettingsRepository, RepositoryError, Stores, StreamAuditLog,
};
