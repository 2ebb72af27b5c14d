//! Domain types for stream supervision.
//!
//! These are pure data types with no infrastructure dependencies.

pub mod destination;
pub mod pattern;
pub mod record;
pub mod stream;

pub use destination::Destination;
pub use pattern::{PatternKind, PatternSettings, PatternSettingsUpdate};
pub use record::ErrorRecord;
pub use stream::{RestreamKey, StreamId};
