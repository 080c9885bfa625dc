//! Core domain logic for topicnote.
//! This crate is the single source of truth for note document invariants.

pub mod enrich;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use enrich::{
    EnrichmentClient, EnrichmentInfo, LookupOutcome, WikipediaClient, WikipediaConfig,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{
    current_timestamp, parse_timestamp, Document, Note, Topic, TIMESTAMP_FORMAT,
};
pub use service::note_service::{
    DeleteOutcome, EnrichOutcome, NoteService, NoteServiceError, NoteView,
};
pub use store::{
    DocumentStore, FileDocumentStore, MemoryDocumentStore, StoreError, StoreResult, TxOutcome,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
