//! External enrichment lookups.
//!
//! # Responsibility
//! - Define the contract used by the note service to fetch summary/link data.
//! - Normalize every failure into a returned value; nothing here panics or
//!   returns an error into the service.
//!
//! # Invariants
//! - `LookupOutcome::NotFound` means the source answered and has no usable data.
//! - `LookupOutcome::Failed` means the lookup itself did not complete.

use std::sync::Arc;

pub mod wikipedia;

pub use wikipedia::{WikipediaClient, WikipediaConfig};

/// Summary/link pair folded into a note as two text fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentInfo {
    pub summary: String,
    pub link: String,
}

/// Normalized lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(EnrichmentInfo),
    /// Confirmed absent, or present without a usable summary/link pair.
    NotFound,
    /// Transport, status or decoding failure. Carries a diagnostic reason.
    Failed(String),
}

/// Blocking lookup keyed by topic name.
pub trait EnrichmentClient: Send + Sync {
    fn lookup(&self, topic: &str) -> LookupOutcome;
}

impl<T: EnrichmentClient + ?Sized> EnrichmentClient for Arc<T> {
    fn lookup(&self, topic: &str) -> LookupOutcome {
        self.as_ref().lookup(topic)
    }
}

impl<T: EnrichmentClient + ?Sized> EnrichmentClient for Box<T> {
    fn lookup(&self, topic: &str) -> LookupOutcome {
        self.as_ref().lookup(topic)
    }
}
