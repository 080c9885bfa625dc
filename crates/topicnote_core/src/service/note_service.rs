//! Note use-case service.
//!
//! # Responsibility
//! - Provide add/list/enrich/delete over topic-grouped notes.
//! - Keep the slow external lookup outside of any store transaction.
//!
//! # Invariants
//! - Add, list and delete each run exactly one store transaction.
//! - Enrich runs the lookup first, then one transaction that re-locates the
//!   note; a note deleted in between is reported as not found.
//! - Duplicate note names are allowed. Enrich and delete act on the first
//!   match in stored order.

use crate::enrich::{EnrichmentClient, LookupOutcome};
use crate::model::document::Note;
use crate::store::{DocumentStore, StoreError, TxOutcome};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const SUMMARY_PREFIX: &str = "Wikipedia Summary: ";
const LINK_PREFIX: &str = "Wikipedia Link: ";

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for NoteServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Read model returned by topic listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteView {
    pub name: String,
    /// All fragments joined by `\n` in insertion order.
    pub text: String,
    /// `MM/DD/YY - HH:MM:SS`.
    pub timestamp: String,
    /// Individual fragments, original body first.
    pub fragments: Vec<String>,
}

impl From<&Note> for NoteView {
    fn from(note: &Note) -> Self {
        Self {
            name: note.name.clone(),
            text: note.joined_text(),
            timestamp: note.timestamp.clone(),
            fragments: note.fragments.clone(),
        }
    }
}

/// Outcome of an enrich request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Summary and link fragments were appended.
    Enriched,
    /// Lookup answered without usable data; store untouched.
    NoInfo,
    /// Lookup did not complete; store untouched.
    LookupFailed(String),
    /// Topic or note missing at write time.
    NoteNotFound,
}

impl EnrichOutcome {
    /// Caller-facing status line.
    ///
    /// `NoInfo` and `LookupFailed` currently share one message: both mean
    /// there is nothing to add.
    pub fn status_message(&self, topic: &str, name: &str) -> String {
        match self {
            Self::Enriched => "Wikipedia summary and link added to note.".to_string(),
            Self::NoInfo | Self::LookupFailed(_) => {
                "No summary or link found on Wikipedia for this topic.".to_string()
            }
            Self::NoteNotFound => {
                format!("No note named '{name}' under topic '{topic}' was found.")
            }
        }
    }
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    /// Caller-facing status line.
    pub fn status_message(&self, topic: &str, name: &str) -> String {
        match self {
            Self::Deleted => {
                format!("Note '{name}' under topic '{topic}' was deleted successfully.")
            }
            Self::NotFound => "Note or topic not found.".to_string(),
        }
    }
}

/// Note service facade over a document store and an enrichment source.
pub struct NoteService<S: DocumentStore, E: EnrichmentClient> {
    store: S,
    enrichment: E,
}

impl<S: DocumentStore, E: EnrichmentClient> NoteService<S, E> {
    pub fn new(store: S, enrichment: E) -> Self {
        Self { store, enrichment }
    }

    /// Underlying store, for read-only inspection by embedders.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Appends a new note, creating the topic on first use.
    ///
    /// An existing note with the same name is kept; the new one becomes a
    /// later sibling.
    pub fn add_note(&self, topic: &str, name: &str, text: &str) -> Result<(), NoteServiceError> {
        let note = Note::new(name, text);
        let total = self.store.transact(move |doc| {
            let topic = doc.find_or_create_topic(topic);
            topic.notes.push(note);
            TxOutcome::changed(topic.notes.len())
        })?;

        info!("event=note_add module=service status=ok topic_notes={total}");
        debug!("event=note_add module=service topic={topic} note={name}");
        Ok(())
    }

    /// Lists notes of a topic in stored order. Missing topics yield an empty list.
    pub fn get_notes_by_topic(&self, topic: &str) -> Result<Vec<NoteView>, NoteServiceError> {
        let notes = self.store.read(|doc| {
            doc.topic(topic)
                .map(|topic| topic.notes.iter().map(NoteView::from).collect::<Vec<_>>())
                .unwrap_or_default()
        })?;
        debug!(
            "event=note_list module=service status=ok topic={topic} count={}",
            notes.len()
        );
        Ok(notes)
    }

    /// Appends summary and link fragments from the enrichment source to the
    /// first note named `name` under `topic`.
    ///
    /// The lookup runs before the store is locked, so a slow source never
    /// blocks other operations.
    pub fn enrich_note(&self, topic: &str, name: &str) -> Result<EnrichOutcome, NoteServiceError> {
        let info = match self.enrichment.lookup(topic) {
            LookupOutcome::Found(info) => info,
            LookupOutcome::NotFound => {
                info!("event=note_enrich module=service status=no_info");
                return Ok(EnrichOutcome::NoInfo);
            }
            LookupOutcome::Failed(reason) => {
                warn!("event=note_enrich module=service status=lookup_failed error={reason}");
                return Ok(EnrichOutcome::LookupFailed(reason));
            }
        };

        let outcome = self.store.transact(|doc| {
            match doc.topic_mut(topic).and_then(|topic| topic.note_mut(name)) {
                Some(note) => {
                    note.push_fragment(format!("{SUMMARY_PREFIX}{}", info.summary));
                    note.push_fragment(format!("{LINK_PREFIX}{}", info.link));
                    TxOutcome::changed(EnrichOutcome::Enriched)
                }
                None => TxOutcome::unchanged(EnrichOutcome::NoteNotFound),
            }
        })?;

        info!("event=note_enrich module=service status={}", outcome_label(&outcome));
        Ok(outcome)
    }

    /// Removes the first note named `name` under `topic`. Persists only when a
    /// note was removed.
    pub fn delete_note(&self, topic: &str, name: &str) -> Result<DeleteOutcome, NoteServiceError> {
        let outcome = self.store.transact(|doc| {
            match doc
                .topic_mut(topic)
                .and_then(|topic| topic.remove_first_note(name))
            {
                Some(_) => TxOutcome::changed(DeleteOutcome::Deleted),
                None => TxOutcome::unchanged(DeleteOutcome::NotFound),
            }
        })?;

        info!(
            "event=note_delete module=service status={}",
            match outcome {
                DeleteOutcome::Deleted => "ok",
                DeleteOutcome::NotFound => "not_found",
            }
        );
        Ok(outcome)
    }
}

fn outcome_label(outcome: &EnrichOutcome) -> &'static str {
    match outcome {
        EnrichOutcome::Enriched => "ok",
        EnrichOutcome::NoInfo => "no_info",
        EnrichOutcome::LookupFailed(_) => "lookup_failed",
        EnrichOutcome::NoteNotFound => "not_found",
    }
}

#[cfg(test)]
mod tests {
    use super::{DeleteOutcome, EnrichOutcome};

    #[test]
    fn delete_status_messages_match_wire_contract() {
        assert_eq!(
            DeleteOutcome::Deleted.status_message("Biology", "Cell"),
            "Note 'Cell' under topic 'Biology' was deleted successfully."
        );
        assert_eq!(
            DeleteOutcome::NotFound.status_message("Biology", "Cell"),
            "Note or topic not found."
        );
    }

    #[test]
    fn lookup_failure_and_no_info_share_status() {
        let failed = EnrichOutcome::LookupFailed("timeout".to_string()).status_message("t", "n");
        assert_eq!(failed, EnrichOutcome::NoInfo.status_message("t", "n"));
        assert_eq!(
            EnrichOutcome::NoteNotFound.status_message("Biology", "Cell"),
            "No note named 'Cell' under topic 'Biology' was found."
        );
    }
}
