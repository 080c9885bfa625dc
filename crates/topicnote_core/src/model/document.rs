//! Document, topic and note records.
//!
//! # Responsibility
//! - Describe the full persisted state as plain serde data.
//! - Provide the mutation helpers used inside store transactions.
//! - Validate persisted state on load.
//!
//! # Invariants
//! - `Document::find_or_create_topic` never creates a second topic with an
//!   existing name.
//! - Every note carries at least one text fragment and a timestamp in
//!   `TIMESTAMP_FORMAT`.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persisted timestamp layout, e.g. `10/19/26 - 14:03:07`.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%y - %H:%M:%S";

/// Latest document format version written by this crate.
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Whole persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Format version; documents newer than `DOCUMENT_FORMAT_VERSION` are rejected.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Topics in insertion order.
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// Named grouping of notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Named entry holding ordered text fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub name: String,
    /// Creation time formatted with `TIMESTAMP_FORMAT`.
    pub timestamp: String,
    /// Original body first, then any appended enrichment fragments.
    #[serde(rename = "text")]
    pub fragments: Vec<String>,
}

/// Persisted state that violates document invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    DuplicateTopic(String),
    EmptyNote { topic: String, note: String },
    InvalidTimestamp {
        topic: String,
        note: String,
        value: String,
    },
}

impl Display for DocumentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTopic(name) => write!(f, "duplicate topic `{name}`"),
            Self::EmptyNote { topic, note } => {
                write!(f, "note `{note}` in topic `{topic}` has no text fragments")
            }
            Self::InvalidTimestamp { topic, note, value } => write!(
                f,
                "note `{note}` in topic `{topic}` has invalid timestamp `{value}`"
            ),
        }
    }
}

impl Error for DocumentValidationError {}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// Creates a document with zero topics.
    pub fn empty() -> Self {
        Self {
            version: DOCUMENT_FORMAT_VERSION,
            topics: Vec::new(),
        }
    }

    /// Returns the topic with `name`, if present.
    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|topic| topic.name == name)
    }

    /// Mutable variant of [`Document::topic`].
    pub fn topic_mut(&mut self, name: &str) -> Option<&mut Topic> {
        self.topics.iter_mut().find(|topic| topic.name == name)
    }

    /// Returns the named topic, appending an empty one when absent.
    pub fn find_or_create_topic(&mut self, name: &str) -> &mut Topic {
        let index = match self.topics.iter().position(|topic| topic.name == name) {
            Some(index) => index,
            None => {
                self.topics.push(Topic::new(name));
                self.topics.len() - 1
            }
        };
        &mut self.topics[index]
    }

    /// Total number of notes across all topics.
    pub fn note_count(&self) -> usize {
        self.topics.iter().map(|topic| topic.notes.len()).sum()
    }

    /// Checks invariants that serde alone cannot enforce.
    pub fn validate(&self) -> Result<(), DocumentValidationError> {
        for (index, topic) in self.topics.iter().enumerate() {
            if self.topics[..index]
                .iter()
                .any(|earlier| earlier.name == topic.name)
            {
                return Err(DocumentValidationError::DuplicateTopic(topic.name.clone()));
            }
            for note in &topic.notes {
                if note.fragments.is_empty() {
                    return Err(DocumentValidationError::EmptyNote {
                        topic: topic.name.clone(),
                        note: note.name.clone(),
                    });
                }
                if parse_timestamp(&note.timestamp).is_none() {
                    return Err(DocumentValidationError::InvalidTimestamp {
                        topic: topic.name.clone(),
                        note: note.name.clone(),
                        value: note.timestamp.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: Vec::new(),
        }
    }

    /// First note named `name` in stored order.
    pub fn note(&self, name: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.name == name)
    }

    /// Mutable variant of [`Topic::note`]; same first-match rule.
    pub fn note_mut(&mut self, name: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.name == name)
    }

    /// Removes the first note named `name`. Later duplicates are untouched.
    pub fn remove_first_note(&mut self, name: &str) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.name == name)?;
        Some(self.notes.remove(index))
    }
}

impl Note {
    /// Creates a note stamped with the current local time.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_timestamp(name, body, current_timestamp())
    }

    /// Creates a note with a caller-provided timestamp string.
    pub fn with_timestamp(
        name: impl Into<String>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            timestamp: timestamp.into(),
            fragments: vec![body.into()],
        }
    }

    /// Appends one text fragment after the existing ones.
    pub fn push_fragment(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    /// All fragments joined by newline in insertion order.
    pub fn joined_text(&self) -> String {
        self.fragments.join("\n")
    }
}

/// Formats the current local time with `TIMESTAMP_FORMAT`.
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a persisted timestamp; `None` when it does not match `TIMESTAMP_FORMAT`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

fn default_version() -> u32 {
    DOCUMENT_FORMAT_VERSION
}

#[cfg(test)]
mod tests {
    use super::{
        current_timestamp, parse_timestamp, Document, DocumentValidationError, Note, Topic,
    };

    #[test]
    fn find_or_create_topic_reuses_existing_topic() {
        let mut doc = Document::empty();
        doc.find_or_create_topic("Biology")
            .notes
            .push(Note::new("Cell", "Basic unit of life"));
        doc.find_or_create_topic("Biology")
            .notes
            .push(Note::new("Gene", "Unit of heredity"));

        assert_eq!(doc.topics.len(), 1);
        assert_eq!(doc.note_count(), 2);
    }

    #[test]
    fn remove_first_note_leaves_later_duplicate() {
        let mut topic = Topic::new("Physics");
        topic
            .notes
            .push(Note::with_timestamp("Atom", "first", "01/02/24 - 03:04:05"));
        topic
            .notes
            .push(Note::with_timestamp("Atom", "second", "01/02/24 - 03:04:06"));

        let removed = topic.remove_first_note("Atom").expect("first duplicate removed");
        assert_eq!(removed.fragments, vec!["first".to_string()]);
        assert_eq!(topic.notes.len(), 1);
        assert_eq!(topic.notes[0].fragments, vec!["second".to_string()]);
        assert!(topic.remove_first_note("Missing").is_none());
    }

    #[test]
    fn current_timestamp_round_trips_through_parser() {
        assert!(parse_timestamp(&current_timestamp()).is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05").is_none());
    }

    #[test]
    fn joined_text_keeps_fragment_order() {
        let mut note = Note::new("Cell", "body");
        note.push_fragment("Wikipedia Summary: s");
        note.push_fragment("Wikipedia Link: l");
        assert_eq!(note.joined_text(), "body\nWikipedia Summary: s\nWikipedia Link: l");
    }

    #[test]
    fn validate_rejects_bad_timestamp_and_duplicate_topics() {
        let mut doc = Document::empty();
        doc.topics.push(Topic::new("A"));
        doc.topics.push(Topic::new("A"));
        assert_eq!(
            doc.validate(),
            Err(DocumentValidationError::DuplicateTopic("A".to_string()))
        );

        let mut doc = Document::empty();
        doc.find_or_create_topic("A")
            .notes
            .push(Note::with_timestamp("n", "t", "yesterday"));
        assert!(matches!(
            doc.validate(),
            Err(DocumentValidationError::InvalidTimestamp { .. })
        ));
    }
}
