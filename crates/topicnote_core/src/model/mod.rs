//! Hierarchical note document model.
//!
//! # Responsibility
//! - Define the persisted shape: document -> topics -> notes -> text fragments.
//! - Own lookup helpers with explicit first-match semantics.
//!
//! # Invariants
//! - Topic names are unique within a document.
//! - Note names are NOT unique within a topic; lookups resolve to the first
//!   match in stored order.
//! - Topics, notes and fragments keep insertion order.

pub mod document;
