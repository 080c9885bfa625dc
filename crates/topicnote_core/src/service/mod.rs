//! Core use-case services.
//!
//! # Responsibility
//! - Express each public note operation as store transactions.
//! - Keep the RPC layer decoupled from storage and lookup details.

pub mod note_service;
