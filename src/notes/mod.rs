//! Notes module: secure-note templates and the record they describe.
//!
//! This module provides:
//! - `NoteType` and its field templates (`catalog`)
//! - Template rendering and parsing (`codec`)
//! - `SecretRecord`, the in-memory form of a vault entry (`record`)

pub mod catalog;
pub mod codec;
pub mod record;

// Re-export the most commonly used items.
pub use catalog::{FieldSpec, NoteType, NOTES_FIELD, NOTE_TYPE_MARKER};
pub use codec::{decode, encode};
pub use record::{SecretRecord, UNRESOLVED_ID};
