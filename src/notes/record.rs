//! The in-memory form of one vault entry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use zeroize::Zeroize;

use super::catalog::{NoteType, NOTE_TYPE_MARKER};
use super::codec;
use crate::errors::Result;

/// Id the vault reports for an entry it has accepted but not yet synced.
pub const UNRESOLVED_ID: &str = "0";

/// Key the decoder stores the `NoteType:` label under.
pub const NOTE_TYPE_FIELD: &str = "NoteType";

/// One vault entry.
///
/// `raw_note` is the source of truth: for records read back from the vault,
/// `custom_fields` is always `codec::decode(raw_note)` and can only change
/// through [`SecretRecord::set_raw_note`].  A pending record built by a
/// caller (empty `id`) instead carries the template values it wants written
/// in `custom_fields` (see [`SecretRecord::with_field`]) and, for plain
/// entries, the free-text notes in `raw_note`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretRecord {
    /// Vault-assigned id; `""` until created, [`UNRESOLVED_ID`] while unsynced.
    pub id: String,
    pub name: String,
    /// Name including the folder path (`Shared-Infra/db1`).
    pub fullname: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub group: String,
    pub share: String,
    /// Unix seconds as reported by the vault, kept verbatim.
    pub last_modified: String,
    pub last_touched: String,
    raw_note: String,
    custom_fields: BTreeMap<String, String>,
}

impl SecretRecord {
    /// Start a pending record that has never been written to the vault.
    pub fn new(name: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.name = name.into();
        record
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Free-text notes of a plain entry (the `Notes:` section of the
    /// generic template).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.raw_note = note.into();
        self
    }

    /// Set a template value (`Hostname`, `Private Key`, `Notes`, ...) to be
    /// rendered when this record is created or updated as a typed note.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_fields.insert(name.into(), value.into());
        self
    }

    pub fn raw_note(&self) -> &str {
        &self.raw_note
    }

    pub fn custom_fields(&self) -> &BTreeMap<String, String> {
        &self.custom_fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.custom_fields.get(name).map(String::as_str)
    }

    /// Replace the note text and re-derive the custom fields from it.
    ///
    /// On a decode error the record is left unchanged.
    pub fn set_raw_note(&mut self, note: impl Into<String>) -> Result<()> {
        let note = note.into();
        let fields = codec::decode(&note)?;
        self.raw_note.zeroize();
        self.raw_note = note;
        self.replace_fields(fields);
        Ok(())
    }

    /// Note type named by the note's `NoteType:` line, `Generic` when the
    /// note carries no marker, and `None` for a type this crate cannot write.
    pub fn note_type(&self) -> Option<NoteType> {
        if !self.raw_note.starts_with(NOTE_TYPE_MARKER) {
            return Some(NoteType::Generic);
        }
        self.field(NOTE_TYPE_FIELD).and_then(NoteType::from_label)
    }

    /// Never written to the vault.
    pub fn is_pending(&self) -> bool {
        self.id.is_empty()
    }

    /// Has a real vault id that can address the entry.
    pub fn is_resolved(&self) -> bool {
        is_resolved_id(&self.id)
    }

    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_seconds(&self.last_modified)
    }

    pub fn last_touched_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_seconds(&self.last_touched)
    }

    fn replace_fields(&mut self, fields: BTreeMap<String, String>) {
        for value in self.custom_fields.values_mut() {
            value.zeroize();
        }
        self.custom_fields = fields;
    }
}

/// True for ids the vault actually assigned (not empty, not [`UNRESOLVED_ID`]).
pub fn is_resolved_id(id: &str) -> bool {
    !id.is_empty() && id != UNRESOLVED_ID
}

fn parse_unix_seconds(value: &str) -> Option<DateTime<Utc>> {
    let secs = value.trim().parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}

impl Drop for SecretRecord {
    fn drop(&mut self) {
        self.password.zeroize();
        self.raw_note.zeroize();
        for value in self.custom_fields.values_mut() {
            value.zeroize();
        }
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fullname", &self.fullname)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("url", &self.url)
            .field("group", &self.group)
            .field("share", &self.share)
            .field("last_modified", &self.last_modified)
            .field("last_touched", &self.last_touched)
            .field("raw_note", &"<REDACTED>")
            .field("custom_fields", &self.custom_fields.keys().collect::<Vec<_>>())
            .finish()
    }
}
