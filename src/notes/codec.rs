//! Secure-note template codec.
//!
//! A typed note is stored by the vault as plain text:
//!
//! ```text
//! NoteType:Server
//! Hostname:db1
//! Username:admin
//! Password:pw
//! Notes:first line
//! second line: with a colon
//! ```
//!
//! Values may contain colons, and the trailing `Notes` value may contain
//! anything at all, so a line-by-line `split(':')` is ambiguous.  Decoding
//! is therefore two explicit passes:
//!
//! 1. [`mark_boundaries`] replaces the newline in front of every field line
//!    with [`FIELD_BOUNDARY`], a control character that never appears in
//!    values.  Marking stops after `Notes:` since everything that follows
//!    belongs to it.
//! 2. [`split_fields`] cuts the text at those markers and splits each piece
//!    at its first colon.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;

use super::catalog::{NoteType, NOTES_FIELD, NOTE_TYPE_MARKER};
use super::record::SecretRecord;
use crate::errors::{NoteVaultError, Result};

/// Reserved boundary marker (ASCII record separator).
pub const FIELD_BOUNDARY: char = '\u{1e}';

/// Comment the template puts on the `Notes:` line itself.
pub const NOTES_COMMENT: &str = "# Add notes below this line.";

/// A field line: name made of alphanumerics, spaces, `-` or `_`, then a colon.
fn field_line() -> &'static Regex {
    static FIELD_LINE: OnceLock<Regex> = OnceLock::new();
    FIELD_LINE.get_or_init(|| Regex::new(r"^([A-Za-z0-9 _-]+):").expect("valid regex"))
}

/// Render `record` as the template text for `note_type`.
///
/// Plain entries take their values from the flat record fields and their
/// notes from `raw_note`; typed entries take every value, `Notes` included,
/// from the record's custom fields.  Missing values render empty.
///
/// The notes section is followed by one newline.  The vault strips the
/// final newline of a note on save and [`decode`] strips one on the way
/// back, so repeated read/modify/write cycles do not drift.
pub fn encode(record: &SecretRecord, note_type: NoteType) -> String {
    let mut out = String::new();
    for spec in note_type.fields().iter().filter(|f| !f.multiline) {
        let value = match note_type {
            NoteType::Generic => generic_value(record, spec.name),
            NoteType::Server | NoteType::SshKey => record.field(spec.name).unwrap_or_default(),
        };
        let _ = writeln!(out, "{}: {value}", spec.name);
    }

    let notes = match note_type {
        NoteType::Generic => record.raw_note(),
        NoteType::Server | NoteType::SshKey => record.field(NOTES_FIELD).unwrap_or_default(),
    };
    let _ = writeln!(out, "{NOTES_FIELD}:    {NOTES_COMMENT}");
    out.push_str(notes);
    out.push('\n');
    out
}

fn generic_value<'a>(record: &'a SecretRecord, field: &str) -> &'a str {
    match field {
        // read-back records carry the folder path only in `fullname`
        "Name" if !record.fullname.is_empty() => &record.fullname,
        "Name" => &record.name,
        "URL" => &record.url,
        "Username" => &record.username,
        "Password" => &record.password,
        _ => "",
    }
}

/// Parse a stored note into its custom fields.
///
/// Only notes that start with `NoteType:` carry fields; anything else
/// decodes to an empty map.  Duplicate field names keep the last value.
pub fn decode(note: &str) -> Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    if !note.starts_with(NOTE_TYPE_MARKER) {
        return Ok(fields);
    }
    if note.contains(FIELD_BOUNDARY) {
        return Err(NoteVaultError::DecodeError(
            "note contains the reserved field boundary character".to_string(),
        ));
    }

    let marked = mark_boundaries(note);
    for (name, value) in split_fields(&marked)? {
        fields.insert(name.to_string(), value);
    }
    Ok(fields)
}

/// Pass one: frame the note with a leading newline and turn every newline
/// that starts a field line into [`FIELD_BOUNDARY`].
fn mark_boundaries(note: &str) -> String {
    let framed = format!("\n{note}");
    let mut marked = String::with_capacity(framed.len());
    let mut in_notes = false;

    for (i, line) in framed.split('\n').enumerate() {
        if i > 0 {
            let name = if in_notes { None } else { field_name(line) };
            match name {
                Some(name) => {
                    in_notes = name == NOTES_FIELD;
                    marked.push(FIELD_BOUNDARY);
                }
                None => marked.push('\n'),
            }
        }
        marked.push_str(line);
    }
    marked
}

fn field_name(line: &str) -> Option<&str> {
    field_line()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pass two: split marked text into `(name, value)` pairs.
fn split_fields(marked: &str) -> Result<Vec<(&str, String)>> {
    let mut segments = marked.split(FIELD_BOUNDARY);

    // Whatever precedes the first boundary is the empty frame line.
    if segments.next().is_some_and(|head| !head.is_empty()) {
        return Err(NoteVaultError::DecodeError(
            "text before the first field".to_string(),
        ));
    }

    segments
        .map(|segment| {
            let (name, value) = segment.split_once(':').ok_or_else(|| {
                NoteVaultError::DecodeError(format!("field without a colon: {segment:?}"))
            })?;
            let value = value.strip_prefix(' ').unwrap_or(value);
            let value = if name == NOTES_FIELD {
                notes_value(value)
            } else {
                value.to_string()
            };
            Ok((name, value))
        })
        .collect()
}

/// Drop the template comment and the one delimiter newline the encoder added.
fn notes_value(value: &str) -> String {
    let body = if value.trim_start().starts_with(NOTES_COMMENT) {
        value.split_once('\n').map(|(_, rest)| rest).unwrap_or("")
    } else {
        value
    };
    body.strip_suffix('\n').unwrap_or(body).to_string()
}
