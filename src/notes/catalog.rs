//! Note-type templates.
//!
//! Every note type the vault knows about renders as a fixed, ordered list
//! of `Field: value` lines followed by a free-form `Notes` section.  This
//! module is the single table of those layouts; the codec reads it and
//! never hard-codes field names of its own.

use std::fmt;

use super::record::SecretRecord;
use crate::errors::{NoteVaultError, Result};

/// Prefix the vault writes in front of every typed note (`NoteType:Server`).
pub const NOTE_TYPE_MARKER: &str = "NoteType:";

/// Name of the trailing free-text field shared by every template.
pub const NOTES_FIELD: &str = "Notes";

/// One field of a note template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key used both in the template text and in the decoded field map.
    pub name: &'static str,
    /// Create/update refuses to write a note without this value.
    pub required: bool,
    /// Value is a credential and must not show up in logs.
    pub sensitive: bool,
    /// Value may span several lines and contain anything, including
    /// `Name:` lookalike lines.  Only the trailing `Notes` field sets this.
    pub multiline: bool,
}

impl FieldSpec {
    const fn line(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            sensitive: false,
            multiline: false,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    const fn notes() -> Self {
        Self {
            name: NOTES_FIELD,
            required: false,
            sensitive: false,
            multiline: true,
        }
    }
}

const GENERIC_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("Name"),
    FieldSpec::line("URL"),
    FieldSpec::line("Username"),
    FieldSpec::line("Password").sensitive(),
    FieldSpec::notes(),
];

// lastpass-cli notes.c, "Server"
const SERVER_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("Hostname"),
    FieldSpec::line("Username").required().sensitive(),
    FieldSpec::line("Password").required().sensitive(),
    FieldSpec::notes(),
];

// lastpass-cli notes.c, "SSH Key"
const SSH_KEY_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("Date"),
    FieldSpec::line("Hostname"),
    FieldSpec::line("Public Key").required().sensitive(),
    FieldSpec::line("Private Key").required().sensitive(),
    FieldSpec::line("Passphrase").sensitive(),
    FieldSpec::line("Format"),
    FieldSpec::line("Bit Strength"),
    FieldSpec::notes(),
];

/// The closed set of note layouts this crate can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteType {
    /// Plain site/secret entry: flat fields plus free-text notes, no marker.
    Generic,
    Server,
    SshKey,
}

impl NoteType {
    pub const ALL: [NoteType; 3] = [NoteType::Generic, NoteType::Server, NoteType::SshKey];

    /// Ordered template for this note type; the last entry is always `Notes`.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            NoteType::Generic => GENERIC_FIELDS,
            NoteType::Server => SERVER_FIELDS,
            NoteType::SshKey => SSH_KEY_FIELDS,
        }
    }

    /// Label the vault stores after `NoteType:`.
    pub fn label(self) -> &'static str {
        match self {
            NoteType::Generic => "Generic",
            NoteType::Server => "Server",
            NoteType::SshKey => "SSH Key",
        }
    }

    /// Value for the client's `--note-type=` flag.  `None` for plain entries.
    pub fn vault_flag(self) -> Option<&'static str> {
        match self {
            NoteType::Generic => None,
            NoteType::Server => Some("server"),
            NoteType::SshKey => Some("ssh-key"),
        }
    }

    /// Reverse of [`NoteType::label`], for notes read back from the vault.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|t| t.label() == label)
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Fails with the first required template field the record leaves empty.
    pub fn check_required(self, record: &SecretRecord) -> Result<()> {
        for spec in self.fields().iter().filter(|f| f.required) {
            let present = record
                .custom_fields()
                .get(spec.name)
                .is_some_and(|v| !v.is_empty());
            if !present {
                return Err(NoteVaultError::MissingField {
                    note_type: self.label(),
                    field: spec.name,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
