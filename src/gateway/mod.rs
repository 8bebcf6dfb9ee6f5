//! Gateway module: the boundary to the external vault client.
//!
//! The vault is reached through a collaborator we do not control (the
//! `lpass` binary in production, an in-memory fake in tests).  It offers
//! four blocking operations, modelled by [`VaultClient`], and reports
//! failures as free text.  [`VaultGateway`] wraps a client, turns that text
//! into [`NoteVaultError`] variants, and turns raw JSON entries into
//! decoded [`SecretRecord`]s.

pub mod lpass;

use std::fmt;

use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroize;

use crate::errors::{NoteVaultError, Result};
use crate::notes::SecretRecord;

pub use lpass::LpassCli;

/// Text the vault client prints when an id or name matches nothing.
pub const NOT_FOUND_MESSAGE: &str = "Could not find specified account";

/// What the vault reports for an entry whose URL was left blank.
const BLANK_URL: &str = "http://";

/// One entry exactly as the vault client returns it.
///
/// Not wiped on drop; [`VaultGateway`] moves the secrets into a
/// [`SecretRecord`] and zeroizes whatever is left.
#[derive(Debug, Clone, Default, Deserialize, Zeroize)]
#[serde(default)]
pub struct RawEntry {
    pub id: String,
    pub name: String,
    pub fullname: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub group: String,
    pub share: String,
    pub note: String,
    pub last_modified_gmt: String,
    pub last_touch: String,
}

/// How to look entries up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryQuery {
    /// Exact vault id.
    Id(String),
    /// Name filter; the client may return several entries.
    Name(String),
}

impl fmt::Display for EntryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryQuery::Id(id) => f.write_str(id),
            EntryQuery::Name(name) => f.write_str(name),
        }
    }
}

/// Where a template write goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// New entry by name.  `note_type` is the client's `--note-type` value.
    Create {
        name: String,
        note_type: Option<&'static str>,
    },
    /// Existing entry by resolved id.
    Update { id: String },
}

/// Failure reported by the vault client, with its diagnostic text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.message.contains(NOT_FOUND_MESSAGE)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.trim())
    }
}

/// The four operations the vault client offers.  All of them block.
pub trait VaultClient {
    fn read(&self, query: &EntryQuery) -> std::result::Result<Vec<RawEntry>, ClientError>;

    fn write(&self, target: &WriteTarget, template: &str) -> std::result::Result<(), ClientError>;

    fn delete(&self, id: &str) -> std::result::Result<(), ClientError>;

    /// Reconcile the client's local cache with the remote vault.
    fn sync(&self) -> std::result::Result<(), ClientError>;
}

/// A vault client plus error normalization.
pub struct VaultGateway<C> {
    client: C,
}

impl<C: VaultClient> VaultGateway<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Read and decode every entry matching `query`.
    ///
    /// Nothing matching is `NotFound`, whether the client reports it as an
    /// error or as an empty list.
    pub fn read(&self, query: &EntryQuery) -> Result<Vec<SecretRecord>> {
        let entries = self
            .client
            .read(query)
            .map_err(|e| classify(e, &query.to_string()))?;
        debug!(%query, matches = entries.len(), "vault read");
        if entries.is_empty() {
            return Err(NoteVaultError::NotFound(query.to_string()));
        }
        entries.into_iter().map(to_record).collect()
    }

    /// Entries whose name or full name is exactly `name`.
    ///
    /// The client's name lookup is a substring search, so the raw results
    /// are filtered before anything is decoded.  No exact match is an
    /// empty list, not `NotFound`.
    pub fn read_named(&self, name: &str) -> Result<Vec<SecretRecord>> {
        let query = EntryQuery::Name(name.to_string());
        let entries = match self.client.read(&query) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(classify(e, name)),
        };
        let total = entries.len();
        let exact: Vec<RawEntry> = entries
            .into_iter()
            .filter_map(|mut raw| {
                if raw.name == name || raw.fullname == name {
                    Some(raw)
                } else {
                    raw.zeroize();
                    None
                }
            })
            .collect();
        debug!(name, matches = total, exact = exact.len(), "vault read by name");
        exact.into_iter().map(to_record).collect()
    }

    pub fn write(&self, target: &WriteTarget, template: &str) -> Result<()> {
        debug!(?target, "vault write");
        self.client.write(target, template).map_err(|e| {
            let subject = match target {
                WriteTarget::Create { name, .. } => name,
                WriteTarget::Update { id } => id,
            };
            classify(e, subject)
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        debug!(id, "vault delete");
        self.client.delete(id).map_err(|e| classify(e, id))
    }

    pub fn sync(&self) -> Result<()> {
        self.client
            .sync()
            .map_err(|e| NoteVaultError::SyncFailed(e.to_string()))
    }
}

fn classify(err: ClientError, subject: &str) -> NoteVaultError {
    if err.is_not_found() {
        NoteVaultError::NotFound(subject.to_string())
    } else {
        NoteVaultError::GatewayError(err.to_string())
    }
}

/// Build a decoded record from a raw entry, undoing the vault's quirks.
fn to_record(mut raw: RawEntry) -> Result<SecretRecord> {
    let mut record = SecretRecord::new(std::mem::take(&mut raw.name));
    record.id = std::mem::take(&mut raw.id);
    record.fullname = std::mem::take(&mut raw.fullname);
    record.username = std::mem::take(&mut raw.username);
    record.password = std::mem::take(&mut raw.password);
    record.url = if raw.url == BLANK_URL {
        String::new()
    } else {
        std::mem::take(&mut raw.url)
    };
    record.group = std::mem::take(&mut raw.group);
    record.share = std::mem::take(&mut raw.share);
    record.last_modified = std::mem::take(&mut raw.last_modified_gmt);
    record.last_touched = std::mem::take(&mut raw.last_touch);
    let decoded = record.set_raw_note(std::mem::take(&mut raw.note));
    raw.zeroize();
    decoded.map(|()| record)
}
