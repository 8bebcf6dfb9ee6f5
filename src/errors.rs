use std::time::Duration;

use thiserror::Error;

/// All errors that can occur while encoding notes or talking to the vault.
#[derive(Debug, Error)]
pub enum NoteVaultError {
    // --- Vault lookups ---
    #[error("Entry '{0}' not found in the vault")]
    NotFound(String),

    #[error("An entry named '{0}' already exists in the vault (import it instead of creating it)")]
    DuplicateName(String),

    #[error("{count} vault entries match '{query}', unable to determine which one to use")]
    AmbiguousIdentity { query: String, count: usize },

    #[error("Invalid vault entry id '{0}'")]
    InvalidIdentifier(String),

    // --- Collaborator failures ---
    #[error("Vault sync failed: {0}")]
    SyncFailed(String),

    #[error("Vault client error: {0}")]
    GatewayError(String),

    #[error(
        "Timed out after {attempts} attempts ({}s) waiting for '{name}' to get an id; \
         the entry may still appear in the vault, re-read before retrying",
        waited.as_secs()
    )]
    CreateTimeout {
        name: String,
        attempts: u32,
        waited: Duration,
    },

    // --- Note templates ---
    #[error("Malformed note template: {0}")]
    DecodeError(String),

    #[error("{note_type} note is missing required field '{field}'")]
    MissingField {
        note_type: &'static str,
        field: &'static str,
    },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NoteVaultError {
    /// Whether the caller can treat this as a normal state rather than a failure.
    ///
    /// `NotFound` means the entry is absent (drift or idempotent delete);
    /// `DuplicateName` tripped before anything was written.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::DuplicateName(_))
    }
}

/// Convenience type alias for notevault results.
pub type Result<T> = std::result::Result<T, NoteVaultError>;
