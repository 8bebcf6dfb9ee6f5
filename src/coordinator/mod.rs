//! Create/read/update/delete against an eventually-consistent vault.
//!
//! The vault accepts a new entry long before it can be read back with a
//! real id: right after `lpass add` the entry is either missing, or present
//! with id `"0"`, until the client has synced with the server.  `create`
//! therefore polls (pause, sync, read by name) until exactly one entry with
//! a real id shows up, bounded by a [`PollPolicy`].  Nothing else retries.
//!
//! The vault also happily stores several entries under the same name, which
//! would make that name lookup ambiguous.  `create` refuses to write when
//! the name is already taken.
//!
//! There is no cancellation inside the poll loop.  A caller that gives up
//! early (external timeout) must treat the vault state as unknown: the
//! entry may still appear later.

pub mod poll;

use tracing::{debug, info, warn};

use crate::errors::{NoteVaultError, Result};
use crate::gateway::{EntryQuery, VaultClient, VaultGateway, WriteTarget};
use crate::notes::record::is_resolved_id;
use crate::notes::{codec, NoteType, SecretRecord};

pub use poll::{Pause, PollPolicy, ThreadPause};

/// Runs vault mutations for one caller.  Holds no per-entry state.
pub struct MutationCoordinator<C, P = ThreadPause> {
    gateway: VaultGateway<C>,
    policy: PollPolicy,
    pause: P,
}

impl<C: VaultClient> MutationCoordinator<C> {
    pub fn new(gateway: VaultGateway<C>, policy: PollPolicy) -> Self {
        Self::with_pause(gateway, policy, ThreadPause)
    }
}

impl<C: VaultClient, P: Pause> MutationCoordinator<C, P> {
    pub fn with_pause(gateway: VaultGateway<C>, policy: PollPolicy, pause: P) -> Self {
        Self {
            gateway,
            policy,
            pause,
        }
    }

    pub fn gateway(&self) -> &VaultGateway<C> {
        &self.gateway
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Write `record` as a new `note_type` entry and wait for its id.
    ///
    /// Returns the entry as the vault stores it.  Any error after the write
    /// was submitted means a partially synced (or duplicate) entry may now
    /// exist; re-read before retrying.
    pub fn create(&self, record: &SecretRecord, note_type: NoteType) -> Result<SecretRecord> {
        let name = record.name.as_str();
        if name.trim().is_empty() {
            return Err(NoteVaultError::MissingField {
                note_type: note_type.label(),
                field: "Name",
            });
        }
        note_type.check_required(record)?;

        let existing = self.find_by_name(name)?;
        if !existing.is_empty() {
            return Err(NoteVaultError::DuplicateName(name.to_string()));
        }

        let template = codec::encode(record, note_type);
        let target = WriteTarget::Create {
            name: name.to_string(),
            note_type: note_type.vault_flag(),
        };
        info!(name, %note_type, "creating vault entry");

        let outcome = self
            .gateway
            .write(&target, &template)
            .and_then(|()| self.await_id(name));
        if let Err(ref e) = outcome {
            warn!(
                name,
                error = %e,
                "create did not complete; the vault may hold a partially synced entry"
            );
        }
        outcome
    }

    /// Poll until the vault reports exactly one entry named `name` with a
    /// real id.
    fn await_id(&self, name: &str) -> Result<SecretRecord> {
        let mut waited = std::time::Duration::ZERO;

        for attempt in 1..=self.policy.attempts {
            self.pause.pause(self.policy.interval);
            waited += self.policy.interval;

            self.gateway.sync()?;
            let mut matches = self.find_by_name(name)?;
            if matches.len() > 1 {
                return Err(NoteVaultError::AmbiguousIdentity {
                    query: name.to_string(),
                    count: matches.len(),
                });
            }
            match matches.pop() {
                Some(found) if found.is_resolved() => {
                    info!(name, id = %found.id, attempt, "vault entry created");
                    return Ok(found);
                }
                Some(_) => debug!(name, attempt, "entry visible but not synced yet"),
                None => debug!(name, attempt, "entry not visible yet"),
            }
        }

        Err(NoteVaultError::CreateTimeout {
            name: name.to_string(),
            attempts: self.policy.attempts,
            waited,
        })
    }

    /// Entries whose name or full name is exactly `name`.
    fn find_by_name(&self, name: &str) -> Result<Vec<SecretRecord>> {
        self.gateway.read_named(name)
    }

    /// Look up one entry.  Absence is `Ok(None)`, not an error.
    ///
    /// A name query only counts entries whose name or full name is exactly
    /// the requested one, the same rule `create` enforces.
    pub fn read(&self, query: &EntryQuery) -> Result<Option<SecretRecord>> {
        let found = match query {
            EntryQuery::Id(_) => self.gateway.read(query),
            EntryQuery::Name(name) => self.gateway.read_named(name),
        };
        match found {
            Ok(mut records) => {
                if records.len() > 1 {
                    return Err(NoteVaultError::AmbiguousIdentity {
                        query: query.to_string(),
                        count: records.len(),
                    });
                }
                if records.is_empty() {
                    debug!(%query, "entry absent");
                }
                Ok(records.pop())
            }
            Err(NoteVaultError::NotFound(_)) => {
                debug!(%query, "entry absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Rewrite an existing entry in place and return it as re-read.
    ///
    /// The id is already resolved, so there is nothing to poll for.
    pub fn update(&self, record: &SecretRecord, note_type: NoteType) -> Result<SecretRecord> {
        if !record.is_resolved() {
            return Err(NoteVaultError::InvalidIdentifier(record.id.clone()));
        }
        note_type.check_required(record)?;

        let template = codec::encode(record, note_type);
        let target = WriteTarget::Update {
            id: record.id.clone(),
        };
        info!(id = %record.id, %note_type, "updating vault entry");
        self.gateway.write(&target, &template)?;

        self.read(&EntryQuery::Id(record.id.clone()))?
            .ok_or_else(|| NoteVaultError::NotFound(record.id.clone()))
    }

    /// Remove an entry.  Deleting something already gone succeeds.
    pub fn delete(&self, id: &str) -> Result<()> {
        if !is_resolved_id(id) {
            debug!(id, "nothing to delete for an unassigned id");
            return Ok(());
        }
        match self.gateway.delete(id) {
            Ok(()) => {
                info!(id, "vault entry deleted");
                Ok(())
            }
            Err(NoteVaultError::NotFound(_)) => {
                info!(id, "vault entry already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Adopt an entry that already exists in the vault, by numeric id.
    pub fn import(&self, id: &str) -> Result<SecretRecord> {
        if !is_resolved_id(id) || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NoteVaultError::InvalidIdentifier(id.to_string()));
        }
        self.read(&EntryQuery::Id(id.to_string()))?
            .ok_or_else(|| NoteVaultError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ClientError, RawEntry};
    use std::cell::Cell;
    use std::time::Duration;

    /// Client that fails every call; tests here only reach the guards.
    struct Unreachable {
        calls: Cell<u32>,
    }

    impl VaultClient for Unreachable {
        fn read(&self, _: &EntryQuery) -> std::result::Result<Vec<RawEntry>, ClientError> {
            self.calls.set(self.calls.get() + 1);
            Err(ClientError::new("unreachable"))
        }
        fn write(&self, _: &WriteTarget, _: &str) -> std::result::Result<(), ClientError> {
            self.calls.set(self.calls.get() + 1);
            Err(ClientError::new("unreachable"))
        }
        fn delete(&self, _: &str) -> std::result::Result<(), ClientError> {
            self.calls.set(self.calls.get() + 1);
            Err(ClientError::new("unreachable"))
        }
        fn sync(&self) -> std::result::Result<(), ClientError> {
            self.calls.set(self.calls.get() + 1);
            Err(ClientError::new("unreachable"))
        }
    }

    struct NoPause;

    impl Pause for NoPause {
        fn pause(&self, _: Duration) {}
    }

    fn coordinator() -> MutationCoordinator<Unreachable, NoPause> {
        let client = Unreachable {
            calls: Cell::new(0),
        };
        MutationCoordinator::with_pause(VaultGateway::new(client), PollPolicy::default(), NoPause)
    }

    fn calls(c: &MutationCoordinator<Unreachable, NoPause>) -> u32 {
        c.gateway().client().calls.get()
    }

    #[test]
    fn create_rejects_blank_name_without_calling_the_vault() {
        let c = coordinator();
        let err = c.create(&SecretRecord::new("  "), NoteType::Generic).unwrap_err();
        assert!(matches!(err, NoteVaultError::MissingField { field: "Name", .. }));
        assert_eq!(calls(&c), 0);
    }

    #[test]
    fn create_checks_required_template_fields_first() {
        let c = coordinator();
        let record = SecretRecord::new("deploy").with_field("Public Key", "ssh-ed25519 AAAA");
        let err = c.create(&record, NoteType::SshKey).unwrap_err();
        assert!(matches!(
            err,
            NoteVaultError::MissingField {
                field: "Private Key",
                ..
            }
        ));
        assert_eq!(calls(&c), 0);
    }

    #[test]
    fn update_requires_a_resolved_id() {
        let c = coordinator();
        let mut record = SecretRecord::new("db1");
        assert!(matches!(
            c.update(&record, NoteType::Generic),
            Err(NoteVaultError::InvalidIdentifier(_))
        ));
        record.id = "0".to_string();
        assert!(matches!(
            c.update(&record, NoteType::Generic),
            Err(NoteVaultError::InvalidIdentifier(ref id)) if id == "0"
        ));
        assert_eq!(calls(&c), 0);
    }

    #[test]
    fn delete_of_unassigned_ids_is_a_no_op() {
        let c = coordinator();
        c.delete("").unwrap();
        c.delete("0").unwrap();
        assert_eq!(calls(&c), 0);
    }

    #[test]
    fn delete_surfaces_hard_failures() {
        let c = coordinator();
        let err = c.delete("42").unwrap_err();
        assert!(matches!(err, NoteVaultError::GatewayError(ref m) if m == "unreachable"));
    }

    #[test]
    fn import_rejects_non_numeric_ids() {
        let c = coordinator();
        for id in ["", "0", "abc", "12a", "-4"] {
            assert!(
                matches!(c.import(id), Err(NoteVaultError::InvalidIdentifier(_))),
                "{id:?}"
            );
        }
        assert_eq!(calls(&c), 0);
    }
}
