//! In-memory stand-in for the `lpass` client.
//!
//! Mimics the behaviour the coordinator has to cope with: a created entry
//! stays invisible for a number of syncs, then shows up with id "0" for a
//! few more, and only then gets a real id.  Typed notes come back with the
//! `NoteType:` line the vault prepends, and every stored note loses its
//! trailing newline.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::time::Duration;

use notevault::coordinator::{MutationCoordinator, Pause, PollPolicy};
use notevault::gateway::{
    ClientError, EntryQuery, RawEntry, VaultClient, VaultGateway, NOT_FOUND_MESSAGE,
};

pub const TEST_INTERVAL: Duration = Duration::from_secs(30);

struct Stored {
    entry: RawEntry,
    /// Syncs left before reads can see the entry.
    hidden_syncs: u32,
    /// Syncs left (once visible) before the entry gets its real id.
    unresolved_syncs: u32,
    real_id: String,
}

#[derive(Default)]
pub struct FakeVault {
    stored: RefCell<Vec<Stored>>,
    next_id: Cell<u32>,

    // behaviour knobs
    pub hidden_syncs: Cell<u32>,
    pub unresolved_syncs: Cell<u32>,
    pub never_resolve: Cell<bool>,
    pub duplicate_on_create: Cell<bool>,
    pub sync_error: RefCell<Option<String>>,
    pub write_error: RefCell<Option<String>>,

    // call log
    pub writes: RefCell<Vec<(notevault::gateway::WriteTarget, String)>>,
    pub reads: RefCell<Vec<EntryQuery>>,
    pub deletes: RefCell<Vec<String>>,
    pub syncs: Cell<u32>,
}

impl FakeVault {
    pub fn new() -> Self {
        let vault = Self::default();
        vault.next_id.set(4_482_100);
        vault
    }

    /// Put an already synced entry into the vault and return its id.
    pub fn seed(&self, fullname: &str, note: &str) -> String {
        let id = self.allocate_id();
        let mut entry = RawEntry::default();
        entry.id = id.clone();
        set_names(&mut entry, fullname);
        entry.url = "http://".to_string();
        entry.note = vault_trim(note).to_string();
        entry.last_modified_gmt = "1609459200".to_string();
        entry.last_touch = "1609459200".to_string();
        self.stored.borrow_mut().push(Stored {
            entry,
            hidden_syncs: 0,
            unresolved_syncs: 0,
            real_id: id.clone(),
        });
        id
    }

    /// Current note text of the entry with `id`, as the vault stores it.
    pub fn note_of(&self, id: &str) -> Option<String> {
        self.stored
            .borrow()
            .iter()
            .find(|s| s.entry.id == id)
            .map(|s| s.entry.note.clone())
    }

    pub fn len(&self) -> usize {
        self.stored.borrow().len()
    }

    fn allocate_id(&self) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id.to_string()
    }

    fn store_created(&self, name: &str, note_type: Option<&str>, template: &str) {
        let mut entry = RawEntry::default();
        entry.id = "0".to_string();
        set_names(&mut entry, name);
        entry.url = "http://".to_string();
        match note_type {
            Some(flag) => {
                entry.note = format!("NoteType:{}\n{}", label_for(flag), vault_trim(template));
            }
            None => apply_generic_template(&mut entry, template),
        }
        let real_id = self.allocate_id();
        self.stored.borrow_mut().push(Stored {
            entry,
            hidden_syncs: self.hidden_syncs.get(),
            unresolved_syncs: self.unresolved_syncs.get(),
            real_id,
        });
    }
}

fn set_names(entry: &mut RawEntry, fullname: &str) {
    entry.fullname = fullname.to_string();
    entry.name = fullname.rsplit('/').next().unwrap_or(fullname).to_string();
    entry.group = fullname
        .rsplit_once('/')
        .map(|(group, _)| group.to_string())
        .unwrap_or_default();
}

/// The vault drops the final newline of every note it saves.
fn vault_trim(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

fn label_for(flag: &str) -> &'static str {
    match flag {
        "server" => "Server",
        "ssh-key" => "SSH Key",
        _ => "Generic",
    }
}

/// Plain entries are split into flat fields; only the notes section is kept
/// as note text.  `Name:` renames (and may move) the entry.
fn apply_generic_template(entry: &mut RawEntry, template: &str) {
    let (head, notes) = template
        .split_once("Notes:    # Add notes below this line.\n")
        .unwrap_or((template, ""));
    for line in head.lines() {
        if let Some((key, value)) = line.split_once(": ") {
            match key {
                "Name" if !value.is_empty() => set_names(entry, value),
                "URL" if !value.is_empty() => entry.url = value.to_string(),
                "Username" => entry.username = value.to_string(),
                "Password" => entry.password = value.to_string(),
                _ => {}
            }
        }
    }
    entry.note = vault_trim(notes).to_string();
}

fn not_found(subject: &str) -> ClientError {
    ClientError::new(format!("Error: {NOT_FOUND_MESSAGE} '{subject}'."))
}

impl VaultClient for FakeVault {
    fn read(&self, query: &EntryQuery) -> Result<Vec<RawEntry>, ClientError> {
        self.reads.borrow_mut().push(query.clone());
        let stored = self.stored.borrow();
        let found: Vec<RawEntry> = stored
            .iter()
            .filter(|s| s.hidden_syncs == 0)
            .filter(|s| match query {
                EntryQuery::Id(id) => &s.entry.id == id,
                // `lpass show -F` is a substring search, not an exact match
                EntryQuery::Name(name) => s.entry.fullname.contains(name.as_str()),
            })
            .map(|s| s.entry.clone())
            .collect();
        if found.is_empty() {
            return Err(not_found(&query.to_string()));
        }
        Ok(found)
    }

    fn write(
        &self,
        target: &notevault::gateway::WriteTarget,
        template: &str,
    ) -> Result<(), ClientError> {
        use notevault::gateway::WriteTarget;

        self.writes
            .borrow_mut()
            .push((target.clone(), template.to_string()));
        if let Some(msg) = self.write_error.borrow().clone() {
            return Err(ClientError::new(msg));
        }

        match target {
            WriteTarget::Create { name, note_type } => {
                self.store_created(name, *note_type, template);
                if self.duplicate_on_create.get() {
                    self.store_created(name, *note_type, template);
                }
                Ok(())
            }
            WriteTarget::Update { id } => {
                let mut stored = self.stored.borrow_mut();
                let slot = stored
                    .iter_mut()
                    .find(|s| &s.entry.id == id)
                    .ok_or_else(|| not_found(id))?;
                match slot.entry.note.lines().next() {
                    Some(first) if first.starts_with("NoteType:") => {
                        slot.entry.note = format!("{first}\n{}", vault_trim(template));
                    }
                    _ => apply_generic_template(&mut slot.entry, template),
                }
                slot.entry.last_modified_gmt = "1609459300".to_string();
                Ok(())
            }
        }
    }

    fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.deletes.borrow_mut().push(id.to_string());
        let mut stored = self.stored.borrow_mut();
        let before = stored.len();
        stored.retain(|s| s.entry.id != id);
        if stored.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn sync(&self) -> Result<(), ClientError> {
        self.syncs.set(self.syncs.get() + 1);
        if let Some(msg) = self.sync_error.borrow().clone() {
            return Err(ClientError::new(msg));
        }
        let never_resolve = self.never_resolve.get();
        for s in self.stored.borrow_mut().iter_mut() {
            if s.hidden_syncs > 0 {
                s.hidden_syncs -= 1;
            } else if s.unresolved_syncs > 0 {
                s.unresolved_syncs -= 1;
            } else if !never_resolve && s.entry.id == "0" {
                s.entry.id = s.real_id.clone();
            }
        }
        Ok(())
    }
}

/// Pause that records instead of sleeping.
#[derive(Default)]
pub struct RecordingPause {
    pub count: Cell<u32>,
    pub total: Cell<Duration>,
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.count.set(self.count.get() + 1);
        self.total.set(self.total.get() + duration);
    }
}

pub fn policy(attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: TEST_INTERVAL,
        attempts,
    }
}

pub fn coordinator(
    vault: FakeVault,
    pause: &RecordingPause,
    attempts: u32,
) -> MutationCoordinator<FakeVault, &RecordingPause> {
    MutationCoordinator::with_pause(VaultGateway::new(vault), policy(attempts), pause)
}
